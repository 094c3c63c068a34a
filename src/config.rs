//! Analyzer configuration
//!
//! Provider limits and the lookup tables the analyzer consults (vulnerable
//! ports, overlapping service-tag pairs, known service IP prefixes) are data,
//! not logic. They live here with serde defaults so a deployment can override
//! any of them from `config.json` without touching code.

use crate::core::error::{Error, Result};
use crate::core::findings::Severity;
use crate::utils::get_config_dir;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Provider limits checked by the counting engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    /// Unique addresses + security groups allowed per directional bucket
    #[serde(default = "default_max_addresses")]
    pub max_addresses_per_bucket: usize,
    /// Security group references allowed in one rule field
    #[serde(default = "default_max_asg")]
    pub max_asg_per_rule: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_addresses_per_bucket: default_max_addresses(),
            max_asg_per_rule: default_max_asg(),
        }
    }
}

fn default_max_addresses() -> usize {
    4000
}

fn default_max_asg() -> usize {
    100
}

/// A pair of service tags where `broader` already covers `narrower`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagOverlapRule {
    pub broader: String,
    pub narrower: String,
    pub severity: Severity,
    pub recommendation: String,
}

impl TagOverlapRule {
    fn new(broader: &str, narrower: &str, severity: Severity, recommendation: &str) -> Self {
        Self {
            broader: broader.to_string(),
            narrower: narrower.to_string(),
            severity,
            recommendation: recommendation.to_string(),
        }
    }
}

/// A provider-managed IP prefix that a service tag stands for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrefix {
    pub prefix: IpNetwork,
    pub service_tag: String,
}

/// Complete analyzer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzerConfig {
    #[serde(default)]
    pub limits: Limits,
    /// Destination ports whose exposure raises a rule's risk score
    #[serde(default = "default_vulnerable_ports")]
    pub vulnerable_ports: Vec<u16>,
    #[serde(default = "default_tag_overlaps")]
    pub tag_overlaps: Vec<TagOverlapRule>,
    #[serde(default = "default_service_prefixes")]
    pub service_prefixes: Vec<ServicePrefix>,
    /// Upper bound for the optional narrative collaborator (seconds)
    #[serde(default = "default_narrative_timeout")]
    pub narrative_timeout_secs: u64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            vulnerable_ports: default_vulnerable_ports(),
            tag_overlaps: default_tag_overlaps(),
            service_prefixes: default_service_prefixes(),
            narrative_timeout_secs: default_narrative_timeout(),
        }
    }
}

pub fn default_vulnerable_ports() -> Vec<u16> {
    vec![22, 3389, 80, 443, 21, 23, 25, 53, 135, 139, 445]
}

pub fn default_tag_overlaps() -> Vec<TagOverlapRule> {
    vec![
        TagOverlapRule::new(
            "Internet",
            "VirtualNetwork",
            Severity::Medium,
            "Rules using Internet already cover VirtualNetwork traffic; scope the Internet rule or drop the VirtualNetwork rule",
        ),
        TagOverlapRule::new(
            "Internet",
            "Storage",
            Severity::Low,
            "Storage endpoints are reachable through the Internet tag; keep the narrower Storage tag and tighten the Internet rule",
        ),
        TagOverlapRule::new(
            "Internet",
            "Sql",
            Severity::Low,
            "Sql endpoints are reachable through the Internet tag; keep the narrower Sql tag and tighten the Internet rule",
        ),
        TagOverlapRule::new(
            "AzureCloud",
            "Storage",
            Severity::Medium,
            "AzureCloud includes all Storage ranges; prefer the narrower Storage tag",
        ),
        TagOverlapRule::new(
            "AzureCloud",
            "Sql",
            Severity::Medium,
            "AzureCloud includes all Sql ranges; prefer the narrower Sql tag",
        ),
        TagOverlapRule::new(
            "AzureCloud",
            "AzureActiveDirectory",
            Severity::Low,
            "AzureCloud includes AzureActiveDirectory ranges; prefer the narrower tag",
        ),
    ]
}

pub fn default_service_prefixes() -> Vec<ServicePrefix> {
    [
        ("168.63.129.16/32", "AzureLoadBalancer"),
        ("20.190.128.0/18", "AzureActiveDirectory"),
        ("40.126.0.0/18", "AzureActiveDirectory"),
        ("20.60.0.0/16", "Storage"),
        ("52.239.0.0/16", "Storage"),
    ]
    .into_iter()
    .filter_map(|(prefix, tag)| {
        prefix.parse().ok().map(|prefix| ServicePrefix {
            prefix,
            service_tag: tag.to_string(),
        })
    })
    .collect()
}

fn default_narrative_timeout() -> u64 {
    30
}

impl AnalyzerConfig {
    /// Rejects configurations that would make every rule set non-compliant.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.limits.max_addresses_per_bucket == 0 {
            return Err(Error::Config {
                field: "limits.maxAddressesPerBucket".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.limits.max_asg_per_rule == 0 {
            return Err(Error::Config {
                field: "limits.maxAsgPerRule".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if let Some(rule) = self
            .tag_overlaps
            .iter()
            .find(|r| r.broader.eq_ignore_ascii_case(&r.narrower))
        {
            return Err(Error::Config {
                field: "tagOverlaps".to_string(),
                message: format!("tag {} cannot overlap itself", rule.broader),
            });
        }
        Ok(())
    }
}

/// Loads and validates a configuration file at an explicit path.
///
/// # Errors
///
/// Returns `Err` if the file cannot be read, is not valid JSON, or fails
/// validation.
pub async fn load_config_from(path: &Path) -> Result<AnalyzerConfig> {
    let json = tokio::fs::read_to_string(path).await?;
    let config: AnalyzerConfig = serde_json::from_str(&json)?;
    config.validate()?;
    Ok(config)
}

/// Loads the config from the user config directory, or returns the default
/// if it is missing or unusable.
pub async fn load_config() -> AnalyzerConfig {
    if let Some(mut path) = get_config_dir() {
        path.push("config.json");
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            match load_config_from(&path).await {
                Ok(config) => return config,
                Err(e) => tracing::warn!("Ignoring {}: {e}", path.display()),
            }
        }
    }
    AnalyzerConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_provider_limits() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.limits.max_addresses_per_bucket, 4000);
        assert_eq!(config.limits.max_asg_per_rule, 100);
        assert_eq!(config.vulnerable_ports.len(), 11);
        assert!(config.vulnerable_ports.contains(&3389));
        assert_eq!(config.service_prefixes.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: AnalyzerConfig =
            serde_json::from_str(r#"{"limits": {"maxAddressesPerBucket": 10}}"#).unwrap();
        assert_eq!(config.limits.max_addresses_per_bucket, 10);
        assert_eq!(config.limits.max_asg_per_rule, 100);
        assert_eq!(config.tag_overlaps, default_tag_overlaps());
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let mut config = AnalyzerConfig::default();
        config.limits.max_addresses_per_bucket = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("maxAddressesPerBucket"));
    }

    #[test]
    fn test_validate_rejects_self_overlap() {
        let mut config = AnalyzerConfig::default();
        config.tag_overlaps.push(TagOverlapRule::new(
            "Internet",
            "internet",
            Severity::Low,
            "noop",
        ));
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, r#"{"vulnerablePorts": [22], "narrativeTimeoutSecs": 5}"#)
            .await
            .unwrap();

        let config = load_config_from(&path).await.unwrap();
        assert_eq!(config.vulnerable_ports, vec![22]);
        assert_eq!(config.narrative_timeout_secs, 5);
    }

    #[tokio::test]
    async fn test_load_config_from_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        tokio::fs::write(&path, "{oops").await.unwrap();

        assert!(matches!(
            load_config_from(&path).await,
            Err(Error::Serialization(_))
        ));
    }
}
