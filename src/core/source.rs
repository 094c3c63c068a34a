//! Rule sources
//!
//! A [`RuleSource`] produces the rule snapshot an analysis runs on. The
//! production source reads a security group export from disk; the static
//! source hands back rules built in code.
//!
//! Accepted export layouts:
//!
//! - a bare array of rules
//! - `{ "securityRules": [...] }`
//! - `{ "properties": { "securityRules": [...] } }`
//!
//! Each rule may be flat or use the portal's nested form
//! (`{ "name": ..., "properties": { "priority": ..., ... } }`). Application
//! security group references may be plain ids or `{ "id": ... }` objects.

use crate::core::error::{Result, SourceError};
use crate::core::findings::Diagnostic;
use crate::core::rule::Rule;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const RULES_KEY: &str = "securityRules";
const ASG_KEYS: [&str; 2] = [
    "sourceApplicationSecurityGroups",
    "destinationApplicationSecurityGroups",
];

/// Rules plus whatever could not be turned into a rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedRules {
    pub rules: Vec<Rule>,
    pub diagnostics: Vec<Diagnostic>,
}

pub trait RuleSource {
    /// Short description used in logs.
    fn describe(&self) -> String;

    /// Produces the rule snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when no snapshot can be produced at all. Individual
    /// malformed rules are reported as diagnostics instead.
    fn load(&self) -> Result<LoadedRules>;
}

/// Reads a JSON security group export.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RuleSource for JsonFileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn load(&self) -> Result<LoadedRules> {
        if !self.path.exists() {
            return Err(SourceError::NotFound(self.describe()).into());
        }
        let json = std::fs::read_to_string(&self.path)?;
        if json.trim().is_empty() {
            return Err(SourceError::Empty.into());
        }
        let loaded = parse_export(&json)?;
        debug!(
            source = %self.describe(),
            rules = loaded.rules.len(),
            skipped = loaded.diagnostics.len(),
            "Loaded rule export"
        );
        Ok(loaded)
    }
}

/// Hands back a fixed rule list.
#[derive(Debug, Clone, Default)]
pub struct StaticRuleSource {
    rules: Vec<Rule>,
}

impl StaticRuleSource {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }
}

impl RuleSource for StaticRuleSource {
    fn describe(&self) -> String {
        format!("static ({} rules)", self.rules.len())
    }

    fn load(&self) -> Result<LoadedRules> {
        Ok(LoadedRules {
            rules: self.rules.clone(),
            diagnostics: Vec::new(),
        })
    }
}

/// Parses an export document in any of the accepted layouts.
///
/// # Errors
///
/// Returns `Error::Serialization` for invalid JSON and
/// `SourceError::UnrecognizedLayout` when no rule list can be found.
pub fn parse_export(json: &str) -> Result<LoadedRules> {
    let document: Value = serde_json::from_str(json)?;
    let entries = rule_entries(document).ok_or(SourceError::UnrecognizedLayout)?;

    let mut loaded = LoadedRules::default();
    for (index, entry) in entries.into_iter().enumerate() {
        let label = entry
            .get("name")
            .and_then(Value::as_str)
            .map_or_else(|| format!("#{index}"), str::to_string);

        match serde_json::from_value::<Rule>(normalize(entry)) {
            Ok(mut rule) => {
                if rule.id.is_empty() {
                    rule.id.clone_from(&rule.name);
                }
                loaded.rules.push(rule);
            }
            Err(e) => {
                warn!(rule = %label, "Skipping malformed rule: {e}");
                loaded.diagnostics.push(Diagnostic::new(
                    label,
                    "rule",
                    String::new(),
                    format!("rule could not be read: {e}"),
                ));
            }
        }
    }
    Ok(loaded)
}

fn rule_entries(document: Value) -> Option<Vec<Value>> {
    match document {
        Value::Array(entries) => Some(entries),
        Value::Object(mut map) => {
            if let Some(Value::Array(entries)) = map.remove(RULES_KEY) {
                return Some(entries);
            }
            match map.remove("properties") {
                Some(Value::Object(mut props)) => match props.remove(RULES_KEY) {
                    Some(Value::Array(entries)) => Some(entries),
                    _ => None,
                },
                _ => None,
            }
        }
        _ => None,
    }
}

/// Flattens the nested portal form and ASG reference objects.
///
/// CLI exports write unset fields as `null`; those keys are dropped so the
/// rule's field defaults apply.
fn normalize(entry: Value) -> Value {
    let Value::Object(mut map) = entry else {
        return entry;
    };

    if let Some(Value::Object(props)) = map.remove("properties") {
        let mut flat: Map<String, Value> = props;
        for key in ["name", "id"] {
            if let Some(value) = map.remove(key) {
                flat.insert(key.to_string(), value);
            }
        }
        map = flat;
    }

    map.retain(|_, value| !value.is_null());

    for key in ASG_KEYS {
        if let Some(Value::Array(groups)) = map.get_mut(key) {
            groups.retain(|group| !group.is_null());
            for group in groups.iter_mut() {
                if let Some(id) = group.get("id").and_then(Value::as_str) {
                    *group = Value::String(id.to_string());
                }
            }
        }
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Error;
    use crate::core::rule::{Access, Direction};
    use std::io::Write;

    const FLAT_RULE: &str = r#"{
        "name": "allow-https",
        "priority": 100,
        "direction": "Inbound",
        "access": "Allow",
        "protocol": "Tcp",
        "sourceAddressPrefix": "*",
        "destinationAddressPrefix": "10.0.0.4",
        "destinationPortRange": "443"
    }"#;

    #[test]
    fn test_bare_array_layout() {
        let loaded = parse_export(&format!("[{FLAT_RULE}]")).unwrap();
        assert_eq!(loaded.rules.len(), 1);
        assert_eq!(loaded.rules[0].id, "allow-https");
        assert_eq!(loaded.rules[0].direction, Direction::Inbound);
        assert!(loaded.diagnostics.is_empty());
    }

    #[test]
    fn test_security_rules_layouts() {
        let wrapped = format!(r#"{{"securityRules": [{FLAT_RULE}]}}"#);
        let nested = format!(r#"{{"name": "nsg", "properties": {{"securityRules": [{FLAT_RULE}]}}}}"#);
        assert_eq!(parse_export(&wrapped).unwrap().rules.len(), 1);
        assert_eq!(parse_export(&nested).unwrap().rules.len(), 1);
    }

    #[test]
    fn test_portal_rule_form_and_asg_objects() {
        let json = r#"[{
            "name": "app-to-db",
            "id": "/subscriptions/x/securityRules/app-to-db",
            "properties": {
                "priority": 200,
                "direction": "Outbound",
                "access": "Allow",
                "protocol": "Tcp",
                "destinationPortRange": "1433",
                "sourceApplicationSecurityGroups": [
                    {"id": "/subscriptions/x/applicationSecurityGroups/app"}
                ]
            }
        }]"#;
        let loaded = parse_export(json).unwrap();
        let rule = &loaded.rules[0];
        assert_eq!(rule.name, "app-to-db");
        assert_eq!(rule.access, Access::Allow);
        assert_eq!(
            rule.source_application_security_groups,
            vec!["/subscriptions/x/applicationSecurityGroups/app"]
        );
    }

    #[test]
    fn test_malformed_rule_is_skipped_with_diagnostic() {
        let json = format!(r#"[{FLAT_RULE}, {{"name": "broken", "direction": "Sideways"}}]"#);
        let loaded = parse_export(&json).unwrap();
        assert_eq!(loaded.rules.len(), 1);
        assert_eq!(loaded.diagnostics.len(), 1);
        assert_eq!(loaded.diagnostics[0].rule_name, "broken");
    }

    #[test]
    fn test_null_fields_fall_back_to_defaults() {
        let json = r#"[
            {
                "name": "cli-flat",
                "priority": 100,
                "direction": "Inbound",
                "access": "Allow",
                "protocol": "Tcp",
                "description": null,
                "sourceAddressPrefix": "10.0.0.0/24",
                "sourceAddressPrefixes": [],
                "sourceApplicationSecurityGroups": null,
                "destinationAddressPrefix": "10.0.1.4",
                "destinationAddressPrefixes": [],
                "destinationApplicationSecurityGroups": null,
                "destinationPortRange": "443",
                "destinationPortRanges": [],
                "provisioningState": "Succeeded"
            },
            {
                "name": "cli-nested",
                "id": null,
                "properties": {
                    "priority": 110,
                    "direction": "Outbound",
                    "access": "Deny",
                    "protocol": "*",
                    "sourceAddressPrefix": "*",
                    "sourceApplicationSecurityGroups": null,
                    "destinationAddressPrefix": "Internet",
                    "destinationApplicationSecurityGroups": [null, {"id": "asg-web"}],
                    "destinationPortRange": "*"
                }
            }
        ]"#;
        let loaded = parse_export(json).unwrap();
        assert!(loaded.diagnostics.is_empty(), "{:?}", loaded.diagnostics);
        assert_eq!(loaded.rules.len(), 2);

        let flat = &loaded.rules[0];
        assert_eq!(flat.name, "cli-flat");
        assert!(flat.source_application_security_groups.is_empty());
        assert!(flat.destination_application_security_groups.is_empty());

        let nested = &loaded.rules[1];
        assert_eq!(nested.id, "cli-nested");
        assert_eq!(nested.access, Access::Deny);
        assert_eq!(nested.destination_application_security_groups, vec!["asg-web"]);
    }

    #[test]
    fn test_unrecognized_layout() {
        let err = parse_export(r#"{"rules": []}"#).unwrap_err();
        assert!(matches!(err, Error::Source(SourceError::UnrecognizedLayout)));
    }

    #[test]
    fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[{FLAT_RULE}]").unwrap();
        let source = JsonFileSource::new(file.path());
        assert_eq!(source.load().unwrap().rules.len(), 1);
    }

    #[test]
    fn test_missing_file() {
        let source = JsonFileSource::new("/nonexistent/nsg-export.json");
        assert!(matches!(
            source.load(),
            Err(Error::Source(SourceError::NotFound(_)))
        ));
    }

    #[test]
    fn test_static_source() {
        let rules = vec![Rule::new("a", 100, Direction::Inbound, Access::Deny)];
        let source = StaticRuleSource::new(rules.clone());
        assert_eq!(source.load().unwrap().rules, rules);
    }
}
