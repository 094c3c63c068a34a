//! Shared test utilities for core module tests
//!
//! Provides rule fixtures and narrative generator doubles used across the
//! unit test suites. This module is only compiled in test mode.

use crate::core::narrative::{
    FindingsDigest, NarrativeError, NarrativeGenerator, NarrativeSuggestion,
};
use crate::core::findings::Severity;
use crate::core::rule::{Access, Direction, Rule};
use async_trait::async_trait;
use std::time::Duration;

/// Inbound Allow TCP rule with a single source, destination and port.
pub fn inbound_tcp(name: &str, source: &str, destination: &str, port: &str) -> Rule {
    Rule::new(name, 100, Direction::Inbound, Access::Allow)
        .with_protocol("Tcp")
        .with_source(source)
        .with_destination(destination)
        .with_destination_port(port)
}

/// A small web tier: three public web ports on one host and two admin rules.
///
/// Produces exactly one port consolidation (the three web rules) and no
/// CIDR overlaps.
pub fn web_tier_rules() -> Vec<Rule> {
    let mut rules = vec![
        inbound_tcp("allow-http", "*", "10.0.0.4", "80"),
        inbound_tcp("allow-https", "*", "10.0.0.4", "443"),
        inbound_tcp("allow-alt-http", "*", "10.0.0.4", "8080"),
        inbound_tcp("ssh-admin", "10.10.0.0/24", "VirtualNetwork", "22"),
        inbound_tcp("rdp-admin", "10.20.0.0/24", "VirtualNetwork", "3389"),
    ];
    for (i, rule) in rules.iter_mut().enumerate() {
        rule.priority = 100 + i32::try_from(i).unwrap_or(0) * 10;
    }
    rules
}

/// Always returns the same suggestions.
pub struct FixedGenerator {
    titles: Vec<String>,
}

impl FixedGenerator {
    pub fn new(titles: &[&str]) -> Self {
        Self {
            titles: titles.iter().map(|t| (*t).to_string()).collect(),
        }
    }
}

#[async_trait]
impl NarrativeGenerator for FixedGenerator {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn suggest(
        &self,
        digest: &FindingsDigest,
    ) -> Result<Vec<NarrativeSuggestion>, NarrativeError> {
        Ok(self
            .titles
            .iter()
            .map(|title| NarrativeSuggestion {
                title: title.clone(),
                description: format!("Suggested for {} rules", digest.total_rules),
                priority: Severity::Low,
            })
            .collect())
    }
}

/// Always fails.
pub struct FailingGenerator;

#[async_trait]
impl NarrativeGenerator for FailingGenerator {
    fn name(&self) -> &str {
        "failing"
    }

    async fn suggest(
        &self,
        _digest: &FindingsDigest,
    ) -> Result<Vec<NarrativeSuggestion>, NarrativeError> {
        Err(NarrativeError::Unavailable("connection refused".to_string()))
    }
}

/// Sleeps before answering with nothing.
pub struct SlowGenerator(pub Duration);

#[async_trait]
impl NarrativeGenerator for SlowGenerator {
    fn name(&self) -> &str {
        "slow"
    }

    async fn suggest(
        &self,
        _digest: &FindingsDigest,
    ) -> Result<Vec<NarrativeSuggestion>, NarrativeError> {
        tokio::time::sleep(self.0).await;
        Ok(Vec::new())
    }
}
