//! Pairwise rule similarity scoring
//!
//! Two rules are compared on five attributes, each worth 0.2: direction,
//! access, protocol, source address and destination address. Address checks
//! are exact string matches of the address field, not CIDR-aware. Rules
//! covering overlapping but different networks are reported by the overlap
//! pass instead; the two detectors answer different questions and stay
//! separate.

use crate::core::findings::Severity;
use crate::core::rule::{Rule, Side};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Number of attributes compared per pair
pub const CHECKS: u8 = 5;

/// Matching attributes required before a pair is reported (score 0.8)
pub const REPORT_THRESHOLD: u8 = 4;

/// Matching attributes required for high severity (score >= 0.95)
pub const HIGH_THRESHOLD: u8 = 5;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Attribute {
    Direction,
    Access,
    Protocol,
    SourceAddress,
    DestinationAddress,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RedundancyFinding {
    pub rule1: String,
    pub rule2: String,
    pub similarity_score: f64,
    pub matched_attributes: Vec<Attribute>,
    pub severity: Severity,
    pub recommendation: String,
}

/// Attributes on which two rules agree.
pub fn matching_attributes(a: &Rule, b: &Rule) -> Vec<Attribute> {
    let mut matched = Vec::with_capacity(CHECKS as usize);
    if a.direction == b.direction {
        matched.push(Attribute::Direction);
    }
    if a.access == b.access {
        matched.push(Attribute::Access);
    }
    if a.protocol_key() == b.protocol_key() {
        matched.push(Attribute::Protocol);
    }
    if a.address_key(Side::Source) == b.address_key(Side::Source) {
        matched.push(Attribute::SourceAddress);
    }
    if a.address_key(Side::Destination) == b.address_key(Side::Destination) {
        matched.push(Attribute::DestinationAddress);
    }
    matched
}

/// Similarity in `[0, 1]`, in steps of 0.2.
///
/// # Examples
///
/// ```
/// use nsgaudit::core::redundancy::similarity;
/// use nsgaudit::core::rule::{Access, Direction, Rule};
///
/// let a = Rule::new("a", 100, Direction::Inbound, Access::Allow).with_source("10.0.0.1");
/// let b = Rule::new("b", 200, Direction::Inbound, Access::Allow).with_source("10.0.0.1");
/// assert_eq!(similarity(&a, &b), 1.0);
/// ```
pub fn similarity(a: &Rule, b: &Rule) -> f64 {
    score(matching_attributes(a, b).len())
}

fn score(matches: usize) -> f64 {
    matches as f64 / f64::from(CHECKS)
}

/// Compares every unordered pair of rules and reports the similar ones.
pub fn find_redundant_rules(rules: &[Rule]) -> Vec<RedundancyFinding> {
    let mut findings = Vec::new();

    for (i, a) in rules.iter().enumerate() {
        for b in &rules[i + 1..] {
            let matched = matching_attributes(a, b);
            let matches = matched.len();
            if matches < usize::from(REPORT_THRESHOLD) {
                continue;
            }

            let (severity, recommendation) = if matches >= usize::from(HIGH_THRESHOLD) {
                (
                    Severity::High,
                    format!(
                        "Rules '{}' and '{}' are nearly identical; remove one of them",
                        a.name, b.name
                    ),
                )
            } else {
                (
                    Severity::Medium,
                    format!(
                        "Rules '{}' and '{}' are similar; review them for consolidation",
                        a.name, b.name
                    ),
                )
            };

            findings.push(RedundancyFinding {
                rule1: a.name.clone(),
                rule2: b.name.clone(),
                similarity_score: score(matches),
                matched_attributes: matched,
                severity,
                recommendation,
            });
        }
    }

    debug!(
        rules = rules.len(),
        findings = findings.len(),
        "Redundancy scoring complete"
    );
    findings
}
