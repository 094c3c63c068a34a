//! Heuristic risk scoring
//!
//! Each rule gets a small integer score:
//!
//! | Condition | Points |
//! |-----------|--------|
//! | Source or destination is a wildcard (`*`, `Any`, `0.0.0.0/0`, `::/0`) | +3 |
//! | Destination port touches a vulnerable port | +2 |
//! | Access is `Allow` | +1 |
//!
//! The rule set as a whole gets a 0-100 score built from violation weights
//! and wildcard/port exposure, bucketed into an [`OverallRisk`] level for the
//! executive summary.

use crate::core::findings::{Severity, Violation};
use crate::core::rule::{Rule, Side, parse_port_spec};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Highest aggregate risk score
pub const MAX_RISK_SCORE: u32 = 100;

/// Address entries that match any address
const OPEN_ADDRESSES: &[&str] = &["*", "any", "0.0.0.0/0", "::/0"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RiskFinding {
    pub rule_name: String,
    pub score: u32,
    pub level: Severity,
    pub wildcard_source: bool,
    pub wildcard_destination: bool,
    pub exposes_vulnerable_port: bool,
    pub allows_traffic: bool,
    pub reasons: Vec<String>,
}

impl RiskFinding {
    pub fn has_wildcard(&self) -> bool {
        self.wildcard_source || self.wildcard_destination
    }
}

/// Rule-set risk level used by the executive summary
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    strum::Display,
    strum::AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallRisk {
    LowRisk,
    MediumRisk,
    HighRisk,
    CriticalRisk,
}

impl OverallRisk {
    pub const fn from_score(score: u32) -> Self {
        match score {
            0..=20 => OverallRisk::LowRisk,
            21..=50 => OverallRisk::MediumRisk,
            51..=80 => OverallRisk::HighRisk,
            _ => OverallRisk::CriticalRisk,
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            OverallRisk::LowRisk => {
                "The rule set follows security best practices with minimal exposure."
            }
            OverallRisk::MediumRisk => {
                "The rule set has moderate exposure; review the flagged rules during the next maintenance window."
            }
            OverallRisk::HighRisk => {
                "The rule set exposes a significant attack surface; remediate the flagged rules promptly."
            }
            OverallRisk::CriticalRisk => {
                "The rule set is critically exposed; immediate remediation is required."
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveSummary {
    pub risk_level: OverallRisk,
    pub risk_score: u32,
    pub description: String,
    pub total_rules: usize,
    pub total_violations: usize,
    pub high_risk_rules: usize,
}

/// Returns `true` if any address entry on this side matches everything.
pub fn side_is_wildcard(rule: &Rule, side: Side) -> bool {
    rule.address_entries(side)
        .iter()
        .any(|e| OPEN_ADDRESSES.iter().any(|o| o.eq_ignore_ascii_case(e)))
}

/// Returns `true` if the destination port spec covers any of `ports`.
///
/// `*` and ranges count when they include a listed port; malformed entries
/// are ignored here (extraction reports them).
pub fn exposes_any_port(spec: &str, ports: &[u16]) -> bool {
    let (ranges, _) = parse_port_spec(spec);
    ranges
        .iter()
        .any(|range| ports.iter().any(|&p| range.contains(p)))
}

/// Scores a single rule.
///
/// # Examples
///
/// ```
/// use nsgaudit::core::findings::Severity;
/// use nsgaudit::core::risk::assess_rule;
/// use nsgaudit::core::rule::{Access, Direction, Rule};
///
/// let rule = Rule::new("ssh", 100, Direction::Inbound, Access::Allow)
///     .with_source("*")
///     .with_destination_port("22");
/// let finding = assess_rule(&rule, &[22, 3389]);
/// assert_eq!(finding.score, 6);
/// assert_eq!(finding.level, Severity::Critical);
/// ```
pub fn assess_rule(rule: &Rule, vulnerable_ports: &[u16]) -> RiskFinding {
    let wildcard_source = side_is_wildcard(rule, Side::Source);
    let wildcard_destination = side_is_wildcard(rule, Side::Destination);
    let destination_port = rule.destination_port();
    let exposes_vulnerable_port = exposes_any_port(&destination_port, vulnerable_ports);
    let allows_traffic = rule.is_allow();

    let mut score = 0;
    let mut reasons = Vec::new();

    if wildcard_source || wildcard_destination {
        score += 3;
        let side = match (wildcard_source, wildcard_destination) {
            (true, true) => "source and destination",
            (true, false) => "source",
            _ => "destination",
        };
        reasons.push(format!("Wildcard {side} address"));
    }
    if exposes_vulnerable_port {
        score += 2;
        reasons.push(format!(
            "Destination port {destination_port} includes a commonly attacked port"
        ));
    }
    if allows_traffic {
        score += 1;
        reasons.push("Allows traffic".to_string());
    }

    RiskFinding {
        rule_name: rule.name.clone(),
        score,
        level: level_for(score),
        wildcard_source,
        wildcard_destination,
        exposes_vulnerable_port,
        allows_traffic,
        reasons,
    }
}

/// Maps a per-rule score to a level.
pub const fn level_for(score: u32) -> Severity {
    match score {
        5.. => Severity::Critical,
        3..=4 => Severity::High,
        1..=2 => Severity::Medium,
        0 => Severity::Low,
    }
}

/// Scores every rule, keeping only rules with a non-zero score.
pub fn assess_rules(rules: &[Rule], vulnerable_ports: &[u16]) -> Vec<RiskFinding> {
    let findings: Vec<RiskFinding> = rules
        .iter()
        .map(|r| assess_rule(r, vulnerable_ports))
        .filter(|f| f.score > 0)
        .collect();
    debug!(
        rules = rules.len(),
        risky = findings.len(),
        "Risk assessment complete"
    );
    findings
}

/// Aggregate 0-100 risk score for a rule set.
pub fn aggregate_risk_score(violations: &[Violation], findings: &[RiskFinding]) -> u32 {
    let mut score: u32 = violations.iter().map(|v| v.severity.risk_weight()).sum();
    for finding in findings {
        if finding.wildcard_source {
            score += 15;
        }
        if finding.wildcard_destination {
            score += 10;
        }
        if finding.allows_traffic && finding.exposes_vulnerable_port {
            score += 5;
        }
    }
    score.min(MAX_RISK_SCORE)
}

/// Builds the executive summary for an aggregate score.
pub fn summarize(
    risk_score: u32,
    total_rules: usize,
    violations: &[Violation],
    findings: &[RiskFinding],
) -> ExecutiveSummary {
    let risk_level = OverallRisk::from_score(risk_score);
    ExecutiveSummary {
        risk_level,
        risk_score,
        description: risk_level.description().to_string(),
        total_rules,
        total_violations: violations.len(),
        high_risk_rules: findings
            .iter()
            .filter(|f| f.level >= Severity::High)
            .count(),
    }
}
