//! Finding records shared across analysis passes
//!
//! Violations and diagnostics are values, never errors: every pass appends
//! them to its own output and the report assembler merges them.

use crate::core::rule::{Direction, Side};
use serde::{Deserialize, Serialize};

/// Severity of a finding, ordered from least to most severe
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Weight this severity adds to the aggregate risk score.
    pub const fn risk_weight(self) -> u32 {
        match self {
            Severity::Critical => 30,
            Severity::High => 20,
            Severity::Medium => 10,
            Severity::Low => 5,
        }
    }
}

/// One of the four directional address buckets the provider limits
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumIter,
    strum::AsRefStr,
)]
#[serde(rename_all = "camelCase")]
pub enum Bucket {
    #[strum(serialize = "inbound source")]
    InboundSource,
    #[strum(serialize = "inbound destination")]
    InboundDestination,
    #[strum(serialize = "outbound source")]
    OutboundSource,
    #[strum(serialize = "outbound destination")]
    OutboundDestination,
}

impl Bucket {
    pub const fn of(direction: Direction, side: Side) -> Self {
        match (direction, side) {
            (Direction::Inbound, Side::Source) => Bucket::InboundSource,
            (Direction::Inbound, Side::Destination) => Bucket::InboundDestination,
            (Direction::Outbound, Side::Source) => Bucket::OutboundSource,
            (Direction::Outbound, Side::Destination) => Bucket::OutboundDestination,
        }
    }

    pub const fn side(self) -> Side {
        match self {
            Bucket::InboundSource | Bucket::OutboundSource => Side::Source,
            Bucket::InboundDestination | Bucket::OutboundDestination => Side::Destination,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    /// A directional bucket holds more unique addresses than allowed
    IpLimitExceeded,
    /// A single rule field holds more addresses than allowed
    RuleIpLimitExceeded,
    /// A single rule field references too many application security groups
    AsgLimitExceeded,
}

/// A limit violation attached to the report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    pub kind: ViolationKind,
    pub severity: Severity,
    pub message: String,
    pub affected_rule_names: Vec<String>,
    pub current_count: usize,
    pub max_allowed: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<Bucket>,
}

/// A malformed token or field that was skipped during analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub rule_name: String,
    pub field: String,
    pub token: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        rule_name: impl Into<String>,
        field: impl Into<String>,
        token: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            rule_name: rule_name.into(),
            field: field.into(),
            token: token.into(),
            message: message.into(),
        }
    }
}
