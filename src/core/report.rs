//! Analysis report and its assembly
//!
//! [`AnalysisReport`] is the serialization contract consumed by report
//! formatters: camelCase field names, the four directional bucket counts
//! spelled out as flat fields, plus the legacy flattened view.
//!
//! `generatedAt` is the only field that differs between two analyses of the
//! same input.

use crate::config::Limits;
use crate::core::consolidation::ConsolidationOpportunity;
use crate::core::counting::{BucketCount, CountingResult, DuplicateAddress, LegacyCounts};
use crate::core::findings::{Bucket, Diagnostic, Violation};
use crate::core::narrative::NarrativeOutcome;
use crate::core::overlap::OverlapFinding;
use crate::core::recommendations::{RecommendationItem, build_recommendations};
use crate::core::redundancy::RedundancyFinding;
use crate::core::risk::{ExecutiveSummary, RiskFinding, aggregate_risk_score, summarize};
use crate::core::rule::{Direction, Rule};
use crate::core::service_tags::ServiceTagAnalysis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

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
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplianceStatus {
    Compliant,
    NonCompliant,
}

/// Outputs of the independent analysis passes, ready to merge
#[derive(Debug, Clone)]
pub struct PassOutputs {
    pub counting: CountingResult,
    pub overlaps: Vec<OverlapFinding>,
    pub redundant_rules: Vec<RedundancyFinding>,
    pub risk_findings: Vec<RiskFinding>,
    pub consolidation: Vec<ConsolidationOpportunity>,
    pub service_tags: ServiceTagAnalysis,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub generated_at: DateTime<Utc>,
    /// SHA-256 of the analyzed rule snapshot
    pub input_fingerprint: String,

    pub total_rules: usize,
    pub inbound_rules: usize,
    pub outbound_rules: usize,

    pub inbound_source_ip_count: usize,
    pub inbound_destination_ip_count: usize,
    pub inbound_source_asg_count: usize,
    pub inbound_destination_asg_count: usize,
    pub outbound_source_ip_count: usize,
    pub outbound_destination_ip_count: usize,
    pub outbound_source_asg_count: usize,
    pub outbound_destination_asg_count: usize,
    pub buckets: Vec<BucketCount>,
    pub legacy_counts: LegacyCounts,
    pub max_addresses_per_bucket: usize,

    pub is_within_limits: bool,
    pub compliance_status: ComplianceStatus,
    pub violations: Vec<Violation>,
    pub diagnostics: Vec<Diagnostic>,

    pub risk_score: u32,
    pub executive_summary: ExecutiveSummary,
    pub risk_findings: Vec<RiskFinding>,

    pub overlaps: Vec<OverlapFinding>,
    pub redundant_rules: Vec<RedundancyFinding>,
    pub consolidation_opportunities: Vec<ConsolidationOpportunity>,
    pub duplicate_addresses: Vec<DuplicateAddress>,
    pub service_tag_analysis: ServiceTagAnalysis,

    pub recommendations: Vec<RecommendationItem>,
    #[serde(default)]
    pub narrative: NarrativeOutcome,
}

impl AnalysisReport {
    /// Puts diagnostics raised while loading the rules ahead of the
    /// extraction diagnostics.
    pub fn prepend_diagnostics(&mut self, mut diagnostics: Vec<Diagnostic>) {
        if diagnostics.is_empty() {
            return;
        }
        diagnostics.append(&mut self.diagnostics);
        self.diagnostics = diagnostics;
    }

    /// The report with its wall-clock field zeroed, for comparisons.
    pub fn without_timestamp(&self) -> Self {
        Self {
            generated_at: DateTime::<Utc>::UNIX_EPOCH,
            ..self.clone()
        }
    }
}

/// SHA-256 hex digest of the rules' canonical JSON.
pub fn fingerprint(rules: &[Rule]) -> String {
    let mut hasher = Sha256::new();
    if let Ok(bytes) = serde_json::to_vec(rules) {
        hasher.update(&bytes);
    }
    format!("{:x}", hasher.finalize())
}

/// Merges pass outputs into a report and derives recommendations.
pub fn assemble(
    rules: &[Rule],
    limits: &Limits,
    diagnostics: Vec<Diagnostic>,
    outputs: PassOutputs,
) -> AnalysisReport {
    let PassOutputs {
        counting,
        overlaps,
        redundant_rules,
        risk_findings,
        consolidation,
        service_tags,
    } = outputs;

    let inbound_rules = rules
        .iter()
        .filter(|r| r.direction == Direction::Inbound)
        .count();

    let risk_score = aggregate_risk_score(&counting.violations, &risk_findings);
    let executive_summary = summarize(risk_score, rules.len(), &counting.violations, &risk_findings);
    let is_within_limits = counting.violations.is_empty();

    let ip = |b| counting.bucket(b).ip_count;
    let asg = |b| counting.bucket(b).asg_count;

    let mut report = AnalysisReport {
        generated_at: Utc::now(),
        input_fingerprint: fingerprint(rules),
        total_rules: rules.len(),
        inbound_rules,
        outbound_rules: rules.len() - inbound_rules,
        inbound_source_ip_count: ip(Bucket::InboundSource),
        inbound_destination_ip_count: ip(Bucket::InboundDestination),
        inbound_source_asg_count: asg(Bucket::InboundSource),
        inbound_destination_asg_count: asg(Bucket::InboundDestination),
        outbound_source_ip_count: ip(Bucket::OutboundSource),
        outbound_destination_ip_count: ip(Bucket::OutboundDestination),
        outbound_source_asg_count: asg(Bucket::OutboundSource),
        outbound_destination_asg_count: asg(Bucket::OutboundDestination),
        buckets: counting.buckets.clone(),
        legacy_counts: counting.legacy,
        max_addresses_per_bucket: limits.max_addresses_per_bucket,
        is_within_limits,
        compliance_status: if is_within_limits {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::NonCompliant
        },
        violations: counting.violations.clone(),
        diagnostics,
        risk_score,
        executive_summary,
        risk_findings,
        overlaps,
        redundant_rules,
        consolidation_opportunities: consolidation,
        duplicate_addresses: counting.duplicate_addresses.clone(),
        service_tag_analysis: service_tags,
        recommendations: Vec::new(),
        narrative: NarrativeOutcome::Skipped,
    };
    report.recommendations = build_recommendations(&report);
    report
}
