//! Deterministic recommendation generation
//!
//! Recommendations are derived only from the structured findings already in
//! an [`AnalysisReport`]: one item per finding category that has something to
//! say, prioritized by the most severe finding behind it. Running this twice
//! over the same report yields the same list.

use crate::core::findings::{Severity, ViolationKind};
use crate::core::overlap::OverlapType;
use crate::core::report::AnalysisReport;
use crate::utils::join_names;
use serde::{Deserialize, Serialize};

/// Rule names listed in a description before eliding the rest
const MAX_NAMES: usize = 5;

/// Recommendation priority uses the same scale as finding severity
pub type Priority = Severity;

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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecommendationCategory {
    LimitCompliance,
    WildcardUsage,
    Consolidation,
    DuplicateAddresses,
    RedundantRules,
    NetworkOverlap,
    ServiceTags,
    Maintenance,
    /// Prose supplied by an external narrative generator
    Narrative,
}

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
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Impact {
    Compliance,
    Security,
    Maintainability,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedSavings {
    pub rule_reduction: usize,
    pub address_reduction: usize,
    pub percentage_of_rules: f64,
}

impl EstimatedSavings {
    fn rules(rule_reduction: usize, total_rules: usize) -> Self {
        Self {
            rule_reduction,
            address_reduction: 0,
            percentage_of_rules: percentage(rule_reduction, total_rules),
        }
    }

    fn addresses(address_reduction: usize) -> Self {
        Self {
            address_reduction,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationItem {
    pub id: String,
    pub category: RecommendationCategory,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub impact: Impact,
    pub estimated_savings: EstimatedSavings,
}

/// Builds the deterministic recommendation list for a report.
///
/// The list is never empty: a clean rule set still gets a low-priority
/// periodic review item.
pub fn build_recommendations(report: &AnalysisReport) -> Vec<RecommendationItem> {
    let total_rules = report.total_rules;
    let mut items = Vec::new();

    if let Some(priority) = report.violations.iter().map(|v| v.severity).max() {
        let over_limit: usize = report
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::IpLimitExceeded)
            .map(|v| v.current_count.saturating_sub(v.max_allowed))
            .sum();
        let messages: Vec<String> = report.violations.iter().map(|v| v.message.clone()).collect();
        items.push(item(
            RecommendationCategory::LimitCompliance,
            format!("Resolve {} provider limit violation(s)", report.violations.len()),
            format!(
                "The rule set exceeds provider limits: {}. Replace address lists with service tags or application security groups, or split the rules across security groups.",
                join_names(&messages, 3)
            ),
            priority,
            Impact::Compliance,
            EstimatedSavings::addresses(over_limit),
        ));
    }

    let wildcard: Vec<_> = report.risk_findings.iter().filter(|f| f.has_wildcard()).collect();
    if let Some(priority) = wildcard.iter().map(|f| f.level).max() {
        let names: Vec<String> = wildcard.iter().map(|f| f.rule_name.clone()).collect();
        items.push(item(
            RecommendationCategory::WildcardUsage,
            format!("Restrict wildcard addresses in {} rule(s)", wildcard.len()),
            format!(
                "Rules {} match any address. Replace wildcards with specific prefixes, service tags or application security groups.",
                join_names(&names, MAX_NAMES)
            ),
            priority,
            Impact::Security,
            EstimatedSavings::default(),
        ));
    }

    if !report.consolidation_opportunities.is_empty() {
        let reduction: usize = report
            .consolidation_opportunities
            .iter()
            .map(|o| o.potential_savings.rule_reduction)
            .sum();
        let priority = if percentage(reduction, total_rules) >= 20.0 {
            Severity::Medium
        } else {
            Severity::Low
        };
        items.push(item(
            RecommendationCategory::Consolidation,
            format!(
                "Consolidate {} rule group(s)",
                report.consolidation_opportunities.len()
            ),
            format!(
                "{} group(s) of rules differ only by port or source address and can be merged, removing {reduction} rule(s).",
                report.consolidation_opportunities.len()
            ),
            priority,
            Impact::Maintainability,
            EstimatedSavings::rules(reduction, total_rules),
        ));
    }

    if !report.duplicate_addresses.is_empty() {
        let redundant: usize = report
            .duplicate_addresses
            .iter()
            .map(crate::core::counting::DuplicateAddress::redundant_entries)
            .sum();
        let addresses: Vec<String> = report
            .duplicate_addresses
            .iter()
            .map(|d| d.address.clone())
            .collect();
        items.push(item(
            RecommendationCategory::DuplicateAddresses,
            format!(
                "Deduplicate {} address(es) repeated across rules",
                addresses.len()
            ),
            format!(
                "Addresses {} appear in several rules of the same direction. Group them into fewer rules or an application security group.",
                join_names(&addresses, MAX_NAMES)
            ),
            if redundant > 10 {
                Severity::Medium
            } else {
                Severity::Low
            },
            Impact::Maintainability,
            EstimatedSavings::addresses(redundant),
        ));
    }

    if let Some(priority) = report.redundant_rules.iter().map(|f| f.severity).max() {
        let mut removable: Vec<String> = report
            .redundant_rules
            .iter()
            .filter(|f| f.severity == Severity::High)
            .map(|f| f.rule2.clone())
            .collect();
        removable.sort();
        removable.dedup();
        items.push(item(
            RecommendationCategory::RedundantRules,
            format!(
                "Review {} pair(s) of redundant rules",
                report.redundant_rules.len()
            ),
            format!(
                "{} rule pair(s) share direction, access, protocol and addresses. {} rule(s) duplicate another rule outright and can be removed.",
                report.redundant_rules.len(),
                removable.len()
            ),
            priority,
            Impact::Maintainability,
            EstimatedSavings::rules(removable.len(), total_rules),
        ));
    }

    if let Some(priority) = report.overlaps.iter().map(|o| o.severity).max() {
        let covered = report
            .overlaps
            .iter()
            .filter(|o| o.overlap_type != OverlapType::Partial)
            .count();
        items.push(item(
            RecommendationCategory::NetworkOverlap,
            format!("Resolve {} overlapping network pair(s)", report.overlaps.len()),
            format!(
                "{} pair(s) of CIDR blocks overlap; {covered} are identical or fully contained and can be simplified.",
                report.overlaps.len()
            ),
            priority,
            Impact::Maintainability,
            EstimatedSavings::addresses(covered),
        ));
    }

    let tags = &report.service_tag_analysis;
    if tags.has_findings() {
        let priority = tags
            .overlaps
            .iter()
            .map(|o| o.severity)
            .max()
            .unwrap_or(Severity::Low);
        items.push(item(
            RecommendationCategory::ServiceTags,
            "Tidy up service tag usage".to_string(),
            format!(
                "{} heavily used tag(s), {} overlapping tag pair(s) and {} literal address(es) that could become service tags.",
                tags.consolidation_candidates.len(),
                tags.overlaps.len(),
                tags.conversion_opportunities.len()
            ),
            priority,
            Impact::Maintainability,
            EstimatedSavings {
                rule_reduction: tags.total_redundant_rules,
                address_reduction: tags.conversion_opportunities.len(),
                percentage_of_rules: percentage(tags.total_redundant_rules, total_rules),
            },
        ));
    }

    if items.is_empty() {
        items.push(item(
            RecommendationCategory::Maintenance,
            "Keep reviewing the rule set periodically".to_string(),
            "No limit, exposure or consolidation findings. Re-run the analysis after rule changes."
                .to_string(),
            Severity::Low,
            Impact::Maintainability,
            EstimatedSavings::default(),
        ));
    }

    items.sort_by(|a, b| b.priority.cmp(&a.priority));
    for (i, rec) in items.iter_mut().enumerate() {
        rec.id = recommendation_id(i);
    }
    items
}

/// Stable identifier for the recommendation at `index`.
pub fn recommendation_id(index: usize) -> String {
    format!("REC-{:03}", index + 1)
}

fn item(
    category: RecommendationCategory,
    title: String,
    description: String,
    priority: Priority,
    impact: Impact,
    estimated_savings: EstimatedSavings,
) -> RecommendationItem {
    RecommendationItem {
        id: String::new(),
        category,
        title,
        description,
        priority,
        impact,
        estimated_savings,
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}
