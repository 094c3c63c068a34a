//! Service tag usage analysis
//!
//! Tracks which rules reference each symbolic service tag, flags tag pairs
//! that the configured overlap table marks as redundant, and spots literal
//! networks that fall inside a known provider-service prefix and could be
//! replaced by the corresponding tag.

use crate::config::{ServicePrefix, TagOverlapRule};
use crate::core::extract::{RuleAddresses, canonical_service_tag};
use crate::core::findings::Severity;
use crate::core::overlap::network_contains;
use crate::core::rule::Side;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Tags referenced by more rules than this are consolidation candidates
pub const CONSOLIDATION_USAGE_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagUsage {
    pub tag: String,
    pub usage_count: usize,
    pub rule_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagOverlapFinding {
    pub broader_tag: String,
    pub narrower_tag: String,
    pub severity: Severity,
    pub recommendation: String,
    pub broader_rules: Vec<String>,
    pub narrower_rules: Vec<String>,
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
pub enum Confidence {
    /// The literal is exactly the service prefix
    High,
    /// The literal lies inside the service prefix
    Medium,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TagConversion {
    pub rule_name: String,
    pub field: Side,
    pub address: String,
    pub suggested_tag: String,
    pub matched_prefix: String,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceTagAnalysis {
    pub tag_usage: Vec<TagUsage>,
    pub consolidation_candidates: Vec<TagUsage>,
    /// Σ(usage - 1) over consolidation candidates
    pub total_redundant_rules: usize,
    pub overlaps: Vec<TagOverlapFinding>,
    pub conversion_opportunities: Vec<TagConversion>,
}

impl ServiceTagAnalysis {
    pub fn has_findings(&self) -> bool {
        !self.consolidation_candidates.is_empty()
            || !self.overlaps.is_empty()
            || !self.conversion_opportunities.is_empty()
    }
}

/// Runs the service tag analysis over extracted rules.
pub fn analyze_service_tags(
    extracted: &[RuleAddresses<'_>],
    overlap_table: &[TagOverlapRule],
    service_prefixes: &[ServicePrefix],
) -> ServiceTagAnalysis {
    let mut usage: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    for entry in extracted {
        for side in [Side::Source, Side::Destination] {
            for tag in &entry.side(side).service_tags {
                let names = usage.entry(*tag).or_default();
                if !names.contains(&entry.rule.name) {
                    names.push(entry.rule.name.clone());
                }
            }
        }
    }

    let tag_usage: Vec<TagUsage> = usage
        .iter()
        .map(|(tag, names)| TagUsage {
            tag: (*tag).to_string(),
            usage_count: names.len(),
            rule_names: names.clone(),
        })
        .collect();

    let consolidation_candidates: Vec<TagUsage> = tag_usage
        .iter()
        .filter(|u| u.usage_count > CONSOLIDATION_USAGE_THRESHOLD)
        .cloned()
        .collect();
    let total_redundant_rules = consolidation_candidates
        .iter()
        .map(|u| u.usage_count - 1)
        .sum();

    let overlaps = overlap_table
        .iter()
        .filter_map(|rule| {
            let broader = usage.get(canonical_service_tag(&rule.broader)?)?;
            let narrower = usage.get(canonical_service_tag(&rule.narrower)?)?;
            Some(TagOverlapFinding {
                broader_tag: rule.broader.clone(),
                narrower_tag: rule.narrower.clone(),
                severity: rule.severity,
                recommendation: rule.recommendation.clone(),
                broader_rules: broader.clone(),
                narrower_rules: narrower.clone(),
            })
        })
        .collect();

    let conversion_opportunities = find_conversions(extracted, service_prefixes);

    let analysis = ServiceTagAnalysis {
        tag_usage,
        consolidation_candidates,
        total_redundant_rules,
        overlaps,
        conversion_opportunities,
    };
    debug!(
        tags = analysis.tag_usage.len(),
        overlaps = analysis.overlaps.len(),
        conversions = analysis.conversion_opportunities.len(),
        "Service tag analysis complete"
    );
    analysis
}

fn find_conversions(
    extracted: &[RuleAddresses<'_>],
    service_prefixes: &[ServicePrefix],
) -> Vec<TagConversion> {
    let mut conversions = Vec::new();
    for entry in extracted {
        for side in [Side::Source, Side::Destination] {
            for net in &entry.side(side).networks {
                let matched = service_prefixes
                    .iter()
                    .filter(|sp| network_contains(&sp.prefix, &net.network))
                    .map(|sp| {
                        let exact = network_contains(&net.network, &sp.prefix);
                        (sp, if exact { Confidence::High } else { Confidence::Medium })
                    })
                    .max_by_key(|(sp, confidence)| {
                        (*confidence == Confidence::High, sp.prefix.prefix())
                    });

                if let Some((sp, confidence)) = matched {
                    conversions.push(TagConversion {
                        rule_name: entry.rule.name.clone(),
                        field: side,
                        address: net.token.clone(),
                        suggested_tag: sp.service_tag.clone(),
                        matched_prefix: sp.prefix.to_string(),
                        confidence,
                    });
                }
            }
        }
    }
    conversions
}
