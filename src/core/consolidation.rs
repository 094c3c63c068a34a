//! Consolidation planning
//!
//! Rules are first grouped by `(direction, access, protocol)`. Inside each
//! group of three or more rules the planner looks for two collapse patterns:
//!
//! - **Port consolidation**: rules sharing source and destination address
//!   that differ only by destination port can become one multi-port rule.
//! - **IP consolidation**: rules sharing destination address and port that
//!   differ only by source address can become one multi-address rule.
//!
//! Each opportunity saves `group size - 1` rules.

use crate::core::rule::{Access, Direction, Rule, Side};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Smallest group worth consolidating
pub const MIN_GROUP_SIZE: usize = 3;

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
pub enum ConsolidationKind {
    PortConsolidation,
    IpConsolidation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PotentialSavings {
    pub rule_reduction: usize,
    /// Reduction as a share of the whole rule set, one decimal place
    pub percentage_of_rules: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationOpportunity {
    pub id: String,
    pub kind: ConsolidationKind,
    pub direction: Direction,
    pub access: Access,
    pub protocol: String,
    pub description: String,
    pub rule_names: Vec<String>,
    /// Attribute value every member shares
    pub shared_value: String,
    /// Distinct values that would be merged into the consolidated rule
    pub merged_values: Vec<String>,
    pub potential_savings: PotentialSavings,
}

type GroupKey = (Direction, Access, String);

/// Finds consolidation opportunities, largest savings first.
pub fn plan_consolidation(rules: &[Rule]) -> Vec<ConsolidationOpportunity> {
    let mut groups: BTreeMap<GroupKey, Vec<&Rule>> = BTreeMap::new();
    for rule in rules {
        groups
            .entry((rule.direction, rule.access, rule.protocol_key()))
            .or_default()
            .push(rule);
    }

    let mut opportunities = Vec::new();
    for (key, members) in &groups {
        if members.len() < MIN_GROUP_SIZE {
            continue;
        }
        opportunities.extend(port_consolidations(key, members, rules.len()));
        opportunities.extend(ip_consolidations(key, members, rules.len()));
    }

    opportunities.sort_by(|a, b| {
        b.potential_savings
            .rule_reduction
            .cmp(&a.potential_savings.rule_reduction)
            .then_with(|| a.rule_names.cmp(&b.rule_names))
    });
    for (i, opportunity) in opportunities.iter_mut().enumerate() {
        opportunity.id = format!("CONS-{:03}", i + 1);
    }

    debug!(
        groups = groups.len(),
        opportunities = opportunities.len(),
        "Consolidation planning complete"
    );
    opportunities
}

fn port_consolidations(
    key: &GroupKey,
    members: &[&Rule],
    total_rules: usize,
) -> Vec<ConsolidationOpportunity> {
    let mut by_endpoints: BTreeMap<(String, String), Vec<&Rule>> = BTreeMap::new();
    for rule in members {
        by_endpoints
            .entry((rule.address_key(Side::Source), rule.address_key(Side::Destination)))
            .or_default()
            .push(rule);
    }

    by_endpoints
        .into_iter()
        .filter(|(_, group)| group.len() >= MIN_GROUP_SIZE)
        .filter_map(|((source, destination), group)| {
            let ports = distinct(group.iter().map(|r| r.destination_port()));
            if ports.len() < 2 {
                return None;
            }
            let description = format!(
                "{} {} {} {} rules from {} to {} differ only by destination port; merge them into one rule covering ports {}",
                group.len(),
                key.0,
                key.1,
                display_protocol(&key.2),
                display_address(&source),
                display_address(&destination),
                ports.join(",")
            );
            Some(opportunity(
                ConsolidationKind::PortConsolidation,
                key,
                &group,
                format!("{} -> {}", display_address(&source), display_address(&destination)),
                ports,
                description,
                total_rules,
            ))
        })
        .collect()
}

fn ip_consolidations(
    key: &GroupKey,
    members: &[&Rule],
    total_rules: usize,
) -> Vec<ConsolidationOpportunity> {
    let mut by_target: BTreeMap<(String, String), Vec<&Rule>> = BTreeMap::new();
    for rule in members {
        by_target
            .entry((rule.address_key(Side::Destination), rule.destination_port()))
            .or_default()
            .push(rule);
    }

    by_target
        .into_iter()
        .filter(|(_, group)| group.len() >= MIN_GROUP_SIZE)
        .filter_map(|((destination, port), group)| {
            let sources = distinct(group.iter().map(|r| r.address_key(Side::Source)));
            if sources.len() < 2 {
                return None;
            }
            let description = format!(
                "{} {} {} {} rules to {} on destination port {} differ only by source address; merge them into one rule with {} source prefixes",
                group.len(),
                key.0,
                key.1,
                display_protocol(&key.2),
                display_address(&destination),
                port,
                sources.len()
            );
            Some(opportunity(
                ConsolidationKind::IpConsolidation,
                key,
                &group,
                format!("{} port {}", display_address(&destination), port),
                sources,
                description,
                total_rules,
            ))
        })
        .collect()
}

fn opportunity(
    kind: ConsolidationKind,
    key: &GroupKey,
    group: &[&Rule],
    shared_value: String,
    merged_values: Vec<String>,
    description: String,
    total_rules: usize,
) -> ConsolidationOpportunity {
    let rule_reduction = group.len() - 1;
    ConsolidationOpportunity {
        id: String::new(),
        kind,
        direction: key.0,
        access: key.1,
        protocol: key.2.clone(),
        description,
        rule_names: group.iter().map(|r| r.name.clone()).collect(),
        shared_value,
        merged_values,
        potential_savings: PotentialSavings {
            rule_reduction,
            percentage_of_rules: percentage(rule_reduction, total_rules),
        },
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 1000.0).round() / 10.0
}

/// Values in first-seen order without repeats.
fn distinct(values: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

fn display_address(key: &str) -> &str {
    if key.is_empty() { "(unset)" } else { key }
}

fn display_protocol(key: &str) -> String {
    if key == "*" {
        "any-protocol".to_string()
    } else {
        key.to_uppercase()
    }
}
