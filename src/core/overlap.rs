//! Pairwise CIDR overlap detection
//!
//! Every literal CIDR block (an entry written as `address/prefix`) is
//! compared with every other block exactly once. Bare host addresses are not
//! part of this pass. IPv4 and IPv6 blocks never overlap.

use crate::core::extract::RuleAddresses;
use crate::core::findings::Severity;
use crate::core::rule::Side;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use tracing::debug;

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
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverlapType {
    /// Both blocks cover exactly the same range
    Identical,
    /// One block lies entirely inside the other
    Subset,
    /// The ranges intersect but neither contains the other
    Partial,
}

impl OverlapType {
    pub const fn severity(self) -> Severity {
        match self {
            OverlapType::Identical => Severity::High,
            OverlapType::Subset | OverlapType::Partial => Severity::Medium,
        }
    }

    pub const fn recommendation(self) -> &'static str {
        match self {
            OverlapType::Identical => {
                "Identical networks are declared more than once; keep a single entry"
            }
            OverlapType::Subset => {
                "The smaller network is already covered by the larger one; remove it unless rule priorities require both"
            }
            OverlapType::Partial => {
                "Networks partially overlap; review whether they can be merged into one block"
            }
        }
    }
}

/// Where a network was declared
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRef {
    pub rule_name: String,
    pub field: Side,
    pub network: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct OverlapFinding {
    pub network_a: NetworkRef,
    pub network_b: NetworkRef,
    pub overlap_type: OverlapType,
    pub severity: Severity,
    pub recommendation: String,
}

/// Inclusive address range of a network as 128-bit integers.
fn bounds(network: &IpNetwork) -> (u128, u128) {
    match network {
        IpNetwork::V4(v4) => {
            let ip = u32::from(v4.ip());
            let mask = u32::MAX.checked_shl(32 - u32::from(v4.prefix())).unwrap_or(0);
            let start = ip & mask;
            (u128::from(start), u128::from(start | !mask))
        }
        IpNetwork::V6(v6) => {
            let ip = u128::from(v6.ip());
            let mask = u128::MAX.checked_shl(128 - u32::from(v6.prefix())).unwrap_or(0);
            let start = ip & mask;
            (start, start | !mask)
        }
    }
}

/// Returns `true` if every address of `inner` lies inside `outer`.
pub fn network_contains(outer: &IpNetwork, inner: &IpNetwork) -> bool {
    if outer.is_ipv4() != inner.is_ipv4() {
        return false;
    }
    let (outer_start, outer_end) = bounds(outer);
    let (inner_start, inner_end) = bounds(inner);
    outer_start <= inner_start && inner_end <= outer_end
}

/// Classifies how two networks overlap, or `None` if they are disjoint.
///
/// The result does not depend on argument order.
///
/// # Examples
///
/// ```
/// use nsgaudit::core::overlap::{classify_overlap, OverlapType};
///
/// let a = "10.0.0.0/24".parse().unwrap();
/// let b = "10.0.0.0/16".parse().unwrap();
/// let c = "10.0.1.0/24".parse().unwrap();
///
/// assert_eq!(classify_overlap(&a, &b), Some(OverlapType::Subset));
/// assert_eq!(classify_overlap(&a, &a), Some(OverlapType::Identical));
/// assert_eq!(classify_overlap(&a, &c), None);
/// ```
pub fn classify_overlap(a: &IpNetwork, b: &IpNetwork) -> Option<OverlapType> {
    if a.is_ipv4() != b.is_ipv4() {
        return None;
    }
    let (a_start, a_end) = bounds(a);
    let (b_start, b_end) = bounds(b);

    if a_start > b_end || b_start > a_end {
        return None;
    }
    if a_start == b_start && a_end == b_end {
        return Some(OverlapType::Identical);
    }
    if network_contains(a, b) || network_contains(b, a) {
        Some(OverlapType::Subset)
    } else {
        Some(OverlapType::Partial)
    }
}

/// Finds every overlapping pair of CIDR blocks across all rules.
pub fn detect_overlaps(extracted: &[RuleAddresses<'_>]) -> Vec<OverlapFinding> {
    let blocks: Vec<(NetworkRef, IpNetwork)> = extracted
        .iter()
        .flat_map(|entry| {
            [Side::Source, Side::Destination]
                .into_iter()
                .flat_map(move |side| {
                    entry
                        .side(side)
                        .networks
                        .iter()
                        .filter(|n| n.is_cidr())
                        .map(move |n| {
                            (
                                NetworkRef {
                                    rule_name: entry.rule.name.clone(),
                                    field: side,
                                    network: n.token.clone(),
                                },
                                n.network,
                            )
                        })
                })
        })
        .collect();

    let mut findings = Vec::new();
    for (i, (ref_a, net_a)) in blocks.iter().enumerate() {
        for (ref_b, net_b) in &blocks[i + 1..] {
            if let Some(overlap_type) = classify_overlap(net_a, net_b) {
                findings.push(OverlapFinding {
                    network_a: ref_a.clone(),
                    network_b: ref_b.clone(),
                    overlap_type,
                    severity: overlap_type.severity(),
                    recommendation: overlap_type.recommendation().to_string(),
                });
            }
        }
    }

    debug!(
        blocks = blocks.len(),
        overlaps = findings.len(),
        "Overlap detection complete"
    );
    findings
}
