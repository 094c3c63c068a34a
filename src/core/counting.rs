//! Unique address counting and provider limit checks
//!
//! The provider limits the number of *unique* addresses per direction and
//! field, not the number of rules. Every literal network extracted from a
//! rule lands in one of four directional sets (see [`Bucket`]); security
//! group references land in a parallel set of four. A bucket's combined
//! count is `|ips| + |asgs|`.
//!
//! The four directional buckets are authoritative and gate compliance. The
//! flattened [`LegacyCounts`] (inbound + outbound per field) are kept only
//! for older report consumers.

use crate::config::Limits;
use crate::core::extract::RuleAddresses;
use crate::core::findings::{Bucket, Severity, Violation, ViolationKind};
use crate::core::rule::Side;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use strum::IntoEnumIterator;
use tracing::debug;

/// Affected-rule marker used when a bucket violation spans several rules
pub const MULTIPLE_RULES: &str = "Multiple rules";

/// Unique counts for one directional bucket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BucketCount {
    pub bucket: Bucket,
    pub ip_count: usize,
    pub asg_count: usize,
    pub combined_count: usize,
}

/// Flattened counts summed across directions (reporting only)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LegacyCounts {
    pub source_ip_count: usize,
    pub destination_ip_count: usize,
    pub source_asg_count: usize,
    pub destination_asg_count: usize,
}

/// A literal network written in more than one rule of the same bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateAddress {
    pub address: String,
    pub bucket: Bucket,
    pub rule_names: Vec<String>,
}

impl DuplicateAddress {
    /// Entries that could be removed if the address were declared once.
    pub fn redundant_entries(&self) -> usize {
        self.rule_names.len().saturating_sub(1)
    }
}

/// Output of the counting pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CountingResult {
    pub buckets: Vec<BucketCount>,
    pub legacy: LegacyCounts,
    pub violations: Vec<Violation>,
    pub duplicate_addresses: Vec<DuplicateAddress>,
}

impl CountingResult {
    pub fn bucket(&self, bucket: Bucket) -> BucketCount {
        self.buckets
            .iter()
            .copied()
            .find(|b| b.bucket == bucket)
            .unwrap_or(BucketCount {
                bucket,
                ip_count: 0,
                asg_count: 0,
                combined_count: 0,
            })
    }
}

#[derive(Default)]
struct BucketSets {
    ips: HashMap<IpNetwork, (String, Vec<String>)>,
    asgs: BTreeSet<String>,
    contributors: BTreeSet<String>,
}

/// Counts unique addresses per bucket and checks them against `limits`.
///
/// Also runs the per-rule checks from [`check_rule_limits`] so a single
/// oversized rule is attributed by name.
pub fn count_addresses(extracted: &[RuleAddresses<'_>], limits: &Limits) -> CountingResult {
    let mut sets: BTreeMap<Bucket, BucketSets> =
        Bucket::iter().map(|b| (b, BucketSets::default())).collect();

    for entry in extracted {
        let rule_name = &entry.rule.name;
        for side in [Side::Source, Side::Destination] {
            let bucket = Bucket::of(entry.rule.direction, side);
            let addresses = entry.side(side);
            let Some(set) = sets.get_mut(&bucket) else {
                continue;
            };

            for net in &addresses.networks {
                let (_, names) = set
                    .ips
                    .entry(net.network)
                    .or_insert_with(|| (net.token.clone(), Vec::new()));
                if !names.contains(rule_name) {
                    names.push(rule_name.clone());
                }
            }
            set.asgs.extend(addresses.security_groups.iter().cloned());

            if addresses.combined_count() > 0 {
                set.contributors.insert(rule_name.clone());
            }
        }
    }

    let mut buckets = Vec::with_capacity(4);
    let mut violations = Vec::new();
    let mut duplicate_addresses = Vec::new();

    for (bucket, set) in &sets {
        let count = BucketCount {
            bucket: *bucket,
            ip_count: set.ips.len(),
            asg_count: set.asgs.len(),
            combined_count: set.ips.len() + set.asgs.len(),
        };
        debug!(
            bucket = %bucket,
            ips = count.ip_count,
            asgs = count.asg_count,
            "Counted unique addresses"
        );

        if count.combined_count > limits.max_addresses_per_bucket {
            let affected = if set.contributors.len() == 1 {
                set.contributors.iter().cloned().collect()
            } else {
                vec![MULTIPLE_RULES.to_string()]
            };
            violations.push(Violation {
                kind: ViolationKind::IpLimitExceeded,
                severity: Severity::Critical,
                message: format!(
                    "{} addresses ({} IPs + {} security groups = {}) exceed the limit of {}",
                    capitalize(bucket.as_ref()),
                    count.ip_count,
                    count.asg_count,
                    count.combined_count,
                    limits.max_addresses_per_bucket
                ),
                affected_rule_names: affected,
                current_count: count.combined_count,
                max_allowed: limits.max_addresses_per_bucket,
                bucket: Some(*bucket),
            });
        }

        duplicate_addresses.extend(
            set.ips
                .values()
                .filter(|(_, names)| names.len() > 1)
                .map(|(token, names)| DuplicateAddress {
                    address: token.clone(),
                    bucket: *bucket,
                    rule_names: names.clone(),
                }),
        );

        buckets.push(count);
    }

    duplicate_addresses.sort_by(|a, b| {
        a.bucket
            .cmp(&b.bucket)
            .then_with(|| a.address.cmp(&b.address))
    });

    for entry in extracted {
        violations.extend(check_rule_limits(entry, limits));
    }

    let legacy = legacy_counts(&buckets);

    CountingResult {
        buckets,
        legacy,
        violations,
        duplicate_addresses,
    }
}

/// Checks one rule on its own against the address and security-group limits.
pub fn check_rule_limits(entry: &RuleAddresses<'_>, limits: &Limits) -> Vec<Violation> {
    let mut violations = Vec::new();
    let rule = entry.rule;

    for side in [Side::Source, Side::Destination] {
        let addresses = entry.side(side);

        let combined = addresses.combined_count();
        if combined > limits.max_addresses_per_bucket {
            violations.push(Violation {
                kind: ViolationKind::RuleIpLimitExceeded,
                severity: Severity::Critical,
                message: format!(
                    "Rule '{}' alone lists {combined} {side} addresses, over the limit of {}",
                    rule.name, limits.max_addresses_per_bucket
                ),
                affected_rule_names: vec![rule.name.clone()],
                current_count: combined,
                max_allowed: limits.max_addresses_per_bucket,
                bucket: Some(Bucket::of(rule.direction, side)),
            });
        }

        let asgs = addresses.security_groups.len();
        if asgs > limits.max_asg_per_rule {
            violations.push(Violation {
                kind: ViolationKind::AsgLimitExceeded,
                severity: Severity::High,
                message: format!(
                    "Rule '{}' references {asgs} {side} application security groups, over the limit of {}",
                    rule.name, limits.max_asg_per_rule
                ),
                affected_rule_names: vec![rule.name.clone()],
                current_count: asgs,
                max_allowed: limits.max_asg_per_rule,
                bucket: Some(Bucket::of(rule.direction, side)),
            });
        }
    }

    violations
}

fn legacy_counts(buckets: &[BucketCount]) -> LegacyCounts {
    let mut legacy = LegacyCounts::default();
    for count in buckets {
        match count.bucket.side() {
            Side::Source => {
                legacy.source_ip_count += count.ip_count;
                legacy.source_asg_count += count.asg_count;
            }
            Side::Destination => {
                legacy.destination_ip_count += count.ip_count;
                legacy.destination_asg_count += count.asg_count;
            }
        }
    }
    legacy
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::extract::extract_all;
    use crate::core::rule::{Access, Direction, Rule};

    fn inbound(name: &str) -> Rule {
        Rule::new(name, 100, Direction::Inbound, Access::Allow)
    }

    fn outbound(name: &str) -> Rule {
        Rule::new(name, 100, Direction::Outbound, Access::Allow)
    }

    fn hosts(range: std::ops::Range<u32>) -> Vec<String> {
        range
            .map(|i| format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff))
            .collect()
    }

    #[test]
    fn test_repeated_addresses_counted_once() {
        let rules = vec![
            inbound("a").with_sources(["10.0.0.1", "10.0.0.2"]),
            inbound("b").with_sources(["10.0.0.2", "10.0.0.3"]),
            inbound("c").with_source("10.0.0.1"),
        ];
        let extracted = extract_all(&rules);
        let result = count_addresses(&extracted, &Limits::default());

        assert_eq!(result.bucket(Bucket::InboundSource).ip_count, 3);
        assert_eq!(result.bucket(Bucket::InboundDestination).ip_count, 0);
        assert_eq!(result.duplicate_addresses.len(), 2);
        assert_eq!(result.duplicate_addresses[0].address, "10.0.0.1");
        assert_eq!(result.duplicate_addresses[0].rule_names, vec!["a", "c"]);
    }

    #[test]
    fn test_wildcards_and_tags_not_counted() {
        let rules = vec![
            inbound("a").with_source("*"),
            inbound("b").with_source("Internet"),
            inbound("c").with_source("VirtualNetwork"),
        ];
        let extracted = extract_all(&rules);
        let result = count_addresses(&extracted, &Limits::default());
        assert_eq!(result.bucket(Bucket::InboundSource).combined_count, 0);
    }

    #[test]
    fn test_asg_counted_separately() {
        let rules = vec![
            inbound("a")
                .with_source("10.0.0.1")
                .with_source_asgs(["asg-1", "asg-2"]),
            inbound("b").with_source_asgs(["asg-2"]),
        ];
        let extracted = extract_all(&rules);
        let result = count_addresses(&extracted, &Limits::default());
        let bucket = result.bucket(Bucket::InboundSource);
        assert_eq!(bucket.ip_count, 1);
        assert_eq!(bucket.asg_count, 2);
        assert_eq!(bucket.combined_count, 3);
    }

    #[test]
    fn test_legacy_counts_sum_directions() {
        let rules = vec![
            inbound("in").with_source("10.0.0.1").with_destination("10.1.0.1"),
            outbound("out").with_source("10.0.0.1").with_destination("10.2.0.1"),
        ];
        let extracted = extract_all(&rules);
        let result = count_addresses(&extracted, &Limits::default());
        assert_eq!(result.legacy.source_ip_count, 2);
        assert_eq!(result.legacy.destination_ip_count, 2);
        assert_eq!(result.bucket(Bucket::OutboundSource).ip_count, 1);
    }

    #[test]
    fn test_limit_boundary() {
        let limits = Limits {
            max_addresses_per_bucket: 10,
            max_asg_per_rule: 100,
        };

        let at_limit = vec![
            inbound("a").with_sources(hosts(0..5)),
            inbound("b").with_sources(hosts(5..10)),
        ];
        let extracted = extract_all(&at_limit);
        assert!(count_addresses(&extracted, &limits).violations.is_empty());

        let over_limit = vec![
            inbound("a").with_sources(hosts(0..5)),
            inbound("b").with_sources(hosts(5..11)),
        ];
        let extracted = extract_all(&over_limit);
        let result = count_addresses(&extracted, &limits);
        let bucket_violations: Vec<_> = result
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::IpLimitExceeded)
            .collect();
        assert_eq!(bucket_violations.len(), 1);
        assert_eq!(bucket_violations[0].bucket, Some(Bucket::InboundSource));
        assert_eq!(bucket_violations[0].current_count, 11);
        assert_eq!(bucket_violations[0].severity, Severity::Critical);
        assert_eq!(bucket_violations[0].affected_rule_names, vec![MULTIPLE_RULES]);
    }

    #[test]
    fn test_single_rule_over_limit_is_named() {
        let limits = Limits {
            max_addresses_per_bucket: 3,
            max_asg_per_rule: 100,
        };
        let rules = vec![inbound("big").with_destinations(hosts(0..4))];
        let extracted = extract_all(&rules);
        let result = count_addresses(&extracted, &limits);

        let bucket_violation = result
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::IpLimitExceeded)
            .unwrap();
        assert_eq!(bucket_violation.affected_rule_names, vec!["big"]);

        let rule_violation = result
            .violations
            .iter()
            .find(|v| v.kind == ViolationKind::RuleIpLimitExceeded)
            .unwrap();
        assert_eq!(rule_violation.affected_rule_names, vec!["big"]);
        assert_eq!(rule_violation.bucket, Some(Bucket::InboundDestination));
    }

    #[test]
    fn test_asg_limit_per_rule() {
        let limits = Limits {
            max_addresses_per_bucket: 4000,
            max_asg_per_rule: 2,
        };
        let rules = vec![inbound("groups").with_source_asgs(["a", "b", "c"])];
        let extracted = extract_all(&rules);
        let violations = check_rule_limits(&extracted[0], &limits);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::AsgLimitExceeded);
        assert_eq!(violations[0].severity, Severity::High);
    }
}
