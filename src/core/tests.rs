#[cfg(test)]
mod tests_impl {
    use crate::config::Limits;
    use crate::core::analyzer::{Analyzer, analyze};
    use crate::core::findings::{Bucket, ViolationKind};
    use crate::core::rule::{Access, Direction, Rule};
    use crate::core::test_helpers::{inbound_tcp, web_tier_rules};

    fn hosts(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256))
            .collect()
    }

    #[test]
    fn test_limit_boundary_exactly_max() {
        let limits = Limits::default();
        let rules = vec![
            Rule::new("wide", 100, Direction::Inbound, Access::Allow)
                .with_sources(hosts(limits.max_addresses_per_bucket)),
        ];
        let report = analyze(&rules, limits);
        assert!(report.is_within_limits);
        assert_eq!(report.inbound_source_ip_count, 4000);
    }

    #[test]
    fn test_limit_boundary_one_over() {
        let limits = Limits::default();
        let rules = vec![
            Rule::new("wide-a", 100, Direction::Inbound, Access::Allow)
                .with_sources(hosts(2000)),
            Rule::new("wide-b", 110, Direction::Inbound, Access::Allow)
                .with_sources(hosts(4001).split_off(2000)),
        ];
        let report = analyze(&rules, limits);
        assert!(!report.is_within_limits);
        let bucket_violations: Vec<_> = report
            .violations
            .iter()
            .filter(|v| v.kind == ViolationKind::IpLimitExceeded)
            .collect();
        assert_eq!(bucket_violations.len(), 1);
        assert_eq!(bucket_violations[0].bucket, Some(Bucket::InboundSource));
        assert_eq!(bucket_violations[0].current_count, 4001);
    }

    #[test]
    fn test_directions_are_counted_apart() {
        let rules = vec![
            inbound_tcp("in", "10.0.0.1", "10.0.0.2", "443"),
            Rule::new("out", 100, Direction::Outbound, Access::Allow)
                .with_source("10.0.0.1")
                .with_destination("10.0.0.3"),
        ];
        let report = Analyzer::default().analyze(&rules);
        assert_eq!(report.inbound_source_ip_count, 1);
        assert_eq!(report.outbound_source_ip_count, 1);
        assert_eq!(report.legacy_counts.source_ip_count, 2);
        assert_eq!(report.inbound_rules, 1);
        assert_eq!(report.outbound_rules, 1);
    }

    #[test]
    fn test_web_tier_summary() {
        let report = Analyzer::default().analyze(&web_tier_rules());
        assert_eq!(report.total_rules, 5);
        assert_eq!(report.inbound_destination_ip_count, 1);
        assert_eq!(report.consolidation_opportunities.len(), 1);
        assert!(report.overlaps.is_empty());
        assert!(report.risk_score > 0);
    }
}

#[cfg(test)]
mod property_tests {
    use crate::core::analyzer::Analyzer;
    use crate::core::extract::classify_token;
    use crate::core::overlap::classify_overlap;
    use crate::core::risk::MAX_RISK_SCORE;
    use crate::core::rule::{Access, Direction, Rule};
    use ipnetwork::IpNetwork;
    use proptest::prelude::*;
    use std::collections::HashSet;

    const ADDRESS_POOL: &[&str] = &[
        "10.0.0.0/24",
        "10.0.0.0/16",
        "10.0.1.0/24",
        "10.0.0.4",
        "192.168.1.10",
        "172.16.0.0/12",
        "2001:db8::/32",
        "2001:db8::1",
    ];

    const SYMBOLIC_POOL: &[&str] = &["*", "Internet", "VirtualNetwork", "Storage.WestEurope"];

    prop_compose! {
        fn arb_addresses()(
            literals in prop::sample::subsequence(ADDRESS_POOL, 0..=4),
            symbols in prop::sample::subsequence(SYMBOLIC_POOL, 0..=2),
        ) -> Vec<String> {
            literals
                .into_iter()
                .chain(symbols)
                .map(str::to_string)
                .collect()
        }
    }

    prop_compose! {
        fn arb_rule()(
            index in 0usize..1000,
            direction in prop_oneof![Just(Direction::Inbound), Just(Direction::Outbound)],
            access in prop_oneof![Just(Access::Allow), Just(Access::Deny)],
            protocol in prop_oneof![Just("Tcp"), Just("Udp"), Just("*")],
            sources in arb_addresses(),
            destinations in arb_addresses(),
            port in prop_oneof![Just("22"), Just("443"), Just("8000-8100"), Just("*")],
        ) -> Rule {
            Rule::new(format!("rule-{index}"), 100 + i32::try_from(index).unwrap_or(0), direction, access)
                .with_protocol(protocol)
                .with_sources(sources)
                .with_destinations(destinations)
                .with_destination_port(port)
        }
    }

    prop_compose! {
        fn arb_v4_network()(octets in any::<[u8; 4]>(), prefix in 0u8..=32) -> IpNetwork {
            let ip = std::net::Ipv4Addr::from(octets);
            IpNetwork::V4(ipnetwork::Ipv4Network::new(ip, prefix).unwrap())
        }
    }

    fn distinct_literals(rules: &[Rule], direction: Direction) -> usize {
        rules
            .iter()
            .filter(|r| r.direction == direction)
            .flat_map(|r| r.source_address_prefixes.iter())
            .filter_map(|t| t.parse::<IpNetwork>().ok())
            .collect::<HashSet<_>>()
            .len()
    }

    proptest! {
        #[test]
        fn test_counts_equal_distinct_literals(rules in prop::collection::vec(arb_rule(), 0..12)) {
            let report = Analyzer::default().analyze(&rules);
            prop_assert_eq!(
                report.inbound_source_ip_count,
                distinct_literals(&rules, Direction::Inbound)
            );
            prop_assert_eq!(
                report.outbound_source_ip_count,
                distinct_literals(&rules, Direction::Outbound)
            );
        }

        #[test]
        fn test_symbolic_entries_never_counted(rules in prop::collection::vec(arb_rule(), 0..8)) {
            let stripped: Vec<Rule> = rules
                .iter()
                .cloned()
                .map(|mut r| {
                    r.source_address_prefixes.retain(|t| !SYMBOLIC_POOL.contains(&t.as_str()));
                    r.destination_address_prefixes.retain(|t| !SYMBOLIC_POOL.contains(&t.as_str()));
                    r
                })
                .collect();
            let analyzer = Analyzer::default();
            let with = analyzer.analyze(&rules);
            let without = analyzer.analyze(&stripped);
            prop_assert_eq!(with.buckets, without.buckets);
        }

        #[test]
        fn test_analysis_is_idempotent(rules in prop::collection::vec(arb_rule(), 0..10)) {
            let analyzer = Analyzer::default();
            let first = analyzer.analyze(&rules).without_timestamp();
            let second = analyzer.analyze(&rules).without_timestamp();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn test_risk_score_is_bounded(rules in prop::collection::vec(arb_rule(), 0..20)) {
            let report = Analyzer::default().analyze(&rules);
            prop_assert!(report.risk_score <= MAX_RISK_SCORE);
        }

        #[test]
        fn test_overlap_is_symmetric(a in arb_v4_network(), b in arb_v4_network()) {
            prop_assert_eq!(classify_overlap(&a, &b), classify_overlap(&b, &a));
        }

        #[test]
        fn test_overlap_findings_never_self_pair(mut rules in prop::collection::vec(arb_rule(), 0..8)) {
            for (i, rule) in rules.iter_mut().enumerate() {
                rule.name = format!("rule-{i}");
            }
            let report = Analyzer::default().analyze(&rules);
            for finding in &report.overlaps {
                prop_assert_ne!(&finding.network_a, &finding.network_b);
            }
        }

        #[test]
        fn test_token_classification_never_panics(token in "\\PC{0,40}") {
            let _ = classify_token(&token);
        }

        #[test]
        fn test_garbage_addresses_are_not_counted(token in "[g-z]{3,12}") {
            let rule = Rule::new("garbage", 100, Direction::Inbound, Access::Allow)
                .with_source(token);
            let report = Analyzer::default().analyze(&[rule]);
            prop_assert_eq!(report.inbound_source_ip_count, 0);
        }
    }
}
