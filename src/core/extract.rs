//! Address and service-tag extraction
//!
//! Splits a rule's source/destination fields into the four kinds of entry
//! the provider accepts: the `*` wildcard, symbolic service tags, application
//! security group references and literal IP/CIDR blocks. Only literals are
//! counted against address limits; security groups are tracked separately
//! and wildcards and tags are elided.
//!
//! Unparsable entries are dropped and reported as [`Diagnostic`]s.

use crate::core::findings::Diagnostic;
use crate::core::rule::{MAX_PRIORITY, MIN_PRIORITY, Rule, Side, WILDCARD, parse_port_spec};
use ipnetwork::IpNetwork;
use tracing::warn;

/// Well-known provider service tags, in canonical spelling.
///
/// Regional variants (`Storage.WestEurope`) resolve to their base tag.
pub const SERVICE_TAGS: &[&str] = &[
    "VirtualNetwork",
    "Internet",
    "Any",
    "AzureLoadBalancer",
    "Storage",
    "Sql",
    "AzureActiveDirectory",
    "AzureCloud",
    "AzureMonitor",
    "AppService",
    "AzureKeyVault",
    "EventHub",
    "ServiceBus",
    "AzureCosmosDB",
    "GatewayManager",
    "AzureFrontDoor.Backend",
    "AzureTrafficManager",
    "AzureContainerRegistry",
];

/// Path segment identifying an application security group resource id
pub const ASG_PATH_SEGMENT: &str = "applicationsecuritygroups";

/// Classification of a single address entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressToken {
    Wildcard,
    ServiceTag(&'static str),
    SecurityGroup(String),
    Network(IpNetwork),
}

/// Resolves a token to its canonical service tag name, if it is one.
pub fn canonical_service_tag(token: &str) -> Option<&'static str> {
    let token = token.trim();
    if let Some(tag) = SERVICE_TAGS.iter().find(|t| t.eq_ignore_ascii_case(token)) {
        return Some(*tag);
    }
    let (base, region) = token.split_once('.')?;
    if region.is_empty() {
        return None;
    }
    SERVICE_TAGS
        .iter()
        .find(|t| !t.contains('.') && t.eq_ignore_ascii_case(base))
        .copied()
}

/// Classifies one address entry.
///
/// # Errors
///
/// Returns a human-readable reason when the entry is neither a wildcard, a
/// known service tag, a security-group reference nor a valid IP/CIDR.
///
/// # Examples
///
/// ```
/// use nsgaudit::core::extract::{classify_token, AddressToken};
///
/// assert_eq!(classify_token("*"), Ok(AddressToken::Wildcard));
/// assert_eq!(classify_token("internet"), Ok(AddressToken::ServiceTag("Internet")));
/// assert!(matches!(classify_token("10.0.0.0/24"), Ok(AddressToken::Network(_))));
/// assert!(classify_token("10.0.0.0/33").is_err());
/// ```
pub fn classify_token(token: &str) -> Result<AddressToken, String> {
    let token = token.trim();
    if token.is_empty() {
        return Err("empty address entry".to_string());
    }
    if token == WILDCARD {
        return Ok(AddressToken::Wildcard);
    }
    if token.to_ascii_lowercase().contains(ASG_PATH_SEGMENT) {
        return Ok(AddressToken::SecurityGroup(token.to_string()));
    }
    if let Some(tag) = canonical_service_tag(token) {
        return Ok(AddressToken::ServiceTag(tag));
    }
    token
        .parse::<IpNetwork>()
        .map(AddressToken::Network)
        .map_err(|e| format!("not an IP address, CIDR block or service tag ({e})"))
}

/// A literal network together with the text it was written as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEntry {
    pub token: String,
    pub network: IpNetwork,
}

impl NetworkEntry {
    /// Entries written in `address/prefix` form; bare addresses are hosts.
    pub fn is_cidr(&self) -> bool {
        self.token.contains('/')
    }
}

/// Everything extracted from one side of a rule
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SideAddresses {
    pub networks: Vec<NetworkEntry>,
    pub service_tags: Vec<&'static str>,
    pub security_groups: Vec<String>,
    pub wildcard: bool,
}

impl SideAddresses {
    /// Literal + security-group count for this side alone.
    pub fn combined_count(&self) -> usize {
        self.networks.len() + self.security_groups.len()
    }
}

/// Extraction output for one rule
#[derive(Debug, Clone)]
pub struct RuleAddresses<'a> {
    pub rule: &'a Rule,
    pub source: SideAddresses,
    pub destination: SideAddresses,
    pub diagnostics: Vec<Diagnostic>,
}

impl RuleAddresses<'_> {
    pub fn side(&self, side: Side) -> &SideAddresses {
        match side {
            Side::Source => &self.source,
            Side::Destination => &self.destination,
        }
    }
}

/// Extracts both sides of a rule.
pub fn extract_rule(rule: &Rule) -> RuleAddresses<'_> {
    let mut diagnostics = Vec::new();
    let source = extract_side(rule, Side::Source, &mut diagnostics);
    let destination = extract_side(rule, Side::Destination, &mut diagnostics);

    for (field, spec) in [
        ("sourcePortRange", rule.source_port()),
        ("destinationPortRange", rule.destination_port()),
    ] {
        let (_, invalid) = parse_port_spec(&spec);
        for (entry, reason) in invalid {
            warn!(rule = %rule.name, field, entry = %entry, "Skipping port entry: {reason}");
            diagnostics.push(Diagnostic::new(&rule.name, field, entry, reason));
        }
    }

    if !rule.priority_in_range() {
        diagnostics.push(Diagnostic::new(
            &rule.name,
            "priority",
            rule.priority.to_string(),
            format!("priority outside the provider range {MIN_PRIORITY}-{MAX_PRIORITY}"),
        ));
    }

    RuleAddresses {
        rule,
        source,
        destination,
        diagnostics,
    }
}

/// Extracts every rule in order.
pub fn extract_all(rules: &[Rule]) -> Vec<RuleAddresses<'_>> {
    rules.iter().map(extract_rule).collect()
}

fn extract_side(rule: &Rule, side: Side, diagnostics: &mut Vec<Diagnostic>) -> SideAddresses {
    let mut out = SideAddresses::default();
    let field = format!("{side}AddressPrefix");

    for token in rule.address_entries(side) {
        match classify_token(token) {
            Ok(AddressToken::Wildcard) => out.wildcard = true,
            Ok(AddressToken::ServiceTag(tag)) => {
                if !out.service_tags.contains(&tag) {
                    out.service_tags.push(tag);
                }
            }
            Ok(AddressToken::SecurityGroup(id)) => push_unique(&mut out.security_groups, id),
            Ok(AddressToken::Network(network)) => {
                if !out.networks.iter().any(|e| e.network == network) {
                    out.networks.push(NetworkEntry {
                        token: token.to_string(),
                        network,
                    });
                }
            }
            Err(message) => {
                warn!(rule = %rule.name, field = %field, token, "Skipping address entry: {message}");
                diagnostics.push(Diagnostic::new(&rule.name, &field, token, message));
            }
        }
    }

    for id in rule.security_groups(side) {
        let id = id.trim();
        if id.is_empty() {
            diagnostics.push(Diagnostic::new(
                &rule.name,
                format!("{side}ApplicationSecurityGroups"),
                id,
                "empty security group reference",
            ));
            continue;
        }
        push_unique(&mut out.security_groups, id.to_string());
    }

    out
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rule::{Access, Direction};

    fn inbound(name: &str) -> Rule {
        Rule::new(name, 100, Direction::Inbound, Access::Allow)
    }

    #[test]
    fn test_classify_wildcard_and_tags() {
        assert_eq!(classify_token(" * "), Ok(AddressToken::Wildcard));
        assert_eq!(
            classify_token("VirtualNetwork"),
            Ok(AddressToken::ServiceTag("VirtualNetwork"))
        );
        assert_eq!(
            classify_token("Storage.WestEurope"),
            Ok(AddressToken::ServiceTag("Storage"))
        );
        assert_eq!(
            classify_token("AzureFrontDoor.Backend"),
            Ok(AddressToken::ServiceTag("AzureFrontDoor.Backend"))
        );
    }

    #[test]
    fn test_classify_security_group_path() {
        let id = "/subscriptions/s/resourceGroups/rg/providers/Microsoft.Network/applicationSecurityGroups/web";
        assert_eq!(
            classify_token(id),
            Ok(AddressToken::SecurityGroup(id.to_string()))
        );
    }

    #[test]
    fn test_classify_literals() {
        assert!(matches!(
            classify_token("10.0.0.4"),
            Ok(AddressToken::Network(n)) if n.prefix() == 32
        ));
        assert!(matches!(
            classify_token("2001:db8::/32"),
            Ok(AddressToken::Network(n)) if n.is_ipv6()
        ));
        assert!(classify_token("not-an-ip").is_err());
        assert!(classify_token("300.1.1.1").is_err());
        assert!(classify_token("").is_err());
    }

    #[test]
    fn test_extract_splits_kinds() {
        let rule = inbound("mixed")
            .with_sources(["*", "Internet", "10.0.0.0/24", "10.0.0.0/24", "bogus"])
            .with_source_asgs(["asg-web"]);
        let extracted = extract_rule(&rule);

        assert!(extracted.source.wildcard);
        assert_eq!(extracted.source.service_tags, vec!["Internet"]);
        assert_eq!(extracted.source.networks.len(), 1);
        assert_eq!(extracted.source.security_groups, vec!["asg-web".to_string()]);
        assert_eq!(extracted.source.combined_count(), 2);
        assert_eq!(extracted.diagnostics.len(), 1);
        assert_eq!(extracted.diagnostics[0].token, "bogus");
        assert_eq!(extracted.diagnostics[0].field, "sourceAddressPrefix");
    }

    #[test]
    fn test_extract_ignores_singular_when_plural_present() {
        let rule = inbound("both")
            .with_destination("192.168.0.1")
            .with_destinations(["10.1.0.0/16"]);
        let extracted = extract_rule(&rule);
        assert_eq!(extracted.destination.networks.len(), 1);
        assert_eq!(extracted.destination.networks[0].token, "10.1.0.0/16");
    }

    #[test]
    fn test_bad_ports_and_priority_reported() {
        let rule = Rule::new("odd", 50, Direction::Inbound, Access::Allow)
            .with_destination_ports(["443", "https"]);
        let extracted = extract_rule(&rule);
        let fields: Vec<&str> = extracted
            .diagnostics
            .iter()
            .map(|d| d.field.as_str())
            .collect();
        assert_eq!(fields, vec!["destinationPortRange", "priority"]);
    }

    #[test]
    fn test_cidr_flag() {
        let rule = inbound("r").with_sources(["10.0.0.4", "10.0.0.0/24"]);
        let extracted = extract_rule(&rule);
        let flags: Vec<bool> = extracted.source.networks.iter().map(NetworkEntry::is_cidr).collect();
        assert_eq!(flags, vec![false, true]);
    }
}
