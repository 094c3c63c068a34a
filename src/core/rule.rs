//! Security rule data structures
//!
//! A [`Rule`] mirrors one entry of an NSG `securityRules` export. Address and
//! port fields exist in both a singular and a plural form, exactly as the
//! provider serializes them; the provider never populates both at once, and
//! when a non-empty plural list is present the singular field is ignored.
//!
//! Every optional field is an explicit `Option` or an empty `Vec`, so a rule
//! that arrives with missing data still deserializes and the analyzer decides
//! what to do with the gap.
//!
//! # Example
//!
//! ```
//! use nsgaudit::core::rule::{Access, Direction, Rule};
//!
//! let rule = Rule::new("allow-https", 100, Direction::Inbound, Access::Allow)
//!     .with_protocol("Tcp")
//!     .with_source("*")
//!     .with_destination("10.0.0.4")
//!     .with_destination_port("443");
//!
//! assert_eq!(rule.destination_port(), "443");
//! assert!(rule.is_allow());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lowest priority value the provider accepts for user rules
pub const MIN_PRIORITY: i32 = 100;

/// Highest priority value the provider accepts for user rules
pub const MAX_PRIORITY: i32 = 4096;

/// Wildcard token used by the provider for "any address" and "any port"
pub const WILDCARD: &str = "*";

/// Traffic direction a rule applies to
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
pub enum Direction {
    /// Traffic entering the protected subnet or NIC
    Inbound,
    /// Traffic leaving the protected subnet or NIC
    Outbound,
}

/// What the provider does with matching traffic
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
pub enum Access {
    Allow,
    Deny,
}

/// Which address field of a rule a value came from
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
pub enum Side {
    #[strum(serialize = "source")]
    Source,
    #[strum(serialize = "destination")]
    Destination,
}

/// An inclusive port range parsed from a port specification entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    pub const ANY: PortRange = PortRange {
        start: 0,
        end: u16::MAX,
    };

    pub const fn single(port: u16) -> Self {
        Self {
            start: port,
            end: port,
        }
    }

    pub const fn contains(&self, port: u16) -> bool {
        self.start <= port && port <= self.end
    }

    /// Parses one entry of a port specification (`*`, `443`, `8000-8080`).
    ///
    /// # Errors
    ///
    /// Returns a reason when the entry is not a port, a range or `*`, or when
    /// a range is reversed.
    pub fn parse(entry: &str) -> std::result::Result<Self, String> {
        let entry = entry.trim();
        if entry == WILDCARD {
            return Ok(Self::ANY);
        }
        let parse_port = |s: &str| {
            s.trim()
                .parse::<u16>()
                .map_err(|_| format!("'{}' is not a port number", s.trim()))
        };
        match entry.split_once('-') {
            Some((start, end)) => {
                let (start, end) = (parse_port(start)?, parse_port(end)?);
                if start > end {
                    Err(format!("port range {start}-{end} is reversed"))
                } else {
                    Ok(Self { start, end })
                }
            }
            None => parse_port(entry).map(Self::single),
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::ANY {
            write!(f, "{WILDCARD}")
        } else if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Parses a comma-joined port specification, keeping the bad entries apart.
pub fn parse_port_spec(spec: &str) -> (Vec<PortRange>, Vec<(String, String)>) {
    let mut ranges = Vec::new();
    let mut invalid = Vec::new();
    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match PortRange::parse(entry) {
            Ok(range) => ranges.push(range),
            Err(reason) => invalid.push((entry.to_string(), reason)),
        }
    }
    (ranges, invalid)
}

/// One directional security rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub priority: i32,
    pub direction: Direction,
    pub access: Access,
    /// Protocol as exported (`Tcp`, `Udp`, `Icmp`, `*`, ...)
    #[serde(default = "default_wildcard")]
    pub protocol: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_address_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_address_prefixes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_address_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_address_prefixes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port_range: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_port_ranges: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_port_range: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_port_ranges: Vec<String>,

    /// Application security group references, counted apart from IP literals
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source_application_security_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub destination_application_security_groups: Vec<String>,
}

fn default_wildcard() -> String {
    WILDCARD.to_string()
}

impl Rule {
    /// Creates a rule with wildcard protocol and ports and no addresses.
    pub fn new(name: impl Into<String>, priority: i32, direction: Direction, access: Access) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            priority,
            direction,
            access,
            protocol: default_wildcard(),
            source_address_prefix: None,
            source_address_prefixes: Vec::new(),
            destination_address_prefix: None,
            destination_address_prefixes: Vec::new(),
            source_port_range: None,
            source_port_ranges: Vec::new(),
            destination_port_range: None,
            destination_port_ranges: Vec::new(),
            source_application_security_groups: Vec::new(),
            destination_application_security_groups: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_source(mut self, prefix: impl Into<String>) -> Self {
        self.source_address_prefix = Some(prefix.into());
        self
    }

    pub fn with_sources<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_address_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_destination(mut self, prefix: impl Into<String>) -> Self {
        self.destination_address_prefix = Some(prefix.into());
        self
    }

    pub fn with_destinations<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destination_address_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source_port(mut self, range: impl Into<String>) -> Self {
        self.source_port_range = Some(range.into());
        self
    }

    pub fn with_destination_port(mut self, range: impl Into<String>) -> Self {
        self.destination_port_range = Some(range.into());
        self
    }

    pub fn with_destination_ports<I, S>(mut self, ranges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destination_port_ranges = ranges.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_source_asgs<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_application_security_groups = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_destination_asgs<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.destination_application_security_groups = ids.into_iter().map(Into::into).collect();
        self
    }

    pub const fn is_allow(&self) -> bool {
        matches!(self.access, Access::Allow)
    }

    /// Lowercased protocol, so `TCP` and `Tcp` group together.
    pub fn protocol_key(&self) -> String {
        self.protocol.trim().to_ascii_lowercase()
    }

    /// Raw address entries for one side, plural list winning over singular.
    pub fn address_entries(&self, side: Side) -> Vec<&str> {
        let (single, plural) = match side {
            Side::Source => (&self.source_address_prefix, &self.source_address_prefixes),
            Side::Destination => (
                &self.destination_address_prefix,
                &self.destination_address_prefixes,
            ),
        };
        pick_entries(single.as_deref(), plural)
    }

    /// Address field rendered as a single comparable string.
    pub fn address_key(&self, side: Side) -> String {
        self.address_entries(side).join(",")
    }

    pub fn security_groups(&self, side: Side) -> &[String] {
        match side {
            Side::Source => &self.source_application_security_groups,
            Side::Destination => &self.destination_application_security_groups,
        }
    }

    /// Source port specification, comma-joined; `*` when absent.
    pub fn source_port(&self) -> String {
        join_ports(
            self.source_port_range.as_deref(),
            &self.source_port_ranges,
        )
    }

    /// Destination port specification, comma-joined; `*` when absent.
    pub fn destination_port(&self) -> String {
        join_ports(
            self.destination_port_range.as_deref(),
            &self.destination_port_ranges,
        )
    }

    /// Returns `true` if the priority sits inside the provider's user range.
    pub fn priority_in_range(&self) -> bool {
        (MIN_PRIORITY..=MAX_PRIORITY).contains(&self.priority)
    }
}

fn pick_entries<'a>(single: Option<&'a str>, plural: &'a [String]) -> Vec<&'a str> {
    if !plural.is_empty() {
        return plural
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();
    }
    single
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn join_ports(single: Option<&str>, plural: &[String]) -> String {
    let entries = pick_entries(single, plural);
    if entries.is_empty() {
        WILDCARD.to_string()
    } else {
        entries.join(",")
    }
}
