//! Core rule analysis functionality
//!
//! This module contains the rule model and every analysis pass. It provides:
//!
//! - [`rule`]: The canonical security rule and port ranges
//! - [`extract`]: Address token classification and per-rule extraction
//! - [`counting`]: Directional address counting and provider limit checks
//! - [`overlap`]: Pairwise CIDR overlap detection
//! - [`redundancy`]: Attribute-similarity redundancy detection
//! - [`risk`]: Per-rule risk scoring and the executive summary
//! - [`consolidation`]: Port and address consolidation planning
//! - [`service_tags`]: Service tag usage, overlap and conversion analysis
//! - [`report`]: Report contract and assembly
//! - [`recommendations`]: Deterministic recommendation generation
//! - [`narrative`]: Optional narrative collaborator
//! - [`analyzer`]: Sequential, parallel and batch entry points
//! - [`source`]: Rule snapshot sources
//! - [`error`]: Error types for the I/O boundary

pub mod analyzer;
pub mod consolidation;
pub mod counting;
pub mod error;
pub mod extract;
pub mod findings;
pub mod narrative;
pub mod overlap;
pub mod recommendations;
pub mod redundancy;
pub mod report;
pub mod risk;
pub mod rule;
pub mod service_tags;
pub mod source;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
