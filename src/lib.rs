//! nsgaudit - Network Security Group rule analysis
//!
//! Reads a snapshot of directional security rules and reports on address
//! limit compliance, overlapping networks, redundant rules, exposure risk,
//! consolidation opportunities and service tag usage.
//!
//! # Architecture
//!
//! - [`core`] - Rule model, analysis passes, report assembly and rule sources
//! - [`config`] - Analyzer configuration (limits, risk tables) and loading
//! - [`utils`] - Utility functions (config directory, text helpers)
//!
//! # Guarantees
//!
//! - Analysis never fails: malformed entries become diagnostics
//! - Output is deterministic for a given input, apart from `generatedAt`
//! - Sequential and parallel analysis produce identical reports
//! - The optional narrative step can only append recommendations

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use config::{AnalyzerConfig, Limits};
pub use core::analyzer::{Analyzer, analyze, analyze_batch};
pub use core::error::{Error, Result};
pub use core::narrative::{NarrativeGenerator, enrich_with_narrative};
pub use core::report::AnalysisReport;
pub use core::rule::{Access, Direction, Rule};
pub use core::source::{JsonFileSource, RuleSource, StaticRuleSource};
