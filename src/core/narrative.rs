//! Optional narrative collaborator
//!
//! An external generator (typically a language model) may add prose
//! recommendations on top of the deterministic list. It only ever sees a
//! compact [`FindingsDigest`], runs under a caller-supplied timeout, and can
//! only append: on absence, failure or timeout the report is returned with
//! its recommendations untouched.

use crate::core::findings::Severity;
use crate::core::recommendations::{
    EstimatedSavings, Impact, RecommendationCategory, RecommendationItem, recommendation_id,
};
use crate::core::report::AnalysisReport;
use crate::core::risk::OverallRisk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors a narrative generator can report.
#[derive(Debug, Error)]
pub enum NarrativeError {
    /// The backing service could not be reached or refused the request.
    #[error("Narrative service unavailable: {0}")]
    Unavailable(String),

    /// The service answered with something that is not a usable suggestion.
    #[error("Invalid narrative output: {0}")]
    InvalidOutput(String),
}

/// Compact summary handed to the narrative generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FindingsDigest {
    pub total_rules: usize,
    pub risk_level: OverallRisk,
    pub risk_score: u32,
    pub is_within_limits: bool,
    pub violations: usize,
    pub high_risk_rules: Vec<String>,
    pub consolidation_opportunities: usize,
    pub duplicate_addresses: usize,
    pub redundant_pairs: usize,
    pub overlaps: usize,
    /// Titles of the deterministic recommendations already present
    pub existing_recommendations: Vec<String>,
}

impl FindingsDigest {
    pub fn from_report(report: &AnalysisReport) -> Self {
        Self {
            total_rules: report.total_rules,
            risk_level: report.executive_summary.risk_level,
            risk_score: report.risk_score,
            is_within_limits: report.is_within_limits,
            violations: report.violations.len(),
            high_risk_rules: report
                .risk_findings
                .iter()
                .filter(|f| f.level >= Severity::High)
                .map(|f| f.rule_name.clone())
                .collect(),
            consolidation_opportunities: report.consolidation_opportunities.len(),
            duplicate_addresses: report.duplicate_addresses.len(),
            redundant_pairs: report.redundant_rules.len(),
            overlaps: report.overlaps.len(),
            existing_recommendations: report
                .recommendations
                .iter()
                .map(|r| r.title.clone())
                .collect(),
        }
    }
}

/// One prose suggestion returned by a generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeSuggestion {
    pub title: String,
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: Severity,
}

fn default_priority() -> Severity {
    Severity::Low
}

/// What happened to the narrative step for a report.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum NarrativeOutcome {
    /// No generator was configured.
    #[default]
    Skipped,
    /// The generator answered; `items` suggestions were appended.
    Applied { items: usize },
    /// The generator returned an error.
    Failed { reason: String },
    /// The generator did not answer in time.
    TimedOut {
        #[serde(rename = "afterSecs")]
        after_secs: u64,
    },
}

/// A source of free-form recommendations.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Produces suggestions for the digest.
    async fn suggest(
        &self,
        digest: &FindingsDigest,
    ) -> Result<Vec<NarrativeSuggestion>, NarrativeError>;
}

/// Appends narrative recommendations to a finished report.
///
/// Dropping the returned future cancels the generator call. The
/// deterministic recommendations are never modified or reordered.
pub async fn enrich_with_narrative(
    mut report: AnalysisReport,
    generator: Option<&dyn NarrativeGenerator>,
    timeout: Duration,
) -> AnalysisReport {
    let Some(generator) = generator else {
        report.narrative = NarrativeOutcome::Skipped;
        return report;
    };

    let digest = FindingsDigest::from_report(&report);
    debug!(generator = generator.name(), "Requesting narrative recommendations");

    report.narrative = match tokio::time::timeout(timeout, generator.suggest(&digest)).await {
        Ok(Ok(suggestions)) => {
            let items = suggestions.len();
            let start = report.recommendations.len();
            report
                .recommendations
                .extend(suggestions.into_iter().enumerate().map(|(i, s)| {
                    RecommendationItem {
                        id: recommendation_id(start + i),
                        category: RecommendationCategory::Narrative,
                        title: s.title,
                        description: s.description,
                        priority: s.priority,
                        impact: Impact::Maintainability,
                        estimated_savings: EstimatedSavings::default(),
                    }
                }));
            NarrativeOutcome::Applied { items }
        }
        Ok(Err(e)) => {
            warn!(generator = generator.name(), "Narrative generation failed: {e}");
            NarrativeOutcome::Failed {
                reason: e.to_string(),
            }
        }
        Err(_) => {
            warn!(
                generator = generator.name(),
                "Narrative generation timed out after {:?}", timeout
            );
            NarrativeOutcome::TimedOut {
                after_secs: timeout.as_secs(),
            }
        }
    };
    report
}
