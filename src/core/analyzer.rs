//! Analysis entry points
//!
//! An [`Analyzer`] is a stateless value holding its configuration. Every
//! call extracts addresses from the rule slice once and runs the analysis
//! passes over that shared snapshot; the passes never mutate it, so they can
//! run sequentially or fan out on rayon with identical results.

use crate::config::{AnalyzerConfig, Limits};
use crate::core::consolidation::plan_consolidation;
use crate::core::counting::count_addresses;
use crate::core::error::{Error, Result};
use crate::core::extract::{RuleAddresses, extract_all};
use crate::core::findings::Diagnostic;
use crate::core::narrative::{NarrativeGenerator, enrich_with_narrative};
use crate::core::overlap::detect_overlaps;
use crate::core::redundancy::find_redundant_rules;
use crate::core::report::{AnalysisReport, PassOutputs, assemble};
use crate::core::risk::assess_rules;
use crate::core::rule::Rule;
use crate::core::service_tags::analyze_service_tags;
use crate::core::source::LoadedRules;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Default configuration with custom provider limits.
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            config: AnalyzerConfig {
                limits,
                ..AnalyzerConfig::default()
            },
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Runs every pass on the calling thread.
    pub fn analyze(&self, rules: &[Rule]) -> AnalysisReport {
        let extracted = extract_all(rules);
        let outputs = PassOutputs {
            counting: count_addresses(&extracted, &self.config.limits),
            overlaps: detect_overlaps(&extracted),
            redundant_rules: find_redundant_rules(rules),
            risk_findings: assess_rules(rules, &self.config.vulnerable_ports),
            consolidation: plan_consolidation(rules),
            service_tags: analyze_service_tags(
                &extracted,
                &self.config.tag_overlaps,
                &self.config.service_prefixes,
            ),
        };
        self.finish(rules, &extracted, outputs)
    }

    /// Same result as [`Analyzer::analyze`], with the passes joined on the
    /// rayon pool.
    pub fn analyze_parallel(&self, rules: &[Rule]) -> AnalysisReport {
        let extracted = extract_all(rules);
        let config = &self.config;
        let shared = extracted.as_slice();

        let ((counting, overlaps), ((redundant_rules, risk_findings), (consolidation, service_tags))) =
            rayon::join(
                || {
                    rayon::join(
                        || count_addresses(shared, &config.limits),
                        || detect_overlaps(shared),
                    )
                },
                || {
                    rayon::join(
                        || {
                            rayon::join(
                                || find_redundant_rules(rules),
                                || assess_rules(rules, &config.vulnerable_ports),
                            )
                        },
                        || {
                            rayon::join(
                                || plan_consolidation(rules),
                                || {
                                    analyze_service_tags(
                                        shared,
                                        &config.tag_overlaps,
                                        &config.service_prefixes,
                                    )
                                },
                            )
                        },
                    )
                },
            );

        let outputs = PassOutputs {
            counting,
            overlaps,
            redundant_rules,
            risk_findings,
            consolidation,
            service_tags,
        };
        self.finish(rules, &extracted, outputs)
    }

    /// Analyzes a loaded snapshot, keeping the source's diagnostics ahead
    /// of the extraction diagnostics.
    pub fn analyze_loaded(&self, loaded: &LoadedRules) -> AnalysisReport {
        let mut report = self.analyze(&loaded.rules);
        report.prepend_diagnostics(loaded.diagnostics.clone());
        report
    }

    /// Runs the optional narrative step under the configured timeout.
    pub async fn enrich(
        &self,
        report: AnalysisReport,
        generator: Option<&dyn NarrativeGenerator>,
    ) -> AnalysisReport {
        let timeout = Duration::from_secs(self.config.narrative_timeout_secs);
        enrich_with_narrative(report, generator, timeout).await
    }

    fn finish(
        &self,
        rules: &[Rule],
        extracted: &[RuleAddresses<'_>],
        outputs: PassOutputs,
    ) -> AnalysisReport {
        let diagnostics: Vec<Diagnostic> = extracted
            .iter()
            .flat_map(|e| e.diagnostics.iter().cloned())
            .collect();
        let report = assemble(rules, &self.config.limits, diagnostics, outputs);
        info!(
            rules = report.total_rules,
            violations = report.violations.len(),
            risk_score = report.risk_score,
            recommendations = report.recommendations.len(),
            "Analysis complete: {}",
            report.compliance_status
        );
        report
    }
}

/// Analyzes a rule slice with default settings and the given limits.
pub fn analyze(rules: &[Rule], limits: Limits) -> AnalysisReport {
    Analyzer::with_limits(limits).analyze(rules)
}

/// Analyzes several independent rule sets with at most `max_concurrency`
/// analyses in flight. Reports come back in input order.
///
/// # Errors
///
/// Returns `Error::Internal` if a blocking analysis task panicked or was
/// cancelled.
pub async fn analyze_batch(
    analyzer: &Analyzer,
    rule_sets: Vec<Vec<Rule>>,
    max_concurrency: usize,
) -> Result<Vec<AnalysisReport>> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let analyzer = Arc::new(analyzer.clone());
    let mut handles = Vec::with_capacity(rule_sets.len());

    for rules in rule_sets {
        let permit = Arc::clone(&semaphore)
            .acquire_owned()
            .await
            .map_err(|e| Error::Internal(format!("Batch semaphore closed: {e}")))?;
        let analyzer = Arc::clone(&analyzer);
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            analyzer.analyze(&rules)
        }));
    }

    let mut reports = Vec::with_capacity(handles.len());
    for handle in handles {
        let report = handle
            .await
            .map_err(|e| Error::Internal(format!("Analysis task failed: {e}")))?;
        reports.push(report);
    }
    Ok(reports)
}
