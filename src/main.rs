//! nsgaudit - Network Security Group rule analyzer
//!
//! Command-line front end for the analysis engine.
//!
//! # Usage
//!
//! ```bash
//! nsgaudit analyze nsg-export.json             # Text summary
//! nsgaudit analyze nsg-export.json -f json     # Full report as JSON
//! nsgaudit batch web.json db.json -j 4         # Several exports at once
//! nsgaudit limits                              # Effective configuration
//! nsgaudit --config ./nsgaudit.json limits     # Explicit config file
//! ```
//!
//! Logs go to stderr; `-v` enables info and `-vv` debug output.

use clap::{Parser, Subcommand, ValueEnum};
use nsgaudit::config::{self, AnalyzerConfig};
use nsgaudit::core::report::AnalysisReport;
use nsgaudit::utils::truncate_string;
use nsgaudit::{Analyzer, JsonFileSource, RuleSource, analyze_batch};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[derive(Parser)]
#[command(name = "nsgaudit")]
#[command(about = "Analyze network security group rules for limits, risk and consolidation", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze one rule export
    Analyze {
        /// Path to the JSON rule export
        file: PathBuf,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Run the analysis passes in parallel
        #[arg(long)]
        parallel: bool,
    },
    /// Analyze several rule exports concurrently
    Batch {
        /// Paths to the JSON rule exports
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Maximum analyses in flight
        #[arg(short = 'j', long, default_value_t = 4)]
        jobs: usize,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Print the effective limits and risk tables
    Limits,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(handle_cli(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

async fn resolve_config(path: Option<PathBuf>) -> nsgaudit::Result<AnalyzerConfig> {
    match path {
        Some(path) => config::load_config_from(&path).await,
        None => Ok(config::load_config().await),
    }
}

async fn handle_cli(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let config = resolve_config(cli.config).await?;

    match cli.command {
        Commands::Analyze {
            file,
            format,
            parallel,
        } => {
            let loaded = JsonFileSource::new(file).load()?;
            let analyzer = Analyzer::new(config);
            let report = if parallel {
                let mut report = analyzer.analyze_parallel(&loaded.rules);
                report.prepend_diagnostics(loaded.diagnostics);
                report
            } else {
                analyzer.analyze_loaded(&loaded)
            };
            print_report(&report, format)?;
            Ok(exit_code(&report))
        }
        Commands::Batch {
            files,
            jobs,
            format,
        } => {
            let mut rule_sets = Vec::with_capacity(files.len());
            let mut source_diagnostics = Vec::with_capacity(files.len());
            for file in &files {
                let loaded = JsonFileSource::new(file).load()?;
                rule_sets.push(loaded.rules);
                source_diagnostics.push(loaded.diagnostics);
            }

            let analyzer = Analyzer::new(config);
            let mut reports = analyze_batch(&analyzer, rule_sets, jobs).await?;
            for (report, diagnostics) in reports.iter_mut().zip(source_diagnostics) {
                report.prepend_diagnostics(diagnostics);
            }

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
                OutputFormat::Text => {
                    for (file, report) in files.iter().zip(&reports) {
                        println!(
                            "{:<40} {:>5} rules  {:<14} risk {:>3}  {} recommendation(s)",
                            truncate_string(&file.display().to_string(), 40),
                            report.total_rules,
                            report.compliance_status.as_ref(),
                            report.risk_score,
                            report.recommendations.len()
                        );
                    }
                }
            }

            if reports.iter().all(|r| r.is_within_limits) {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(2))
            }
        }
        Commands::Limits => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Non-compliant rule sets exit with status 2 so scripts can gate on it.
fn exit_code(report: &AnalysisReport) -> ExitCode {
    if report.is_within_limits {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn print_report(report: &AnalysisReport, format: OutputFormat) -> serde_json::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Text => print_summary(report),
    }
    Ok(())
}

fn print_summary(report: &AnalysisReport) {
    let summary = &report.executive_summary;
    println!(
        "Rules: {} ({} inbound, {} outbound)",
        report.total_rules, report.inbound_rules, report.outbound_rules
    );
    println!(
        "Compliance: {}  Risk: {} ({}/100)",
        report.compliance_status, summary.risk_level, report.risk_score
    );
    println!("{}", summary.description);
    println!();

    for bucket in &report.buckets {
        println!(
            "  {:<22} {:>5} IPs  {:>4} ASGs  ({}/{})",
            bucket.bucket.as_ref(),
            bucket.ip_count,
            bucket.asg_count,
            bucket.combined_count,
            report.max_addresses_per_bucket
        );
    }

    if !report.violations.is_empty() {
        println!();
        println!("Violations:");
        for violation in &report.violations {
            println!("  [{}] {}", violation.severity, violation.message);
        }
    }

    if !report.diagnostics.is_empty() {
        println!();
        println!("Skipped entries: {}", report.diagnostics.len());
        for diagnostic in &report.diagnostics {
            println!(
                "  {} {} '{}': {}",
                diagnostic.rule_name, diagnostic.field, diagnostic.token, diagnostic.message
            );
        }
    }

    println!();
    println!("Recommendations:");
    for rec in &report.recommendations {
        println!("  {} [{}] {}", rec.id, rec.priority, rec.title);
        println!("      {}", rec.description);
    }
}
