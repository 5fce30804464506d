//! Plantprep: YOLO dataset preparation for plant disease detection.
//!
//! Plantprep turns raw CSV bounding-box annotations into class-balanced,
//! YOLO-layout datasets ready for detector training. Three pipelines
//! share one template and differ only in how they label and filter
//! records: binary (healthy vs diseased), species, and disease.
//!
//! # Modules
//!
//! - [`record`]: annotation model shared by all stages
//! - [`loader`]: CSV reading and class-label normalization
//! - [`features`]: species/disease derivation from class labels
//! - [`integrity`]: filesystem validation and dimension repair
//! - [`balance`]: class balancing via controlled duplication
//! - [`export`]: YOLO image/label/manifest materialization
//! - [`pipeline`]: the three pipeline variants and their shared driver
//! - [`error`]: error types for plantprep operations

pub mod balance;
pub mod config;
pub mod error;
pub mod export;
pub mod features;
pub mod integrity;
pub mod loader;
pub mod pipeline;
pub mod record;

use std::io;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use balance::{BalanceDecision, DecisionSource, FixedDecision, InteractivePrompt};
use pipeline::{PipelineKind, PipelineReport};

pub use error::PlantPrepError;

/// The plantprep CLI application.
#[derive(Parser)]
#[command(name = "plantprep")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run one pipeline, or all three, end to end.
    Run(RunArgs),
}

/// Arguments for the run subcommand.
#[derive(clap::Args)]
struct RunArgs {
    /// Pipeline configuration file.
    #[arg(long, env = "PLANTPREP_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Pipeline to run ('binary', 'species', 'disease', or 'all').
    #[arg(long, default_value = "all")]
    pipeline: String,

    /// Balance the training split to this many samples per class
    /// instead of prompting.
    #[arg(long, conflicts_with = "no_balance")]
    balance_target: Option<usize>,

    /// Keep the natural class distribution instead of prompting.
    #[arg(long)]
    no_balance: bool,

    /// Accept balance targets above the recommended cap.
    #[arg(long)]
    yes: bool,

    /// Output format for the run report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Run the plantprep CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), PlantPrepError> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Run(args)) => run_pipelines(args),
        None => {
            println!("plantprep {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("YOLO dataset preparation for plant disease detection.");
            println!();
            println!("Run 'plantprep --help' for usage information.");
            Ok(())
        }
    }
}

/// Execute the run subcommand.
fn run_pipelines(args: RunArgs) -> Result<(), PlantPrepError> {
    if args.balance_target == Some(0) {
        return Err(PlantPrepError::InvalidBalanceTarget {
            target: 0,
            reason: "target must be at least 1".to_string(),
        });
    }

    let config = config::PipelineConfig::load(&args.config)?;

    let kinds: Vec<PipelineKind> = if args.pipeline == "all" {
        PipelineKind::ALL.to_vec()
    } else {
        vec![args.pipeline.parse()?]
    };

    let quiet = args.output == "json";
    let mut reports: Vec<PipelineReport> = Vec::with_capacity(kinds.len());

    for kind in kinds {
        let policy = kind.policy();
        let mut decisions = decision_source(&args);
        let report = pipeline::run_pipeline(&config, policy.as_ref(), decisions.as_mut(), quiet)?;
        reports.push(report);
    }

    match args.output.as_str() {
        "json" => {
            let json = serde_json::to_string_pretty(&reports)
                .map_err(|e| PlantPrepError::Io(io::Error::other(e)))?;
            println!("{json}");
        }
        _ => {
            println!();
            for report in &reports {
                println!(
                    "{}: {} train / {} eval image(s) exported, {} class(es), manifest {}",
                    report.pipeline,
                    report.train_export.exported,
                    report.eval_export.exported,
                    report.class_count,
                    report.manifest_path
                );
            }
        }
    }

    Ok(())
}

/// Picks the balancing decision source for one pipeline run: CLI flags
/// when given, the interactive stdin prompt otherwise.
fn decision_source(args: &RunArgs) -> Box<dyn DecisionSource> {
    if args.no_balance {
        Box::new(FixedDecision {
            decision: BalanceDecision::KeepNatural,
            accept_over_cap: args.yes,
        })
    } else if let Some(target) = args.balance_target {
        Box::new(FixedDecision {
            decision: BalanceDecision::Balance { target },
            accept_over_cap: args.yes,
        })
    } else {
        Box::new(InteractivePrompt::new(
            io::BufReader::new(io::stdin()),
            io::stdout(),
        ))
    }
}
