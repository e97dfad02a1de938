//! Command line argument parsing for the Augur CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Augur - closed-loop intent classification
#[derive(Parser, Debug, Clone)]
#[command(name = "augur")]
#[command(about = "Train, serve and retrain an intent classifier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct AugurArgs {
    /// Configuration file (JSON); built-in defaults when absent
    #[arg(short, long, env = "AUGUR_CONFIG", value_name = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl AugurArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train from the corpus and publish fresh artifacts
    Train,

    /// Predict the intent of one or more queries
    Predict(PredictArgs),

    /// Evaluate the model and write the evaluation report
    Evaluate(EvaluateArgs),

    /// Run one retraining pass
    Retrain(RetrainArgs),

    /// Harvest, augment, retrain and verify in one go
    Pipeline,

    /// Show the retraining history summary
    Status,

    /// Route a query and store it when it falls below the threshold
    Record(RecordArgs),
}

/// Arguments for prediction
#[derive(Parser, Debug, Clone)]
pub struct PredictArgs {
    /// Queries to classify
    #[arg(value_name = "QUERY", required = true)]
    pub queries: Vec<String>,

    /// Include the cleaned query and every intent's score
    #[arg(long)]
    pub details: bool,

    /// Override the configured confidence threshold
    #[arg(short, long)]
    pub threshold: Option<f64>,
}

/// Arguments for evaluation
#[derive(Parser, Debug, Clone)]
pub struct EvaluateArgs {
    /// Train on a split and score the held-out fraction instead of the
    /// persisted model on the full corpus
    #[arg(long, value_name = "RATIO")]
    pub holdout: Option<f64>,

    /// Shuffle seed for the hold-out split
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Report path; defaults to the configured evaluation report path
    #[arg(short, long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

/// Arguments for retraining
#[derive(Parser, Debug, Clone)]
pub struct RetrainArgs {
    /// Retrain on the corpus as it is, without harvesting records
    #[arg(long)]
    pub no_augment: bool,
}

/// Arguments for recording a query
#[derive(Parser, Debug, Clone)]
pub struct RecordArgs {
    /// Query to route
    #[arg(value_name = "QUERY")]
    pub query: String,
}

/// Output format options
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
