//! Command-line interface.

pub mod commands;
pub mod output;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::domain::errors::PipelineError;
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Parser)]
#[command(name = "lectern")]
#[command(about = "Lectern - recursive book analysis with cross-book deduplication", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .lectern/config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the analysis pipeline over the configured reading list
    Run(commands::run::RunArgs),

    /// Inspect the recommendation ledger
    Ledger(commands::ledger::LedgerArgs),

    /// Scan the target codebases and print the knowledge snapshot
    Scan(commands::scan::ScanArgs),
}

/// Load configuration, honoring an explicit `--config` path.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Report an error and exit with its mapped code.
///
/// Budget exhaustion exits 2 so schedulers can distinguish "ran out of
/// budget, resume later" from real failures; everything else exits 1.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    let code = exit_code(&err);
    if json {
        eprintln!("{}", serde_json::json!({ "error": format!("{err:#}") }));
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(code)
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<PipelineError>() {
        Some(PipelineError::BudgetExhausted { .. }) => 2,
        _ => 1,
    }
}
