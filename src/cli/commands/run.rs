//! `lectern run`: execute the analysis pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::Args;
use tracing::info;

use crate::cli::output::TableFormatter;
use crate::domain::errors::PipelineError;
use crate::domain::models::Config;
use crate::domain::ports::Analyst;
use crate::infrastructure::analyst::HttpAnalyst;
use crate::services::orchestrator::{RunOrchestrator, RunOutcome, RunReport};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Analyze only this book from the reading list
    #[arg(long)]
    pub book: Option<String>,

    /// Resume from the last checkpoint instead of starting fresh
    #[arg(long)]
    pub resume: bool,

    /// Print the worst-case cost estimate and exit without spending
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn execute(args: RunArgs, mut config: Config, json_mode: bool) -> Result<()> {
    if let Some(book) = &args.book {
        if !config.books.iter().any(|b| b == book) {
            bail!("book '{book}' is not in the configured reading list");
        }
        config.books.retain(|b| b == book);
    }

    let analyst: Arc<dyn Analyst> = Arc::new(
        HttpAnalyst::new(&config.analyst)
            .map_err(|e| PipelineError::Config(format!("analyst setup failed: {e}")))?,
    );
    let shutdown = Arc::new(AtomicBool::new(false));
    let orchestrator = RunOrchestrator::new(config, analyst, Arc::clone(&shutdown));

    if args.dry_run {
        let estimate = orchestrator.estimate_cost();
        if json_mode {
            println!("{}", serde_json::json!({ "estimated_cost": estimate }));
        } else {
            println!("Worst-case cost estimate: ${estimate:.2}");
        }
        return Ok(());
    }

    // First Ctrl-C requests a graceful stop between iterations; a second one
    // lets tokio's default handler kill the process.
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown requested, finishing current iteration");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let report = orchestrator.run(args.resume).await?;
    print_report(&report, json_mode)?;

    match report.outcome {
        RunOutcome::BudgetExhausted {
            book,
            spent,
            ceiling,
        } => Err(PipelineError::BudgetExhausted {
            book,
            spent,
            ceiling,
        }
        .into()),
        _ => Ok(()),
    }
}

fn print_report(report: &RunReport, json_mode: bool) -> Result<()> {
    if json_mode {
        let books: Vec<_> = report
            .books
            .iter()
            .map(|b| {
                serde_json::json!({
                    "book": b.book,
                    "outcome": format!("{:?}", b.outcome).to_lowercase(),
                    "iterations": b.iterations,
                    "new": b.new,
                    "duplicate": b.duplicate,
                    "improved": b.improved,
                    "suppressed": b.suppressed,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "books": books,
                "total_spent": report.total_spent,
                "ledger_entries": report.ledger_entries,
                "ledger_path": report.ledger_path,
            }))?
        );
        return Ok(());
    }

    if !report.books.is_empty() {
        println!("{}", TableFormatter::new().format_book_reports(&report.books));
    }
    println!(
        "Total spent: ${:.2}  Ledger entries: {}  ({})",
        report.total_spent,
        report.ledger_entries,
        report.ledger_path.display()
    );
    match &report.outcome {
        RunOutcome::Completed => {}
        RunOutcome::Interrupted => {
            println!(
                "Run interrupted; resume with `lectern run --resume` ({})",
                report.checkpoint_path.display()
            );
        }
        RunOutcome::BudgetExhausted { book, spent, ceiling } => {
            println!(
                "Budget exhausted while processing '{book}': spent ${spent:.2} of ${ceiling:.2} ceiling"
            );
            println!(
                "Resume with `lectern run --resume` ({})",
                report.checkpoint_path.display()
            );
        }
    }
    Ok(())
}
