//! `lectern ledger`: inspect the persisted recommendation ledger.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::cli::output::TableFormatter;
use crate::domain::models::{Category, Config, Recommendation};
use crate::infrastructure::checkpoint::CheckpointStore;
use crate::services::ledger::RecommendationLedger;

#[derive(Args, Debug)]
pub struct LedgerArgs {
    #[command(subcommand)]
    pub command: LedgerCommand,
}

#[derive(Subcommand, Debug)]
pub enum LedgerCommand {
    /// List ledger entries
    Show {
        /// Filter by category (critical, important, nice-to-have)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Summarize entry counts by category and source book
    Stats,
}

pub async fn execute(args: LedgerArgs, config: Config, json_mode: bool) -> Result<()> {
    let store = CheckpointStore::new(&config.state_dir);
    let path = store.ledger_path();
    if !path.exists() {
        if json_mode {
            println!("{}", serde_json::json!({ "entries": 0 }));
        } else {
            println!("No ledger found at {} (run `lectern run` first)", path.display());
        }
        return Ok(());
    }

    let ledger = RecommendationLedger::load(&path, config.similarity, config.escalation)?;

    match args.command {
        LedgerCommand::Show { category } => show(&ledger, category.as_deref(), json_mode),
        LedgerCommand::Stats => stats(&ledger, json_mode),
    }
}

fn show(ledger: &RecommendationLedger, category: Option<&str>, json_mode: bool) -> Result<()> {
    let filter = match category {
        Some(label) => match Category::parse_label(label) {
            Some(category) => Some(category),
            None => anyhow::bail!("unknown category '{label}'"),
        },
        None => None,
    };

    let entries: Vec<&Recommendation> = ledger
        .iter()
        .filter(|rec| filter.map_or(true, |c| rec.category == c))
        .collect();

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        println!("No matching entries.");
    } else {
        println!("{}", TableFormatter::new().format_recommendations(&entries));
    }
    Ok(())
}

fn stats(ledger: &RecommendationLedger, json_mode: bool) -> Result<()> {
    let by_category: Vec<(Category, usize)> =
        [Category::Critical, Category::Important, Category::NiceToHave]
            .into_iter()
            .map(|c| (c, ledger.ids_in_category(c).count()))
            .collect();

    if json_mode {
        let categories: serde_json::Map<String, serde_json::Value> = by_category
            .iter()
            .map(|(c, n)| (c.label().to_string(), (*n).into()))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "entries": ledger.len(),
                "by_category": categories,
            }))?
        );
    } else {
        println!("Entries: {}", ledger.len());
        for (category, count) in by_category {
            println!("  {:>12}: {count}", category.label());
        }
    }
    Ok(())
}
