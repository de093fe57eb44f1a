//! `lectern scan`: preview the knowledge snapshot used for suppression.

use anyhow::Result;
use clap::Args;

use crate::domain::models::Config;
use crate::services::knowledge_scanner::KnowledgeScanner;

#[derive(Args, Debug)]
pub struct ScanArgs {
    /// Maximum number of feature names to print
    #[arg(long, default_value = "50")]
    pub limit: usize,
}

pub async fn execute(args: ScanArgs, config: Config, json_mode: bool) -> Result<()> {
    let snapshot = KnowledgeScanner::new().scan(&config.codebase_roots);

    if json_mode {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("{}", snapshot.digest(args.limit));
    if snapshot.is_empty() {
        println!("Snapshot is empty: nothing will be suppressed during runs.");
    } else {
        println!(
            "{} modules, {} features across {} roots",
            snapshot.modules.len(),
            snapshot.features.len(),
            snapshot.source_roots.len()
        );
    }
    Ok(())
}
