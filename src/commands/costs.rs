use anyhow::Result;
use colored::Colorize;
use perplexity_assistant::config;
use perplexity_assistant::cost::{CostTracker, CounterKind};
use perplexity_assistant::host::memory::JsonStateStore;
use std::path::Path;
use std::sync::Arc;

/// Execute the costs command
pub async fn execute(config_path: &Path, state_file: &Path) -> Result<()> {
    let cfg = config::load_config(config_path)?;
    let store = Arc::new(JsonStateStore::open(state_file));
    let tracker = CostTracker::restore(store, &cfg.host.entry_id).await;
    let snapshot = tracker.snapshot();

    println!("{}", "Perplexity Bill:".green().bold());
    println!(
        "  {}: ${:.4} (since {})",
        CounterKind::Monthly.name().cyan(),
        snapshot.monthly,
        snapshot.monthly_since
    );
    println!("  {}: ${:.4}", CounterKind::AllTime.name().cyan(), snapshot.all_time);

    Ok(())
}
