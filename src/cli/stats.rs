use anyhow::Result;

use super::format_millis;
use trailkeep::config::TrailkeepConfig;
use trailkeep::history::RetentionStore;

/// Display history statistics in the terminal.
pub async fn stats(config: &TrailkeepConfig, store: &RetentionStore) -> Result<()> {
    let stats = store.stats().await?;

    println!("Location History");
    println!("{}", "=".repeat(40));
    println!("  Backend:             {}", config.remote.backend);
    println!("  Collection:          {}", store.settings().path);
    println!("  Records:             {} / {}", stats.records, stats.capacity);
    println!(
        "  Merge threshold:     {:.1} m",
        store.settings().merge_threshold_meters
    );

    if let Some(oldest) = stats.oldest {
        println!("  Oldest:              {}", format_millis(oldest));
    }
    if let Some(newest) = stats.newest {
        println!("  Newest:              {}", format_millis(newest));
    }

    Ok(())
}
