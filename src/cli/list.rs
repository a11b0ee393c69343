use anyhow::Result;

use super::format_millis;
use trailkeep::history::route;
use trailkeep::history::RetentionStore;

/// Print stored locations, newest first.
pub async fn list(store: &RetentionStore, limit: Option<usize>, json: bool) -> Result<()> {
    let records = route::newest_first(store.load_all().await?);
    let shown: Vec<_> = records
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No locations stored.");
        return Ok(());
    }

    for record in &shown {
        println!(
            "Lat: {:.6}, Lon: {:.6}  {}",
            record.latitude,
            record.longitude,
            format_millis(record.captured_at)
        );
    }
    Ok(())
}
