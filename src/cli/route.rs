use anyhow::Result;

use super::format_millis;
use trailkeep::history::route;
use trailkeep::history::RetentionStore;

/// Print the trail in chronological order with its summary.
pub async fn route(store: &RetentionStore, json: bool) -> Result<()> {
    let records = route::chronological(store.load_all().await?);
    let summary = route::summarize(&records);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Route");
    println!("{}", "=".repeat(40));
    println!("  Points:        {}", summary.points);
    if let Some(start) = summary.start {
        println!("  Start:         {}", format_millis(start));
    }
    if let Some(end) = summary.end {
        println!("  End:           {}", format_millis(end));
    }
    println!("  Length:        {:.1} m", summary.length_m);

    if !records.is_empty() {
        println!();
        for (i, record) in records.iter().enumerate() {
            println!(
                "  {:>4}. Lat: {:.6}, Lon: {:.6}  {}",
                i + 1,
                record.latitude,
                record.longitude,
                format_millis(record.captured_at)
            );
        }
    }
    Ok(())
}
