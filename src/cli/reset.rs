//! CLI `reset` command: delete all stored locations after confirmation.

use anyhow::{bail, Result};
use std::io::Write;

use trailkeep::history::RetentionStore;

pub async fn reset(store: &RetentionStore, yes: bool) -> Result<()> {
    if !yes {
        println!("WARNING: This will permanently delete ALL stored locations.");
        println!("Collection: {}", store.settings().path);
        print!("\nType YES to confirm: ");
        std::io::stdout().flush()?;

        let mut input = String::new();
        std::io::stdin().read_line(&mut input)?;

        if input.trim() != "YES" {
            bail!("reset cancelled");
        }
    }

    store.delete_all().await?;
    println!("All locations deleted.");
    Ok(())
}
