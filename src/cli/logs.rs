//! CLI `logs` subcommands: local view and clear, remote upload, download and delete.

use anyhow::Result;

use trailkeep::logs::{LogCapture, LogSync};
use trailkeep::TrackError;

pub fn show(capture: &LogCapture) {
    print!("{}", capture.read_all());
}

pub fn clear(capture: &LogCapture) -> Result<()> {
    capture.clear()?;
    println!("Local log cleared: {}", capture.path().display());
    Ok(())
}

pub async fn upload(sync: &LogSync, capture: &LogCapture) -> Result<()> {
    match sync.upload(capture).await {
        Ok(outcome) => {
            println!("Uploaded log {} ({} bytes)", outcome.id, outcome.size);
            Ok(())
        }
        Err(TrackError::NothingToUpload) => {
            println!("Nothing to upload: the local log is empty.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn download(sync: &LogSync) -> Result<()> {
    match sync.download().await? {
        Some(text) => print!("{text}"),
        None => println!("No log found."),
    }
    Ok(())
}

pub async fn delete_remote(sync: &LogSync) -> Result<()> {
    sync.delete_remote().await?;
    println!("Remote logs deleted.");
    Ok(())
}
