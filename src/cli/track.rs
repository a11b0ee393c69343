//! CLI `track` command: run the sampler against a replay source until it ends
//! or Ctrl-C is pressed.

use anyhow::{Context, Result};
use std::time::Duration;

use trailkeep::config::TrailkeepConfig;
use trailkeep::history::RetentionStore;
use trailkeep::sampler::{LineSource, PositionSource, Sampler};

pub async fn track(
    config: &TrailkeepConfig,
    store: &RetentionStore,
    replay: &str,
    interval_secs: Option<u64>,
) -> Result<()> {
    let mut source: Box<dyn PositionSource> = if replay == "-" {
        Box::new(LineSource::stdin())
    } else {
        Box::new(
            LineSource::open(replay)
                .await
                .with_context(|| format!("failed to open replay file: {replay}"))?,
        )
    };

    let interval = Duration::from_secs(interval_secs.unwrap_or(config.sampler.interval_secs).max(1));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    let report = Sampler::new(store, interval)
        .run(source.as_mut(), shutdown)
        .await;

    println!(
        "Ticks: {}  appended: {}  merged: {}  no fix: {}  failed: {}",
        report.ticks, report.appended, report.merged, report.no_fix, report.failed
    );
    Ok(())
}
