//! Producer loop: pull a fix from a [`PositionSource`] on a fixed cadence and
//! hand it to [`RetentionStore::save`].
//!
//! Each save is awaited before the next tick is serviced, so at most one save
//! is ever in flight. Ticks missed while a slow save was running are skipped
//! rather than replayed in a burst.

use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::time::MissedTickBehavior;

use crate::history::{PositionFix, RetentionStore, SaveOutcome};

/// What a source produced for one tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    Fix(PositionFix),
    /// No position available this tick; nothing is saved.
    NoFix,
    /// The source is exhausted and the loop should stop.
    Finished,
}

#[async_trait]
pub trait PositionSource: Send {
    async fn next_fix(&mut self) -> Tick;
}

/// Replays fixes from JSON lines: `{"latitude":..,"longitude":..}` with an
/// optional `"timestamp"` in epoch milliseconds. `null` or a blank line means
/// no fix for that tick.
pub struct LineSource<R> {
    lines: Lines<R>,
    line_no: usize,
}

#[derive(Debug, Deserialize)]
struct ReplayFix {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    timestamp: Option<i64>,
}

impl<R: AsyncBufRead + Unpin + Send> LineSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl LineSource<BufReader<tokio::fs::File>> {
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl LineSource<BufReader<tokio::io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

/// Interpret one replay line. Unparseable or out-of-range input is a missed fix.
pub fn parse_line(line: &str) -> Result<Option<PositionFix>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let parsed: Option<ReplayFix> = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let Some(fix) = parsed else {
        return Ok(None);
    };

    if !(fix.latitude.is_finite() && (-90.0..=90.0).contains(&fix.latitude)) {
        return Err(format!("latitude out of range: {}", fix.latitude));
    }
    if !(fix.longitude.is_finite() && (-180.0..=180.0).contains(&fix.longitude)) {
        return Err(format!("longitude out of range: {}", fix.longitude));
    }

    Ok(Some(match fix.timestamp {
        Some(ts) => PositionFix::new(fix.latitude, fix.longitude, ts),
        None => PositionFix::now(fix.latitude, fix.longitude),
    }))
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> PositionSource for LineSource<R> {
    async fn next_fix(&mut self) -> Tick {
        let line = match self.lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => return Tick::Finished,
            Err(e) => {
                tracing::error!(error = %e, "replay source read failed");
                return Tick::Finished;
            }
        };
        self.line_no += 1;

        match parse_line(&line) {
            Ok(Some(fix)) => Tick::Fix(fix),
            Ok(None) => Tick::NoFix,
            Err(reason) => {
                tracing::warn!(line = self.line_no, %reason, "skipping invalid replay line");
                Tick::NoFix
            }
        }
    }
}

/// Counters for one sampler run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SamplerReport {
    pub ticks: usize,
    pub appended: usize,
    pub merged: usize,
    pub no_fix: usize,
    pub failed: usize,
}

pub struct Sampler<'a> {
    store: &'a RetentionStore,
    interval: Duration,
}

impl<'a> Sampler<'a> {
    pub fn new(store: &'a RetentionStore, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run until the source finishes or `shutdown` resolves. A failed save is
    /// logged and the next tick tries again.
    pub async fn run<S, F>(&self, source: &mut S, shutdown: F) -> SamplerReport
    where
        S: PositionSource + ?Sized,
        F: Future<Output = ()>,
    {
        let mut report = SamplerReport::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(interval_ms = self.interval.as_millis() as u64, "sampler started");

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested, stopping sampler");
                    break;
                }
                _ = ticker.tick() => {}
            }
            report.ticks += 1;

            let fix = match source.next_fix().await {
                Tick::Fix(fix) => fix,
                Tick::NoFix => {
                    report.no_fix += 1;
                    tracing::debug!("no position fix this tick");
                    continue;
                }
                Tick::Finished => {
                    tracing::info!("position source finished");
                    break;
                }
            };

            match self.store.save(fix).await {
                Ok(SaveOutcome::Appended { .. }) => {
                    report.appended += 1;
                    tracing::info!("Location encrypted and saved");
                }
                Ok(SaveOutcome::Merged { .. }) => {
                    report.merged += 1;
                    tracing::info!("Location encrypted and saved");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, "failed to save location");
                }
            }
        }

        tracing::info!(
            ticks = report.ticks,
            appended = report.appended,
            merged = report.merged,
            no_fix = report.no_fix,
            failed = report.failed,
            "sampler stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ObfuscationCodec;
    use crate::history::RetentionSettings;
    use crate::remote::memory::{MemoryStore, Operation};
    use std::collections::VecDeque;
    use std::sync::Arc;

    struct Scripted(VecDeque<Tick>);

    #[async_trait]
    impl PositionSource for Scripted {
        async fn next_fix(&mut self) -> Tick {
            self.0.pop_front().unwrap_or(Tick::Finished)
        }
    }

    struct Idle;

    #[async_trait]
    impl PositionSource for Idle {
        async fn next_fix(&mut self) -> Tick {
            Tick::NoFix
        }
    }

    fn store() -> (Arc<MemoryStore>, RetentionStore) {
        let memory = Arc::new(MemoryStore::new());
        let store = RetentionStore::new(
            memory.clone(),
            ObfuscationCodec::new("sampler-key").unwrap(),
            RetentionSettings::default(),
        );
        (memory, store)
    }

    #[test]
    fn parse_line_variants() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("  null ").unwrap(), None);

        let fix = parse_line(r#"{"latitude": 1.5, "longitude": -2.0, "timestamp": 9}"#)
            .unwrap()
            .unwrap();
        assert_eq!(fix, PositionFix::new(1.5, -2.0, 9));

        let stamped_now = parse_line(r#"{"latitude": 1.5, "longitude": -2.0}"#)
            .unwrap()
            .unwrap();
        assert!(stamped_now.sampled_at > 0);

        assert!(parse_line("{oops").is_err());
        assert!(parse_line(r#"{"latitude": 95.0, "longitude": 0.0}"#).is_err());
        assert!(parse_line(r#"{"latitude": 0.0, "longitude": 181.0}"#).is_err());
    }

    #[tokio::test]
    async fn line_source_reads_until_eof() {
        let input: &[u8] = b"{\"latitude\":1.0,\"longitude\":2.0,\"timestamp\":5}\nnull\nnot json\n";
        let mut source = LineSource::new(input);
        assert_eq!(source.next_fix().await, Tick::Fix(PositionFix::new(1.0, 2.0, 5)));
        assert_eq!(source.next_fix().await, Tick::NoFix);
        assert_eq!(source.next_fix().await, Tick::NoFix);
        assert_eq!(source.next_fix().await, Tick::Finished);
    }

    #[tokio::test]
    async fn run_saves_each_fix_in_order() {
        let (memory, store) = store();
        let mut source = Scripted(VecDeque::from([
            Tick::Fix(PositionFix::new(0.0, 0.0, 1)),
            Tick::NoFix,
            // ~5.5 m away: merged
            Tick::Fix(PositionFix::new(0.00005, 0.0, 2)),
            // ~111 m away: appended
            Tick::Fix(PositionFix::new(0.001, 0.0, 3)),
        ]));

        let report = Sampler::new(&store, Duration::from_millis(1))
            .run(&mut source, std::future::pending())
            .await;

        assert_eq!(report.ticks, 5);
        assert_eq!(report.appended, 2);
        assert_eq!(report.merged, 1);
        assert_eq!(report.no_fix, 1);
        assert_eq!(report.failed, 0);
        assert_eq!(memory.documents("locations").len(), 2);
    }

    #[tokio::test]
    async fn failed_save_does_not_stop_the_loop() {
        let (memory, store) = store();
        memory.fail_on(Operation::Write);
        let mut source = Scripted(VecDeque::from([
            Tick::Fix(PositionFix::new(0.0, 0.0, 1)),
            Tick::Fix(PositionFix::new(1.0, 0.0, 2)),
        ]));

        let report = Sampler::new(&store, Duration::from_millis(1))
            .run(&mut source, std::future::pending())
            .await;

        assert_eq!(report.failed, 2);
        assert!(memory.documents("locations").is_empty());
    }

    #[tokio::test]
    async fn shutdown_stops_an_endless_source() {
        let (_memory, store) = store();
        let report = Sampler::new(&store, Duration::from_millis(5))
            .run(&mut Idle, tokio::time::sleep(Duration::from_millis(60)))
            .await;
        assert!(report.ticks >= 1);
        assert_eq!(report.ticks, report.no_fix);
    }
}
