//! Write and read paths for the position history.
//!
//! [`RetentionStore::save`] is the single ingestion entry point. Every call
//! re-reads the latest stored record, then either merges the sample into it
//! (stationary entity) or evicts down to capacity and appends a new record.
//! No state is cached between calls.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::retention;
use super::types::{EncodedRecord, PositionFix, PositionRecord, SaveOutcome, ORDER_FIELD};
use crate::codec::ObfuscationCodec;
use crate::config::RetentionConfig;
use crate::error::TrackResult;
use crate::geo;
use crate::remote::RemoteStore;

/// Maximum number of stored position records.
pub const CAPACITY: usize = 1000;

/// Samples closer than this to the latest record only refresh its timestamp.
pub const MERGE_THRESHOLD_METERS: f64 = 10.0;

#[derive(Debug, Clone)]
pub struct RetentionSettings {
    pub path: String,
    pub capacity: usize,
    pub merge_threshold_meters: f64,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            path: "locations".into(),
            capacity: CAPACITY,
            merge_threshold_meters: MERGE_THRESHOLD_METERS,
        }
    }
}

impl From<&RetentionConfig> for RetentionSettings {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            path: config.locations_path.clone(),
            capacity: config.capacity,
            merge_threshold_meters: config.merge_threshold_meters,
        }
    }
}

/// Summary of what is currently stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryStats {
    pub records: usize,
    pub capacity: usize,
    pub oldest: Option<i64>,
    pub newest: Option<i64>,
}

pub struct RetentionStore {
    remote: Arc<dyn RemoteStore>,
    codec: ObfuscationCodec,
    settings: RetentionSettings,
    /// Serializes saves issued from this process; the read-then-write sequence
    /// is not atomic on the remote side.
    write_gate: Mutex<()>,
}

impl RetentionStore {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        codec: ObfuscationCodec,
        settings: RetentionSettings,
    ) -> Self {
        Self {
            remote,
            codec,
            settings,
            write_gate: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &RetentionSettings {
        &self.settings
    }

    /// Persist one sample: merge into the latest record or append a new one.
    ///
    /// Errors from the latest-record read and from the terminal write are
    /// returned; eviction errors are logged and do not block the append.
    pub async fn save(&self, fix: PositionFix) -> TrackResult<SaveOutcome> {
        let _gate = self.write_gate.lock().await;
        let path = self.settings.path.as_str();

        // 1. Latest record, if any decodes
        let latest = self.remote.ordered_last(path, ORDER_FIELD, 1).await?;
        let previous = latest.last().and_then(|doc| {
            let decoded = EncodedRecord::from_document(doc).and_then(|e| e.decode(&self.codec));
            if decoded.is_none() {
                tracing::debug!(id = %doc.key, "latest record did not decode, treating as absent");
            }
            decoded.map(|record| (doc.key.clone(), record))
        });

        // 2. Merge gate
        if let Some((key, previous)) = previous {
            let distance_m = geo::distance(fix.coordinate, previous.coordinate());
            if distance_m < self.settings.merge_threshold_meters {
                return self.merge(&key, previous, fix.sampled_at, distance_m).await;
            }
            tracing::debug!(distance_m, "moved beyond merge threshold, appending");
        }

        // 3. Make room
        let eviction = retention::make_room(&self.remote, path, self.settings.capacity).await;

        // 4. Append
        let id = self.remote.generate_id(path).await?;
        let record = PositionRecord::from_fix(id.clone(), &fix);
        let encoded = EncodedRecord::encode(&record, &self.codec)?;
        self.remote.write(path, &id, encoded.to_fields()).await?;

        tracing::info!(
            id = %id,
            evicted = eviction.removed,
            "location encrypted and appended"
        );
        Ok(SaveOutcome::Appended {
            id,
            evicted: eviction.removed,
        })
    }

    /// Overwrite the latest record at `key` with a newer timestamp.
    async fn merge(
        &self,
        key: &str,
        previous: PositionRecord,
        captured_at: i64,
        distance_m: f64,
    ) -> TrackResult<SaveOutcome> {
        let updated = PositionRecord {
            captured_at,
            ..previous
        };
        let mut encoded = EncodedRecord::encode(&updated, &self.codec)?;
        encoded.id = key.to_string();
        self.remote
            .write(&self.settings.path, key, encoded.to_fields())
            .await?;

        tracing::info!(id = %key, distance_m, "stationary sample merged into latest record");
        Ok(SaveOutcome::Merged {
            id: key.to_string(),
            distance_m,
        })
    }

    /// Every decodable record, ascending by capture time (ties in store
    /// insertion order). Records that fail to decode are dropped.
    pub async fn load_all(&self) -> TrackResult<Vec<PositionRecord>> {
        let docs = self
            .remote
            .ordered_all(&self.settings.path, ORDER_FIELD)
            .await?;
        let total = docs.len();

        let records: Vec<PositionRecord> = docs
            .iter()
            .filter_map(|doc| EncodedRecord::from_document(doc).and_then(|e| e.decode(&self.codec)))
            .collect();

        if records.len() < total {
            tracing::warn!(
                dropped = total - records.len(),
                total,
                "some stored records could not be decoded"
            );
        }
        Ok(records)
    }

    /// Remove every stored record.
    pub async fn delete_all(&self) -> TrackResult<()> {
        let _gate = self.write_gate.lock().await;
        self.remote.remove_all(&self.settings.path).await?;
        tracing::info!(path = %self.settings.path, "all locations deleted");
        Ok(())
    }

    pub async fn stats(&self) -> TrackResult<HistoryStats> {
        let path = self.settings.path.as_str();
        let records = self.remote.count(path).await?;
        let oldest = self.remote.ordered_first(path, ORDER_FIELD, 1).await?;
        let newest = self.remote.ordered_last(path, ORDER_FIELD, 1).await?;
        Ok(HistoryStats {
            records,
            capacity: self.settings.capacity,
            oldest: oldest.first().and_then(|d| d.int_field(ORDER_FIELD)),
            newest: newest.last().and_then(|d| d.int_field(ORDER_FIELD)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::memory::{MemoryStore, Operation};
    use serde_json::json;

    fn setup(capacity: usize) -> (Arc<MemoryStore>, RetentionStore) {
        let memory = Arc::new(MemoryStore::new());
        let store = RetentionStore::new(
            memory.clone(),
            ObfuscationCodec::new("unit-key").unwrap(),
            RetentionSettings {
                capacity,
                ..RetentionSettings::default()
            },
        );
        (memory, store)
    }

    #[tokio::test]
    async fn first_save_appends() {
        let (memory, store) = setup(CAPACITY);
        let outcome = store.save(PositionFix::new(1.0, 2.0, 100)).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Appended { evicted: 0, .. }));

        let docs = memory.documents("locations");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].key, outcome.id());
        assert_eq!(docs[0].fields["id"], json!(outcome.id()));
    }

    #[tokio::test]
    async fn merge_keeps_id_and_moves_timestamp() {
        let (memory, store) = setup(CAPACITY);
        let first = store.save(PositionFix::new(0.0, 0.0, 100)).await.unwrap();
        let second = store.save(PositionFix::new(0.0, 0.00005, 200)).await.unwrap();

        match &second {
            SaveOutcome::Merged { id, distance_m } => {
                assert_eq!(id, first.id());
                assert!(*distance_m < MERGE_THRESHOLD_METERS);
            }
            other => panic!("expected merge, got {other:?}"),
        }

        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].captured_at, 200);
        // coordinates of the original record are kept
        assert_eq!(all[0].longitude, 0.0);
        assert_eq!(memory.documents("locations")[0].fields["timestamp"], json!(200));
    }

    #[tokio::test]
    async fn undecodable_latest_is_treated_as_absent() {
        let (memory, store) = setup(CAPACITY);
        let junk = json!({"id": "junk", "encryptedData": [1, 2, 3], "timestamp": 50})
            .as_object()
            .cloned()
            .unwrap();
        memory.write("locations", "junk", junk).await.unwrap();

        let outcome = store.save(PositionFix::new(0.0, 0.0, 100)).await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Appended { .. }));
        assert_eq!(memory.documents("locations").len(), 2);
        // the junk record is invisible to readers
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_failure_fails_the_save() {
        let (memory, store) = setup(CAPACITY);
        memory.fail_on(Operation::Read);
        assert!(store.save(PositionFix::new(0.0, 0.0, 1)).await.is_err());
        assert_eq!(memory.write_count(), 0);
    }

    #[tokio::test]
    async fn write_failure_fails_the_save() {
        let (memory, store) = setup(CAPACITY);
        memory.fail_on(Operation::Write);
        assert!(store.save(PositionFix::new(0.0, 0.0, 1)).await.is_err());
    }

    #[tokio::test]
    async fn merge_write_failure_fails_the_save() {
        let (memory, store) = setup(CAPACITY);
        store.save(PositionFix::new(0.0, 0.0, 100)).await.unwrap();

        memory.fail_on(Operation::Write);
        let result = store.save(PositionFix::new(0.0, 0.00005, 200)).await;
        assert!(result.is_err());

        // the stored record is left as it was
        assert_eq!(memory.write_count(), 1);
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].captured_at, 100);
    }

    #[tokio::test]
    async fn eviction_failure_does_not_block_append() {
        let (memory, store) = setup(2);
        store.save(PositionFix::new(0.0, 0.0, 1)).await.unwrap();
        store.save(PositionFix::new(1.0, 0.0, 2)).await.unwrap();

        memory.fail_on(Operation::Delete);
        let outcome = store.save(PositionFix::new(2.0, 0.0, 3)).await.unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Appended {
                id: outcome.id().to_string(),
                evicted: 0
            }
        );
        assert_eq!(memory.documents("locations").len(), 3);
    }

    #[tokio::test]
    async fn stats_reports_range() {
        let (_memory, store) = setup(CAPACITY);
        assert_eq!(
            store.stats().await.unwrap(),
            HistoryStats {
                records: 0,
                capacity: CAPACITY,
                oldest: None,
                newest: None
            }
        );
        store.save(PositionFix::new(0.0, 0.0, 10)).await.unwrap();
        store.save(PositionFix::new(5.0, 0.0, 30)).await.unwrap();
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(stats.oldest, Some(10));
        assert_eq!(stats.newest, Some(30));
    }

    #[tokio::test]
    async fn overlapping_saves_are_serialized() {
        let (memory, store) = setup(CAPACITY);
        let store = Arc::new(store);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.save(PositionFix::new(0.0, 0.0, 100 + i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // All samples are at the same spot: one append, the rest merge.
        assert_eq!(memory.documents("locations").len(), 1);
    }
}
