#![allow(dead_code)]

use std::sync::Arc;

use rusqlite::Connection;
use trailkeep::codec::ObfuscationCodec;
use trailkeep::db;
use trailkeep::history::{EncodedRecord, PositionFix, PositionRecord, RetentionSettings, RetentionStore};
use trailkeep::remote::memory::MemoryStore;
use trailkeep::remote::sqlite::SqliteStore;
use trailkeep::remote::RemoteStore;

pub const TEST_KEY: &str = "integration-key";

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    db::schema::init_schema(&conn).unwrap();
    db::migrations::run_migrations(&conn).unwrap();
    conn
}

pub fn codec() -> ObfuscationCodec {
    ObfuscationCodec::new(TEST_KEY).unwrap()
}

pub fn settings(capacity: usize) -> RetentionSettings {
    RetentionSettings {
        capacity,
        ..RetentionSettings::default()
    }
}

/// Both backends that can run without a network, by name.
pub fn backends() -> Vec<(&'static str, Arc<dyn RemoteStore>)> {
    vec![
        ("memory", Arc::new(MemoryStore::new()) as Arc<dyn RemoteStore>),
        ("sqlite", Arc::new(SqliteStore::from_connection(test_db())) as Arc<dyn RemoteStore>),
    ]
}

pub fn retention_store(remote: Arc<dyn RemoteStore>, capacity: usize) -> RetentionStore {
    RetentionStore::new(remote, codec(), settings(capacity))
}

/// Write an encoded record straight to the remote, bypassing the merge gate.
pub async fn seed(remote: &Arc<dyn RemoteStore>, id: &str, lat: f64, lon: f64, ts: i64) {
    let record = PositionRecord::from_fix(id, &PositionFix::new(lat, lon, ts));
    let encoded = EncodedRecord::encode(&record, &codec()).unwrap();
    remote
        .write("locations", id, encoded.to_fields())
        .await
        .unwrap();
}
