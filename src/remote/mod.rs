//! Path-addressed document store client.
//!
//! [`RemoteStore`] is the boundary both the position history and the log sync
//! drive. A store holds collections at paths (e.g. `"locations"`); each
//! collection maps a key to a schema-less JSON object. Backends:
//!
//! - [`memory::MemoryStore`]: in-process, for tests and dry runs
//! - [`sqlite::SqliteStore`]: a SQLite document table, for self-hosting
//! - [`firebase::FirebaseStore`]: Firebase Realtime Database over REST
//!
//! Every backend guarantees single-key write atomicity and nothing more.

pub mod firebase;
pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<rusqlite::Error> for RemoteError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Storage(e.to_string())
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

impl From<tokio::task::JoinError> for RemoteError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Task(e.to_string())
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// One stored document: its key plus an arbitrary field map.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(key: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            key: key.into(),
            fields,
        }
    }

    /// Integer value of `field`, if present and numeric.
    pub fn int_field(&self, field: &str) -> Option<i64> {
        self.fields.get(field).and_then(order_value)
    }
}

/// Sort key extracted from a document field.
///
/// Numbers order numerically; documents missing the field sort first, which
/// matches how the Firebase query engine places children without the child key.
pub(crate) fn order_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        _ => None,
    }
}

/// Normalize a stored `encryptedData` value into bytes.
///
/// Accepts an array of integers or the same values comma-joined in a string
/// (`"12,250,7"`). Integers may be 0..=255 or -128..=-1 (older writers stored
/// sign-extended bytes); only the low byte is kept. Anything else is `None`.
pub fn byte_payload(value: &Value) -> Option<Vec<u8>> {
    fn to_byte(n: i64) -> Option<u8> {
        (-128..=255).contains(&n).then_some((n & 0xFF) as u8)
    }

    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_i64().and_then(to_byte))
            .collect(),
        Value::String(text) => {
            let text = text.trim().trim_start_matches('[').trim_end_matches(']');
            if text.trim().is_empty() {
                return Some(Vec::new());
            }
            text.split(',')
                .map(|part| part.trim().parse::<i64>().ok().and_then(to_byte))
                .collect()
        }
        _ => None,
    }
}

/// Client for a path-addressed, schema-less document store.
///
/// Ordered reads sort by the integer value of `order_field`; ties keep the
/// store's insertion order.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// The last `n` documents at `path` when ordered ascending by `order_field`,
    /// returned in ascending order.
    async fn ordered_last(&self, path: &str, order_field: &str, n: usize)
        -> RemoteResult<Vec<Document>>;

    /// The first `n` documents at `path` ordered ascending by `order_field`.
    async fn ordered_first(&self, path: &str, order_field: &str, n: usize)
        -> RemoteResult<Vec<Document>>;

    /// Every document at `path` ordered ascending by `order_field`.
    async fn ordered_all(&self, path: &str, order_field: &str) -> RemoteResult<Vec<Document>>;

    async fn count(&self, path: &str) -> RemoteResult<usize>;

    /// A fresh key, unique within `path`. Does not write anything.
    async fn generate_id(&self, path: &str) -> RemoteResult<String>;

    /// Create or replace the document at `path/id`.
    async fn write(&self, path: &str, id: &str, value: Map<String, Value>) -> RemoteResult<()>;

    /// Delete `path/id`. Deleting a missing key succeeds.
    async fn delete(&self, path: &str, id: &str) -> RemoteResult<()>;

    /// Delete the whole collection at `path`.
    async fn remove_all(&self, path: &str) -> RemoteResult<()>;
}

/// Generate a time-sortable unique key.
pub(crate) fn new_key() -> String {
    uuid::Uuid::now_v7().simple().to_string()
}

/// Create the configured remote store backend.
pub fn create_store(config: &crate::config::RemoteConfig) -> anyhow::Result<Arc<dyn RemoteStore>> {
    match config.backend.as_str() {
        "sqlite" => {
            let store = sqlite::SqliteStore::open(crate::config::expand_tilde(&config.db_path))?;
            Ok(Arc::new(store))
        }
        "firebase" => {
            let store = firebase::FirebaseStore::new(config)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(memory::MemoryStore::new())),
        other => anyhow::bail!("unknown remote backend: {other}. Supported: sqlite, firebase, memory"),
    }
}
