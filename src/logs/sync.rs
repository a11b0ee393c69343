//! Push and pull the local log to the remote `logs` collection.
//!
//! Each upload stores the whole obfuscated log text as a new [`LogEntry`];
//! downloads only ever look at the most recent one. Uploads prune older entries
//! beyond `keep` so the collection stays bounded.

use serde_json::{Map, Value};
use std::sync::Arc;

use super::capture::{LogCapture, NO_LOG_FILE};
use crate::codec::ObfuscationCodec;
use crate::error::{TrackError, TrackResult};
use crate::history::retention;
use crate::history::types::ORDER_FIELD;
use crate::remote::{byte_payload, Document, RemoteStore};

/// A remote log snapshot: `{"id","encryptedData","timestamp","size"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub id: String,
    pub payload: Vec<u8>,
    pub captured_at: i64,
    /// Byte length of the plaintext.
    pub size: usize,
}

impl LogEntry {
    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("id".into(), Value::from(self.id.clone()));
        fields.insert(
            "encryptedData".into(),
            Value::Array(self.payload.iter().map(|&b| Value::from(b)).collect()),
        );
        fields.insert(ORDER_FIELD.into(), Value::from(self.captured_at));
        fields.insert("size".into(), Value::from(self.size));
        fields
    }

    /// Accepts `encryptedData` as an integer array or its comma-joined text.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let payload = byte_payload(doc.fields.get("encryptedData")?)?;
        Some(Self {
            id: doc.key.clone(),
            captured_at: doc.int_field(ORDER_FIELD).unwrap_or_default(),
            size: doc
                .int_field("size")
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(payload.len()),
            payload,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub id: String,
    pub size: usize,
    pub pruned: usize,
}

pub struct LogSync {
    remote: Arc<dyn RemoteStore>,
    codec: ObfuscationCodec,
    path: String,
    keep: usize,
}

impl LogSync {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        codec: ObfuscationCodec,
        path: impl Into<String>,
        keep: usize,
    ) -> Self {
        Self {
            remote,
            codec,
            path: path.into(),
            keep: keep.max(1),
        }
    }

    /// Upload the full local log as a new entry.
    ///
    /// An empty or missing log is [`TrackError::NothingToUpload`] and never
    /// reaches the remote.
    pub async fn upload(&self, capture: &LogCapture) -> TrackResult<UploadOutcome> {
        let text = match capture.read_text()? {
            Some(text) if !text.is_empty() && text != NO_LOG_FILE => text,
            _ => return Err(TrackError::NothingToUpload),
        };

        let id = self.remote.generate_id(&self.path).await?;
        let entry = LogEntry {
            id: id.clone(),
            payload: self.codec.encode(&text),
            captured_at: chrono::Utc::now().timestamp_millis(),
            size: text.len(),
        };
        self.remote.write(&self.path, &id, entry.to_fields()).await?;

        // Pruning to `keep` after the write: make_room leaves keep - 1.
        let pruned = retention::make_room(&self.remote, &self.path, self.keep + 1)
            .await
            .removed;

        tracing::info!(id = %id, size = entry.size, pruned, "log uploaded");
        Ok(UploadOutcome {
            id,
            size: entry.size,
            pruned,
        })
    }

    /// Text of the most recent uploaded log, `None` if there is none or it
    /// cannot be decoded.
    pub async fn download(&self) -> TrackResult<Option<String>> {
        let latest = self.remote.ordered_last(&self.path, ORDER_FIELD, 1).await?;
        let Some(doc) = latest.last() else {
            return Ok(None);
        };

        let Some(entry) = LogEntry::from_document(doc) else {
            tracing::warn!(id = %doc.key, "latest log entry has an unreadable payload");
            return Ok(None);
        };

        let text = self.codec.decode(&entry.payload);
        if text.len() != entry.size {
            tracing::warn!(
                id = %entry.id,
                expected = entry.size,
                actual = text.len(),
                "decoded log size mismatch"
            );
        }
        Ok(Some(text))
    }

    /// Remove every uploaded log entry.
    pub async fn delete_remote(&self) -> TrackResult<()> {
        self.remote.remove_all(&self.path).await?;
        tracing::info!(path = %self.path, "remote logs deleted");
        Ok(())
    }
}
