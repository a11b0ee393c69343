//! Position history record types.
//!
//! [`PositionRecord`] is the plaintext record; [`EncodedRecord`] is its at-rest
//! form with the serialized record obfuscated and the timestamp duplicated in
//! cleartext so the store can order and evict without decoding.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::ObfuscationCodec;
use crate::error::TrackResult;
use crate::geo::Coordinate;
use crate::remote::{byte_payload, Document};

/// Field the store orders and evicts by.
pub const ORDER_FIELD: &str = "timestamp";

/// One sample delivered by a positioning source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionFix {
    pub coordinate: Coordinate,
    /// Milliseconds since the Unix epoch.
    pub sampled_at: i64,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64, sampled_at: i64) -> Self {
        Self {
            coordinate: Coordinate::new(latitude, longitude),
            sampled_at,
        }
    }

    /// A fix stamped with the current wall-clock time.
    pub fn now(latitude: f64, longitude: f64) -> Self {
        Self::new(latitude, longitude, chrono::Utc::now().timestamp_millis())
    }
}

/// A stored position. Serialized as `{"id","latitude","longitude","timestamp"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRecord {
    /// Store key. Older payloads may omit it; readers fill it from the key.
    #[serde(default)]
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "timestamp")]
    pub captured_at: i64,
}

impl PositionRecord {
    pub fn from_fix(id: impl Into<String>, fix: &PositionFix) -> Self {
        Self {
            id: id.into(),
            latitude: fix.coordinate.latitude,
            longitude: fix.coordinate.longitude,
            captured_at: fix.sampled_at,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }

    /// Parse and sanity-check decoded plaintext. Garbage yields `None`.
    pub fn from_json(text: &str) -> Option<Self> {
        let record: Self = serde_json::from_str(text).ok()?;
        record.is_plausible().then_some(record)
    }

    fn is_plausible(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// At-rest form of a [`PositionRecord`]: `{"id","encryptedData","timestamp"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedRecord {
    pub id: String,
    pub payload: Vec<u8>,
    /// Always equal to the `captured_at` inside `payload`.
    pub captured_at: i64,
}

impl EncodedRecord {
    pub fn encode(record: &PositionRecord, codec: &ObfuscationCodec) -> TrackResult<Self> {
        let json = serde_json::to_string(record)?;
        Ok(Self {
            id: record.id.clone(),
            payload: codec.encode(&json),
            captured_at: record.captured_at,
        })
    }

    /// Decode the payload, or `None` if it does not hold a valid record.
    pub fn decode(&self, codec: &ObfuscationCodec) -> Option<PositionRecord> {
        let mut record = PositionRecord::from_json(&codec.decode(&self.payload))?;
        if record.id.is_empty() {
            record.id = self.id.clone();
        }
        Some(record)
    }

    /// Read an encoded record from a stored document. The key wins over any
    /// `id` field in the body.
    pub fn from_document(doc: &Document) -> Option<Self> {
        let payload = byte_payload(doc.fields.get("encryptedData")?)?;
        let captured_at = doc.int_field(ORDER_FIELD).unwrap_or_default();
        Some(Self {
            id: doc.key.clone(),
            payload,
            captured_at,
        })
    }

    pub fn to_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("id".into(), Value::from(self.id.clone()));
        fields.insert(
            "encryptedData".into(),
            Value::Array(self.payload.iter().map(|&b| Value::from(b)).collect()),
        );
        fields.insert(ORDER_FIELD.into(), Value::from(self.captured_at));
        fields
    }
}

/// What a successful save did.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The sample was within the merge threshold of the latest record, whose
    /// timestamp was moved forward in place.
    Merged { id: String, distance_m: f64 },
    /// A new record was written, after evicting `evicted` old ones.
    Appended { id: String, evicted: usize },
}

impl SaveOutcome {
    pub fn id(&self) -> &str {
        match self {
            Self::Merged { id, .. } | Self::Appended { id, .. } => id,
        }
    }
}
