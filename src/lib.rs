//! Bounded, obfuscated location history on top of a remote document store.
//!
//! A producer feeds periodic position fixes into [`history::RetentionStore`].
//! Each fix is either merged into the most recent record (the entity has not
//! moved more than the merge threshold) or appended as a new record, evicting
//! the oldest records first so the collection never grows past its capacity.
//! Records are obfuscated with a repeating-key XOR before they leave the
//! process, with the capture timestamp kept in cleartext for ordering.
//!
//! A local diagnostic log ([`logs::LogCapture`]) mirrors tracing output and can
//! be uploaded to, and downloaded from, the same remote store.
//!
//! # Modules
//!
//! - [`codec`]: reversible payload obfuscation
//! - [`geo`]: coordinates and great-circle distance
//! - [`remote`]: the remote store seam and its SQLite, Firebase and in-memory backends
//! - [`db`]: SQLite schema and migrations behind the SQLite backend
//! - [`history`]: the retention store and record types
//! - [`logs`]: local log sink and remote log sync
//! - [`sampler`]: the periodic producer loop
//! - [`config`]: TOML configuration with environment overrides

pub mod codec;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod history;
pub mod logs;
pub mod remote;
pub mod sampler;

pub use error::{TrackError, TrackResult};
