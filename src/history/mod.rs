//! Bounded, obfuscated position history.
//!
//! - [`types`]: plaintext and at-rest record forms
//! - [`store`]: [`RetentionStore`], the merge-or-append write path and reads
//! - [`retention`]: oldest-first eviction under the capacity ceiling
//! - [`route`]: ordering and route summaries for consumers

pub mod retention;
pub mod route;
pub mod store;
pub mod types;

pub use store::{RetentionSettings, RetentionStore, CAPACITY, MERGE_THRESHOLD_METERS};
pub use types::{EncodedRecord, PositionFix, PositionRecord, SaveOutcome};
