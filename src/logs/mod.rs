//! Diagnostic log: a local append-only file plus remote upload and download.

pub mod capture;
pub mod sync;

pub use capture::{LogCapture, NO_LOG_FILE};
pub use sync::{LogEntry, LogSync, UploadOutcome};
