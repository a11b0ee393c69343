//! Local append-only diagnostic log file.
//!
//! Each [`LogCapture::append`] writes exactly one `[yyyy-MM-dd HH:mm:ss.SSS] `
//! prefixed entry with a single `write_all` under a process-wide lock, so
//! concurrent callers never interleave partial lines. The same sink doubles as
//! a `tracing-subscriber` writer.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing_subscriber::fmt::MakeWriter;

/// Returned by [`LogCapture::read_all`] when nothing has been written yet.
pub const NO_LOG_FILE: &str = "Log file does not exist.";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

#[derive(Debug, Clone)]
pub struct LogCapture {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl LogCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped entry. Failures go to stderr and are otherwise
    /// ignored; logging never aborts the caller.
    pub fn append(&self, line: &str) {
        if let Err(e) = self.try_append(line) {
            eprintln!("failed to write log file {}: {e}", self.path.display());
        }
    }

    pub fn try_append(&self, line: &str) -> io::Result<()> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT);
        let entry = format!("[{timestamp}] {line}\n");

        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())
    }

    /// The accumulated text, [`NO_LOG_FILE`] if there is none, or a
    /// description of the read failure.
    pub fn read_all(&self) -> String {
        match self.read_text() {
            Ok(Some(text)) => text,
            Ok(None) => NO_LOG_FILE.to_string(),
            Err(e) => format!("Error reading log file: {e}"),
        }
    }

    /// Raw contents, `None` when the file does not exist.
    pub fn read_text(&self) -> io::Result<Option<String>> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        match std::fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete the log file. A missing file is not an error.
    pub fn clear(&self) -> io::Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|p| p.into_inner());
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// Buffers one formatted tracing event and appends it on drop.
pub struct CaptureWriter<'a> {
    capture: &'a LogCapture,
    buf: Vec<u8>,
}

impl Write for CaptureWriter<'_> {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let text = String::from_utf8_lossy(&self.buf);
        let line = text.trim_end_matches(['\r', '\n']);
        let result = if line.is_empty() {
            Ok(())
        } else {
            self.capture.try_append(line)
        };
        self.buf.clear();
        result
    }
}

impl Drop for CaptureWriter<'_> {
    fn drop(&mut self) {
        // Errors cannot be reported from inside the subscriber
        let _ = self.flush();
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = CaptureWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        CaptureWriter {
            capture: self,
            buf: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn capture() -> (TempDir, LogCapture) {
        let tmp = TempDir::new().unwrap();
        let capture = LogCapture::new(tmp.path().join("logs").join("trail.txt"));
        (tmp, capture)
    }

    #[test]
    fn read_before_write_returns_sentinel() {
        let (_tmp, capture) = capture();
        assert_eq!(capture.read_all(), NO_LOG_FILE);
        assert!(capture.read_text().unwrap().is_none());
    }

    #[test]
    fn append_prefixes_timestamp() {
        let (_tmp, capture) = capture();
        capture.append("service started");
        capture.append("second");

        let text = capture.read_all();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        // [2026-01-02 03:04:05.678] service started
        let first = lines[0];
        assert!(first.starts_with('['));
        assert_eq!(&first[24..26], "] ");
        assert_eq!(&first[26..], "service started");
        assert!(chrono::NaiveDateTime::parse_from_str(&first[1..24], TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn clear_removes_file() {
        let (_tmp, capture) = capture();
        capture.append("x");
        capture.clear().unwrap();
        assert_eq!(capture.read_all(), NO_LOG_FILE);
        // clearing twice is fine
        capture.clear().unwrap();
    }

    #[test]
    fn read_failure_is_described_not_raised() {
        let tmp = TempDir::new().unwrap();
        // A directory cannot be read as a file
        let capture = LogCapture::new(tmp.path());
        assert!(capture.read_all().starts_with("Error reading log file"));
    }

    #[test]
    fn concurrent_appends_keep_lines_whole() {
        let (_tmp, capture) = capture();
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let capture = capture.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        capture.append(&format!("thread-{t} entry-{i} {}", "x".repeat(200)));
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        let text = capture.read_all();
        assert_eq!(text.lines().count(), 400);
        assert!(text
            .lines()
            .all(|l| l.starts_with('[') && l.ends_with(&"x".repeat(200))));
    }

    #[test]
    fn writer_appends_one_entry_per_event() {
        let (_tmp, capture) = capture();
        {
            let mut w = capture.make_writer();
            w.write_all(b" INFO saved location\n").unwrap();
        }
        {
            let mut w = capture.make_writer();
            w.write_all(b"\n").unwrap();
        }
        let text = capture.read_all();
        assert_eq!(text.lines().count(), 1);
        assert!(text.trim_end().ends_with(" INFO saved location"));
    }
}
