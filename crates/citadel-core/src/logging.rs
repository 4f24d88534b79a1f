//! Wire logging for streamed operations.
//!
//! When a log directory is configured, every request payload and every raw
//! response line of an operation is appended to its own timestamped file.
//! Diagnostics go through the `log` facade as usual; this is only the raw
//! transcript.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

/// Append-only transcript of one operation.
#[derive(Debug, Default)]
pub struct WireLog {
    file: Option<File>,
    path: Option<PathBuf>,
}

/// Format current UTC time as ISO 8601 with milliseconds (e.g. 2026-02-04T10:15:30.123Z).
fn utc_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

impl WireLog {
    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Open (or create) `{log_dir}/{operation}-{uuid}.log`.
    ///
    /// Failing to open the file only disables the transcript; it never fails
    /// the operation.
    pub fn open(log_dir: Option<&Path>, operation: &str) -> Self {
        let Some(dir) = log_dir else {
            return Self::disabled();
        };

        let path = dir.join(format!("{}-{}.log", operation, uuid::Uuid::new_v4()));
        let opened = std::fs::create_dir_all(dir).and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
        });

        match opened {
            Ok(file) => Self {
                file: Some(file),
                path: Some(path),
            },
            Err(e) => {
                log::warn!("Could not open wire log {}: {}", path.display(), e);
                Self::disabled()
            }
        }
    }

    /// Path of the transcript, if one is being written.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write a timestamped line to the transcript (if open).
    pub fn record(&mut self, direction: &str, data: &[u8]) {
        if let Some(ref mut file) = self.file {
            let ts = utc_timestamp();
            let _ = writeln!(
                file,
                "[{}] {}: {}",
                ts,
                direction,
                String::from_utf8_lossy(data)
            );
            let _ = file.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn utc_timestamp_format() {
        let ts = utc_timestamp();
        // YYYY-MM-DDTHH:MM:SS.mmmZ
        assert!(ts.ends_with('Z'));
        assert_eq!(ts.len(), 24);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn open_creates_file_per_operation() {
        let dir = tempdir().unwrap();

        let log = WireLog::open(Some(dir.path()), "build");
        let path = log.path().expect("wire log path").to_path_buf();

        assert!(path.exists());
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("build-"));
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn open_without_dir_is_disabled() {
        let log = WireLog::open(None, "build");
        assert!(log.path().is_none());
    }

    #[test]
    fn record_appends_lines() {
        let dir = tempdir().unwrap();
        let mut log = WireLog::open(Some(dir.path()), "remove");

        log.record("SEND", br#"{"ids":["abc"]}"#);
        log.record("RECV", br#"{"success":true,"id":"abc"}"#);

        let contents = std::fs::read_to_string(log.path().unwrap()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains(r#"SEND: {"ids":["abc"]}"#));
        assert!(lines[1].contains("RECV: "));
    }

    #[test]
    fn record_on_disabled_log_is_noop() {
        let mut log = WireLog::disabled();
        // Should not panic
        log.record("RECV", b"{}");
    }
}
