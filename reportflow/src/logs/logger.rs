//! The run logger: two append-only log files behind one mutex each.

use super::{format_entry, parse_entries, tail_file, LogEntry, LogKind};
use crate::config::PipelineConfig;
use crate::core::RunRecord;
use crate::errors::{ReportflowError, Result};
use crate::utils::{format_log_timestamp, now_utc, Timestamp};
use parking_lot::Mutex;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Size and modification time of a log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogMetadata {
    /// Which log this describes.
    pub which: LogKind,
    /// Whether the file exists.
    pub exists: bool,
    /// File size in bytes (0 when missing).
    pub size_bytes: u64,
    /// Last modification time.
    pub modified: Option<Timestamp>,
}

impl LogMetadata {
    /// Modification time in log timestamp format.
    #[must_use]
    pub fn modified_display(&self) -> Option<String> {
        self.modified.as_ref().map(format_log_timestamp)
    }
}

#[derive(Debug)]
struct LogFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl LogFile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }
}

/// Appends entries to the processed and error logs.
///
/// Each file has its own mutex, held for the whole open, write and close of
/// an append and for clears, so concurrent writers never interleave within
/// an entry.
#[derive(Debug)]
pub struct RunLogger {
    processed: LogFile,
    error: LogFile,
}

impl RunLogger {
    /// Creates a logger over the two log paths. Files are created lazily.
    #[must_use]
    pub fn new(processed: impl Into<PathBuf>, error: impl Into<PathBuf>) -> Self {
        Self {
            processed: LogFile::new(processed.into()),
            error: LogFile::new(error.into()),
        }
    }

    /// Creates a logger at the configured paths.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.processed_log_path(), config.error_log_path())
    }

    fn file(&self, which: LogKind) -> &LogFile {
        match which {
            LogKind::Processed => &self.processed,
            LogKind::Error => &self.error,
        }
    }

    /// Path of the given log.
    #[must_use]
    pub fn path(&self, which: LogKind) -> &Path {
        &self.file(which).path
    }

    /// Appends a run record, routed by its outcome. Returns the log written.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    pub fn append_record(&self, record: &RunRecord) -> Result<LogKind> {
        let which = if record.is_success() {
            LogKind::Processed
        } else {
            LogKind::Error
        };
        self.append_at(which, &record.timestamp, &record.header(), &record.body())?;
        Ok(which)
    }

    /// Appends a free-form entry stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be written.
    pub fn append_entry(&self, which: LogKind, header: &str, body: &str) -> Result<()> {
        self.append_at(which, &now_utc(), header, body)
    }

    fn append_at(
        &self,
        which: LogKind,
        timestamp: &Timestamp,
        header: &str,
        body: &str,
    ) -> Result<()> {
        let text = format_entry(timestamp, header, body);
        let file = self.file(which);

        let _guard = file.lock.lock();
        if let Some(parent) = file.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file.path)?;
        handle.write_all(text.as_bytes())?;

        debug!(log = %which, header, bytes = text.len(), "Appended log entry");
        Ok(())
    }

    /// The last `max_bytes` of a log, starting at a line boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read.
    pub fn tail(&self, which: LogKind, max_bytes: usize) -> Result<String> {
        let file = self.file(which);
        let _guard = file.lock.lock();
        Ok(tail_file(&file.path, max_bytes)?)
    }

    /// Truncates a log to zero length. A missing log stays missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be truncated.
    pub fn clear(&self, which: LogKind) -> Result<()> {
        let file = self.file(which);
        let _guard = file.lock.lock();
        if file.path.exists() {
            OpenOptions::new()
                .write(true)
                .truncate(true)
                .open(&file.path)?;
        }
        info!(log = %which, "Cleared log");
        Ok(())
    }

    /// The full content of a log.
    ///
    /// # Errors
    ///
    /// Returns [`ReportflowError::LogNotFound`] if the log has never been written.
    pub fn read_all(&self, which: LogKind) -> Result<Vec<u8>> {
        let file = self.file(which);
        let _guard = file.lock.lock();
        match std::fs::read(&file.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ReportflowError::LogNotFound { which })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Every entry in a log. A missing log has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the log exists but cannot be read.
    pub fn entries(&self, which: LogKind) -> Result<Vec<LogEntry>> {
        match self.read_all(which) {
            Ok(bytes) => Ok(parse_entries(&String::from_utf8_lossy(&bytes))),
            Err(ReportflowError::LogNotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Existence, size and modification time of a log.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata of an existing log cannot be read.
    pub fn metadata(&self, which: LogKind) -> Result<LogMetadata> {
        let path = self.path(which);
        let meta = match std::fs::metadata(path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LogMetadata {
                    which,
                    exists: false,
                    size_bytes: 0,
                    modified: None,
                });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(LogMetadata {
            which,
            exists: true,
            size_bytes: meta.len(),
            modified: meta.modified().ok().map(Timestamp::from),
        })
    }
}
