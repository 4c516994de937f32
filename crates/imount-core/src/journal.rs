//! Operation log: a bounded JSON array of [`LogEntry`] on disk.
//!
//! Writing is best-effort. A failed append is reported through `tracing`
//! and otherwise ignored so it can never fail the operation being logged.
//!
//! The async methods move the file I/O onto tokio's blocking pool; the
//! synchronous ones are for callers that are already off the runtime.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

/// File name of the log inside the settings directory.
pub const LOG_FILE_NAME: &str = "operation_log.json";

/// Entries kept when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 100;

/// Maximum characters kept in [`LogEntry::details`].
pub const DETAILS_LIMIT: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum Status {
    Success,
    Failed,
}

impl From<bool> for Status {
    fn from(success: bool) -> Self {
        if success { Self::Success } else { Self::Failed }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub operation: String,
    pub status: Status,
    #[serde(default)]
    pub details: String,
}

impl LogEntry {
    pub fn new(operation: impl Into<String>, status: Status, details: &str) -> Self {
        Self {
            timestamp: chrono::Local::now()
                .format("%Y-%m-%dT%H:%M:%S%.6f")
                .to_string(),
            operation: operation.into(),
            status,
            details: truncate_details(details),
        }
    }
}

/// Cut `text` to [`DETAILS_LIMIT`] characters.
pub fn truncate_details(text: &str) -> String {
    text.chars().take(DETAILS_LIMIT).collect()
}

/// Handle to the on-disk log. Clones share the same write lock.
#[derive(Debug, Clone)]
pub struct OperationLog {
    path: PathBuf,
    capacity: usize,
    write_lock: Arc<Mutex<()>>,
}

impl OperationLog {
    pub fn new(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity: capacity.max(1),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Log at `<settings_dir>/operation_log.json`.
    pub fn in_dir(settings_dir: &Path, capacity: usize) -> Self {
        Self::new(settings_dir.join(LOG_FILE_NAME), capacity)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against this log on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&OperationLog) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let log = self.clone();
        tokio::task::spawn_blocking(move || f(&log))
            .await
            .context("Operation log task failed")?
    }

    /// Append one entry. Never fails.
    pub async fn append(&self, operation: &str, status: Status, details: &str) {
        let entry = LogEntry::new(operation, status, details);
        if let Err(e) = self.blocking(move |log| log.try_append(entry)).await {
            tracing::warn!(path = %self.path.display(), "Failed to log operation: {:#}", e);
        }
    }

    /// [`append`](Self::append) on the calling thread.
    pub fn append_blocking(&self, operation: &str, status: Status, details: &str) {
        let entry = LogEntry::new(operation, status, details);
        if let Err(e) = self.try_append(entry) {
            tracing::warn!(path = %self.path.display(), "Failed to log operation: {:#}", e);
        }
    }

    fn try_append(&self, entry: LogEntry) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut entries = self.entries().unwrap_or_else(|e| {
            tracing::warn!("Discarding unreadable operation log: {:#}", e);
            Vec::new()
        });
        entries.push(entry);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }
        self.write_all(&entries)
    }

    /// Write through a uniquely named temp file in the same directory, then
    /// rename it over the log. Another process writing at the same time
    /// gets its own temp file.
    fn write_all(&self, entries: &[LogEntry]) -> Result<()> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
        let content =
            serde_json::to_string_pretty(entries).context("Failed to serialize operation log")?;

        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create a temp file in {}", parent.display()))?;
        tmp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", tmp.path().display()))?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }

    /// All entries, oldest first. A missing file is an empty log.
    pub fn entries(&self) -> Result<Vec<LogEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    /// The newest `limit` entries, oldest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let mut entries = self.entries()?;
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.split_off(skip))
    }

    /// [`entries`](Self::entries) off the runtime.
    pub async fn load(&self) -> Result<Vec<LogEntry>> {
        self.blocking(|log| log.entries()).await
    }

    /// [`recent`](Self::recent) off the runtime.
    pub async fn load_recent(&self, limit: usize) -> Result<Vec<LogEntry>> {
        self.blocking(move |log| log.recent(limit)).await
    }

    /// [`clear`](Self::clear) off the runtime.
    pub async fn remove(&self) -> Result<()> {
        self.blocking(|log| log.clear()).await
    }

    /// Delete the log file.
    pub fn clear(&self) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
