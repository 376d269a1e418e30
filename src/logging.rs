//! Translation journal: one JSONL record per translated request or decoded stream.
//!
//! Diagnostics go through `tracing`; the journal is the operator-facing audit
//! trail of what the bridge actually produced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const MAX_JOURNAL_ENTRIES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    /// Backend the entry concerns, e.g. `anthropic`.
    pub backend: String,
    /// `translate`, `decode`, ...
    pub operation: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl LogEntry {
    pub fn new(
        level: LogLevel,
        backend: impl Into<String>,
        operation: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            backend: backend.into(),
            operation: operation.into(),
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, ctx: serde_json::Value) -> Self {
        self.context = Some(ctx);
        self
    }
}

/// Ring buffer of recent entries, mirrored to an append-only JSONL file.
pub struct Journal {
    entries: VecDeque<LogEntry>,
    file_path: PathBuf,
    writer: BufWriter<File>,
}

impl Journal {
    /// Open (or create) the journal at `file_path`, reloading the tail of an existing file.
    pub fn open(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file_path = file_path.as_ref().to_path_buf();

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let mut entries = VecDeque::new();
        if file_path.exists() {
            let reader = BufReader::new(File::open(&file_path)?);
            for line in reader.lines() {
                // Lines that no longer parse are skipped, not fatal.
                if let Ok(entry) = serde_json::from_str::<LogEntry>(&line?) {
                    if entries.len() >= MAX_JOURNAL_ENTRIES {
                        entries.pop_front();
                    }
                    entries.push_back(entry);
                }
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)?;

        Ok(Self {
            entries,
            file_path,
            writer: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn record(&mut self, entry: LogEntry) {
        match serde_json::to_string(&entry) {
            Ok(json) => {
                if let Err(e) = writeln!(self.writer, "{json}").and_then(|()| self.writer.flush()) {
                    tracing::warn!(path = %self.file_path.display(), error = %e, "Journal write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "Journal entry not serializable"),
        }
        if self.entries.len() >= MAX_JOURNAL_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Most recent entries first.
    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }
}

#[derive(Clone)]
pub struct SharedLogger(Arc<Mutex<Journal>>);

impl SharedLogger {
    pub fn new(file_path: impl AsRef<Path>) -> std::io::Result<Self> {
        Ok(Self(Arc::new(Mutex::new(Journal::open(file_path)?))))
    }

    pub fn log(&self, entry: LogEntry) {
        if let Ok(mut journal) = self.0.lock() {
            journal.record(entry);
        }
    }

    pub fn info(&self, backend: &str, operation: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Info, backend, operation, message));
    }

    pub fn warn(&self, backend: &str, operation: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Warn, backend, operation, message));
    }

    pub fn error(&self, backend: &str, operation: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Error, backend, operation, message));
    }

    pub fn debug(&self, backend: &str, operation: &str, message: impl Into<String>) {
        self.log(LogEntry::new(LogLevel::Debug, backend, operation, message));
    }

    pub fn log_with_context(
        &self,
        level: LogLevel,
        backend: &str,
        operation: &str,
        message: impl Into<String>,
        context: serde_json::Value,
    ) {
        self.log(LogEntry::new(level, backend, operation, message).with_context(context));
    }

    pub fn recent(&self, limit: usize) -> Vec<LogEntry> {
        self.0.lock().map(|j| j.recent(limit)).unwrap_or_default()
    }
}

impl std::fmt::Debug for SharedLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self
            .0
            .lock()
            .map(|j| j.path().display().to_string())
            .unwrap_or_default();
        f.debug_tuple("SharedLogger").field(&path).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entries_persist_as_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("journal").join("bridge.jsonl");

        let logger = SharedLogger::new(&path).unwrap();
        logger.info("anthropic", "translate", "1 message");
        logger.log_with_context(
            LogLevel::Warn,
            "gemma",
            "decode",
            "stream closed early",
            json!({"frames": 3}),
        );

        let raw = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = raw.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: LogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.level, LogLevel::Warn);
        assert_eq!(second.backend, "gemma");
        assert_eq!(second.context, Some(json!({"frames": 3})));
    }

    #[test]
    fn test_level_helpers() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SharedLogger::new(dir.path().join("levels.jsonl")).unwrap();
        logger.debug("custom", "decode", "d");
        logger.info("custom", "decode", "i");
        logger.warn("custom", "translate", "Validation error: Request message is empty");
        logger.error("custom", "decode", "e");

        let levels: Vec<LogLevel> = logger.recent(4).into_iter().map(|e| e.level).collect();
        assert_eq!(
            levels,
            vec![LogLevel::Error, LogLevel::Warn, LogLevel::Info, LogLevel::Debug]
        );
    }

    #[test]
    fn test_recent_is_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SharedLogger::new(dir.path().join("j.jsonl")).unwrap();
        for i in 0..5 {
            logger.debug("custom", "translate", format!("entry {i}"));
        }

        let recent = logger.recent(2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "entry 4");
        assert_eq!(recent[1].message, "entry 3");
    }

    #[test]
    fn test_reopen_reloads_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("j.jsonl");
        {
            let logger = SharedLogger::new(&path).unwrap();
            logger.error("lingshu", "translate", "missing template id");
        }
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "not a journal line"))
            .unwrap();

        let logger = SharedLogger::new(&path).unwrap();
        let recent = logger.recent(10);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].operation, "translate");
    }
}
