//! Hook execution audit log
//!
//! A JSON Lines file with one record per hook invocation. Appends are
//! serialized through a mutex. Once the file holds the retention cap, the
//! next append first rewrites it keeping only the newest records, so old
//! entries leave from the head and existing lines are never edited.

use crate::fs::atomic_write;
use crate::hooks::HookExecutionRecord;
use actledger_core::{Error, Result};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Records kept in the log
pub const MAX_RECORDS: usize = 1000;

/// Append-only JSONL writer for hook execution records
#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    max_records: usize,
    /// Line count of the file, loaded on first append
    lines: Mutex<Option<usize>>,
}

impl AuditLog {
    /// Create a log writing to `path` with the default retention cap
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_max_records(path, MAX_RECORDS)
    }

    /// Create a log with a custom retention cap (at least 1)
    #[must_use]
    pub fn with_max_records(path: impl Into<PathBuf>, max_records: usize) -> Self {
        Self {
            path: path.into(),
            max_records: max_records.max(1),
            lines: Mutex::new(None),
        }
    }

    /// Path of the log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be serialized or the file
    /// cannot be written
    pub fn append(&self, record: &HookExecutionRecord) -> Result<()> {
        let line = serde_json::to_string(record)
            .map_err(|e| Error::Message(format!("Failed to serialize audit record: {e}")))?;

        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        let mut count = match *lines {
            Some(count) => count,
            None => self.count_lines()?,
        };

        if count >= self.max_records {
            count = self.truncate_head(self.max_records - 1)?;
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| self.write_error(e))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.write_error(e))?;
        file.write_all(format!("{line}\n").as_bytes())
            .map_err(|e| self.write_error(e))?;

        *lines = Some(count + 1);
        Ok(())
    }

    /// Read all records, oldest first
    ///
    /// Lines that do not parse are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read
    pub fn read_records(&self) -> Result<Vec<HookExecutionRecord>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.read_error(e)),
        };

        Ok(content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .filter_map(|(index, line)| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(line = index + 1, error = %e, "Skipping malformed audit record");
                    None
                }
            })
            .collect())
    }

    fn count_lines(&self) -> Result<usize> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content.lines().filter(|l| !l.trim().is_empty()).count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(self.read_error(e)),
        }
    }

    /// Rewrite the file keeping the newest `keep` lines; returns the new count
    fn truncate_head(&self, keep: usize) -> Result<usize> {
        let content = fs::read_to_string(&self.path).map_err(|e| self.read_error(e))?;
        let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
        let dropped = lines.len().saturating_sub(keep);
        let kept = &lines[dropped..];

        let mut data = String::with_capacity(content.len());
        for line in kept {
            data.push_str(line);
            data.push('\n');
        }
        atomic_write(&self.path, data.as_bytes())?;

        tracing::debug!(dropped, kept = kept.len(), "Rotated audit log");
        Ok(kept.len())
    }

    fn read_error(&self, source: std::io::Error) -> Error {
        Error::FileRead {
            path: self.path.clone(),
            source,
        }
    }

    fn write_error(&self, source: std::io::Error) -> Error {
        Error::FileWrite {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::hooks::LifecycleEvent;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn record(n: usize) -> HookExecutionRecord {
        HookExecutionRecord::finished(
            &format!("hook-{n}"),
            LifecycleEvent::AfterSuccess,
            "a1",
            Duration::from_millis(1),
            None,
        )
    }

    #[test]
    fn test_append_and_read() {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::new(temp.path().join("nested/log.jsonl"));
        log.append(&record(1)).unwrap();
        log.append(&record(2)).unwrap();

        let records = log.read_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].hook_id, "hook-1");
        assert_eq!(records[1].hook_id, "hook-2");

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::new(temp.path().join("none.jsonl"));
        assert!(log.read_records().unwrap().is_empty());
    }

    #[test]
    fn test_retention_drops_oldest() {
        let temp = TempDir::new().unwrap();
        let log = AuditLog::with_max_records(temp.path().join("log.jsonl"), 5);
        for n in 0..12 {
            log.append(&record(n)).unwrap();
            assert!(log.read_records().unwrap().len() <= 5);
        }

        let ids: Vec<String> = log
            .read_records()
            .unwrap()
            .into_iter()
            .map(|r| r.hook_id)
            .collect();
        assert_eq!(ids, vec!["hook-7", "hook-8", "hook-9", "hook-10", "hook-11"]);
    }

    #[test]
    fn test_retention_applies_to_existing_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log.jsonl");
        {
            let log = AuditLog::with_max_records(&path, 3);
            for n in 0..3 {
                log.append(&record(n)).unwrap();
            }
        }
        let reopened = AuditLog::with_max_records(&path, 3);
        reopened.append(&record(3)).unwrap();
        let ids: Vec<String> = reopened
            .read_records()
            .unwrap()
            .into_iter()
            .map(|r| r.hook_id)
            .collect();
        assert_eq!(ids, vec!["hook-1", "hook-2", "hook-3"]);
    }

    #[test]
    fn test_concurrent_appends_do_not_interleave() {
        let temp = TempDir::new().unwrap();
        let log = Arc::new(AuditLog::new(temp.path().join("log.jsonl")));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    for n in 0..25 {
                        log.append(&record(t * 100 + n)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(log.read_records().unwrap().len(), 200);
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("log.jsonl");
        let log = AuditLog::new(&path);
        log.append(&record(1)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{not json\n").unwrap();
        assert_eq!(log.read_records().unwrap().len(), 1);
    }
}
