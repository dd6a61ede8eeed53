// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit trail: human-readable progress for remote operators.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from audit operations
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit write failed: {0}")]
    Write(#[from] std::io::Error),
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives the narration of one bundle run.
///
/// Reporting is best-effort: callers log and drop errors.
pub trait AuditSink: Send + Sync {
    /// Start a new titled section (one per step)
    fn create_section(&self, title: &str) -> Result<(), AuditError>;
    fn append_info(&self, text: &str) -> Result<(), AuditError>;
    fn append_error(&self, text: &str) -> Result<(), AuditError>;
    /// Replace the one-line summary status of the bundle
    fn update_status(&self, status: &str) -> Result<(), AuditError>;
}

/// Opens one [`AuditSink`] per bundle.
pub trait AuditLog: Clone + Send + Sync + 'static {
    type Sink: AuditSink + 'static;

    fn open(&self, bundle_sequence: u64) -> Self::Sink;
}

/// Append-only audit files under `<dir>/<bundle sequence>.log`.
#[derive(Debug, Clone)]
pub struct FileAuditLog {
    dir: PathBuf,
}

impl FileAuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl AuditLog for FileAuditLog {
    type Sink = FileAuditSink;

    fn open(&self, bundle_sequence: u64) -> FileAuditSink {
        FileAuditSink { path: self.dir.join(format!("{}.log", bundle_sequence)) }
    }
}

/// Audit sink for a single bundle.
///
/// Each call opens, writes and closes the file; audit traffic is a handful
/// of lines per step.
///
/// Format: `2026-01-30T08:14:09Z [error] message`
#[derive(Debug, Clone)]
pub struct FileAuditSink {
    path: PathBuf,
}

impl FileAuditSink {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, tag: &str, text: &str) -> Result<(), AuditError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        if text.is_empty() {
            writeln!(file, "{} [{}]", ts, tag)?;
        }
        for line in text.lines() {
            writeln!(file, "{} [{}] {}", ts, tag, line)?;
        }
        Ok(())
    }
}

impl AuditSink for FileAuditSink {
    fn create_section(&self, title: &str) -> Result<(), AuditError> {
        self.write_line("section", &format!("=== {} ===", title))
    }

    fn append_info(&self, text: &str) -> Result<(), AuditError> {
        self.write_line("info", text)
    }

    fn append_error(&self, text: &str) -> Result<(), AuditError> {
        self.write_line("error", text)
    }

    fn update_status(&self, status: &str) -> Result<(), AuditError> {
        self.write_line("status", status)
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{AuditError, AuditLog, AuditSink};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recorded audit call
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum AuditEntry {
        Section(String),
        Info(String),
        Error(String),
        Status(String),
    }

    #[derive(Default)]
    struct FakeAuditState {
        entries: Vec<AuditEntry>,
        opened: Vec<u64>,
        failing: bool,
    }

    /// Fake audit sink for testing.
    ///
    /// Doubles as its own [`AuditLog`]: every opened sink shares the same
    /// recording. Calls are recorded even while failing.
    #[derive(Clone, Default)]
    pub struct FakeAuditSink {
        inner: Arc<Mutex<FakeAuditState>>,
    }

    impl FakeAuditSink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make every subsequent call return an error
        pub fn set_failing(&self, failing: bool) {
            self.inner.lock().failing = failing;
        }

        pub fn entries(&self) -> Vec<AuditEntry> {
            self.inner.lock().entries.clone()
        }

        pub fn errors(&self) -> Vec<String> {
            self.inner
                .lock()
                .entries
                .iter()
                .filter_map(|e| match e {
                    AuditEntry::Error(text) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }

        pub fn error_count(&self) -> usize {
            self.errors().len()
        }

        pub fn statuses(&self) -> Vec<String> {
            self.inner
                .lock()
                .entries
                .iter()
                .filter_map(|e| match e {
                    AuditEntry::Status(text) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        }

        /// Bundle sequences passed to [`AuditLog::open`]
        pub fn opened(&self) -> Vec<u64> {
            self.inner.lock().opened.clone()
        }

        fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
            let mut state = self.inner.lock();
            state.entries.push(entry);
            if state.failing {
                return Err(AuditError::Unavailable("fake sink failing".to_string()));
            }
            Ok(())
        }
    }

    impl AuditSink for FakeAuditSink {
        fn create_section(&self, title: &str) -> Result<(), AuditError> {
            self.record(AuditEntry::Section(title.to_string()))
        }

        fn append_info(&self, text: &str) -> Result<(), AuditError> {
            self.record(AuditEntry::Info(text.to_string()))
        }

        fn append_error(&self, text: &str) -> Result<(), AuditError> {
            self.record(AuditEntry::Error(text.to_string()))
        }

        fn update_status(&self, status: &str) -> Result<(), AuditError> {
            self.record(AuditEntry::Status(status.to_string()))
        }
    }

    impl AuditLog for FakeAuditSink {
        type Sink = FakeAuditSink;

        fn open(&self, bundle_sequence: u64) -> FakeAuditSink {
            self.inner.lock().opened.push(bundle_sequence);
            self.clone()
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{AuditEntry, FakeAuditSink};

#[cfg(test)]
#[path = "audit_tests.rs"]
mod tests;
