// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the end-to-end specs

pub use bx_adapters::{
    AuditLog, CommandPackageInstaller, FakeAuditSink, FakeShutdownProcessor, FileAuditLog,
    HttpFetcher, ShellStepRunner,
};
pub use bx_core::{Attachment, Executable, ExecutableBundle, ScriptStep, SequenceOutcome, Work};
pub use bx_engine::{Adapters, BundleRunner, BundlesQueue, RetryPolicy, SequenceRunner};
pub use std::time::Duration;

use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory holding step working dirs, audit logs and local files.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a local attachment and return its `file://` URL
    pub fn local_file(&self, name: &str, content: &str) -> String {
        let path = self.path().join("files").join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        format!("file://{}", path.display())
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.path().join("audit")
    }

    /// Production collaborators with a recording audit sink
    pub fn runner(
        &self,
        audit: FakeAuditSink,
    ) -> SequenceRunner<HttpFetcher, CommandPackageInstaller, ShellStepRunner, FakeAuditSink> {
        self.runner_with(audit)
    }

    /// Production collaborators writing audit files under `audit_dir()`
    pub fn file_runner(
        &self,
    ) -> SequenceRunner<HttpFetcher, CommandPackageInstaller, ShellStepRunner, FileAuditLog> {
        self.runner_with(FileAuditLog::new(self.audit_dir()))
    }

    fn runner_with<A: AuditLog>(
        &self,
        audit: A,
    ) -> SequenceRunner<HttpFetcher, CommandPackageInstaller, ShellStepRunner, A> {
        let adapters = Adapters {
            fetcher: HttpFetcher::new(),
            installer: CommandPackageInstaller::default(),
            runner: ShellStepRunner::new(self.path().join("cache")),
            audit,
        };
        SequenceRunner::new(adapters, fast_retry())
    }
}

/// Two quick attempts so unreachable hosts fail fast
pub fn fast_retry() -> RetryPolicy {
    RetryPolicy::new(Duration::from_millis(10), true).max_attempts(2)
}

pub fn script(nickname: &str, source: &str) -> ScriptStep {
    ScriptStep {
        nickname: nickname.to_string(),
        source: source.to_string(),
        parameters: Default::default(),
        packages: None,
        attachments: Vec::new(),
    }
}

pub fn bundle(sequence: u64, steps: Vec<ScriptStep>) -> ExecutableBundle {
    ExecutableBundle::new(steps.into_iter().map(Executable::from).collect(), Vec::new(), sequence)
}
