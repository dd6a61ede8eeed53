// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator wiring and the seam between the queue and sequences

use async_trait::async_trait;
use bx_adapters::{
    AuditLog, CommandPackageInstaller, FileAuditLog, HttpFetcher, PackageInstaller, RemoteFetcher,
    ShellStepRunner, StepRunner,
};
use bx_core::{ExecutableBundle, SequenceOutcome};

use crate::config::EngineConfig;
use crate::downloader::{Downloader, RetryPolicy};
use crate::sequence::ExecutableSequence;

/// External collaborators used by sequences
#[derive(Clone)]
pub struct Adapters<F, I, R, A> {
    pub fetcher: F,
    pub installer: I,
    pub runner: R,
    pub audit: A,
}

/// Adapters backed by the network, the host package manager and the shell
pub type ProductionAdapters =
    Adapters<HttpFetcher, CommandPackageInstaller, ShellStepRunner, FileAuditLog>;

impl ProductionAdapters {
    pub fn production(config: &EngineConfig) -> Self {
        let mut runner = ShellStepRunner::new(config.cache_dir());
        if let Some(argv) = &config.recipe_command {
            runner = runner.recipe_command(argv.clone());
        }
        Self {
            fetcher: HttpFetcher::new(),
            installer: CommandPackageInstaller::default(),
            runner,
            audit: FileAuditLog::new(config.audit_dir()),
        }
    }
}

/// Executes one bundle to completion.
///
/// The queue only depends on this trait, so tests can substitute runners
/// that never touch the sequence machinery.
#[async_trait]
pub trait BundleRunner: Clone + Send + Sync + 'static {
    async fn run_bundle(&self, bundle: ExecutableBundle) -> SequenceOutcome;
}

/// Runs each bundle through a fresh [`ExecutableSequence`].
#[derive(Clone)]
pub struct SequenceRunner<F, I, R, A> {
    adapters: Adapters<F, I, R, A>,
    policy: RetryPolicy,
}

impl<F, I, R, A> SequenceRunner<F, I, R, A>
where
    F: RemoteFetcher,
    I: PackageInstaller,
    R: StepRunner,
    A: AuditLog,
{
    pub fn new(adapters: Adapters<F, I, R, A>, policy: RetryPolicy) -> Self {
        Self { adapters, policy }
    }

    pub fn adapters(&self) -> &Adapters<F, I, R, A> {
        &self.adapters
    }

    /// Build the sequence for one bundle; its audit sink is opened here.
    pub fn sequence(&self, bundle: ExecutableBundle) -> ExecutableSequence<F, I, R, A::Sink> {
        let sink = self.adapters.audit.open(bundle.sequence());
        ExecutableSequence::new(
            bundle,
            Downloader::with_policy(self.adapters.fetcher.clone(), self.policy),
            self.adapters.installer.clone(),
            self.adapters.runner.clone(),
            sink,
        )
    }
}

impl SequenceRunner<HttpFetcher, CommandPackageInstaller, ShellStepRunner, FileAuditLog> {
    pub fn production(config: &EngineConfig) -> Self {
        Self::new(Adapters::production(config), config.retry)
    }
}

#[async_trait]
impl<F, I, R, A> BundleRunner for SequenceRunner<F, I, R, A>
where
    F: RemoteFetcher,
    I: PackageInstaller,
    R: StepRunner,
    A: AuditLog,
{
    async fn run_bundle(&self, bundle: ExecutableBundle) -> SequenceOutcome {
        self.sequence(bundle).run().await
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
