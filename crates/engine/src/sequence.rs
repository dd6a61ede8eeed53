// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution of one bundle.
//!
//! Each step moves through `Resolving -> Installing -> Running` and ends in
//! `Done` or `Failed`. The first failed step ends the whole bundle: later
//! steps may rely on side effects of earlier ones.
//!
//! Audit errors per failure:
//! - download: failure detail, abort notice
//! - install: failure detail, abort notice
//! - run: output or runner error, exit status line, abort notice

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bx_adapters::{AuditSink, PackageInstaller, RemoteFetcher, ResolvedAttachment, StepRunner};
use bx_core::{
    format_elapsed, Attachment, Executable, ExecutableBundle, FailurePhase, RunResult,
    SequenceError, SequenceOutcome,
};
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::downloader::{DownloadResult, Downloader};

enum Phase {
    Resolving,
    Installing(Vec<ResolvedAttachment>),
    Running(Vec<ResolvedAttachment>),
    Done,
    Failed(StepFailure),
}

/// Terminal failure of a step, with the audit errors it reports
#[derive(Debug)]
struct StepFailure {
    phase: FailurePhase,
    message: String,
    reports: Vec<String>,
    crashed: bool,
}

/// Runs the steps of one bundle in order, auditing every phase.
pub struct ExecutableSequence<F, I, R, S> {
    bundle: ExecutableBundle,
    downloader: Downloader<F>,
    installer: I,
    runner: R,
    audit: S,
    /// Payloads fetched during this run, by URL
    cache: HashMap<String, Arc<[u8]>>,
}

impl<F, I, R, S> ExecutableSequence<F, I, R, S>
where
    F: RemoteFetcher,
    I: PackageInstaller,
    R: StepRunner,
    S: AuditSink,
{
    pub fn new(
        bundle: ExecutableBundle,
        downloader: Downloader<F>,
        installer: I,
        runner: R,
        audit: S,
    ) -> Self {
        Self { bundle, downloader, installer, runner, audit, cache: HashMap::new() }
    }

    pub fn bundle(&self) -> &ExecutableBundle {
        &self.bundle
    }

    /// Run every step; `success` is true iff all of them exited zero.
    pub async fn run(mut self) -> SequenceOutcome {
        let sequence = self.bundle.sequence();
        let steps = self.bundle.executables().to_vec();
        let started = Instant::now();
        tracing::info!(bundle = sequence, steps = steps.len(), summary = %self.bundle.summary(), "sequence started");

        for (index, step) in steps.iter().enumerate() {
            let step_started = Instant::now();
            self.section(&format!("{} '{}'", step.kind(), step.nickname()));

            if let Err(failure) = self.run_step(step).await {
                return self.abort(index, step, failure);
            }

            self.status(&format!(
                "step {}/{} '{}' completed in {}",
                index + 1,
                steps.len(),
                step.nickname(),
                format_elapsed(step_started.elapsed())
            ));
        }

        let elapsed = started.elapsed();
        tracing::info!(bundle = sequence, elapsed_ms = elapsed.as_millis() as u64, "sequence completed");
        self.status(&format!("completed: {} step(s) in {}", steps.len(), format_elapsed(elapsed)));
        SequenceOutcome::succeeded()
    }

    async fn run_step(&mut self, step: &Executable) -> Result<(), StepFailure> {
        let mut phase = Phase::Resolving;
        loop {
            phase = match phase {
                Phase::Resolving => match self.resolve(step).await {
                    Ok(resolved) => Phase::Installing(resolved),
                    Err(failure) => Phase::Failed(failure),
                },
                Phase::Installing(resolved) => match self.install(step).await {
                    Ok(()) => Phase::Running(resolved),
                    Err(failure) => Phase::Failed(failure),
                },
                Phase::Running(resolved) => match self.execute(step, resolved).await {
                    Ok(()) => Phase::Done,
                    Err(failure) => Phase::Failed(failure),
                },
                Phase::Done => return Ok(()),
                Phase::Failed(failure) => return Err(failure),
            };
        }
    }

    /// Fetch the step's attachments plus the bundle-wide ones.
    ///
    /// Uncached URLs are fetched concurrently. The first failure cancels
    /// the remaining fetches; cancelled fetches are not reported.
    async fn resolve(&mut self, step: &Executable) -> Result<Vec<ResolvedAttachment>, StepFailure> {
        let wanted: Vec<Attachment> =
            step.attachments().iter().chain(self.bundle.attachments()).cloned().collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let pending: Vec<&Attachment> = {
            let mut seen = HashSet::new();
            wanted
                .iter()
                .filter(|&a| !self.cache.contains_key(&a.url) && seen.insert(a.url.as_str()))
                .collect()
        };

        if !pending.is_empty() {
            let cancel = CancellationToken::new();
            let downloader = &self.downloader;
            let mut fetches: FuturesUnordered<_> = pending
                .into_iter()
                .map(|attachment| {
                    let cancel = &cancel;
                    async move { (attachment, downloader.fetch(&attachment.url, cancel).await) }
                })
                .collect();

            let mut fetched = Vec::new();
            let mut failure = None;
            while let Some((attachment, result)) = fetches.next().await {
                match result {
                    DownloadResult::Fetched { payload, .. } => {
                        fetched.push((attachment.url.clone(), payload));
                    }
                    DownloadResult::Failed { error, attempts } => {
                        if failure.is_none() {
                            cancel.cancel();
                            let detail = format!(
                                "Failed to download attachment '{}' from {} after {} attempt(s): {}",
                                attachment.file_name, attachment.url, attempts, error
                            );
                            failure = Some(StepFailure {
                                phase: FailurePhase::Download,
                                message: detail.clone(),
                                reports: vec![detail],
                                crashed: false,
                            });
                        }
                    }
                    DownloadResult::Cancelled { attempts } => {
                        tracing::debug!(url = %attachment.url, attempts, "download cancelled");
                    }
                }
            }
            drop(fetches);

            self.cache.extend(fetched);
            if let Some(failure) = failure {
                return Err(failure);
            }
        }

        let resolved: Vec<ResolvedAttachment> = wanted
            .into_iter()
            .filter_map(|a| {
                let payload = self.cache.get(&a.url)?.clone();
                Some(ResolvedAttachment { file_name: a.file_name, url: a.url, payload })
            })
            .collect();
        self.info(&format!(
            "Resolved {} attachment(s) in {}",
            resolved.len(),
            format_elapsed(started.elapsed())
        ));
        Ok(resolved)
    }

    async fn install(&mut self, step: &Executable) -> Result<(), StepFailure> {
        let Some(spec) = step.packages() else {
            return Ok(());
        };

        let started = Instant::now();
        self.info(&format!("Installing packages: {}", spec));
        let result = self.installer.install(spec).await;
        if !result.success {
            let detail = format!(
                "Failed to install packages '{}' for '{}': {}",
                spec,
                step.nickname(),
                result.detail
            );
            return Err(StepFailure {
                phase: FailurePhase::Install,
                message: detail.clone(),
                reports: vec![detail],
                crashed: false,
            });
        }

        if !result.detail.trim().is_empty() {
            self.info(result.detail.trim_end());
        }
        self.info(&format!("Installed packages in {}", format_elapsed(started.elapsed())));
        Ok(())
    }

    /// Run the step on its own task so the caller's loop keeps turning.
    async fn execute(
        &mut self,
        step: &Executable,
        resolved: Vec<ResolvedAttachment>,
    ) -> Result<(), StepFailure> {
        let started = Instant::now();
        self.info(&format!("Running {} '{}'", step.kind(), step.nickname()));

        let runner = self.runner.clone();
        let owned = step.clone();
        let handle = tokio::spawn(async move {
            let parameters = owned.parameters().clone();
            runner.run(&owned, &resolved, &parameters).await
        });
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => RunResult::crashed(format!("step task failed: {}", e)),
        };
        let elapsed = format_elapsed(started.elapsed());

        match result {
            RunResult::Exited { status: 0, output } => {
                if !output.is_empty() {
                    self.info(&output);
                }
                self.info(&format!("'{}' exited with status 0 after {}", step.nickname(), elapsed));
                Ok(())
            }
            RunResult::Exited { status, output } => {
                let detail = if output.trim().is_empty() {
                    format!("'{}' produced no output", step.nickname())
                } else {
                    format!("'{}' output:\n{}", step.nickname(), output.trim_end())
                };
                let message = format!("'{}' exited with status {} after {}", step.nickname(), status, elapsed);
                Err(StepFailure {
                    phase: FailurePhase::Run,
                    message: message.clone(),
                    reports: vec![detail, message],
                    crashed: false,
                })
            }
            RunResult::Crashed { error } => {
                let message = format!("'{}' could not be run: {}", step.nickname(), error);
                Err(StepFailure {
                    phase: FailurePhase::Run,
                    message: message.clone(),
                    reports: vec![message, format!("'{}' reported no exit status", step.nickname())],
                    crashed: true,
                })
            }
        }
    }

    fn abort(&self, index: usize, step: &Executable, failure: StepFailure) -> SequenceOutcome {
        let sequence = self.bundle.sequence();
        tracing::error!(
            bundle = sequence,
            step = index,
            nickname = step.nickname(),
            phase = %failure.phase,
            error = %failure.message,
            "sequence aborted"
        );

        for report in &failure.reports {
            self.error(report);
        }
        self.error(&format!(
            "Aborting bundle {}: {} '{}' failed during {}",
            sequence,
            step.kind(),
            step.nickname(),
            failure.phase
        ));
        self.status(&format!("failed: step {} '{}' ({})", index + 1, step.nickname(), failure.phase));

        SequenceOutcome::failed(SequenceError {
            step_index: index,
            phase: failure.phase,
            message: failure.message,
            crashed: failure.crashed,
        })
    }

    // Audit writes are best effort; a failing sink never stops the bundle.

    fn section(&self, title: &str) {
        if let Err(e) = self.audit.create_section(title) {
            tracing::warn!(bundle = self.bundle.sequence(), error = %e, "audit section failed");
        }
    }

    fn info(&self, text: &str) {
        if let Err(e) = self.audit.append_info(text) {
            tracing::warn!(bundle = self.bundle.sequence(), error = %e, "audit info failed");
        }
    }

    fn error(&self, text: &str) {
        if let Err(e) = self.audit.append_error(text) {
            tracing::warn!(bundle = self.bundle.sequence(), error = %e, "audit error failed");
        }
    }

    fn status(&self, text: &str) {
        if let Err(e) = self.audit.update_status(text) {
            tracing::warn!(bundle = self.bundle.sequence(), error = %e, "audit status failed");
        }
    }
}

#[cfg(test)]
#[path = "sequence_tests.rs"]
mod tests;
