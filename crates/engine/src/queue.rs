// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-worker bundle queue.
//!
//! All queue state lives in one loop task. Handles send it commands; the
//! task running a sequence reports back with a `Finished` command, so the
//! backlog and the in-flight slot are only ever touched by the loop.
//!
//! ```text
//! Inactive --activate--> Active --close / shutdown--> Closing --drained--> continuation
//! ```

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use bx_adapters::ShutdownProcessor;
use bx_core::{ActivityStats, ExceptionStats, ExecutableBundle, SequenceOutcome, Work};
use futures_util::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::runner::BundleRunner;

/// Lifecycle of a queue. There is no way back to `Active` from `Closing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Inactive,
    Active,
    Closing,
}

bx_core::simple_display! {
    QueueState {
        Inactive => "inactive",
        Active => "active",
        Closing => "closing",
    }
}

/// Snapshot of queue state and activity
#[derive(Debug, Clone)]
pub struct QueueStats {
    pub state: QueueState,
    pub backlog: usize,
    /// Sequence index of the bundle in flight
    pub running: Option<u64>,
    pub succeeded: u64,
    pub failed: u64,
    /// Time since the last bundle or shutdown signal started
    pub last: Option<Duration>,
    pub activity: ActivityStats,
    /// Sequence panics and steps the runner could not execute
    pub exceptions: ExceptionStats,
}

enum Slot {
    Idle,
    Running { sequence: u64, started: Instant },
}

enum Command {
    Activate,
    Push(Work),
    Close,
    /// `panic` carries the payload message when the sequence panicked
    Finished { sequence: u64, outcome: SequenceOutcome, panic: Option<String> },
    Stats(oneshot::Sender<QueueStats>),
}

/// Cloneable handle for submitting work to a [`BundlesQueue`].
///
/// Commands are applied in the order they are sent.
#[derive(Clone)]
pub struct QueueHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl QueueHandle {
    /// Start accepting work; a no-op unless the queue is inactive.
    pub fn activate(&self) {
        self.send(Command::Activate);
    }

    /// Queue a bundle or the shutdown signal. Dropped unless the queue is active.
    pub fn push(&self, work: impl Into<Work>) {
        self.send(Command::Push(work.into()));
    }

    /// Stop accepting work and fire the continuation once drained.
    pub fn close(&self) {
        self.send(Command::Close);
    }

    pub async fn stats(&self) -> Result<QueueStats, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(Command::Stats(tx)).map_err(|_| EngineError::QueueClosed)?;
        rx.await.map_err(|_| EngineError::QueueClosed)
    }

    fn send(&self, command: Command) {
        if self.tx.send(command).is_err() {
            tracing::debug!("bundles queue loop has exited, command ignored");
        }
    }
}

/// Serializes bundles onto one worker slot.
///
/// Dropping every handle stops the loop once the bundle in flight reports
/// back; backlogged bundles are then abandoned.
pub struct BundlesQueue {
    handle: QueueHandle,
    drained: CancellationToken,
}

impl BundlesQueue {
    /// Create an inactive queue. Must be called within a tokio runtime.
    ///
    /// `continuation` runs exactly once, after a close has fully drained.
    pub fn new<B, P>(runner: B, shutdown: P, continuation: impl FnOnce() + Send + 'static) -> Self
    where
        B: BundleRunner,
        P: ShutdownProcessor,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let drained = CancellationToken::new();
        let queue_loop = QueueLoop {
            runner,
            shutdown,
            state: QueueState::Inactive,
            slot: Slot::Idle,
            backlog: VecDeque::new(),
            seen: HashSet::new(),
            continuation: Some(Box::new(continuation)),
            drained: drained.clone(),
            tx: tx.downgrade(),
            activity: ActivityStats::new(Instant::now(), true),
            exceptions: ExceptionStats::new(),
            succeeded: 0,
            failed: 0,
        };
        tokio::spawn(queue_loop.run(rx));
        Self { handle: QueueHandle { tx }, drained }
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    pub fn activate(&self) {
        self.handle.activate();
    }

    pub fn push(&self, work: impl Into<Work>) {
        self.handle.push(work);
    }

    pub fn close(&self) {
        self.handle.close();
    }

    pub async fn stats(&self) -> Result<QueueStats, EngineError> {
        self.handle.stats().await
    }

    /// Resolves once the continuation has fired.
    pub async fn closed(&self) {
        self.drained.cancelled().await;
    }

    pub fn is_closed(&self) -> bool {
        self.drained.is_cancelled()
    }
}

struct QueueLoop<B, P> {
    runner: B,
    shutdown: P,
    state: QueueState,
    slot: Slot,
    backlog: VecDeque<Work>,
    /// Sequence indexes of every bundle ever accepted
    seen: HashSet<u64>,
    continuation: Option<Box<dyn FnOnce() + Send>>,
    drained: CancellationToken,
    /// Weak, so the loop ends once every handle is gone
    tx: mpsc::WeakUnboundedSender<Command>,
    activity: ActivityStats,
    exceptions: ExceptionStats,
    succeeded: u64,
    failed: u64,
}

impl<B: BundleRunner, P: ShutdownProcessor> QueueLoop<B, P> {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = rx.recv().await {
            match command {
                Command::Activate => self.activate(),
                Command::Push(work) => self.push(work),
                Command::Close => self.close(),
                Command::Finished { sequence, outcome, panic } => {
                    self.finished(sequence, outcome, panic)
                }
                Command::Stats(reply) => {
                    let _ = reply.send(self.stats());
                }
            }
        }
        tracing::debug!(state = %self.state, "bundles queue loop exiting");
    }

    fn activate(&mut self) {
        if self.state != QueueState::Inactive {
            tracing::debug!(state = %self.state, "activate ignored");
            return;
        }
        self.state = QueueState::Active;
        tracing::info!(backlog = self.backlog.len(), "bundles queue active");
        self.pump();
    }

    fn push(&mut self, work: Work) {
        if self.state != QueueState::Active {
            match &work {
                Work::Bundle(bundle) => tracing::info!(
                    bundle = bundle.sequence(),
                    state = %self.state,
                    "dropping bundle pushed while not active"
                ),
                Work::Shutdown => {
                    tracing::info!(state = %self.state, "dropping shutdown pushed while not active")
                }
            }
            return;
        }
        if let Work::Bundle(bundle) = &work {
            if !self.seen.insert(bundle.sequence()) {
                tracing::warn!(bundle = bundle.sequence(), "dropping re-delivered bundle");
                return;
            }
        }
        self.backlog.push_back(work);
        self.pump();
    }

    fn close(&mut self) {
        if self.state == QueueState::Closing {
            tracing::debug!("close ignored, already closing");
            return;
        }
        self.state = QueueState::Closing;
        tracing::info!(backlog = self.backlog.len(), "bundles queue closing");
        self.maybe_drained();
    }

    fn finished(&mut self, sequence: u64, outcome: SequenceOutcome, panic: Option<String>) {
        let started = match self.slot {
            Slot::Running { sequence: running, started } if running == sequence => started,
            _ => {
                tracing::warn!(bundle = sequence, "completion for a bundle that is not in flight");
                return;
            }
        };
        self.slot = Slot::Idle;
        let now = Instant::now();
        self.activity.finish(now, Some(started));
        if let Some(message) = panic {
            self.exceptions.track(now, "sequence", "panic", &message);
        }
        if let Some(crash) = outcome.crash() {
            self.exceptions.track(now, "step", "crash", &crash.message);
        }
        if outcome.is_success() {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        tracing::info!(
            bundle = sequence,
            success = outcome.is_success(),
            elapsed_ms = now.duration_since(started).as_millis() as u64,
            "bundle finished"
        );
        self.pump();
    }

    /// Start queued work while the slot is free, then check for drain.
    fn pump(&mut self) {
        while matches!(self.slot, Slot::Idle) && self.state != QueueState::Inactive {
            let Some(work) = self.backlog.pop_front() else {
                break;
            };
            match work {
                Work::Bundle(bundle) => self.start(bundle),
                Work::Shutdown => self.shutdown_signal(),
            }
        }
        self.maybe_drained();
    }

    fn start(&mut self, bundle: ExecutableBundle) {
        let Some(tx) = self.tx.upgrade() else {
            tracing::warn!(bundle = bundle.sequence(), "no queue handles left, not starting bundle");
            return;
        };
        let sequence = bundle.sequence();
        let started = self.activity.update(Instant::now(), Some("bundle"));
        self.slot = Slot::Running { sequence, started };
        tracing::info!(bundle = sequence, steps = bundle.executables().len(), "starting bundle");

        let runner = self.runner.clone();
        tokio::spawn(async move {
            let (outcome, panic) =
                match AssertUnwindSafe(runner.run_bundle(bundle)).catch_unwind().await {
                    Ok(outcome) => (outcome, None),
                    Err(payload) => {
                        let message = panic_message(&*payload);
                        tracing::error!(bundle = sequence, error = %message, "sequence panicked");
                        (SequenceOutcome::default(), Some(message))
                    }
                };
            if tx.send(Command::Finished { sequence, outcome, panic }).is_err() {
                tracing::debug!(bundle = sequence, "queue gone before bundle finished");
            }
        });
    }

    fn shutdown_signal(&mut self) {
        self.activity.update(Instant::now(), Some("shutdown"));
        let accepted = self.shutdown.process();
        tracing::info!(accepted, "shutdown signal processed");
        if self.state == QueueState::Active {
            self.state = QueueState::Closing;
            tracing::info!(backlog = self.backlog.len(), "bundles queue closing");
        }
    }

    fn maybe_drained(&mut self) {
        if self.state != QueueState::Closing
            || !matches!(self.slot, Slot::Idle)
            || !self.backlog.is_empty()
        {
            return;
        }
        if let Some(continuation) = self.continuation.take() {
            tracing::info!(succeeded = self.succeeded, failed = self.failed, "bundles queue drained");
            continuation();
            self.drained.cancel();
        }
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            state: self.state,
            backlog: self.backlog.len(),
            running: match self.slot {
                Slot::Running { sequence, .. } => Some(sequence),
                Slot::Idle => None,
            },
            succeeded: self.succeeded,
            failed: self.failed,
            last: self.activity.last(Instant::now()),
            activity: self.activity.clone(),
            exceptions: self.exceptions.clone(),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
