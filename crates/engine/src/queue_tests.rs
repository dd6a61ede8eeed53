// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use async_trait::async_trait;
use bx_adapters::FakeShutdownProcessor;
use bx_core::{FailurePhase, ScriptStep, SequenceError, ShutdownLevel};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct RunnerState {
    in_flight: usize,
    max_in_flight: usize,
    started: Vec<u64>,
    finished: Vec<u64>,
    failing: HashSet<u64>,
    crashing: HashSet<u64>,
    panicking: HashSet<u64>,
}

/// Bundle runner that takes one second per bundle and tracks overlap.
#[derive(Clone, Default)]
struct RecordingRunner {
    inner: Arc<Mutex<RunnerState>>,
}

impl RecordingRunner {
    fn fail(&self, sequence: u64) {
        self.inner.lock().failing.insert(sequence);
    }

    fn crash(&self, sequence: u64) {
        self.inner.lock().crashing.insert(sequence);
    }

    fn panic_on(&self, sequence: u64) {
        self.inner.lock().panicking.insert(sequence);
    }

    fn started(&self) -> Vec<u64> {
        self.inner.lock().started.clone()
    }

    fn finished(&self) -> Vec<u64> {
        self.inner.lock().finished.clone()
    }

    fn max_in_flight(&self) -> usize {
        self.inner.lock().max_in_flight
    }
}

#[async_trait]
impl BundleRunner for RecordingRunner {
    async fn run_bundle(&self, bundle: ExecutableBundle) -> SequenceOutcome {
        let sequence = bundle.sequence();
        {
            let mut state = self.inner.lock();
            state.in_flight += 1;
            state.max_in_flight = state.max_in_flight.max(state.in_flight);
            state.started.push(sequence);
        }
        tokio::time::sleep(Duration::from_secs(1)).await;

        let (fail, crash, panics) = {
            let mut state = self.inner.lock();
            state.in_flight -= 1;
            state.finished.push(sequence);
            (
                state.failing.contains(&sequence),
                state.crashing.contains(&sequence),
                state.panicking.contains(&sequence),
            )
        };
        if panics {
            panic!("runner blew up on bundle {}", sequence);
        }
        if crash {
            SequenceOutcome::failed(SequenceError {
                step_index: 0,
                phase: FailurePhase::Run,
                message: "'step' could not be run: interpreter missing".to_string(),
                crashed: true,
            })
        } else if fail {
            SequenceOutcome::failed(SequenceError {
                step_index: 0,
                phase: FailurePhase::Run,
                message: "exited with status 1".to_string(),
                crashed: false,
            })
        } else {
            SequenceOutcome::succeeded()
        }
    }
}

struct Harness {
    queue: BundlesQueue,
    runner: RecordingRunner,
    shutdown: FakeShutdownProcessor,
    fired: Arc<AtomicUsize>,
}

/// Honor `RUST_LOG` when debugging a test
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Harness {
    fn new() -> Self {
        init_tracing();
        let runner = RecordingRunner::default();
        let shutdown = FakeShutdownProcessor::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let queue = BundlesQueue::new(runner.clone(), shutdown.clone(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        Self { queue, runner, shutdown, fired }
    }

    fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }
}

fn bundle(sequence: u64) -> ExecutableBundle {
    ExecutableBundle::new(
        vec![ScriptStep::builder().nickname(format!("step-{}", sequence)).build().into()],
        vec![],
        sequence,
    )
}

#[tokio::test(start_paused = true)]
async fn push_before_activation_is_dropped() {
    let h = Harness::new();

    h.queue.push(bundle(1));
    h.queue.activate();
    h.queue.push(bundle(2));
    h.queue.close();
    h.queue.closed().await;

    assert_eq!(h.runner.started(), vec![2]);
}

#[tokio::test(start_paused = true)]
async fn one_bundle_in_flight_at_a_time() {
    let h = Harness::new();
    h.queue.activate();

    for sequence in 1..=5 {
        h.queue.push(bundle(sequence));
    }
    h.queue.close();
    h.queue.closed().await;

    assert_eq!(h.runner.max_in_flight(), 1);
    assert_eq!(h.runner.started(), vec![1, 2, 3, 4, 5]);
    assert_eq!(h.runner.finished(), vec![1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn continuation_fires_once_after_drain() {
    let runner = RecordingRunner::default();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let queue = {
        let runner = runner.clone();
        let observed = Arc::clone(&observed);
        BundlesQueue::new(runner.clone(), FakeShutdownProcessor::new(), move || {
            observed.lock().push(runner.finished().len());
        })
    };
    queue.activate();
    queue.push(bundle(1));
    queue.push(bundle(2));
    queue.push(bundle(3));

    queue.close();
    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.state, QueueState::Closing);
    assert_eq!(stats.running, Some(1));
    assert!(!queue.is_closed());

    queue.close();
    queue.closed().await;

    assert_eq!(*observed.lock(), vec![3]);
}

#[tokio::test]
async fn close_while_idle_fires_continuation() {
    let h = Harness::new();
    h.queue.activate();

    h.queue.close();
    h.queue.closed().await;

    assert_eq!(h.fired(), 1);
    assert!(h.runner.started().is_empty());
}

#[tokio::test]
async fn close_while_inactive_fires_continuation() {
    let h = Harness::new();

    h.queue.close();
    h.queue.closed().await;

    assert_eq!(h.fired(), 1);
}

#[tokio::test(start_paused = true)]
async fn push_after_close_is_dropped() {
    let h = Harness::new();
    h.queue.activate();
    h.queue.push(bundle(1));

    h.queue.close();
    h.queue.push(bundle(2));
    h.queue.activate();
    h.queue.push(bundle(3));
    h.queue.closed().await;

    assert_eq!(h.runner.started(), vec![1]);
    assert_eq!(h.fired(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_signal_is_processed_not_run() {
    let h = Harness::new();
    h.shutdown.submit(ShutdownLevel::Reboot);
    h.queue.activate();

    h.queue.push(bundle(1));
    h.queue.push(Work::Shutdown);
    h.queue.closed().await;

    assert_eq!(h.shutdown.processed(), 1);
    assert_eq!(h.runner.started(), vec![1]);
    assert_eq!(h.fired(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_signal_keeps_fifo_order() {
    let h = Harness::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    {
        let runner = h.runner.clone();
        let order = Arc::clone(&order);
        h.shutdown.on_process(move || {
            order.lock().push(runner.finished());
            true
        });
    }
    h.queue.activate();

    h.queue.push(bundle(1));
    h.queue.push(bundle(2));
    h.queue.push(Work::Shutdown);
    h.queue.closed().await;

    assert_eq!(*order.lock(), vec![vec![1, 2]]);
}

#[tokio::test(start_paused = true)]
async fn shutdown_result_does_not_affect_drain() {
    let h = Harness::new();
    h.shutdown.on_process(|| false);
    h.queue.activate();

    h.queue.push(Work::Shutdown);
    h.queue.closed().await;

    assert_eq!(h.fired(), 1);
}

#[tokio::test(start_paused = true)]
async fn push_from_shutdown_processor_is_dropped() {
    let h = Harness::new();
    {
        let handle = h.queue.handle();
        h.shutdown.on_process(move || {
            handle.push(bundle(99));
            true
        });
    }
    h.queue.activate();

    h.queue.push(Work::Shutdown);
    h.queue.closed().await;
    // Round-trip through the loop so the late push has been handled
    let stats = h.queue.stats().await.unwrap();

    assert_eq!(stats.backlog, 0);
    assert!(h.runner.started().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_bundle_does_not_block_the_next() {
    let h = Harness::new();
    h.runner.fail(2);
    h.queue.activate();

    for sequence in 1..=3 {
        h.queue.push(bundle(sequence));
    }
    h.queue.close();
    h.queue.closed().await;

    assert_eq!(h.runner.finished(), vec![1, 2, 3]);
    let stats = h.queue.stats().await.unwrap();
    assert_eq!((stats.succeeded, stats.failed), (2, 1));
}

#[tokio::test(start_paused = true)]
async fn panicking_runner_counts_as_failure() {
    let h = Harness::new();
    h.runner.panic_on(1);
    h.queue.activate();

    h.queue.push(bundle(1));
    h.queue.push(bundle(2));
    h.queue.close();
    h.queue.closed().await;

    assert_eq!(h.runner.started(), vec![1, 2]);
    let stats = h.queue.stats().await.unwrap();
    assert_eq!((stats.succeeded, stats.failed), (1, 1));
    assert_eq!(stats.exceptions.total("sequence"), 1);
    let recent = stats.exceptions.recent("sequence");
    assert_eq!(recent[0].kind, "panic");
    assert_eq!(recent[0].message, "runner blew up on bundle 1");
}

#[tokio::test(start_paused = true)]
async fn crashed_step_is_tracked_as_exception() {
    let h = Harness::new();
    h.runner.crash(1);
    h.runner.crash(2);
    h.runner.fail(3);
    h.queue.activate();

    for sequence in 1..=3 {
        h.queue.push(bundle(sequence));
    }
    h.queue.close();
    h.queue.closed().await;

    let stats = h.queue.stats().await.unwrap();
    assert_eq!(stats.failed, 3);
    assert_eq!(stats.exceptions.total("step"), 2);
    assert_eq!(stats.exceptions.total("sequence"), 0);
    let recent = stats.exceptions.recent("step");
    assert_eq!(recent.len(), 1, "identical crashes collapse");
    assert_eq!(recent[0].count, 2);
}

#[tokio::test(start_paused = true)]
async fn redelivered_bundle_is_dropped() {
    let h = Harness::new();
    h.queue.activate();

    h.queue.push(bundle(1));
    h.queue.push(bundle(1));
    h.queue.push(bundle(2));
    h.queue.close();
    h.queue.closed().await;

    assert_eq!(h.runner.started(), vec![1, 2]);
}

#[tokio::test(start_paused = true)]
async fn activate_is_idempotent() {
    let h = Harness::new();
    h.queue.activate();
    h.queue.push(bundle(1));
    h.queue.activate();

    h.queue.close();
    h.queue.closed().await;

    assert_eq!(h.runner.started(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn stats_track_activity() {
    let h = Harness::new();
    let before = h.queue.stats().await.unwrap();
    assert_eq!(before.state, QueueState::Inactive);
    assert_eq!(before.last, None);

    h.queue.activate();
    h.queue.push(bundle(1));
    h.queue.push(bundle(2));
    let busy = h.queue.stats().await.unwrap();
    assert_eq!(busy.running, Some(1));
    assert_eq!(busy.backlog, 1);

    h.queue.close();
    h.queue.closed().await;

    let after = h.queue.stats().await.unwrap();
    assert_eq!(after.running, None);
    assert_eq!(after.activity.total(), 2);
    assert_eq!(after.activity.count("bundle"), 2);
    assert!(after.last.is_some());
}
