// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hand-off point for the in-band shutdown signal.

/// Acts on a pending shutdown request when the queue dequeues the
/// shutdown signal.
///
/// The return value is informational; the queue drains and completes its
/// close regardless.
pub trait ShutdownProcessor: Clone + Send + Sync + 'static {
    fn process(&self) -> bool;
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::ShutdownProcessor;
    use bx_core::ShutdownLevel;
    use parking_lot::Mutex;
    use std::sync::Arc;

    type Hook = Arc<dyn Fn() -> bool + Send + Sync>;

    #[derive(Default)]
    struct FakeShutdownState {
        processed: usize,
        level: Option<ShutdownLevel>,
        hook: Option<Hook>,
    }

    /// Fake shutdown processor for testing
    #[derive(Clone, Default)]
    pub struct FakeShutdownProcessor {
        inner: Arc<Mutex<FakeShutdownState>>,
    }

    impl FakeShutdownProcessor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Record a pending request, escalating any earlier one
        pub fn submit(&self, level: ShutdownLevel) {
            let mut state = self.inner.lock();
            state.level = Some(state.level.map_or(level, |l| l.escalate(level)));
        }

        /// Run `hook` on each `process()` call; its result is returned.
        /// The hook runs outside the lock, so it may call back into the fake.
        pub fn on_process(&self, hook: impl Fn() -> bool + Send + Sync + 'static) {
            self.inner.lock().hook = Some(Arc::new(hook));
        }

        pub fn processed(&self) -> usize {
            self.inner.lock().processed
        }

        pub fn level(&self) -> Option<ShutdownLevel> {
            self.inner.lock().level
        }
    }

    impl ShutdownProcessor for FakeShutdownProcessor {
        fn process(&self) -> bool {
            let (hook, pending) = {
                let mut state = self.inner.lock();
                state.processed += 1;
                (state.hook.clone(), state.level.is_some())
            };
            match hook {
                Some(hook) => hook(),
                None => pending,
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeShutdownProcessor;
