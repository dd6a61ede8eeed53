// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Items accepted by the bundles queue.

use crate::bundle::ExecutableBundle;

/// Unit of queued work: an ordinary bundle or the in-band shutdown signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Work {
    Bundle(ExecutableBundle),
    /// Begin orderly shutdown once everything ahead of it has run
    Shutdown,
}

impl Work {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, Work::Shutdown)
    }
}

impl From<ExecutableBundle> for Work {
    fn from(bundle: ExecutableBundle) -> Self {
        Work::Bundle(bundle)
    }
}
