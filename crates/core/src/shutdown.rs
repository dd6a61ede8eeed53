// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shutdown levels requested by lifecycle actions.

use serde::{Deserialize, Serialize};

/// Severity of a requested shutdown. Later variants supersede earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownLevel {
    Reboot,
    Stop,
    Terminate,
}

crate::simple_display! {
    ShutdownLevel {
        Reboot => "reboot",
        Stop => "stop",
        Terminate => "terminate",
    }
}

impl ShutdownLevel {
    /// Combine two requests, keeping the most severe.
    pub fn escalate(self, other: ShutdownLevel) -> ShutdownLevel {
        self.max(other)
    }
}
