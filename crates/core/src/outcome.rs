// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-phase results and the aggregated verdict of one sequence run.

use serde::{Deserialize, Serialize};

/// Phase of a step in which a terminal failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePhase {
    Download,
    Install,
    Run,
}

crate::simple_display! {
    FailurePhase {
        Download => "download",
        Install => "install",
        Run => "run",
    }
}

/// One terminal failure recorded by a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceError {
    /// Index of the failing step within the bundle
    pub step_index: usize,
    pub phase: FailurePhase,
    pub message: String,
    /// The runner could not execute the step, so no exit status exists
    #[serde(default)]
    pub crashed: bool,
}

/// Verdict of one bundle run.
///
/// Successful iff every step completed its run phase with exit status zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceOutcome {
    pub success: bool,
    #[serde(default)]
    pub errors: Vec<SequenceError>,
}

impl SequenceOutcome {
    pub fn succeeded() -> Self {
        Self { success: true, errors: Vec::new() }
    }

    pub fn failed(error: SequenceError) -> Self {
        Self { success: false, errors: vec![error] }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// First failure whose step never produced an exit status.
    pub fn crash(&self) -> Option<&SequenceError> {
        self.errors.iter().find(|e| e.crashed)
    }

    /// Phase of the first recorded failure, if any.
    pub fn failed_phase(&self) -> Option<FailurePhase> {
        self.errors.first().map(|e| e.phase)
    }
}

/// Result of installing a step's packages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    pub success: bool,
    pub detail: String,
}

impl InstallResult {
    pub fn installed(detail: impl Into<String>) -> Self {
        Self { success: true, detail: detail.into() }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self { success: false, detail: detail.into() }
    }
}

/// Result of running one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunResult {
    /// The step ran to completion and reported an exit status
    Exited { status: i32, output: String },
    /// The runner could not execute the step at all
    Crashed { error: String },
}

impl RunResult {
    pub fn exited(status: i32, output: impl Into<String>) -> Self {
        RunResult::Exited { status, output: output.into() }
    }

    pub fn crashed(error: impl Into<String>) -> Self {
        RunResult::Crashed { error: error.into() }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Exited { status: 0, .. })
    }

    pub fn exit_status(&self) -> Option<i32> {
        match self {
            RunResult::Exited { status, .. } => Some(*status),
            RunResult::Crashed { .. } => None,
        }
    }
}

#[cfg(test)]
#[path = "outcome_tests.rs"]
mod tests;
