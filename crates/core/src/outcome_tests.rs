// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    zero_exit    = { RunResult::exited(0, ""), true },
    nonzero_exit = { RunResult::exited(1, "boom"), false },
    signal_exit  = { RunResult::exited(-1, ""), false },
    crashed      = { RunResult::crashed("no such interpreter"), false },
)]
fn run_result_success(result: RunResult, expected: bool) {
    assert_eq!(result.is_success(), expected);
}

#[test]
fn crashed_run_has_no_exit_status() {
    assert_eq!(RunResult::crashed("x").exit_status(), None);
    assert_eq!(RunResult::exited(3, "").exit_status(), Some(3));
}

#[test]
fn failed_outcome_reports_first_phase() {
    let outcome = SequenceOutcome::failed(SequenceError {
        step_index: 2,
        phase: FailurePhase::Install,
        message: "bad spec".to_string(),
        crashed: false,
    });
    assert!(!outcome.is_success());
    assert_eq!(outcome.failed_phase(), Some(FailurePhase::Install));
    assert_eq!(SequenceOutcome::succeeded().failed_phase(), None);
    assert!(outcome.crash().is_none());
}

#[test]
fn crashed_step_is_flagged() {
    let outcome = SequenceOutcome::failed(SequenceError {
        step_index: 0,
        phase: FailurePhase::Run,
        message: "'setup' could not be run: no such interpreter".to_string(),
        crashed: true,
    });
    assert_eq!(outcome.crash().map(|e| e.step_index), Some(0));
}

#[test]
fn crashed_defaults_to_false_when_absent() {
    let error: SequenceError =
        serde_json::from_str(r#"{"step_index":1,"phase":"run","message":"exited with status 1"}"#).unwrap();
    assert!(!error.crashed);
}

#[test]
fn phase_display_is_lowercase() {
    assert_eq!(FailurePhase::Download.to_string(), "download");
    assert_eq!(FailurePhase::Run.to_string(), "run");
}

#[test]
fn phase_serializes_snake_case() {
    let json = serde_json::to_string(&FailurePhase::Install).unwrap();
    assert_eq!(json, "\"install\"");
}
