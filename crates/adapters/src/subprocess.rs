// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process execution with captured output.

use std::process::Stdio;
use tokio::process::Command;

/// Exit status and combined output of a finished child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Exit code; `-1` when the process was killed by a signal
    pub status: i32,
    /// stdout followed by stderr, lossily decoded
    pub output: String,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Run `cmd` to completion, capturing stdout and stderr.
///
/// The child's stdin is closed. The child is killed if the returned future
/// is dropped.
pub async fn run_captured(mut cmd: Command) -> std::io::Result<CapturedOutput> {
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped()).kill_on_drop(true);
    let out = cmd.output().await?;

    let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&out.stderr);
    if !stderr.is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&stderr);
    }

    Ok(CapturedOutput { status: out.status.code().unwrap_or(-1), output })
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
