// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-readable durations for audit lines.

use std::time::Duration;

/// Format a duration as `"850ms"`, `"12.4s"`, `"3m 07s"` or `"2h 05m"`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let ms = elapsed.as_millis();
    if ms < 1_000 {
        return format!("{}ms", ms);
    }
    let secs = elapsed.as_secs();
    if secs < 60 {
        return format!("{:.1}s", elapsed.as_secs_f64());
    }
    if secs < 3_600 {
        return format!("{}m {:02}s", secs / 60, secs % 60);
    }
    format!("{}h {:02}m", secs / 3_600, (secs % 3_600) / 60)
}

#[cfg(test)]
#[path = "time_fmt_tests.rs"]
mod tests;
