// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the engine crate.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::downloader::RetryPolicy;
use crate::error::EngineError;

/// Resolve state directory: BX_STATE_DIR > XDG_STATE_HOME/bx > ~/.local/state/bx
pub fn state_dir() -> Result<PathBuf, EngineError> {
    if let Ok(dir) = std::env::var("BX_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("bx"));
    }
    let home = std::env::var("HOME").map_err(|_| EngineError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/bx"))
}

/// Delay before the first download retry
pub fn retry_period() -> Result<Option<Duration>, EngineError> {
    Ok(parse::<u64>("BX_RETRY_PERIOD_MS")?.map(Duration::from_millis))
}

/// Whether retry delays grow between attempts
pub fn use_backoff() -> Result<Option<bool>, EngineError> {
    parse("BX_USE_BACKOFF")
}

/// Retry delay growth; must be finite and greater than 1
pub fn backoff_factor() -> Result<Option<f64>, EngineError> {
    const VAR: &str = "BX_BACKOFF_FACTOR";
    match parse::<f64>(VAR)? {
        Some(factor) if !RetryPolicy::is_valid_factor(factor) => Err(EngineError::InvalidEnv {
            var: VAR,
            value: std::env::var(VAR).unwrap_or_default(),
        }),
        factor => Ok(factor),
    }
}

/// Attempt budget per remote attachment
pub fn max_attempts() -> Result<Option<u32>, EngineError> {
    parse("BX_MAX_ATTEMPTS")
}

fn parse<T: FromStr>(var: &'static str) -> Result<Option<T>, EngineError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| EngineError::InvalidEnv { var, value }),
        Err(_) => Ok(None),
    }
}
