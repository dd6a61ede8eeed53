// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::downloader::RetryPolicy;
use crate::env;
use crate::error::EngineError;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root state directory (e.g. ~/.local/state/bx)
    pub state_dir: PathBuf,
    /// Download retry policy for remote attachments
    pub retry: RetryPolicy,
    /// Command that runs recipes; the recipe name is appended
    pub recipe_command: Option<Vec<String>>,
}

impl EngineConfig {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self { state_dir: state_dir.into(), retry: RetryPolicy::default(), recipe_command: None }
    }

    /// Load configuration from `BX_*` environment variables over defaults.
    pub fn from_env() -> Result<Self, EngineError> {
        let mut config = Self::new(env::state_dir()?);
        if let Some(period) = env::retry_period()? {
            config.retry.retry_period = period;
        }
        if let Some(backoff) = env::use_backoff()? {
            config.retry.use_backoff = backoff;
        }
        if let Some(factor) = env::backoff_factor()? {
            config.retry = config.retry.backoff_factor(factor);
        }
        if let Some(max) = env::max_attempts()? {
            config.retry.max_attempts = max.max(1);
        }
        Ok(config)
    }

    /// Per-step working directories with materialized attachments
    pub fn cache_dir(&self) -> PathBuf {
        self.state_dir.join("cache")
    }

    /// Per-bundle audit logs
    pub fn audit_dir(&self) -> PathBuf {
        self.state_dir.join("audit")
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn retry_period(mut self, period: Duration) -> Self {
        self.retry.retry_period = period;
        self
    }

    pub fn use_backoff(mut self, use_backoff: bool) -> Self {
        self.retry.use_backoff = use_backoff;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.retry.max_attempts = max_attempts.max(1);
        self
    }

    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.retry = self.retry.backoff_factor(factor);
        self
    }

    pub fn recipe_command(mut self, argv: Vec<String>) -> Self {
        self.recipe_command = Some(argv);
        self
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
