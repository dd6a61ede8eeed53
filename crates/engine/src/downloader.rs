// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attachment downloader with bounded retries.
//!
//! Local references (`file://` URLs and bare absolute paths) are read once;
//! a failure is terminal. Remote URLs go through a [`RemoteFetcher`] and
//! transient failures are retried after `retry_period`, multiplied by
//! `backoff_factor` for each further retry when backoff is enabled.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bx_adapters::{FetchError, RemoteFetcher};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Retry schedule for remote attachments
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay before the first retry
    pub retry_period: Duration,
    pub use_backoff: bool,
    /// Growth of the delay per retry; finite and greater than 1
    backoff_factor: f64,
    /// Total attempts, including the first
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_period: Duration::from_secs(10),
            use_backoff: true,
            backoff_factor: 2.0,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    pub fn new(retry_period: Duration, use_backoff: bool) -> Self {
        Self { retry_period, use_backoff, ..Self::default() }
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the backoff growth factor. Factors that would not grow the delay
    /// are ignored and the current one kept.
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        if Self::is_valid_factor(factor) {
            self.backoff_factor = factor;
        } else {
            tracing::warn!(factor, kept = self.backoff_factor, "ignoring invalid backoff factor");
        }
        self
    }

    pub fn factor(&self) -> f64 {
        self.backoff_factor
    }

    pub fn is_valid_factor(factor: f64) -> bool {
        factor.is_finite() && factor > 1.0
    }

    /// Delay after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        if !self.use_backoff {
            return self.retry_period;
        }
        let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.retry_period.as_secs_f64() * self.backoff_factor.powi(exp);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

/// Terminal download failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    #[error("cannot read {}: {message}", .path.display())]
    LocalFile { path: PathBuf, message: String },
    #[error("unsupported attachment location '{0}'")]
    UnsupportedUrl(String),
    #[error(transparent)]
    Remote(#[from] FetchError),
}

/// Outcome of fetching one attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadResult {
    Fetched { payload: Arc<[u8]>, attempts: u32 },
    /// Retries exhausted or a non-retryable error; carries the last error
    Failed { error: DownloadError, attempts: u32 },
    /// Abandoned because the owning step was aborted; not reported on its own
    Cancelled { attempts: u32 },
}

impl DownloadResult {
    pub fn attempts(&self) -> u32 {
        match self {
            DownloadResult::Fetched { attempts, .. }
            | DownloadResult::Failed { attempts, .. }
            | DownloadResult::Cancelled { attempts } => *attempts,
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, DownloadResult::Fetched { .. })
    }
}

enum Location {
    Local(PathBuf),
    Remote,
}

fn locate(url: &str) -> Result<Location, DownloadError> {
    match url::Url::parse(url) {
        Ok(parsed) => match parsed.scheme() {
            "file" => parsed
                .to_file_path()
                .map(Location::Local)
                .map_err(|_| DownloadError::UnsupportedUrl(url.to_string())),
            "http" | "https" => Ok(Location::Remote),
            _ => Err(DownloadError::UnsupportedUrl(url.to_string())),
        },
        Err(url::ParseError::RelativeUrlWithoutBase) if url.starts_with('/') => {
            Ok(Location::Local(PathBuf::from(url)))
        }
        Err(_) => Err(DownloadError::UnsupportedUrl(url.to_string())),
    }
}

/// Fetches attachment payloads.
#[derive(Clone)]
pub struct Downloader<F> {
    fetcher: F,
    policy: RetryPolicy,
}

impl<F: RemoteFetcher> Downloader<F> {
    pub fn new(fetcher: F, retry_period: Duration, use_backoff: bool) -> Self {
        Self::with_policy(fetcher, RetryPolicy::new(retry_period, use_backoff))
    }

    pub fn with_policy(fetcher: F, policy: RetryPolicy) -> Self {
        Self { fetcher, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Fetch the payload behind `url`, retrying transient remote failures.
    ///
    /// Cancelling `cancel` abandons the fetch at the next attempt or backoff
    /// boundary and yields [`DownloadResult::Cancelled`].
    pub async fn fetch(&self, url: &str, cancel: &CancellationToken) -> DownloadResult {
        match locate(url) {
            Ok(Location::Local(path)) => match tokio::fs::read(&path).await {
                Ok(bytes) => DownloadResult::Fetched { payload: bytes.into(), attempts: 1 },
                Err(e) => DownloadResult::Failed {
                    error: DownloadError::LocalFile { path, message: e.to_string() },
                    attempts: 1,
                },
            },
            Ok(Location::Remote) => self.fetch_remote(url, cancel).await,
            Err(error) => DownloadResult::Failed { error, attempts: 0 },
        }
    }

    async fn fetch_remote(&self, url: &str, cancel: &CancellationToken) -> DownloadResult {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempts = 0;
        loop {
            if cancel.is_cancelled() {
                return DownloadResult::Cancelled { attempts };
            }
            attempts += 1;

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return DownloadResult::Cancelled { attempts },
                result = self.fetcher.fetch(url) => result,
            };

            let error = match result {
                Ok(bytes) => {
                    tracing::debug!(url, attempts, bytes = bytes.len(), "downloaded attachment");
                    return DownloadResult::Fetched { payload: bytes.into(), attempts };
                }
                Err(e) => e,
            };

            if !error.is_transient() || attempts >= max_attempts {
                tracing::warn!(url, attempts, error = %error, "download failed");
                return DownloadResult::Failed { error: error.into(), attempts };
            }

            let delay = self.policy.delay(attempts);
            tracing::info!(
                url,
                attempt = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "download attempt failed, retrying"
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return DownloadResult::Cancelled { attempts },
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "downloader_tests.rs"]
mod tests;
