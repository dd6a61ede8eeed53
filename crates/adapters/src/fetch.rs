// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-attempt transport for remote attachments. Retries live in the
//! engine's downloader.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Errors from one fetch attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Worth retrying: connection problems, timeouts, 5xx, 429
    #[error("{0}")]
    Transient(String),
    /// Will not succeed on retry: 4xx, malformed or unsupported URL
    #[error("{0}")]
    Permanent(String),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Fetches the payload behind a remote URL, once.
#[async_trait]
pub trait RemoteFetcher: Clone + Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP(S) fetcher backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Per-attempt timeout covering connect and body transfer.
    pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(300);

    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Self::ATTEMPT_TIMEOUT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default http client");
                reqwest::Client::new()
            });
        Self { client }
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await.map_err(classify)?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Transient(format!("HTTP {} from {}", status, url)));
        }
        if !status.is_success() {
            return Err(FetchError::Permanent(format!("HTTP {} from {}", status, url)));
        }

        let body = response.bytes().await.map_err(classify)?;
        Ok(body.to_vec())
    }
}

fn classify(e: reqwest::Error) -> FetchError {
    if e.is_builder() {
        FetchError::Permanent(e.to_string())
    } else {
        FetchError::Transient(e.to_string())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{FetchError, RemoteFetcher};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, HashSet, VecDeque};
    use std::sync::Arc;
    use tokio::time::Instant;

    /// Recorded fetch attempt
    #[derive(Debug, Clone)]
    pub struct FetchAttempt {
        pub url: String,
        /// tokio time, so paused-clock tests see exact retry spacing
        pub at: Instant,
    }

    #[derive(Default)]
    struct FakeFetcherState {
        scripted: HashMap<String, VecDeque<Result<Vec<u8>, FetchError>>>,
        fallback: HashMap<String, Result<Vec<u8>, FetchError>>,
        hanging: HashSet<String>,
        attempts: Vec<FetchAttempt>,
    }

    /// Fake remote fetcher for testing.
    ///
    /// Scripted responses are consumed in order; after that the URL's
    /// fallback applies. Unknown URLs fail transiently.
    #[derive(Clone, Default)]
    pub struct FakeFetcher {
        inner: Arc<Mutex<FakeFetcherState>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue one response for `url`
        pub fn respond(&self, url: impl Into<String>, result: Result<Vec<u8>, FetchError>) {
            self.inner.lock().scripted.entry(url.into()).or_default().push_back(result);
        }

        /// Answer every remaining attempt for `url` with `result`
        pub fn always(&self, url: impl Into<String>, result: Result<Vec<u8>, FetchError>) {
            self.inner.lock().fallback.insert(url.into(), result);
        }

        /// Never complete fetches of `url`
        pub fn hang(&self, url: impl Into<String>) {
            self.inner.lock().hanging.insert(url.into());
        }

        pub fn attempts(&self) -> Vec<FetchAttempt> {
            self.inner.lock().attempts.clone()
        }

        pub fn attempts_for(&self, url: &str) -> Vec<Instant> {
            self.inner.lock().attempts.iter().filter(|a| a.url == url).map(|a| a.at).collect()
        }
    }

    #[async_trait]
    impl RemoteFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            let result = {
                let mut state = self.inner.lock();
                state.attempts.push(FetchAttempt { url: url.to_string(), at: Instant::now() });
                if state.hanging.contains(url) {
                    None
                } else {
                    let scripted = state.scripted.get_mut(url).and_then(VecDeque::pop_front);
                    Some(scripted.or_else(|| state.fallback.get(url).cloned()).unwrap_or_else(
                        || Err(FetchError::Transient(format!("{} is unreachable", url))),
                    ))
                }
            };
            match result {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeFetcher, FetchAttempt};

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
