// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bx-engine: bundle execution engine
//!
//! A [`BundlesQueue`] serializes bundles onto a single worker slot; each
//! bundle is executed by an [`ExecutableSequence`], which resolves
//! attachments through the [`Downloader`], installs packages and runs the
//! steps in order.

pub mod config;
pub mod downloader;
pub mod env;
pub mod error;
pub mod queue;
pub mod runner;
pub mod sequence;

pub use config::EngineConfig;
pub use downloader::{DownloadError, DownloadResult, Downloader, RetryPolicy};
pub use error::EngineError;
pub use queue::{BundlesQueue, QueueHandle, QueueState, QueueStats};
pub use runner::{Adapters, BundleRunner, ProductionAdapters, SequenceRunner};
pub use sequence::ExecutableSequence;
