// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bx-adapters: external collaborators of the bundle execution engine
//!
//! Each collaborator is a trait with one production implementation and a
//! recording fake (behind the `test-support` feature).

pub mod audit;
pub mod fetch;
pub mod installer;
pub mod runner;
pub mod shutdown;
pub mod subprocess;

pub use audit::{AuditError, AuditLog, AuditSink, FileAuditLog, FileAuditSink};
pub use fetch::{FetchError, HttpFetcher, RemoteFetcher};
pub use installer::{CommandPackageInstaller, PackageInstaller};
pub use runner::{ResolvedAttachment, ShellStepRunner, StepRunner};
pub use shutdown::ShutdownProcessor;

#[cfg(any(test, feature = "test-support"))]
pub use audit::{AuditEntry, FakeAuditSink};
#[cfg(any(test, feature = "test-support"))]
pub use fetch::{FakeFetcher, FetchAttempt};
#[cfg(any(test, feature = "test-support"))]
pub use installer::FakePackageInstaller;
#[cfg(any(test, feature = "test-support"))]
pub use runner::{FakeStepRunner, RunCall};
#[cfg(any(test, feature = "test-support"))]
pub use shutdown::FakeShutdownProcessor;
