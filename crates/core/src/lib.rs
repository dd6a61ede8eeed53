// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! bx-core: data model for the bundle execution engine

pub mod macros;

pub mod bundle;
pub mod outcome;
pub mod package;
pub mod shutdown;
pub mod stats;
pub mod time_fmt;
pub mod work;

#[cfg(any(test, feature = "test-support"))]
pub use bundle::{RecipeStepBuilder, ScriptStepBuilder};
pub use bundle::{Attachment, Executable, ExecutableBundle, RecipeStep, ScriptStep, StepKind};
pub use outcome::{FailurePhase, InstallResult, RunResult, SequenceError, SequenceOutcome};
pub use package::{PackageSpec, PackageSpecError};
pub use shutdown::ShutdownLevel;
pub use stats::{
    ActivityStats, ExceptionCategory, ExceptionStats, RecentException, MAX_RECENT_EXCEPTIONS,
};
pub use time_fmt::format_elapsed;
pub use work::Work;
