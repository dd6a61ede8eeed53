// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine-level errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot determine state directory: set BX_STATE_DIR or HOME")]
    NoStateDir,
    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },
    #[error("bundles queue has shut down")]
    QueueClosed,
}
