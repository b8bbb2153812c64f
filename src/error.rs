// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::time::Duration;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors surfaced to callers of the [`crate::Sender`].
///
/// Retryable failures and payload-too-large rejections are handled internally
/// and never appear here. Use lifecycle hooks or
/// [`crate::Sender::pending_actions`] to find out which actions were affected.
#[derive(Error, Debug)]
pub enum SenderError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Auto-flush requires a running tokio runtime")]
    NoRuntime,

    #[error("Sender is closed")]
    Closed,

    #[error("Document {index} has no usable key in field '{field}'")]
    MissingKey { index: usize, field: String },

    #[error("{failed} action(s) could not be indexed")]
    TerminalFailures { failed: usize },

    #[error("Flush did not complete within {0:?}")]
    FlushTimeout(Duration),

    #[error("Flush round aborted: {0}")]
    RoundAborted(String),
}

/// Result type alias using SenderError.
pub type SenderResult<T> = Result<T, SenderError>;
