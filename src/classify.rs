// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Outcome classification.
//!
//! Pure functions mapping transport results and per-action status codes to
//! what the dispatcher should do with each action.
//!
//! # Example
//!
//! ```
//! use buffered_sender::classify::{classify_status, Outcome};
//!
//! assert_eq!(classify_status(201, 0, 10), Outcome::Success);
//! assert_eq!(classify_status(409, 0, 10), Outcome::Retryable);
//! assert_eq!(classify_status(409, 9, 10), Outcome::Terminal); // out of retries
//! assert_eq!(classify_status(404, 0, 10), Outcome::Terminal);
//! ```

use crate::transport::TransportError;

/// What happens to one action after a send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Accepted by the store; notify and drop
    Success,
    /// Resend in a later round
    Retryable,
    /// Give up; notify and drop
    Terminal,
}

impl Outcome {
    /// Label for logs and metrics
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Retryable => "retryable",
            Self::Terminal => "terminal",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens to a whole batch after a transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Payload too large: halve and resend
    Split,
    /// Every action in the batch gets this outcome
    Each(Outcome),
}

/// Per-action codes meaning the store applied the action.
pub const SUCCESS_CODES: [u16; 2] = [200, 201];

/// Per-action codes worth resending: conflict, unprocessable due to timing,
/// service unavailable.
pub const RETRYABLE_CODES: [u16; 3] = [409, 422, 503];

/// Per-action code that signals the service is shedding load.
pub const THROTTLING_CODE: u16 = 503;

#[must_use]
pub fn is_success_code(status_code: u16) -> bool {
    SUCCESS_CODES.contains(&status_code)
}

#[must_use]
pub fn is_retryable_code(status_code: u16) -> bool {
    RETRYABLE_CODES.contains(&status_code)
}

#[must_use]
pub fn is_throttling(status_code: u16) -> bool {
    status_code == THROTTLING_CODE
}

/// Apply the retry limit to an outcome.
///
/// A retryable action that has already been resent `max_retries - 1` times has
/// no retry left, so it turns terminal now rather than after one more send.
#[must_use]
pub fn apply_retry_limit(outcome: Outcome, attempt: u32, max_retries: u32) -> Outcome {
    if attempt >= max_retries {
        return Outcome::Terminal;
    }
    match outcome {
        Outcome::Retryable if attempt.saturating_add(1) >= max_retries => Outcome::Terminal,
        other => other,
    }
}

/// Classify one per-action status code from a multi-status response.
#[must_use]
pub fn classify_status(status_code: u16, attempt: u32, max_retries: u32) -> Outcome {
    let raw = if is_success_code(status_code) {
        Outcome::Success
    } else if is_retryable_code(status_code) {
        Outcome::Retryable
    } else {
        Outcome::Terminal
    };
    apply_retry_limit(raw, attempt, max_retries)
}

/// Classify a whole-batch transport failure.
///
/// The retry limit is applied per action by the caller via [`apply_retry_limit`].
#[must_use]
pub fn classify_transport(error: &TransportError) -> BatchOutcome {
    if error.is_payload_too_large() {
        BatchOutcome::Split
    } else {
        BatchOutcome::Each(Outcome::Retryable)
    }
}
