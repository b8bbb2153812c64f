// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the sender facade.

use std::time::Duration;

/// Sender lifecycle state.
///
/// Use [`super::Sender::state()`] to check the current state or
/// [`super::Sender::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Accepting actions, no round running
    Idle,
    /// A flush round is in progress
    Flushing,
    /// `close()` called, final round pending or running
    Closing,
    /// Closed; further actions are refused
    Closed,
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Flushing => write!(f, "Flushing"),
            Self::Closing => write!(f, "Closing"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// What started a flush round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Pending action count reached the batch action count
    Count,
    /// Auto-flush timer fired
    Time,
    /// Caller asked for it
    Manual,
    /// Final round on close
    Shutdown,
}

impl FlushReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Time => "time",
            Self::Manual => "manual",
            Self::Shutdown => "shutdown",
        }
    }
}

impl std::fmt::Display for FlushReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one flush round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    pub reason: FlushReason,
    /// Actions in the round's snapshot
    pub total: usize,
    /// Accepted by the store
    pub succeeded: usize,
    /// Failed terminally and removed
    pub failed: usize,
    /// Re-enqueued for a later round
    pub retried: usize,
    /// Transport calls made, splits included
    pub requests: usize,
    /// Payload-too-large splits performed
    pub splits: usize,
    pub duration: Duration,
}

impl FlushReport {
    pub(crate) fn empty(reason: FlushReason) -> Self {
        Self {
            reason,
            total: 0,
            succeeded: 0,
            failed: 0,
            retried: 0,
            requests: 0,
            splits: 0,
            duration: Duration::ZERO,
        }
    }

    /// No action failed terminally in this round
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", SenderState::Idle), "Idle");
        assert_eq!(format!("{}", SenderState::Flushing), "Flushing");
        assert_eq!(format!("{}", SenderState::Closed), "Closed");
    }

    #[test]
    fn test_reason_labels() {
        assert_eq!(FlushReason::Count.as_str(), "count");
        assert_eq!(FlushReason::Shutdown.to_string(), "shutdown");
    }

    #[test]
    fn test_report_is_success() {
        let mut report = FlushReport::empty(FlushReason::Manual);
        assert!(report.is_success());
        assert_eq!(report.total, 0);

        report.failed = 2;
        assert!(!report.is_success());
    }
}
