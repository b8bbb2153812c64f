// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Lifecycle hooks for observing actions as they move through the sender.
//!
//! Per action the order is always:
//!
//! ```text
//! action_added ──► (retries are silent) ──► action_succeeded | action_failed ──► action_removed
//! ```
//!
//! Hooks run synchronously on whichever task is performing the flush. With
//! `max_concurrent_batches > 1` they may be invoked concurrently, so
//! implementations must be `Send + Sync`.

use std::sync::Arc;
use crate::action::IndexAction;

/// Why an action left the queue without succeeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionFailure {
    /// Per-action status code, if the store returned one
    pub status_code: Option<u16>,
    /// Human readable reason
    pub message: String,
}

impl ActionFailure {
    pub fn new(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ActionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} ({})", self.message, code),
            None => f.write_str(&self.message),
        }
    }
}

/// Observer for action lifecycle events. Every method defaults to a no-op.
pub trait LifecycleHooks: Send + Sync {
    /// An action was admitted to the queue. Fires once per action, never on retry.
    fn action_added(&self, _action: &IndexAction) {}

    /// The store accepted the action.
    fn action_succeeded(&self, _action: &IndexAction) {}

    /// The action failed terminally and will not be resent.
    fn action_failed(&self, _action: &IndexAction, _failure: &ActionFailure) {}

    /// The action left the queue (after success or terminal failure).
    fn action_removed(&self, _action: &IndexAction) {}
}

/// Optional hooks. Every call is a no-op when no observer is installed.
#[derive(Clone, Default)]
pub(crate) struct HookSet {
    inner: Option<Arc<dyn LifecycleHooks>>,
}

impl HookSet {
    pub(crate) fn new(inner: Option<Arc<dyn LifecycleHooks>>) -> Self {
        Self { inner }
    }

    pub(crate) fn added(&self, action: &IndexAction) {
        if let Some(hooks) = &self.inner {
            hooks.action_added(action);
        }
    }

    /// Fire `action_succeeded` then `action_removed`.
    pub(crate) fn succeeded(&self, action: &IndexAction) {
        if let Some(hooks) = &self.inner {
            hooks.action_succeeded(action);
            hooks.action_removed(action);
        }
    }

    /// Fire `action_failed` then `action_removed`.
    pub(crate) fn failed(&self, action: &IndexAction, failure: &ActionFailure) {
        if let Some(hooks) = &self.inner {
            hooks.action_failed(action, failure);
            hooks.action_removed(action);
        }
    }
}

impl std::fmt::Debug for HookSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookSet")
            .field("installed", &self.inner.is_some())
            .finish()
    }
}
