// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Index action data structure.
//!
//! The [`IndexAction`] is the unit of work that flows through the sender.
//! Each action pairs a document with the mutation to apply to it and tracks
//! how many times it has been resent.

use std::sync::OnceLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;
use crate::batching::SizedItem;

/// Mutation applied to a document in the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Insert the document, replacing it if the key already exists
    #[serde(rename = "upload")]
    Upload,
    /// Update fields of an existing document
    #[serde(rename = "merge")]
    Merge,
    /// Merge if the document exists, upload otherwise
    #[serde(rename = "mergeOrUpload")]
    MergeOrUpload,
    /// Remove the document
    #[serde(rename = "delete")]
    Delete,
}

impl ActionKind {
    /// Wire name used by the store's `@search.action` field.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Merge => "merge",
            Self::MergeOrUpload => "mergeOrUpload",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an action currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ActionState {
    /// Admitted, waiting for its first flush
    Pending,
    /// Drained into a batch that is being dispatched
    InFlight,
    /// Accepted by the store
    Succeeded,
    /// Returned to the queue after a retryable outcome
    RetryScheduled,
    /// Will not be resent
    TerminalFailure,
}

impl std::fmt::Display for ActionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::InFlight => write!(f, "InFlight"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::RetryScheduled => write!(f, "RetryScheduled"),
            Self::TerminalFailure => write!(f, "TerminalFailure"),
        }
    }
}

/// One pending document mutation plus its retry bookkeeping.
///
/// # Example
///
/// ```
/// use buffered_sender::{IndexAction, ActionKind, ActionState};
/// use serde_json::json;
///
/// let action = IndexAction::new(
///     ActionKind::Upload,
///     "hotel-1".into(),
///     json!({"id": "hotel-1", "name": "Fancy Stay"}),
/// );
///
/// assert_eq!(action.key, "hotel-1");
/// assert_eq!(action.attempt, 0);
/// assert_eq!(action.state, ActionState::Pending);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct IndexAction {
    /// Unique per admitted action (keys may repeat)
    pub id: Uuid,
    /// Mutation to apply
    pub kind: ActionKind,
    /// Caller-supplied document key, used for diagnostics and hooks only
    pub key: String,
    /// The document body
    pub document: Value,
    /// Number of times this action has been re-enqueued after a retryable outcome
    pub attempt: u32,
    /// Current lifecycle state
    pub state: ActionState,

    #[serde(skip)]
    cached_size: OnceLock<usize>,
}

impl IndexAction {
    pub fn new(kind: ActionKind, key: String, document: Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            key,
            document,
            attempt: 0,
            state: ActionState::Pending,
            cached_size: OnceLock::new(),
        }
    }

    /// Build an action, reading its key from `key_field` of the document.
    ///
    /// Returns `None` when the field is missing or is not a string, number or bool.
    #[must_use]
    pub fn from_document(kind: ActionKind, document: Value, key_field: &str) -> Option<Self> {
        let key = document_key(&document, key_field)?;
        Some(Self::new(kind, key, document))
    }
}

/// Extract a document key as a string.
#[must_use]
pub fn document_key(document: &Value, key_field: &str) -> Option<String> {
    match document.get(key_field)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl SizedItem for IndexAction {
    fn size_bytes(&self) -> usize {
        *self.cached_size.get_or_init(|| {
            // Approximate wire size: key + action name + document JSON
            self.key.len() + self.kind.as_str().len() + self.document.to_string().len()
        })
    }
}
