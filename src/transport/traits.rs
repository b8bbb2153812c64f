// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::time::Duration;
use async_trait::async_trait;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::action::{ActionKind, IndexAction};

/// Whole-batch failure reported by the transport.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The store rejected the request body as too large; the batch must shrink
    #[error("Request payload too large")]
    PayloadTooLarge,
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Connection error: {0}")]
    Connection(String),
    /// Any other non-success response for the whole batch
    #[error("Batch rejected with status {status}: {message}")]
    Status { status: u16, message: String },
}

impl TransportError {
    /// Map a whole-batch HTTP status to an error. 413 becomes [`TransportError::PayloadTooLarge`].
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 413 {
            Self::PayloadTooLarge
        } else {
            Self::Status { status, message: message.into() }
        }
    }

    #[must_use]
    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, Self::PayloadTooLarge)
    }

    /// Short label for metrics
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PayloadTooLarge => "payload_too_large",
            Self::Timeout(_) => "timeout",
            Self::Connection(_) => "connection",
            Self::Status { .. } => "status",
        }
    }
}

/// One action as it goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAction {
    pub kind: ActionKind,
    pub key: String,
    pub document: Value,
}

impl From<&IndexAction> for RequestAction {
    fn from(action: &IndexAction) -> Self {
        Self {
            kind: action.kind,
            key: action.key.clone(),
            document: action.document.clone(),
        }
    }
}

/// Serializes as the document's own fields plus `@search.action`.
impl Serialize for RequestAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.document {
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len() + 1))?;
                map.serialize_entry("@search.action", &self.kind)?;
                for (name, value) in fields {
                    if name != "@search.action" {
                        map.serialize_entry(name, value)?;
                    }
                }
                map.end()
            }
            other => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("@search.action", &self.kind)?;
                map.serialize_entry("document", other)?;
                map.end()
            }
        }
    }
}

/// A batch of actions sent in one request. Serializes as `{"value": [...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchRequest {
    #[serde(rename = "value")]
    pub actions: Vec<RequestAction>,
}

impl BatchRequest {
    #[must_use]
    pub fn from_actions(actions: &[IndexAction]) -> Self {
        Self {
            actions: actions.iter().map(RequestAction::from).collect(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Keys in request order
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.actions.iter().map(|a| a.key.as_str()).collect()
    }
}

/// Outcome for a single action inside a multi-status response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub key: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ActionResult {
    pub fn new(key: impl Into<String>, status_code: u16) -> Self {
        Self {
            key: key.into(),
            status_code,
            error_message: None,
        }
    }
}

/// Successfully transported response carrying one result per request action,
/// in request order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResponse {
    pub status_code: u16,
    #[serde(rename = "value")]
    pub results: Vec<ActionResult>,
}

impl BatchResponse {
    /// Build a response, using 207 when any result is not a 2xx and 200 otherwise.
    #[must_use]
    pub fn multi_status(results: Vec<ActionResult>) -> Self {
        let all_ok = results.iter().all(|r| (200..300).contains(&r.status_code));
        Self {
            status_code: if all_ok { 200 } else { 207 },
            results,
        }
    }

    /// Answer every action in `request` with the same status code.
    #[must_use]
    pub fn uniform(request: &BatchRequest, status_code: u16) -> Self {
        Self::multi_status(
            request.actions.iter().map(|a| ActionResult::new(a.key.clone(), status_code)).collect(),
        )
    }
}

/// The remote store, as seen by the dispatcher.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one batch. Whole-batch failures (including payload too large)
    /// come back as `Err`; per-action failures live inside the response.
    async fn send(&self, request: &BatchRequest) -> Result<BatchResponse, TransportError>;
}
