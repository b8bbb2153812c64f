//! # Buffered Sender
//!
//! A buffered, batching sender for index-action bulk APIs.
//!
//! Callers add upload, merge, merge-or-upload and delete actions; the sender
//! queues them, ships them to the store in batches, and sorts every action's
//! per-item result into success, retry or terminal failure.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Admission                             │
//! │  • add_actions() / upload_documents() / ...                 │
//! │  • Never waits on the network                               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   PendingActionSet                          │
//! │  • FIFO queue, retries go back to the front                 │
//! │  • Count trigger once batch_action_count is reached         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!              (flush round: count, timer, manual, close)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Dispatcher                            │
//! │  • Bounded concurrent sends through the Transport           │
//! │  • Payload too large: halve and resend                      │
//! │  • Per-action classification and lifecycle hooks            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use buffered_sender::{Sender, SenderConfig};
//! use buffered_sender::transport::ScriptedTransport;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = Arc::new(ScriptedTransport::always(201));
//!     let sender = Sender::new(SenderConfig::default(), transport)
//!         .expect("valid config");
//!
//!     sender
//!         .upload_documents(vec![
//!             json!({"id": "1", "name": "Fancy Stay"}),
//!             json!({"id": "2", "name": "Roach Motel"}),
//!         ])
//!         .expect("documents have keys");
//!
//!     let report = sender.flush().await.expect("flush");
//!     println!("sent {} actions in {} request(s)", report.succeeded, report.requests);
//!
//!     sender.close().await.expect("close");
//! }
//! ```
//!
//! ## Features
//!
//! - **Batching**: Flush by action count, interval, explicit call or close
//! - **Adaptive batch size**: Oversized batches are halved and the batch
//!   action count shrinks for later rounds
//! - **Per-action retries**: 409, 422 and 503 are retried up to a limit
//! - **Throttling backoff**: Exponential delay while the store reports 503s
//! - **Lifecycle hooks**: added, succeeded, failed, removed
//!
//! ## Configuration
//!
//! See [`SenderConfig`] for all configuration options.
//!
//! ## Modules
//!
//! - [`sender`]: The [`Sender`] facade and flush scheduling
//! - [`batching`]: Pending queue and batch halving
//! - [`dispatcher`]: Send, classify, split and retry
//! - [`classify`]: Status code classification
//! - [`transport`]: The [`Transport`] seam and a scripted in-memory transport
//! - [`resilience`]: Throttling backoff

pub mod action;
pub mod batching;
pub mod classify;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod resilience;
pub mod sender;
pub mod transport;

// Note: We don't expose a `tracing` module to avoid conflict with the tracing crate

pub use action::{ActionKind, ActionState, IndexAction};
pub use batching::{PendingActionSet, SizedItem};
pub use classify::Outcome;
pub use config::{ConfigError, SenderConfig};
pub use dispatcher::{DispatchReport, Dispatcher};
pub use error::{SenderError, SenderResult};
pub use hooks::{ActionFailure, LifecycleHooks};
pub use resilience::BackoffConfig;
pub use sender::{FlushReason, FlushReport, Sender, SenderState};
pub use transport::{ActionResult, BatchRequest, BatchResponse, ScriptedTransport, Transport, TransportError};
