// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Buffered sender facade.
//!
//! The [`Sender`] is the only component callers touch. It ties together:
//! - the pending action queue
//! - the dispatcher (send, classify, split, retry)
//! - the flush scheduler (count, timer, manual and shutdown triggers)
//! - optional lifecycle hooks
//!
//! # Lifecycle
//!
//! ```text
//! Idle ⇄ Flushing → Closing → Closed
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use buffered_sender::{Sender, SenderConfig, ActionKind};
//! use buffered_sender::transport::ScriptedTransport;
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), buffered_sender::SenderError> {
//! let transport = Arc::new(ScriptedTransport::always(201));
//! let sender = Sender::new(SenderConfig::default(), transport)?;
//!
//! sender.add_actions(ActionKind::Upload, vec![json!({"id": "1", "name": "first"})])?;
//! let report = sender.flush().await?;
//! assert_eq!(report.succeeded, 1);
//!
//! sender.close().await?;
//! # Ok(())
//! # }
//! ```

mod types;
mod flush;
mod lifecycle;

pub use types::{SenderState, FlushReason, FlushReport};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::action::{ActionKind, IndexAction};
use crate::batching::PendingActionSet;
use crate::config::SenderConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{SenderError, SenderResult};
use crate::hooks::{HookSet, LifecycleHooks};
use crate::resilience::Throttle;
use crate::transport::Transport;

/// Buffered bulk-action sender.
///
/// # Thread Safety
///
/// `Sender` is `Send + Sync`. Any number of tasks or threads may add actions
/// concurrently; at most one flush round runs at a time.
pub struct Sender {
    pub(super) inner: Arc<SenderInner>,
    pub(super) timer: Mutex<Option<JoinHandle<()>>>,
}

/// State shared between the facade, spawned rounds and the timer task.
pub(crate) struct SenderInner {
    pub(super) config: SenderConfig,
    pub(super) pending: PendingActionSet,
    pub(super) dispatcher: Dispatcher,
    pub(super) throttle: Throttle,

    /// Held for the whole of a round; only one round runs at a time
    pub(super) flush_gate: Arc<tokio::sync::Mutex<()>>,

    pub(super) closed: AtomicBool,

    /// Lifecycle state (broadcast to watchers)
    pub(super) state: watch::Sender<SenderState>,
    pub(super) state_rx: watch::Receiver<SenderState>,

    /// Signalled after every completed round so the timer restarts its interval
    pub(super) rearm: Notify,

    /// Runtime used for rounds spawned by automatic triggers
    pub(super) runtime: Option<Handle>,
}

impl Sender {
    /// Create a sender without hooks.
    ///
    /// With `auto_flush` enabled this must be called from inside a tokio
    /// runtime, which also hosts the auto-flush timer.
    pub fn new(config: SenderConfig, transport: Arc<dyn Transport>) -> SenderResult<Self> {
        Self::build(config, transport, None)
    }

    /// Create a sender that reports action lifecycle events to `hooks`.
    pub fn with_hooks(
        config: SenderConfig,
        transport: Arc<dyn Transport>,
        hooks: Arc<dyn LifecycleHooks>,
    ) -> SenderResult<Self> {
        Self::build(config, transport, Some(hooks))
    }

    fn build(
        config: SenderConfig,
        transport: Arc<dyn Transport>,
        hooks: Option<Arc<dyn LifecycleHooks>>,
    ) -> SenderResult<Self> {
        config.validate()?;

        let runtime = Handle::try_current().ok();
        if config.auto_flush && runtime.is_none() {
            return Err(SenderError::NoRuntime);
        }

        let hooks = HookSet::new(hooks);
        let (state_tx, state_rx) = watch::channel(SenderState::Idle);

        let inner = Arc::new(SenderInner {
            pending: PendingActionSet::with_hooks(hooks.clone()),
            dispatcher: Dispatcher::with_hook_set(transport, hooks, &config),
            throttle: Throttle::new(config.backoff()),
            flush_gate: Arc::new(tokio::sync::Mutex::new(())),
            closed: AtomicBool::new(false),
            state: state_tx,
            state_rx,
            rearm: Notify::new(),
            runtime,
            config,
        });

        let timer = lifecycle::spawn_timer(&inner);
        debug!(
            auto_flush = inner.config.auto_flush,
            batch_action_count = inner.config.initial_batch_action_count,
            "Sender created"
        );

        Ok(Self {
            inner,
            timer: Mutex::new(timer),
        })
    }

    // --- Admission ---

    /// Enqueue one action per document, reading each key from `key_field`.
    ///
    /// Returns immediately; never waits on the network. If any document lacks
    /// a usable key, nothing from this call is admitted.
    pub fn add_actions<I>(&self, kind: ActionKind, documents: I) -> SenderResult<usize>
    where
        I: IntoIterator<Item = Value>,
    {
        self.ensure_open()?;

        let field = &self.inner.config.key_field;
        let mut actions = Vec::new();
        for (index, document) in documents.into_iter().enumerate() {
            let action = IndexAction::from_document(kind, document, field).ok_or_else(|| SenderError::MissingKey {
                index,
                field: field.clone(),
            })?;
            actions.push(action);
        }

        let count = actions.len();
        self.admit(actions);
        Ok(count)
    }

    /// Enqueue pre-built actions in order.
    pub fn add(&self, actions: Vec<IndexAction>) -> SenderResult<usize> {
        self.ensure_open()?;
        let count = actions.len();
        self.admit(actions);
        Ok(count)
    }

    /// Enqueue a single pre-built action.
    pub fn add_action(&self, action: IndexAction) -> SenderResult<usize> {
        self.add(vec![action])
    }

    pub fn upload_documents<I: IntoIterator<Item = Value>>(&self, documents: I) -> SenderResult<usize> {
        self.add_actions(ActionKind::Upload, documents)
    }

    pub fn merge_documents<I: IntoIterator<Item = Value>>(&self, documents: I) -> SenderResult<usize> {
        self.add_actions(ActionKind::Merge, documents)
    }

    pub fn merge_or_upload_documents<I: IntoIterator<Item = Value>>(&self, documents: I) -> SenderResult<usize> {
        self.add_actions(ActionKind::MergeOrUpload, documents)
    }

    pub fn delete_documents<I: IntoIterator<Item = Value>>(&self, documents: I) -> SenderResult<usize> {
        self.add_actions(ActionKind::Delete, documents)
    }

    fn ensure_open(&self) -> SenderResult<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            Err(SenderError::Closed)
        } else {
            Ok(())
        }
    }

    fn admit(&self, actions: Vec<IndexAction>) {
        if actions.is_empty() {
            return;
        }
        let pending = self.inner.pending.append(actions);
        if self.inner.config.auto_flush && pending >= self.inner.dispatcher.batch_action_count() {
            self.inner.trigger(FlushReason::Count);
        }
    }

    // --- Introspection ---

    /// Snapshot of pending and retry-scheduled actions, front of queue first.
    #[must_use]
    pub fn pending_actions(&self) -> Vec<IndexAction> {
        self.inner.pending.snapshot()
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }

    /// Actions per request; starts at `initial_batch_action_count` and shrinks
    /// after payload-too-large splits.
    #[must_use]
    pub fn batch_action_count(&self) -> usize {
        self.inner.dispatcher.batch_action_count()
    }

    #[must_use]
    pub fn state(&self) -> SenderState {
        *self.inner.state_rx.borrow()
    }

    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<SenderState> {
        self.inner.state_rx.clone()
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn config(&self) -> &SenderConfig {
        &self.inner.config
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .field("dispatcher", &self.inner.dispatcher)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;
    use serde_json::json;

    fn manual_config() -> SenderConfig {
        SenderConfig { auto_flush: false, ..Default::default() }
    }

    #[test]
    fn test_manual_sender_needs_no_runtime() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let sender = Sender::new(manual_config(), transport).unwrap();
        assert_eq!(sender.state(), SenderState::Idle);
    }

    #[test]
    fn test_auto_flush_without_runtime_is_rejected() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let result = Sender::new(SenderConfig::default(), transport);
        assert!(matches!(result, Err(SenderError::NoRuntime)));
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let config = SenderConfig { initial_batch_action_count: 0, ..manual_config() };
        assert!(matches!(Sender::new(config, transport), Err(SenderError::Config(_))));
    }

    #[test]
    fn test_unbounded_concurrency_is_a_config_error() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let config = SenderConfig { max_concurrent_batches: usize::MAX, ..manual_config() };
        assert!(matches!(
            Sender::new(config, transport),
            Err(SenderError::Config(crate::config::ConfigError::Concurrency(usize::MAX)))
        ));
    }

    #[test]
    fn test_add_actions_reads_keys() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let sender = Sender::new(manual_config(), transport).unwrap();

        let added = sender
            .upload_documents(vec![json!({"id": "a"}), json!({"id": 7})])
            .unwrap();

        assert_eq!(added, 2);
        let pending = sender.pending_actions();
        assert_eq!(pending[0].key, "a");
        assert_eq!(pending[1].key, "7");
        assert_eq!(pending[1].kind, ActionKind::Upload);
    }

    #[test]
    fn test_missing_key_admits_nothing() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let sender = Sender::new(manual_config(), transport).unwrap();

        let result = sender.delete_documents(vec![json!({"id": "a"}), json!({"name": "no key"})]);

        assert!(matches!(result, Err(SenderError::MissingKey { index: 1, .. })));
        assert_eq!(sender.pending_count(), 0);
    }

    #[test]
    fn test_add_prebuilt_action() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let sender = Sender::new(manual_config(), transport).unwrap();

        let action = IndexAction::new(ActionKind::Delete, "gone".into(), json!({"id": "gone"}));
        assert_eq!(sender.add_action(action).unwrap(), 1);
        assert_eq!(sender.pending_actions()[0].kind, ActionKind::Delete);
    }

    #[test]
    fn test_custom_key_field() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let config = SenderConfig { key_field: "hotelId".into(), ..manual_config() };
        let sender = Sender::new(config, transport).unwrap();

        sender.merge_documents(vec![json!({"hotelId": "h1"})]).unwrap();
        assert_eq!(sender.pending_actions()[0].key, "h1");
    }
}
