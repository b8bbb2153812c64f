// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch dispatch.
//!
//! The [`Dispatcher`] sends one batch through the [`Transport`], classifies
//! every action in the reply, fires the completion hooks and hands back the
//! actions that should be retried.
//!
//! # Outcome routing
//!
//! ```text
//!                 send(batch)
//!                      │
//!     ┌────────────────┼─────────────────────────┐
//!     ▼                ▼                         ▼
//! PayloadTooLarge   other transport error    multi-status response
//!     │                │                         │
//!  n > 1: halve,    every action             per-action code
//!  recurse on       Retryable                    │
//!  each half           │              ┌──────────┼──────────┐
//!  n = 1: Terminal     │              ▼          ▼          ▼
//!                      └───────►  Retryable   Success    Terminal
//!                                 attempt+1   succeeded  failed
//!                                 → retry     + removed  + removed
//! ```
//!
//! Retryable actions that have used up their retries turn Terminal instead.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::action::{ActionState, IndexAction};
use crate::batching::{halve, total_bytes};
use crate::classify::{apply_retry_limit, classify_status, classify_transport, is_throttling, BatchOutcome, Outcome};
use crate::config::SenderConfig;
use crate::hooks::{ActionFailure, HookSet, LifecycleHooks};
use crate::transport::{BatchRequest, BatchResponse, Transport, TransportError};

/// Aggregated result of dispatching one batch, including any splits.
#[derive(Debug, Default)]
pub struct DispatchReport {
    /// Actions accepted by the store
    pub succeeded: usize,
    /// Actions that failed terminally
    pub failed: usize,
    /// Actions to re-enqueue, in request order, `attempt` already incremented
    pub retry: Vec<IndexAction>,
    /// Transport calls made
    pub requests: usize,
    /// Payload-too-large splits performed
    pub splits: usize,
    /// The store signalled it is overloaded
    pub throttled: bool,
}

impl DispatchReport {
    #[must_use]
    pub fn retried(&self) -> usize {
        self.retry.len()
    }

    /// Fold `other` into `self`, appending its retries after ours.
    pub fn merge(&mut self, other: DispatchReport) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.retry.extend(other.retry);
        self.requests += other.requests;
        self.splits += other.splits;
        self.throttled |= other.throttled;
    }
}

/// Sends batches and routes each action to success, retry or terminal failure.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    hooks: HookSet,
    max_retries: u32,
    permits: Semaphore,
    batch_action_count: AtomicUsize,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        hooks: Option<Arc<dyn LifecycleHooks>>,
        config: &SenderConfig,
    ) -> Self {
        Self::with_hook_set(transport, HookSet::new(hooks), config)
    }

    pub(crate) fn with_hook_set(transport: Arc<dyn Transport>, hooks: HookSet, config: &SenderConfig) -> Self {
        crate::metrics::set_batch_action_count(config.initial_batch_action_count);
        Self {
            transport,
            hooks,
            max_retries: config.max_retries_per_action,
            permits: Semaphore::new(config.max_concurrent_batches),
            batch_action_count: AtomicUsize::new(config.initial_batch_action_count.max(1)),
        }
    }

    /// Current actions-per-request. Shrinks whenever a batch had to be split.
    #[must_use]
    pub fn batch_action_count(&self) -> usize {
        self.batch_action_count.load(Ordering::Acquire)
    }

    fn shrink_batch_action_count(&self, to: usize) {
        let to = to.max(1);
        let previous = self.batch_action_count.fetch_min(to, Ordering::AcqRel);
        if to < previous {
            debug!(previous, current = to, "Batch action count reduced");
            crate::metrics::set_batch_action_count(to);
        }
    }

    /// Send `batch`, splitting on payload-too-large, and classify every action.
    ///
    /// Never fails: transport errors become per-action outcomes.
    pub fn dispatch(&self, batch: Vec<IndexAction>) -> BoxFuture<'_, DispatchReport> {
        Box::pin(async move {
            if batch.is_empty() {
                return DispatchReport::default();
            }

            let request = BatchRequest::from_actions(&batch);
            crate::metrics::record_batch_size(batch.len());
            crate::metrics::record_batch_bytes(total_bytes(&batch));

            let result = {
                // Permit covers the network call only, so recursive halves can't starve each other.
                let _permit = self.permits.acquire().await.ok();
                self.transport.send(&request).await
            };

            let mut report = DispatchReport { requests: 1, ..Default::default() };
            match result {
                Ok(response) => self.apply_response(batch, response, &mut report),
                Err(error) => self.apply_transport_error(batch, error, &mut report).await,
            }
            report
        })
    }

    async fn apply_transport_error(&self, batch: Vec<IndexAction>, error: TransportError, report: &mut DispatchReport) {
        crate::metrics::record_transport_error(error.kind());

        match classify_transport(&error) {
            BatchOutcome::Split if batch.len() > 1 => {
                let size = batch.len();
                let (left, right) = halve(batch);
                warn!(size, left = left.len(), right = right.len(), "Payload too large, splitting batch");
                crate::metrics::record_split(size);
                self.shrink_batch_action_count(left.len());

                let (left_report, right_report) = futures::join!(self.dispatch(left), self.dispatch(right));
                report.splits += 1;
                report.merge(left_report);
                report.merge(right_report);
            }
            BatchOutcome::Split => {
                for action in batch {
                    warn!(key = %action.key, "Single action exceeds the payload limit");
                    let failure = ActionFailure::new(Some(413), "Action is too large to send even on its own");
                    self.resolve(action, Outcome::Terminal, &failure, report);
                }
            }
            BatchOutcome::Each(outcome) => {
                warn!(error = %error, size = batch.len(), "Batch transport failed, actions will be retried");
                report.throttled = true;
                for action in batch {
                    let limited = apply_retry_limit(outcome, action.attempt, self.max_retries);
                    let failure = self.exhausted(&action, None, &error.to_string());
                    self.resolve(action, limited, &failure, report);
                }
            }
        }
    }

    fn apply_response(&self, batch: Vec<IndexAction>, response: BatchResponse, report: &mut DispatchReport) {
        let expected = batch.len();
        if response.results.len() != expected {
            warn!(
                expected,
                received = response.results.len(),
                "Response result count does not match request"
            );
        }

        let mut results = response.results.into_iter();
        for action in batch {
            match results.next() {
                Some(result) => {
                    if is_throttling(result.status_code) {
                        report.throttled = true;
                    }
                    let outcome = classify_status(result.status_code, action.attempt, self.max_retries);
                    let failure = match outcome {
                        Outcome::Terminal if crate::classify::is_retryable_code(result.status_code) => {
                            self.exhausted(&action, Some(result.status_code), result.error_message.as_deref().unwrap_or("retryable failure"))
                        }
                        _ => ActionFailure::new(
                            Some(result.status_code),
                            result.error_message.unwrap_or_else(|| format!("Action rejected with status {}", result.status_code)),
                        ),
                    };
                    self.resolve(action, outcome, &failure, report);
                }
                None => {
                    let outcome = apply_retry_limit(Outcome::Retryable, action.attempt, self.max_retries);
                    let failure = self.exhausted(&action, None, "no result returned for action");
                    self.resolve(action, outcome, &failure, report);
                }
            }
        }
    }

    fn exhausted(&self, action: &IndexAction, status_code: Option<u16>, last_error: &str) -> ActionFailure {
        ActionFailure::new(
            status_code,
            format!("Retries exhausted after {} attempt(s): {}", action.attempt + 1, last_error),
        )
    }

    fn resolve(&self, mut action: IndexAction, outcome: Outcome, failure: &ActionFailure, report: &mut DispatchReport) {
        crate::metrics::record_outcome(outcome);
        match outcome {
            Outcome::Success => {
                action.state = ActionState::Succeeded;
                self.hooks.succeeded(&action);
                report.succeeded += 1;
            }
            Outcome::Terminal => {
                action.state = ActionState::TerminalFailure;
                warn!(key = %action.key, attempt = action.attempt, failure = %failure, "Action failed terminally");
                self.hooks.failed(&action, failure);
                report.failed += 1;
            }
            Outcome::Retryable => {
                action.attempt += 1;
                action.state = ActionState::RetryScheduled;
                report.retry.push(action);
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("max_retries", &self.max_retries)
            .field("batch_action_count", &self.batch_action_count())
            .field("hooks", &self.hooks)
            .finish()
    }
}
