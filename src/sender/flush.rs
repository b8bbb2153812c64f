// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Flush rounds.
//!
//! A round waits out any throttling backoff, then drains the actions pending
//! at that moment, sends them in batches of the current batch action count,
//! and puts every retryable action back at the front of the queue once all
//! batches have finished.
//!
//! Rounds always run on a spawned task. A caller that stops waiting (timeout
//! or a dropped future) never cancels sends already issued; their outcomes
//! are still applied.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::action::IndexAction;
use crate::dispatcher::DispatchReport;
use crate::error::{SenderError, SenderResult};

use super::{FlushReason, FlushReport, Sender, SenderInner, SenderState};

impl Sender {
    /// Send everything pending now and wait for the round to finish.
    ///
    /// Waits for an already running round first. Fails with
    /// [`SenderError::TerminalFailures`] if any action in this round failed
    /// terminally; all other actions are still processed.
    pub async fn flush(&self) -> SenderResult<FlushReport> {
        let round = self.inner.spawn_round(FlushReason::Manual);
        let report = round
            .await
            .map_err(|e| SenderError::RoundAborted(e.to_string()))?;
        report_result(report)
    }

    /// Like [`flush`](Self::flush) but stop waiting after `timeout`.
    ///
    /// On timeout the round keeps running in the background and its outcomes
    /// are still applied to the queue.
    pub async fn flush_with_timeout(&self, timeout: Duration) -> SenderResult<FlushReport> {
        let round = self.inner.spawn_round(FlushReason::Manual);
        match tokio::time::timeout(timeout, round).await {
            Ok(joined) => {
                let report = joined.map_err(|e| SenderError::RoundAborted(e.to_string()))?;
                report_result(report)
            }
            Err(_) => {
                warn!(?timeout, "Flush timed out, round continues in background");
                crate::metrics::record_flush_timeout();
                Err(SenderError::FlushTimeout(timeout))
            }
        }
    }
}

pub(super) fn report_result(report: FlushReport) -> SenderResult<FlushReport> {
    if report.failed > 0 {
        Err(SenderError::TerminalFailures { failed: report.failed })
    } else {
        Ok(report)
    }
}

impl SenderInner {
    /// Spawn a round that waits for any running round to finish first.
    pub(super) fn spawn_round(self: &Arc<Self>, reason: FlushReason) -> tokio::task::JoinHandle<FlushReport> {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _gate = inner.flush_gate.clone().lock_owned().await;
            inner.run_round(reason).await
        })
    }

    /// Automatic trigger. Dropped if a round is already running; the next
    /// trigger after it finishes picks up whatever accumulated.
    pub(super) fn trigger(self: &Arc<Self>, reason: FlushReason) {
        let Ok(gate) = self.flush_gate.clone().try_lock_owned() else {
            debug!(reason = %reason, "Round already running, trigger coalesced");
            crate::metrics::record_flush_coalesced(reason.as_str());
            return;
        };
        let Some(runtime) = self.runtime.as_ref() else {
            return;
        };

        let inner = Arc::clone(self);
        runtime.spawn(async move {
            let _gate = gate;
            inner.run_round(reason).await;
        });
    }

    /// One flush round. Caller must hold the flush gate.
    #[tracing::instrument(skip(self), fields(total))]
    pub(super) async fn run_round(&self, reason: FlushReason) -> FlushReport {
        let start = Instant::now();

        // Actions stay queued until the backoff ends.
        let delay = self.throttle.current_delay();
        if !delay.is_zero() && !self.pending.is_empty() {
            info!(?delay, "Backing off before sending to throttled store");
            crate::metrics::record_throttle_delay(delay);
            tokio::time::sleep(delay).await;
        }

        let snapshot = self.pending.drain_up_to(self.pending.len());
        if snapshot.is_empty() {
            debug!("Nothing pending");
            self.finish_round();
            return FlushReport::empty(reason);
        }

        let total = snapshot.len();
        tracing::Span::current().record("total", total);
        if !self.closed.load(Ordering::Acquire) {
            self.set_state(SenderState::Flushing);
        }

        let batch_size = self.dispatcher.batch_action_count();
        let batches = into_batches(snapshot, batch_size);
        debug!(batches = batches.len(), batch_size, "Dispatching round");

        let reports = join_all(batches.into_iter().map(|batch| self.dispatcher.dispatch(batch))).await;
        let mut combined = DispatchReport::default();
        for report in reports {
            combined.merge(report);
        }

        self.throttle.record_round(combined.throttled);
        let retried = combined.retried();
        self.pending.reinsert_front(combined.retry);

        let report = FlushReport {
            reason,
            total,
            succeeded: combined.succeeded,
            failed: combined.failed,
            retried,
            requests: combined.requests,
            splits: combined.splits,
            duration: start.elapsed(),
        };

        crate::metrics::record_flush(reason.as_str(), report.duration);
        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            retried = report.retried,
            requests = report.requests,
            splits = report.splits,
            reason = %reason,
            "Flush round complete"
        );

        self.finish_round();
        report
    }

    fn finish_round(&self) {
        if !self.closed.load(Ordering::Acquire) {
            self.set_state(SenderState::Idle);
        }
        self.rearm.notify_one();
    }

    pub(super) fn set_state(&self, state: SenderState) {
        let _ = self.state.send(state);
    }
}

/// Chunk `actions` into batches of at most `size`, keeping order.
fn into_batches(actions: Vec<IndexAction>, size: usize) -> Vec<Vec<IndexAction>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(actions.len().div_ceil(size));
    let mut iter = actions.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ActionKind, ActionState};
    use crate::config::SenderConfig;
    use crate::transport::{BatchResponse, ScriptedTransport, TransportError};
    use serde_json::json;

    fn manual_config() -> SenderConfig {
        SenderConfig {
            auto_flush: false,
            throttling_delay_ms: 1,
            max_throttling_delay_ms: 5,
            ..Default::default()
        }
    }

    fn docs(n: usize) -> Vec<serde_json::Value> {
        (0..n).map(|i| json!({"id": format!("doc-{}", i)})).collect()
    }

    #[test]
    fn test_into_batches() {
        let actions: Vec<IndexAction> = (0..7)
            .map(|i| IndexAction::new(ActionKind::Upload, i.to_string(), json!({})))
            .collect();
        let batches = into_batches(actions, 3);

        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(batches[2][0].key, "6");
    }

    #[tokio::test]
    async fn test_flush_sends_in_batches() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let config = SenderConfig { initial_batch_action_count: 4, ..manual_config() };
        let sender = Sender::new(config, transport.clone()).unwrap();

        sender.upload_documents(docs(10)).unwrap();
        let report = sender.flush().await.unwrap();

        assert_eq!(report.total, 10);
        assert_eq!(report.succeeded, 10);
        assert_eq!(report.requests, 3);
        assert_eq!(transport.call_count(), 3);
        assert_eq!(sender.pending_count(), 0);
        assert_eq!(sender.state(), SenderState::Idle);
    }

    #[tokio::test]
    async fn test_flush_on_empty_queue_sends_nothing() {
        let transport = Arc::new(ScriptedTransport::always(201));
        let sender = Sender::new(manual_config(), transport.clone()).unwrap();

        let report = sender.flush().await.unwrap();
        assert_eq!(report.total, 0);
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_terminal_failure_surfaces_after_round() {
        let transport = Arc::new(ScriptedTransport::always(400));
        let sender = Sender::new(manual_config(), transport).unwrap();

        sender.upload_documents(docs(3)).unwrap();
        let err = sender.flush().await.unwrap_err();

        assert!(matches!(err, SenderError::TerminalFailures { failed: 3 }));
        assert_eq!(sender.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_retryable_actions_stay_pending() {
        let transport = Arc::new(ScriptedTransport::always(409));
        let sender = Sender::new(manual_config(), transport).unwrap();

        sender.upload_documents(docs(2)).unwrap();
        let report = sender.flush().await.unwrap();

        assert_eq!(report.retried, 2);
        let pending = sender.pending_actions();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|a| a.attempt == 1 && a.state == ActionState::RetryScheduled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_timeout_does_not_cancel_round() {
        let transport = Arc::new(ScriptedTransport::always(201).with_latency(Duration::from_secs(10)));
        let sender = Sender::new(manual_config(), transport.clone()).unwrap();

        sender.upload_documents(docs(2)).unwrap();
        let err = sender.flush_with_timeout(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, SenderError::FlushTimeout(_)));

        // The send already issued still completes and is applied.
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(transport.call_count(), 1);
        assert_eq!(sender.pending_count(), 0);
        assert_eq!(sender.state(), SenderState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_actions_stay_visible_during_backoff() {
        let transport = Arc::new(ScriptedTransport::new(|request, call| {
            if call == 0 {
                Err(TransportError::Connection("reset by peer".into()))
            } else {
                Ok(BatchResponse::uniform(request, 201))
            }
        }));
        let config = SenderConfig {
            throttling_delay_ms: 1_000,
            max_throttling_delay_ms: 5_000,
            ..manual_config()
        };
        let sender = Arc::new(Sender::new(config, transport.clone()).unwrap());

        sender.upload_documents(docs(2)).unwrap();
        sender.flush().await.unwrap();
        assert_eq!(sender.inner.throttle.current_delay(), Duration::from_secs(1));

        let second = {
            let sender = Arc::clone(&sender);
            tokio::spawn(async move { sender.flush().await })
        };
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(transport.call_count(), 1);
        assert_eq!(sender.pending_count(), 2);
        assert_eq!(sender.state(), SenderState::Idle);

        let report = second.await.unwrap().unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(sender.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_throttled_round_delays_next_round() {
        let transport = Arc::new(ScriptedTransport::new(|request, call| {
            if call == 0 {
                Err(TransportError::Timeout(Duration::from_secs(30)))
            } else {
                Ok(BatchResponse::uniform(request, 201))
            }
        }));
        let sender = Sender::new(manual_config(), transport.clone()).unwrap();

        sender.upload_documents(docs(1)).unwrap();
        let first = sender.flush().await.unwrap();
        assert_eq!(first.retried, 1);
        assert_eq!(sender.inner.throttle.consecutive(), 1);

        let second = sender.flush().await.unwrap();
        assert_eq!(second.succeeded, 1);
        assert_eq!(sender.inner.throttle.consecutive(), 0);
    }
}
