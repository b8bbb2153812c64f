// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Auto-flush timer and shutdown.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{SenderError, SenderResult};

use super::flush::report_result;
use super::{FlushReason, FlushReport, Sender, SenderInner, SenderState};

/// Start the auto-flush timer, if auto-flush is on.
///
/// The interval restarts after every completed round, whatever triggered it.
/// The task holds only a weak reference so a dropped sender ends it.
pub(super) fn spawn_timer(inner: &Arc<SenderInner>) -> Option<JoinHandle<()>> {
    if !inner.config.auto_flush {
        return None;
    }
    let runtime = inner.runtime.as_ref()?;
    let interval = inner.config.auto_flush_interval();
    let weak: Weak<SenderInner> = Arc::downgrade(inner);

    Some(runtime.spawn(async move {
        loop {
            let Some(inner) = weak.upgrade() else { break };

            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if inner.closed.load(Ordering::Acquire) {
                        break;
                    }
                    if !inner.pending.is_empty() {
                        debug!(pending = inner.pending.len(), "Auto-flush interval elapsed");
                        inner.trigger(FlushReason::Time);
                    }
                }
                _ = inner.rearm.notified() => {}
            }
        }
        debug!("Auto-flush timer stopped");
    }))
}

impl Sender {
    /// Stop accepting actions, send everything still pending and close.
    ///
    /// Waits for a running round first, then runs one final round. Actions
    /// that come back retryable from that round stay in
    /// [`pending_actions`](Self::pending_actions). Calling `close` again
    /// returns an empty report.
    #[tracing::instrument(skip(self))]
    pub async fn close(&self) -> SenderResult<FlushReport> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            debug!("Sender already closed");
            return Ok(FlushReport::empty(FlushReason::Shutdown));
        }

        self.inner.set_state(SenderState::Closing);
        if let Some(timer) = self.timer.lock().take() {
            timer.abort();
        }

        let round = self.inner.spawn_round(FlushReason::Shutdown);
        let joined = round.await;
        self.inner.set_state(SenderState::Closed);
        let report = joined.map_err(|e| SenderError::RoundAborted(e.to_string()))?;

        info!(
            succeeded = report.succeeded,
            failed = report.failed,
            left_pending = self.inner.pending.len(),
            "Sender closed"
        );
        report_result(report)
    }
}

impl Drop for Sender {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
        if !self.inner.closed.load(Ordering::Acquire) {
            let pending = self.inner.pending.len();
            if pending > 0 {
                warn!(pending, "Sender dropped without close, pending actions were not sent");
            }
        }
    }
}
