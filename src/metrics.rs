// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the buffered sender.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter.
//!
//! # Metric Naming Convention
//! - `buffered_sender_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `outcome`: success, retryable, terminal
//! - `reason`: count, time, manual, shutdown
//! - `kind`: transport error kind

use metrics::{counter, gauge, histogram};
use std::time::Duration;

use crate::classify::Outcome;

/// Record actions admitted to the queue
pub fn record_actions_added(count: usize) {
    counter!("buffered_sender_actions_added_total").increment(count as u64);
}

/// Record the final (or retry) outcome of one action
pub fn record_outcome(outcome: Outcome) {
    counter!(
        "buffered_sender_action_outcomes_total",
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record actions in one transport request
pub fn record_batch_size(count: usize) {
    histogram!("buffered_sender_batch_size").record(count as f64);
}

/// Record approximate bytes in one transport request
pub fn record_batch_bytes(bytes: usize) {
    histogram!("buffered_sender_batch_bytes").record(bytes as f64);
}

/// Record a payload-too-large split
pub fn record_split(batch_size: usize) {
    counter!("buffered_sender_splits_total").increment(1);
    histogram!("buffered_sender_split_batch_size").record(batch_size as f64);
}

/// Record a whole-batch transport failure
pub fn record_transport_error(kind: &'static str) {
    counter!(
        "buffered_sender_transport_errors_total",
        "kind" => kind
    )
    .increment(1);
}

/// Set current queue depth
pub fn set_pending_actions(count: usize) {
    gauge!("buffered_sender_pending_actions").set(count as f64);
}

/// Set the current batch action count (drops after splits)
pub fn set_batch_action_count(count: usize) {
    gauge!("buffered_sender_batch_action_count").set(count as f64);
}

/// Record a completed flush round
pub fn record_flush(reason: &'static str, duration: Duration) {
    counter!(
        "buffered_sender_flushes_total",
        "reason" => reason
    )
    .increment(1);
    histogram!(
        "buffered_sender_flush_seconds",
        "reason" => reason
    )
    .record(duration.as_secs_f64());
}

/// Record an automatic trigger dropped because a round was already running
pub fn record_flush_coalesced(reason: &'static str) {
    counter!(
        "buffered_sender_flushes_coalesced_total",
        "reason" => reason
    )
    .increment(1);
}

/// Record time spent waiting on throttling backoff
pub fn record_throttle_delay(delay: Duration) {
    histogram!("buffered_sender_throttle_delay_seconds").record(delay.as_secs_f64());
}

/// Record a flush call that gave up waiting
pub fn record_flush_timeout() {
    counter!("buffered_sender_flush_timeouts_total").increment(1);
}
