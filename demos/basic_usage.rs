// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic buffered-sender usage example.
//!
//! Demonstrates:
//! 1. Creating a sender with lifecycle hooks
//! 2. Adding upload, merge and delete actions
//! 3. A store that rejects large requests (batch splitting)
//! 4. Per-action retries and terminal failures
//! 5. Displaying metrics
//! 6. Clean shutdown
//!
//! Runs entirely in memory against a simulated store.
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;
use std::time::Duration;

use buffered_sender::{
    ActionFailure, ActionResult, BatchResponse, IndexAction, LifecycleHooks, ScriptedTransport, Sender,
    SenderConfig, SenderError, TransportError,
};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;

/// Largest request the simulated store accepts
const STORE_REQUEST_LIMIT: usize = 8;

struct PrintingHooks;

impl LifecycleHooks for PrintingHooks {
    fn action_succeeded(&self, action: &IndexAction) {
        println!("   ✅ {} {} (attempt {})", action.kind, action.key, action.attempt + 1);
    }

    fn action_failed(&self, action: &IndexAction, failure: &ActionFailure) {
        println!("   ❌ {} {}: {}", action.kind, action.key, failure);
    }
}

/// Simulated store: rejects requests over the limit, fails "bad-*" keys with
/// 400 and reports a conflict for "busy-*" keys on their first call.
fn simulated_store() -> ScriptedTransport {
    ScriptedTransport::new(|request, call| {
        if request.len() > STORE_REQUEST_LIMIT {
            return Err(TransportError::PayloadTooLarge);
        }
        let results = request
            .actions
            .iter()
            .map(|action| {
                let code = if action.key.starts_with("bad-") {
                    400
                } else if action.key.starts_with("busy-") && call < 3 {
                    409
                } else {
                    201
                };
                ActionResult::new(action.key.clone(), code)
            })
            .collect();
        Ok(BatchResponse::multi_status(results))
    })
    .with_latency(Duration::from_millis(20))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║           buffered-sender: Basic Usage Example                ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure the sender
    // ─────────────────────────────────────────────────────────────────────────
    println!("📦 Creating sender...");
    let config = SenderConfig {
        auto_flush: false,
        initial_batch_action_count: 32,
        max_concurrent_batches: 2,
        key_field: "hotelId".into(),
        ..Default::default()
    };
    let transport = Arc::new(simulated_store());
    let sender = Sender::with_hooks(config, transport.clone(), Arc::new(PrintingHooks))?;
    println!("   batch action count: {}\n", sender.batch_action_count());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Add actions
    // ─────────────────────────────────────────────────────────────────────────
    println!("📝 Adding actions...");
    let hotels = (1..=12).map(|i| json!({"hotelId": format!("hotel-{}", i), "rating": i % 5}));
    sender.upload_documents(hotels)?;
    sender.merge_documents(vec![
        json!({"hotelId": "busy-1", "rating": 4}),
        json!({"hotelId": "busy-2", "rating": 2}),
    ])?;
    sender.delete_documents(vec![json!({"hotelId": "bad-1"})])?;
    println!("   {} actions pending\n", sender.pending_count());

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Flush (splits, retries and one terminal failure)
    // ─────────────────────────────────────────────────────────────────────────
    println!("🚀 Flushing...");
    match sender.flush().await {
        Ok(report) => println!("   round: {:?}", report),
        Err(SenderError::TerminalFailures { failed }) => println!("   {} action(s) failed terminally", failed),
        Err(e) => return Err(e.into()),
    }
    println!(
        "   batch action count is now {}, {} action(s) waiting for retry\n",
        sender.batch_action_count(),
        sender.pending_count()
    );

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Retry round
    // ─────────────────────────────────────────────────────────────────────────
    println!("🔁 Flushing retries...");
    let report = sender.flush().await?;
    println!("   round: {} succeeded, {} retried\n", report.succeeded, report.retried);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("📊 Metrics:");
    dump_metrics(&snapshotter);
    println!("   requests sent: {}", transport.call_count());

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Clean shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Closing...");
    let report = sender.close().await?;
    println!("   ✅ Closed! State: {:?}, final round sent {}", sender.state(), report.total);

    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_, key) = composite_key.into_parts();
            let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
            let label_str = if labels.is_empty() { String::new() } else { format!("{{{}}}", labels.join(",")) };
            let rendered = match value {
                DebugValue::Counter(v) => v.to_string(),
                DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
                DebugValue::Histogram(samples) => {
                    let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                    format!("count={} sum={:.3}", samples.len(), sum)
                }
            };
            format!("{}{} = {}", key.name(), label_str, rendered)
        })
        .collect();

    lines.sort();
    for line in lines {
        println!("   └─ {}", line);
    }
}
