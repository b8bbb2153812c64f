// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-memory transport driven by a responder closure.
//!
//! Records every request it receives, which makes it the workhorse for tests
//! and local demos.
//!
//! ```
//! use buffered_sender::transport::{ScriptedTransport, BatchResponse};
//!
//! // Accept everything with 201
//! let transport = ScriptedTransport::new(|request, _call| Ok(BatchResponse::uniform(request, 201)));
//! assert_eq!(transport.call_count(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::{BatchRequest, BatchResponse, Transport, TransportError};

type Responder = dyn Fn(&BatchRequest, usize) -> Result<BatchResponse, TransportError> + Send + Sync;

pub struct ScriptedTransport {
    responder: Box<Responder>,
    latency: Option<Duration>,
    calls: AtomicUsize,
    requests: Mutex<Vec<BatchRequest>>,
}

impl ScriptedTransport {
    /// `responder` receives each request and its zero-based call index.
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&BatchRequest, usize) -> Result<BatchResponse, TransportError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            latency: None,
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every action of every request with `status_code`.
    #[must_use]
    pub fn always(status_code: u16) -> Self {
        Self::new(move |request, _| Ok(BatchResponse::uniform(request, status_code)))
    }

    /// Delay every response by `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of `send` calls so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in call order
    #[must_use]
    pub fn requests(&self) -> Vec<BatchRequest> {
        self.requests.lock().clone()
    }

    /// Total actions received across all calls (resends counted again)
    #[must_use]
    pub fn actions_received(&self) -> usize {
        self.requests.lock().iter().map(BatchRequest::len).sum()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &BatchRequest) -> Result<BatchResponse, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        (self.responder)(request, call)
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("calls", &self.call_count())
            .field("latency", &self.latency)
            .finish()
    }
}
