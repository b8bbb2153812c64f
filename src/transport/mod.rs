// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Transport seam between the sender and the remote document store.

pub mod traits;
pub mod memory;

pub use traits::{Transport, TransportError, BatchRequest, BatchResponse, RequestAction, ActionResult};
pub use memory::ScriptedTransport;
