// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batching primitives: the pending action queue and the batch splitter.

pub mod pending;
pub mod splitter;

pub use pending::PendingActionSet;
pub use splitter::{halve, max_split_depth};

/// Trait for items that know their own approximate size
pub trait SizedItem {
    #[must_use]
    fn size_bytes(&self) -> usize;
}

/// Total approximate size of a slice of items
#[must_use]
pub fn total_bytes<T: SizedItem>(items: &[T]) -> usize {
    items.iter().map(SizedItem::size_bytes).sum()
}
