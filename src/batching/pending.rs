// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pending action queue.
//!
//! The [`PendingActionSet`] owns every action that is waiting to be sent.
//! Flush rounds drain it from the front, and retryable actions go back to the
//! front so older work is preferred over newly appended actions.
//!
//! # Example
//!
//! ```
//! use buffered_sender::{PendingActionSet, IndexAction, ActionKind};
//! use serde_json::json;
//!
//! let set = PendingActionSet::default();
//! set.append(vec![
//!     IndexAction::new(ActionKind::Upload, "a".into(), json!({"id": "a"})),
//!     IndexAction::new(ActionKind::Upload, "b".into(), json!({"id": "b"})),
//! ]);
//! assert_eq!(set.len(), 2);
//!
//! let drained = set.drain_up_to(1);
//! assert_eq!(drained[0].key, "a");
//!
//! set.reinsert_front(drained);
//! assert_eq!(set.snapshot()[0].key, "a");
//! ```

use std::collections::VecDeque;
use parking_lot::Mutex;
use tracing::debug;

use crate::action::{ActionState, IndexAction};
use crate::hooks::HookSet;

/// Thread-safe FIFO of actions awaiting dispatch.
#[derive(Debug, Default)]
pub struct PendingActionSet {
    queue: Mutex<VecDeque<IndexAction>>,
    hooks: HookSet,
}

impl PendingActionSet {
    pub(crate) fn with_hooks(hooks: HookSet) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            hooks,
        }
    }

    /// Admit actions in the given order. Returns the queue length afterwards.
    ///
    /// `action_added` fires for each action before it becomes visible to a
    /// flush, so observers never see a completion before the admission.
    pub fn append(&self, actions: Vec<IndexAction>) -> usize {
        if actions.is_empty() {
            return self.len();
        }

        let count = actions.len();
        let mut admitted = Vec::with_capacity(count);
        for mut action in actions {
            action.state = ActionState::Pending;
            self.hooks.added(&action);
            admitted.push(action);
        }

        let mut queue = self.queue.lock();
        queue.extend(admitted);
        let len = queue.len();
        drop(queue);

        debug!(count, pending = len, "Actions appended");
        crate::metrics::record_actions_added(count);
        crate::metrics::set_pending_actions(len);
        len
    }

    /// Atomically remove up to `max` actions from the front, in FIFO order.
    pub fn drain_up_to(&self, max: usize) -> Vec<IndexAction> {
        let mut queue = self.queue.lock();
        let take = max.min(queue.len());
        let mut drained: Vec<IndexAction> = queue.drain(..take).collect();
        let remaining = queue.len();
        drop(queue);

        for action in &mut drained {
            action.state = ActionState::InFlight;
        }
        crate::metrics::set_pending_actions(remaining);
        drained
    }

    /// Put retryable actions back at the front, keeping their relative order.
    pub fn reinsert_front(&self, actions: Vec<IndexAction>) {
        if actions.is_empty() {
            return;
        }

        let count = actions.len();
        let mut queue = self.queue.lock();
        for mut action in actions.into_iter().rev() {
            action.state = ActionState::RetryScheduled;
            queue.push_front(action);
        }
        let len = queue.len();
        drop(queue);

        debug!(count, pending = len, "Actions returned for retry");
        crate::metrics::set_pending_actions(len);
    }

    /// Number of pending actions. May be stale by the time it is read.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Cloned view of the pending and retry-scheduled actions, front first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<IndexAction> {
        self.queue.lock().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionKind;
    use crate::hooks::LifecycleHooks;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn action(key: &str) -> IndexAction {
        IndexAction::new(ActionKind::Upload, key.to_string(), json!({"id": key}))
    }

    fn keys(actions: &[IndexAction]) -> Vec<String> {
        actions.iter().map(|a| a.key.clone()).collect()
    }

    #[test]
    fn test_empty_initially() {
        let set = PendingActionSet::default();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
        assert!(set.drain_up_to(10).is_empty());
    }

    #[test]
    fn test_drain_preserves_fifo_order() {
        let set = PendingActionSet::default();
        set.append(vec![action("a"), action("b"), action("c")]);

        let first = set.drain_up_to(2);
        assert_eq!(keys(&first), vec!["a", "b"]);
        assert!(first.iter().all(|a| a.state == ActionState::InFlight));

        let rest = set.drain_up_to(10);
        assert_eq!(keys(&rest), vec!["c"]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_reinsert_front_precedes_new_work() {
        let set = PendingActionSet::default();
        set.append(vec![action("a"), action("b"), action("c")]);

        let drained = set.drain_up_to(2);
        set.append(vec![action("d")]);
        set.reinsert_front(drained);

        let snapshot = set.snapshot();
        assert_eq!(keys(&snapshot), vec!["a", "b", "c", "d"]);
        assert_eq!(snapshot[0].state, ActionState::RetryScheduled);
        assert_eq!(snapshot[3].state, ActionState::Pending);
    }

    #[test]
    fn test_duplicate_keys_tracked_independently() {
        let set = PendingActionSet::default();
        set.append(vec![action("dup"), action("dup")]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_added_hook_fires_once_per_action_not_on_reinsert() {
        #[derive(Default)]
        struct Counter(AtomicUsize);
        impl LifecycleHooks for Counter {
            fn action_added(&self, _action: &IndexAction) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let counter = Arc::new(Counter::default());
        let set = PendingActionSet::with_hooks(HookSet::new(Some(counter.clone())));

        set.append(vec![action("a"), action("b")]);
        let drained = set.drain_up_to(2);
        set.reinsert_front(drained);

        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_append_and_drain() {
        let set = Arc::new(PendingActionSet::default());
        let mut handles = vec![];

        for t in 0..8 {
            let set = set.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    set.append(vec![action(&format!("t{}-{}", t, i))]);
                }
            }));
        }

        let drainer = {
            let set = set.clone();
            std::thread::spawn(move || {
                let mut seen = 0;
                for _ in 0..100 {
                    seen += set.drain_up_to(7).len();
                }
                seen
            })
        };

        for handle in handles {
            handle.join().unwrap();
        }
        let drained = drainer.join().unwrap();

        assert_eq!(drained + set.len(), 400);
    }
}
