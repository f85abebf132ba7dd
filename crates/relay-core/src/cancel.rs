//! Per-user stop tokens shared across concurrently handled events.
//!
//! Each user owns one parent [`CancellationToken`]. Batches run on child
//! tokens of the current parent, so a stop reaches every batch that user has
//! in flight. Starting a batch after a stop installs a fresh parent; batches
//! that were already stopped stay stopped.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use tokio_util::sync::CancellationToken;

use crate::domain::UserId;

#[derive(Debug, Default)]
struct UserSlot {
    parent: CancellationToken,
    /// Batches holding a live [`BatchGuard`].
    running: usize,
}

#[derive(Debug, Default)]
pub struct CancelRegistry {
    inner: Mutex<HashMap<UserId, UserSlot>>,
}

/// Held for the lifetime of one batch; dropping it marks the batch finished.
#[derive(Debug)]
pub struct BatchGuard<'a> {
    registry: &'a CancelRegistry,
    user_id: UserId,
    token: CancellationToken,
}

impl BatchGuard<'_> {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        self.registry.with_map(|map| {
            if let Some(slot) = map.get_mut(&self.user_id) {
                slot.running = slot.running.saturating_sub(1);
            }
        });
    }
}

impl CancelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<T>(&self, f: impl FnOnce(&mut HashMap<UserId, UserSlot>) -> T) -> T {
        // The map holds no invariants a panicking writer could break.
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut map)
    }

    /// Reset the user's flag and register a new running batch.
    pub fn begin(&self, user_id: UserId) -> BatchGuard<'_> {
        let token = self.with_map(|map| {
            let slot = map.entry(user_id).or_default();
            if slot.parent.is_cancelled() {
                slot.parent = CancellationToken::new();
            }
            slot.running += 1;
            slot.parent.child_token()
        });
        BatchGuard {
            registry: self,
            user_id,
            token,
        }
    }

    /// Raise the stop flag. Returns `true` only when a batch was running and
    /// had not been stopped yet.
    pub fn cancel(&self, user_id: UserId) -> bool {
        self.with_map(|map| {
            let Some(slot) = map.get(&user_id) else {
                return false;
            };
            let was_live = slot.running > 0 && !slot.parent.is_cancelled();
            slot.parent.cancel();
            was_live
        })
    }

    pub fn is_cancelled(&self, user_id: UserId) -> bool {
        self.with_map(|map| map.get(&user_id).is_some_and(|s| s.parent.is_cancelled()))
    }

    pub fn running(&self, user_id: UserId) -> usize {
        self.with_map(|map| map.get(&user_id).map_or(0, |s| s.running))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn default_state_is_not_cancelled() {
        let reg = CancelRegistry::new();
        assert!(!reg.is_cancelled(UserId(1)));
        let guard = reg.begin(UserId(1));
        assert!(!guard.token().is_cancelled());
    }

    #[test]
    fn cancel_reaches_outstanding_tokens() {
        let reg = CancelRegistry::new();
        let a = reg.begin(UserId(1));
        let b = reg.begin(UserId(1));
        assert_eq!(reg.running(UserId(1)), 2);
        assert!(reg.cancel(UserId(1)));
        assert!(a.token().is_cancelled());
        assert!(b.token().is_cancelled());
        assert!(reg.is_cancelled(UserId(1)));
    }

    #[test]
    fn cancel_is_idempotent() {
        let reg = CancelRegistry::new();
        let _guard = reg.begin(UserId(1));
        assert!(reg.cancel(UserId(1)));
        assert!(!reg.cancel(UserId(1)));
        assert!(reg.is_cancelled(UserId(1)));
    }

    #[test]
    fn cancel_after_batch_finished_reports_nothing_running() {
        let reg = CancelRegistry::new();
        let guard = reg.begin(UserId(1));
        drop(guard);
        assert_eq!(reg.running(UserId(1)), 0);
        assert!(!reg.cancel(UserId(1)));
    }

    #[test]
    fn begin_after_cancel_resets_without_reviving_old_tokens() {
        let reg = CancelRegistry::new();
        let old = reg.begin(UserId(1));
        reg.cancel(UserId(1));

        let fresh = reg.begin(UserId(1));
        assert!(!fresh.token().is_cancelled());
        assert!(!reg.is_cancelled(UserId(1)));
        assert!(old.token().is_cancelled());
    }

    #[test]
    fn users_are_independent() {
        let reg = CancelRegistry::new();
        let a = reg.begin(UserId(1));
        let b = reg.begin(UserId(2));
        reg.cancel(UserId(2));
        assert!(!a.token().is_cancelled());
        assert!(b.token().is_cancelled());
    }

    #[test]
    fn stop_before_any_batch_does_not_leak_into_next_batch() {
        let reg = CancelRegistry::new();
        assert!(!reg.cancel(UserId(3)));
        let guard = reg.begin(UserId(3));
        assert!(!guard.token().is_cancelled());
    }

    #[tokio::test]
    async fn cancel_from_another_task_is_observed() {
        let reg = Arc::new(CancelRegistry::new());
        let token = reg.begin(UserId(1)).token().clone();

        let reg2 = reg.clone();
        tokio::spawn(async move {
            reg2.cancel(UserId(1));
        })
        .await
        .unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), token.cancelled())
            .await
            .expect("cancellation observed");
    }
}
