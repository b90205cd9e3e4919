//! Per-pair mutual exclusion
//!
//! Every mutating operation on a pair `{a, b}` holds that pair's lock for its
//! whole check-then-commit sequence. Operations on different pairs proceed
//! concurrently. Slots are created on demand and dropped once the last holder
//! or waiter releases them.

use crate::types::PairKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Registry of pair locks.
#[derive(Debug, Default)]
pub struct PairLocks {
    slots: Mutex<HashMap<PairKey, Slot>>,
}

/// Exclusive hold on one pair. Released on drop.
#[derive(Debug)]
pub struct PairGuard<'a> {
    locks: &'a PairLocks,
    key: PairKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl PairLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    pub async fn lock(&self, key: &PairKey) -> PairGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        // Declared before `acquire` so that, if this future is dropped
        // mid-wait, the slot reference inside `acquire` is gone by the time
        // the waiter reclaims the slot.
        let _waiter = Waiter { locks: self, key };
        let mut acquire: Acquire = Box::pin(slot.lock_owned());
        let guard = (&mut acquire).await;
        tracing::trace!(pair = %key, "pair lock acquired");

        PairGuard {
            locks: self,
            key: key.clone(),
            guard: Some(guard),
        }
    }

    /// Number of live slots.
    pub fn active(&self) -> usize {
        self.slots.lock().len()
    }

    fn release(&self, key: &PairKey) {
        let mut slots = self.slots.lock();
        // Only the registry's own reference left: nobody holds or awaits it.
        if slots
            .get(key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(key);
        }
    }
}

type Acquire = Pin<Box<dyn Future<Output = OwnedMutexGuard<()>> + Send>>;

/// An acquisition in progress. Dropping it reclaims the slot if no one else
/// holds or awaits it; once the lock is held this is a no-op.
struct Waiter<'a> {
    locks: &'a PairLocks,
    key: &'a PairKey,
}

impl Drop for Waiter<'_> {
    fn drop(&mut self) {
        self.locks.release(self.key);
    }
}

impl PairGuard<'_> {
    /// The locked pair.
    pub fn key(&self) -> &PairKey {
        &self.key
    }
}

impl Drop for PairGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserRef;
    use std::time::Duration;

    fn pair(a: &str, b: &str) -> PairKey {
        PairKey::new(UserRef::new(a), UserRef::new(b)).unwrap()
    }

    #[tokio::test]
    async fn test_slot_reclaimed_after_release() {
        let locks = PairLocks::new();
        {
            let guard = locks.lock(&pair("alice", "bob")).await;
            assert_eq!(guard.key(), &pair("bob", "alice"));
            assert_eq!(locks.active(), 1);
        }
        assert_eq!(locks.active(), 0);
    }

    #[tokio::test]
    async fn test_same_pair_is_exclusive_in_both_directions() {
        let locks = PairLocks::new();
        let _held = locks.lock(&pair("alice", "bob")).await;

        let blocked = tokio::time::timeout(
            Duration::from_millis(20),
            locks.lock(&pair("bob", "alice")),
        )
        .await;
        assert!(blocked.is_err());
    }

    #[tokio::test]
    async fn test_distinct_pairs_do_not_block() {
        let locks = PairLocks::new();
        let _held = locks.lock(&pair("alice", "bob")).await;

        let other = tokio::time::timeout(
            Duration::from_millis(20),
            locks.lock(&pair("alice", "carol")),
        )
        .await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_abandoned_waiter_reclaims_slot() {
        let locks = PairLocks::new();
        let key = pair("alice", "bob");
        let holder = locks.lock(&key).await;

        let mut waiter = Box::pin(locks.lock(&key));
        assert!(futures::poll!(waiter.as_mut()).is_pending());

        // The holder leaves first; the waiter gives up without being polled
        // again.
        drop(holder);
        assert_eq!(locks.active(), 1);
        drop(waiter);

        assert_eq!(locks.active(), 0);
    }
}
