//! Key Lock Module
//!
//! Per-key async mutual exclusion. Operations on the same key serialize;
//! operations on different keys proceed concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

// == Key Locks ==
/// Table of lazily created per-key locks.
///
/// Slots are dropped from the table once no guard or waiter references them,
/// so the table only ever holds keys with work in progress.
#[derive(Debug, Default)]
pub struct KeyLocks {
    slots: Mutex<HashMap<String, Slot>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    // == Acquire ==
    /// Waits until `key` is free and returns a guard holding it.
    pub async fn acquire(&self, key: &str) -> KeyGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(key.to_string()).or_default().clone()
        };

        let guard = slot.clone().lock_owned().await;

        KeyGuard {
            locks: self,
            key: key.to_string(),
            slot,
            guard: Some(guard),
        }
    }

    /// Returns true if some task currently holds or awaits `key`.
    pub fn is_busy(&self, key: &str) -> bool {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.contains_key(key)
    }

    /// Number of keys with a holder or waiter.
    pub fn len(&self) -> usize {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// == Key Guard ==
/// Holds one key until dropped.
#[derive(Debug)]
pub struct KeyGuard<'a> {
    locks: &'a KeyLocks,
    key: String,
    slot: Slot,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();

        let mut slots = self
            .locks
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // One reference in the table, one in this guard: nobody is waiting.
        if Arc::strong_count(&self.slot) == 2 {
            slots.remove(&self.key);
        }
    }
}
