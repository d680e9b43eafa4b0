//! Per-summary-key advisory locks.
//!
//! Mutations of one `(user, year, month)` must not interleave: an admin
//! recalculating while another adjusts would otherwise lose one of the two
//! writes. Different keys never contend.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::types::SummaryKey;

/// Registry of one mutex per summary key, created on demand.
#[derive(Debug, Default)]
pub struct SummaryLocks {
    slots: Mutex<HashMap<SummaryKey, Arc<Mutex<()>>>>,
}

impl SummaryLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` while holding the lock for `key`.
    pub fn with_lock<T>(&self, key: &SummaryKey, f: impl FnOnce() -> T) -> T {
        self.with_locks(std::slice::from_ref(key), f)
    }

    /// Runs `f` while holding the locks for every key in `keys`.
    ///
    /// Locks are taken in key order so overlapping batches cannot deadlock.
    pub fn with_locks<T>(&self, keys: &[SummaryKey], f: impl FnOnce() -> T) -> T {
        let keys: BTreeSet<&SummaryKey> = keys.iter().collect();
        let slots: Vec<(SummaryKey, Arc<Mutex<()>>)> = {
            let mut registry = acquire(&self.slots);
            keys.into_iter()
                .map(|key| {
                    let slot = registry.entry(key.clone()).or_default();
                    (key.clone(), Arc::clone(slot))
                })
                .collect()
        };

        let result = {
            let _guards: Vec<MutexGuard<'_, ()>> =
                slots.iter().map(|(_, slot)| acquire(slot)).collect();
            f()
        };

        let mut registry = acquire(&self.slots);
        for (key, slot) in slots {
            // Only the registry and this call hold it: nobody is waiting.
            if Arc::strong_count(&slot) == 2 {
                registry.remove(&key);
            }
        }
        result
    }

    /// Number of keys currently locked or waited on.
    #[must_use]
    pub fn active(&self) -> usize {
        acquire(&self.slots).len()
    }
}

fn acquire<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{UserId, YearMonth};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    fn key(user: &str, month: u32) -> SummaryKey {
        SummaryKey::new(UserId::new(user).unwrap(), YearMonth::new(2025, month).unwrap())
    }

    #[test]
    fn same_key_is_serialized() {
        let locks = Arc::new(SummaryLocks::new());
        let in_flight = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let in_flight = Arc::clone(&in_flight);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    locks.with_lock(&key("u-1", 3), || {
                        if in_flight.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlaps.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::sleep(Duration::from_millis(2));
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn different_keys_do_not_block() {
        let locks = SummaryLocks::new();
        let value = locks.with_lock(&key("u-1", 3), || {
            // Re-entering with another key must not deadlock.
            locks.with_lock(&key("u-2", 3), || 7)
        });
        assert_eq!(value, 7);
        assert_eq!(locks.active(), 0);
    }

    #[test]
    fn batch_locks_dedupe_keys() {
        let locks = SummaryLocks::new();
        let keys = [key("u-1", 3), key("u-1", 3), key("u-1", 4)];
        let seen = locks.with_locks(&keys, || locks.active());
        assert_eq!(seen, 2);
        assert_eq!(locks.active(), 0);
    }
}
