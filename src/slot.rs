//! Single-value, overwrite-latest handoff between loops.
//!
//! A `LatestSlot` holds at most one value. Publishing replaces whatever was
//! there; readers get the newest completed publish or nothing. The lock is
//! held only for the `Arc` swap, never across capture or inference, and a
//! stale read is a normal outcome.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

struct SlotState<T> {
    value: Option<Arc<T>>,
    version: u64,
}

/// Overwrite-on-write holder with a version counter and bounded waits.
pub struct LatestSlot<T> {
    state: Mutex<SlotState<T>>,
    changed: Condvar,
}

impl<T> LatestSlot<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                version: 0,
            }),
            changed: Condvar::new(),
        }
    }

    // The guarded state is a handle plus a counter; a panic elsewhere cannot
    // leave it half-written, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, SlotState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store a new value, dropping any unseen older one. Returns its version.
    pub fn publish(&self, value: T) -> u64 {
        self.publish_arc(Arc::new(value))
    }

    pub fn publish_arc(&self, value: Arc<T>) -> u64 {
        let version = {
            let mut state = self.lock();
            state.version += 1;
            state.value = Some(value);
            state.version
        };
        self.changed.notify_all();
        version
    }

    /// Most recent value, or `None` before the first publish or after `clear`.
    pub fn latest(&self) -> Option<Arc<T>> {
        self.lock().value.clone()
    }

    /// Most recent value with the version it was published under.
    pub fn latest_versioned(&self) -> Option<(u64, Arc<T>)> {
        let state = self.lock();
        state.value.clone().map(|value| (state.version, value))
    }

    /// Version of the last publish or clear. Zero means never written.
    pub fn version(&self) -> u64 {
        self.lock().version
    }

    /// Remove the held value so readers observe absence.
    pub fn clear(&self) {
        {
            let mut state = self.lock();
            state.version += 1;
            state.value = None;
        }
        self.changed.notify_all();
    }

    /// Wait up to `timeout` for a value newer than `seen_version`.
    ///
    /// Returns `None` on timeout or when the newer state is empty.
    pub fn wait_newer(&self, seen_version: u64, timeout: Duration) -> Option<(u64, Arc<T>)> {
        let guard = self.lock();
        let (state, _timed_out) = self
            .changed
            .wait_timeout_while(guard, timeout, |state| state.version <= seen_version)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.version <= seen_version {
            return None;
        }
        state.value.clone().map(|value| (state.version, value))
    }

    /// Wake all waiters without publishing, used on shutdown.
    pub fn notify_waiters(&self) {
        self.changed.notify_all();
    }
}

impl<T> Default for LatestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn empty_before_first_publish() {
        let slot: LatestSlot<u32> = LatestSlot::new();
        assert!(slot.latest().is_none());
        assert_eq!(slot.version(), 0);
    }

    #[test]
    fn publish_overwrites_previous_value() {
        let slot = LatestSlot::new();
        slot.publish(1u32);
        slot.publish(2u32);
        assert_eq!(*slot.latest().unwrap(), 2);
        assert_eq!(slot.version(), 2);
    }

    #[test]
    fn clear_surfaces_absence() {
        let slot = LatestSlot::new();
        slot.publish("frame");
        slot.clear();
        assert!(slot.latest().is_none());
    }

    #[test]
    fn wait_newer_times_out_without_publish() {
        let slot = LatestSlot::new();
        let v = slot.publish(7u8);
        assert!(slot.wait_newer(v, Duration::from_millis(10)).is_none());
    }

    #[test]
    fn wait_newer_returns_already_available_value() {
        let slot = LatestSlot::new();
        slot.publish(7u8);
        let (version, value) = slot.wait_newer(0, Duration::from_millis(10)).unwrap();
        assert_eq!(version, 1);
        assert_eq!(*value, 7);
    }

    #[test]
    fn wait_newer_wakes_on_publish_from_other_thread() {
        let slot = Arc::new(LatestSlot::new());
        let writer = slot.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            writer.publish(42u32);
        });
        let got = slot.wait_newer(0, Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(got.map(|(_, v)| *v), Some(42));
    }

    #[test]
    fn concurrent_readers_only_see_whole_values() {
        let slot = Arc::new(LatestSlot::new());
        slot.publish(vec![0u32; 64]);
        let writer = slot.clone();
        let handle = thread::spawn(move || {
            for i in 1..=500u32 {
                writer.publish(vec![i; 64]);
            }
        });
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let slot = slot.clone();
                thread::spawn(move || {
                    let mut last = 0u32;
                    for _ in 0..500 {
                        let value = slot.latest().unwrap();
                        let first = value[0];
                        assert!(value.iter().all(|v| *v == first));
                        assert!(first >= last);
                        last = first;
                    }
                })
            })
            .collect();
        handle.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(slot.latest().unwrap()[0], 500);
    }
}
