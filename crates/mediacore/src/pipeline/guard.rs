//! In-flight de-duplication.
//!
//! The transport occasionally delivers the same file twice. The first
//! delivery takes a ticket; a second delivery inside the window finds the
//! entry and is dropped silently. The ticket removes its entry on drop, so a
//! job that fails halfway still releases the file. An entry older than the
//! window no longer blocks anyone.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Inner {
    entries: DashMap<String, (Instant, u64)>,
    next_id: AtomicU64,
}

#[derive(Debug, Clone)]
pub struct InFlightGuard {
    inner: Arc<Inner>,
    window: Duration,
}

impl InFlightGuard {
    pub fn new(window: Duration) -> Self {
        Self {
            inner: Arc::new(Inner::default()),
            window,
        }
    }

    /// Takes the slot for `key`, or `None` when it was taken less than a window ago
    pub fn try_acquire(&self, key: &str) -> Option<InFlightTicket> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        match self.inner.entries.entry(key.to_string()) {
            Entry::Occupied(entry) if entry.get().0.elapsed() < self.window => return None,
            Entry::Occupied(mut entry) => {
                log::debug!("Stale in-flight entry for {}, taking over", key);
                entry.insert((Instant::now(), id));
            }
            Entry::Vacant(entry) => {
                entry.insert((Instant::now(), id));
            }
        }
        Some(InFlightTicket {
            inner: Arc::clone(&self.inner),
            key: key.to_string(),
            id,
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }
}

/// Held for the lifetime of one job
#[derive(Debug)]
pub struct InFlightTicket {
    inner: Arc<Inner>,
    key: String,
    id: u64,
}

impl Drop for InFlightTicket {
    fn drop(&mut self) {
        // Only remove our own entry; a stale takeover owns the slot now
        self.inner.entries.remove_if(&self.key, |_, (_, id)| *id == self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_within_window_is_rejected() {
        let guard = InFlightGuard::new(Duration::from_secs(10));
        let ticket = guard.try_acquire("file-1");
        assert!(ticket.is_some());
        assert!(guard.try_acquire("file-1").is_none());
        assert!(guard.try_acquire("file-2").is_some());
    }

    #[test]
    fn test_drop_releases_entry() {
        let guard = InFlightGuard::new(Duration::from_secs(10));
        {
            let _ticket = guard.try_acquire("file-1").unwrap();
            assert!(guard.contains("file-1"));
        }
        assert!(!guard.contains("file-1"));
        assert!(guard.try_acquire("file-1").is_some());
    }

    #[test]
    fn test_stale_entry_is_taken_over() {
        let guard = InFlightGuard::new(Duration::from_millis(0));
        let first = guard.try_acquire("file-1").unwrap();
        let second = guard.try_acquire("file-1").unwrap();

        // The stale ticket must not evict the new owner
        drop(first);
        assert!(guard.contains("file-1"));
        drop(second);
        assert!(guard.is_empty());
    }
}
