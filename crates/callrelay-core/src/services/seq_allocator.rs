//! Short-lived in-memory `seq` allocation for the App ingest endpoint.
//! Valid for 1s per call id; falls back to the store's `max(seq)+1` once
//! the cache entry expires, via UPSERT semantics making any race safe to
//! resolve.

use crate::domain::CallId;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const CACHE_TTL: Duration = Duration::from_secs(1);

struct Entry {
    next_seq: u64,
    expires_at: Instant,
}

/// Per-process (not shared across instances — a multi-instance deployment
/// would need a shared store for this) cache of the next `seq` to assign
/// for a call.
pub struct SeqAllocator {
    entries: Mutex<HashMap<CallId, Entry>>,
}

impl Default for SeqAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SeqAllocator {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the next seq to assign if a cached counter is still valid
    /// for `call_id`, bumping it for the next caller. Returns `None` if the
    /// cache has no entry or it expired — the caller must then fall back to
    /// querying the repository for `max(seq) + 1` and seed the cache with
    /// [`Self::seed`].
    pub fn next(&self, call_id: &CallId, now: Instant) -> Option<u64> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(call_id)?;
        if entry.expires_at < now {
            entries.remove(call_id);
            return None;
        }
        let seq = entry.next_seq;
        entry.next_seq += 1;
        entry.expires_at = now + CACHE_TTL;
        Some(seq)
    }

    /// Seeds (or reseeds) the cache with the seq that was just assigned
    /// from the repository, so the next caller within the TTL window
    /// avoids a repository round-trip.
    pub fn seed(&self, call_id: CallId, assigned_seq: u64, now: Instant) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            call_id,
            Entry {
                next_seq: assigned_seq + 1,
                expires_at: now + CACHE_TTL,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn returns_none_until_seeded() {
        let allocator = SeqAllocator::new();
        assert_eq!(allocator.next(&CallId::new("c1"), Instant::now()), None);
    }

    #[test]
    fn increments_after_seeding_within_ttl() {
        let allocator = SeqAllocator::new();
        let t0 = Instant::now();
        allocator.seed(CallId::new("c1"), 5, t0);
        assert_eq!(allocator.next(&CallId::new("c1"), t0), Some(6));
        assert_eq!(allocator.next(&CallId::new("c1"), t0), Some(7));
    }

    #[test]
    fn expires_after_ttl() {
        let allocator = SeqAllocator::new();
        let t0 = Instant::now();
        allocator.seed(CallId::new("c1"), 5, t0);
        let later = t0 + Duration::from_secs(2);
        assert_eq!(allocator.next(&CallId::new("c1"), later), None);
    }
}
