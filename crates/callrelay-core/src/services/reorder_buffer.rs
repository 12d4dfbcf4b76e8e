//! Enforces non-decreasing `seq` delivery to SSE clients: out-of-order
//! transcript lines are held for up to 250ms, then either released in order
//! or dropped if still out of order once the deadline passes.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

const HOLD_WINDOW: Duration = Duration::from_millis(250);

pub struct ReorderBuffer<T> {
    next_expected_seq: Option<u64>,
    held: BTreeMap<u64, (T, Instant)>,
}

impl<T> Default for ReorderBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ReorderBuffer<T> {
    pub fn new() -> Self {
        Self {
            next_expected_seq: None,
            held: BTreeMap::new(),
        }
    }

    /// Offers an item for `seq`. Returns the in-order run of items now
    /// releasable (possibly including items held from earlier calls).
    pub fn offer(&mut self, seq: u64, item: T, now: Instant) -> Vec<T> {
        self.held.insert(seq, (item, now));
        self.drain_ready(now)
    }

    fn drain_ready(&mut self, now: Instant) -> Vec<T> {
        let mut out = Vec::new();
        loop {
            let Some((&lowest_seq, _)) = self.held.iter().next() else {
                break;
            };
            let expected = self.next_expected_seq.unwrap_or(lowest_seq);
            if lowest_seq == expected {
                let (item, _) = self.held.remove(&lowest_seq).unwrap();
                out.push(item);
                self.next_expected_seq = Some(lowest_seq + 1);
                continue;
            }
            // Out of order: release only once the hold window has elapsed
            // for the oldest pending entry, skipping the gap permanently.
            let (_, inserted_at) = self.held[&lowest_seq];
            if now.saturating_duration_since(inserted_at) >= HOLD_WINDOW {
                let (item, _) = self.held.remove(&lowest_seq).unwrap();
                out.push(item);
                self.next_expected_seq = Some(lowest_seq + 1);
                continue;
            }
            break;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn releases_in_order_immediately() {
        let mut buf = ReorderBuffer::new();
        let now = Instant::now();
        assert_eq!(buf.offer(1, "a", now), vec!["a"]);
        assert_eq!(buf.offer(2, "b", now), vec!["b"]);
    }

    #[test]
    fn holds_out_of_order_until_gap_fills_or_window_elapses() {
        let mut buf = ReorderBuffer::new();
        let now = Instant::now();
        assert_eq!(buf.offer(1, "a", now), vec!["a"]);
        assert!(buf.offer(3, "c", now).is_empty());
        assert_eq!(buf.offer(2, "b", now), vec!["b", "c"]);
    }

    #[test]
    fn drops_gap_after_hold_window() {
        let mut buf = ReorderBuffer::new();
        let now = Instant::now();
        assert_eq!(buf.offer(1, "a", now), vec!["a"]);
        assert!(buf.offer(3, "c", now).is_empty());
        let later = now + Duration::from_millis(300);
        assert_eq!(buf.offer(4, "d", later), vec!["c", "d"]);
    }
}
