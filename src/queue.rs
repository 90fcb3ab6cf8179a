//! Priority output queue (component I, §4.I): bounded, lowest-priority-number-first with FIFO
//! tie-break, lazy expiration, and a wake-up signal for sink dispatchers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Mutex;

use tokio::time::Instant;

struct Entry {
    data: Vec<u8>,
    priority: i32,
    expires_at: Instant,
    sequence: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// `BinaryHeap` is a max-heap; lowest priority number (highest precedence) and earlier
    /// insertion must sort as "greatest" so they pop first.
    fn cmp(&self, other: &Self) -> Ordering {
        other.priority.cmp(&self.priority).then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Bounded priority queue of framed output data (§4.I).
pub struct PriorityQueue {
    heap: Mutex<BinaryHeap<Entry>>,
    max: usize,
    closed: AtomicBool,
    next_sequence: AtomicU64,
    data_available_tx: flume::Sender<()>,
    data_available_rx: flume::Receiver<()>,
}

impl PriorityQueue {
    pub fn new(max: usize) -> Self {
        let (tx, rx) = flume::bounded(1);
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            max,
            closed: AtomicBool::new(false),
            next_sequence: AtomicU64::new(0),
            data_available_tx: tx,
            data_available_rx: rx,
        }
    }

    /// Wait for the next `DataAvailable` notification. Buffered to one pending signal.
    pub async fn data_available(&self) {
        let _ = self.data_available_rx.recv_async().await;
    }

    /// Insert `data` at `priority` with a time-to-live. Silently dropped once closed.
    pub fn put(&self, priority: i32, ttl: std::time::Duration, data: Vec<u8>, now: Instant) {
        if self.closed.load(AtomicOrdering::Acquire) {
            return;
        }
        let sequence = self.next_sequence.fetch_add(1, AtomicOrdering::Relaxed);
        let mut heap = self.heap.lock().expect("queue mutex poisoned");
        heap.push(Entry {
            data,
            priority,
            expires_at: now + ttl,
            sequence,
        });
        if heap.len() > self.max + self.max / 10 {
            prune(&mut heap, self.max);
        }
        drop(heap);
        let _ = self.data_available_tx.try_send(());
    }

    /// Non-destructive peek at the highest-precedence non-expired entry.
    pub fn peek_first(&self, now: Instant) -> Option<(Vec<u8>, i32)> {
        let mut heap = self.heap.lock().expect("queue mutex poisoned");
        discard_expired(&mut heap, now);
        heap.peek().map(|e| (e.data.clone(), e.priority))
    }

    /// Destructive pop of the highest-precedence non-expired entry.
    pub fn pop_first(&self, now: Instant) -> Option<(Vec<u8>, i32)> {
        let mut heap = self.heap.lock().expect("queue mutex poisoned");
        discard_expired(&mut heap, now);
        heap.pop().map(|e| (e.data, e.priority))
    }

    /// Inspection dump of every (non-pruned) entry's data, optionally pruning to `max` first.
    pub fn dump(&self, prune_first: bool) -> Vec<Vec<u8>> {
        let mut heap = self.heap.lock().expect("queue mutex poisoned");
        if prune_first {
            prune(&mut heap, self.max);
        }
        heap.iter().map(|e| e.data.clone()).collect()
    }

    /// Idempotent close. Further `put` calls become no-ops.
    pub fn close(&self) {
        self.closed.store(true, AtomicOrdering::Release);
        let _ = self.data_available_tx.try_send(());
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(AtomicOrdering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.heap.lock().expect("queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn discard_expired(heap: &mut BinaryHeap<Entry>, now: Instant) {
    while let Some(top) = heap.peek() {
        if top.expires_at <= now {
            heap.pop();
        } else {
            break;
        }
    }
}

/// Remove lowest-precedence (highest priority-number) entries until `heap.len() <= max`.
fn prune(heap: &mut BinaryHeap<Entry>, max: usize) {
    if heap.len() <= max {
        return;
    }
    let mut kept: Vec<Entry> = Vec::with_capacity(max);
    let mut all: Vec<Entry> = std::mem::take(heap).into_sorted_vec();
    // into_sorted_vec is ascending by Ord, i.e. lowest-precedence first; keep the tail.
    let drop_count = all.len() - max;
    all.drain(0..drop_count);
    kept.append(&mut all);
    *heap = kept.into_iter().collect();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn pop_returns_lowest_priority_number_first() {
        let q = PriorityQueue::new(10);
        let now = Instant::now();
        q.put(5, Duration::from_secs(60), b"low-precedence".to_vec(), now);
        q.put(1, Duration::from_secs(60), b"high-precedence".to_vec(), now);
        let (data, priority) = q.pop_first(now).unwrap();
        assert_eq!(data, b"high-precedence");
        assert_eq!(priority, 1);
    }

    #[test]
    fn same_priority_is_fifo() {
        let q = PriorityQueue::new(10);
        let now = Instant::now();
        q.put(1, Duration::from_secs(60), b"first".to_vec(), now);
        q.put(1, Duration::from_secs(60), b"second".to_vec(), now);
        assert_eq!(q.pop_first(now).unwrap().0, b"first");
        assert_eq!(q.pop_first(now).unwrap().0, b"second");
    }

    #[test]
    fn expired_entries_are_skipped_on_pop() {
        let q = PriorityQueue::new(10);
        let now = Instant::now();
        q.put(1, Duration::from_millis(1), b"stale".to_vec(), now);
        q.put(2, Duration::from_secs(60), b"fresh".to_vec(), now);
        let later = now + Duration::from_secs(1);
        let (data, _) = q.pop_first(later).unwrap();
        assert_eq!(data, b"fresh");
    }

    #[test]
    fn put_is_a_noop_after_close() {
        let q = PriorityQueue::new(10);
        let now = Instant::now();
        q.close();
        q.put(1, Duration::from_secs(60), b"dropped".to_vec(), now);
        assert!(q.is_empty());
    }

    #[test]
    fn prune_keeps_highest_precedence_entries_within_bound() {
        let q = PriorityQueue::new(4);
        let now = Instant::now();
        for priority in 0..10 {
            q.put(priority, Duration::from_secs(60), vec![priority as u8], now);
        }
        assert!(q.len() <= 4);
        let (data, priority) = q.peek_first(now).unwrap();
        assert_eq!(priority, 0);
        assert_eq!(data, vec![0]);
    }
}
