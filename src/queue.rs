//! Bounded (or unbounded) async priority queues and the three-queue topology
//! (`input` / `main` / `retry`) they compose into.
//!
//! `put` blocks while the queue is at capacity; `get` blocks while it is
//! empty. Ordering is by ascending `priority`; items with equal priority are
//! delivered FIFO (insertion order is the tie-break via a monotonic sequence
//! number).

use std::cmp::Reverse;
use std::cmp::{Ord, Ordering, PartialOrd};
use std::collections::BinaryHeap;

use tokio::sync::{Mutex, Notify};

struct Entry<T> {
    priority: i64,
    seq: u64,
    item: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, self.seq).cmp(&(other.priority, other.seq))
    }
}

struct Inner<T> {
    heap: BinaryHeap<Reverse<Entry<T>>>,
    next_seq: u64,
}

/// A bounded-or-unbounded async min-priority queue. `None` capacity means
/// unbounded (the YAML `-1` convention, see [`crate::config::QueueSize`]).
pub struct PriorityQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Notify,
    not_full: Notify,
    capacity: Option<usize>,
}

impl<T> PriorityQueue<T> {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                heap: BinaryHeap::new(),
                next_seq: 0,
            }),
            not_empty: Notify::new(),
            not_full: Notify::new(),
            capacity,
        }
    }

    /// Enqueues `item` at `priority`, waiting for room if the queue is full.
    pub async fn put(&self, priority: i64, item: T) {
        let mut pending = Some(item);
        loop {
            let notified = self.not_full.notified();
            {
                let mut inner = self.inner.lock().await;
                let has_room = self
                    .capacity
                    .map_or(true, |cap| inner.heap.len() < cap);
                if has_room {
                    let seq = inner.next_seq;
                    inner.next_seq += 1;
                    inner.heap.push(Reverse(Entry {
                        priority,
                        seq,
                        item: pending.take().expect("put polled after completion"),
                    }));
                    drop(inner);
                    self.not_empty.notify_one();
                    return;
                }
            }
            notified.await;
        }
    }

    /// Dequeues the lowest-priority item (with the priority it was enqueued
    /// at), waiting while the queue is empty.
    pub async fn get(&self) -> (i64, T) {
        loop {
            let notified = self.not_empty.notified();
            {
                let mut inner = self.inner.lock().await;
                if let Some(Reverse(entry)) = inner.heap.pop() {
                    drop(inner);
                    self.not_full.notify_one();
                    return (entry.priority, entry.item);
                }
            }
            notified.await;
        }
    }

    pub async fn qsize(&self) -> usize {
        self.inner.lock().await.heap.len()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

/// The three priority queues the pipeline stages read and write. `main` may
/// alias `input` when no filter plugin is configured (see [`crate::filter`]).
pub struct QueueSet<T> {
    pub input: PriorityQueue<T>,
    pub main: PriorityQueue<T>,
    pub retry: PriorityQueue<T>,
}

impl<T> QueueSet<T> {
    pub fn new(
        input_capacity: Option<usize>,
        main_capacity: Option<usize>,
        retry_capacity: Option<usize>,
    ) -> Self {
        Self {
            input: PriorityQueue::new(input_capacity),
            main: PriorityQueue::new(main_capacity),
            retry: PriorityQueue::new(retry_capacity),
        }
    }
}
