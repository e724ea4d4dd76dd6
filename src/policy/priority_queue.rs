//! Indexed min-priority queue with hard admission control.
//!
//! Entries are ordered by ascending priority (smaller is more urgent) and
//! addressed by the `u64` identity of their value, so a caller can re-score
//! or cancel an item it queued earlier without scanning.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                        PriorityQueue<P, T> Layout                           │
//! │                                                                             │
//! │   positions: FxHashMap<u64, usize>        heap: Vec<PriorityEntry<P, T>>    │
//! │   ┌──────┬───────┐                        (implicit binary tree)            │
//! │   │ id 4 │   0   │──────────────►  [0] (-1, id 4)                           │
//! │   │ id 1 │   1   │──────────────►  [1] ( 1, id 1)   [2] ( 2, id 2)          │
//! │   │ id 2 │   2   │──────────────►                                           │
//! │   └──────┴───────┘                                                          │
//! │                                                                             │
//! │   every swap in sift_up / sift_down rewrites both ids' positions            │
//! │   seq: monotonic counter, breaks priority ties in arrival order             │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation          | Complexity | Notes                                    |
//! |--------------------|------------|------------------------------------------|
//! | `put(p, item)`     | O(log n)   | Known id: re-score. New id: admit if room |
//! | `get(id)`          | O(1)       | No reordering                            |
//! | `remove(id)`       | O(log n)   | No-op when absent                        |
//! | `peek()`           | O(1)       | Minimum priority                         |
//! | `tail()`           | O(n)       | Maximum priority, scans the leaves       |
//! | `pop()`            | O(log n)   | Removes the minimum                      |
//! | `elems()`          | O(n log n) | Ascending snapshot                       |
//!
//! A full queue rejects new identities rather than evicting anything. A
//! capacity of 0 rejects every `put`.
//!
//! ## Example
//!
//! ```
//! use metacache::policy::priority_queue::PriorityQueue;
//!
//! let mut pq: PriorityQueue<i64, u64> = PriorityQueue::new(3);
//! assert!(pq.put(1, 1));
//! assert!(pq.put(2, 2));
//! assert!(pq.put(3, 4));
//! assert!(!pq.put(0, 9)); // full, unknown id
//!
//! assert!(pq.put(-1, 4)); // re-score a known id
//! assert_eq!(pq.peek().map(|e| e.id()), Some(4));
//! assert_eq!(pq.tail().map(|e| e.id()), Some(2));
//! ```

use std::cmp::Ordering;
use std::fmt;
#[cfg(feature = "concurrency")]
use std::sync::Arc;

#[cfg(feature = "concurrency")]
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::InvariantError;
use crate::traits::Identified;

/// One queued item together with its priority.
#[derive(Debug, Clone)]
pub struct PriorityEntry<P, T> {
    priority: P,
    value: T,
    id: u64,
    seq: u64,
}

impl<P, T> PriorityEntry<P, T> {
    pub fn priority(&self) -> &P {
        &self.priority
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    /// Identity the entry was queued under.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn into_parts(self) -> (P, T) {
        (self.priority, self.value)
    }
}

impl<P: Ord, T> PriorityEntry<P, T> {
    fn order(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.seq.cmp(&other.seq))
    }
}

/// Single-threaded bounded min-priority queue keyed by item identity.
pub struct PriorityQueue<P, T> {
    heap: Vec<PriorityEntry<P, T>>,
    positions: FxHashMap<u64, usize>,
    capacity: usize,
    seq: u64,
}

impl<P, T> PriorityQueue<P, T>
where
    P: Ord,
    T: Identified,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Vec::with_capacity(capacity),
            positions: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            capacity,
            seq: 0,
        }
    }

    /// Queues `value` at `priority`, or re-scores it if its id is queued.
    ///
    /// Returns `false` only when the id is new and the queue is full; the
    /// queue is left untouched in that case.
    pub fn put(&mut self, priority: P, value: T) -> bool {
        let id = value.id();
        let seq = self.next_seq();

        if let Some(&pos) = self.positions.get(&id) {
            let entry = &mut self.heap[pos];
            entry.priority = priority;
            entry.value = value;
            entry.seq = seq;
            self.repair(pos);
            return true;
        }

        if self.heap.len() >= self.capacity {
            debug!(id, capacity = self.capacity, "Priority queue full, rejecting item");
            return false;
        }

        let pos = self.heap.len();
        self.heap.push(PriorityEntry {
            priority,
            value,
            id,
            seq,
        });
        self.positions.insert(id, pos);
        self.sift_up(pos);
        true
    }

    pub fn get(&self, id: u64) -> Option<&PriorityEntry<P, T>> {
        self.positions.get(&id).map(|&pos| &self.heap[pos])
    }

    pub fn contains(&self, id: u64) -> bool {
        self.positions.contains_key(&id)
    }

    pub fn remove(&mut self, id: u64) -> Option<PriorityEntry<P, T>> {
        let pos = *self.positions.get(&id)?;
        Some(self.remove_at(pos))
    }

    /// Most urgent entry.
    pub fn peek(&self) -> Option<&PriorityEntry<P, T>> {
        self.heap.first()
    }

    /// Least urgent entry. The maximum of a min-heap is always a leaf, so only
    /// the second half of the array is scanned.
    pub fn tail(&self) -> Option<&PriorityEntry<P, T>> {
        let first_leaf = self.heap.len() / 2;
        self.heap[first_leaf..].iter().max_by(|a, b| a.order(b))
    }

    /// Removes and returns the most urgent entry.
    pub fn pop(&mut self) -> Option<PriorityEntry<P, T>> {
        if self.heap.is_empty() {
            return None;
        }
        Some(self.remove_at(0))
    }

    /// All entries, most urgent first.
    pub fn elems(&self) -> Vec<&PriorityEntry<P, T>> {
        let mut entries: Vec<_> = self.heap.iter().collect();
        entries.sort_by(|a, b| a.order(b));
        entries
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.positions.clear();
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.positions.len() != self.heap.len() {
            return Err(InvariantError::new(format!(
                "priority queue indexes {} ids but holds {} entries",
                self.positions.len(),
                self.heap.len()
            )));
        }
        if self.heap.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "priority queue holds {} entries over capacity {}",
                self.heap.len(),
                self.capacity
            )));
        }
        for (pos, entry) in self.heap.iter().enumerate() {
            if self.positions.get(&entry.id) != Some(&pos) {
                return Err(InvariantError::new(format!(
                    "id {} at slot {} is indexed at {:?}",
                    entry.id,
                    pos,
                    self.positions.get(&entry.id)
                )));
            }
            if pos > 0 && self.heap[(pos - 1) / 2].order(entry) == Ordering::Greater {
                return Err(InvariantError::new(format!(
                    "heap order violated between slot {} and its parent",
                    pos
                )));
            }
        }
        Ok(())
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.seq;
        self.seq = self.seq.wrapping_add(1);
        seq
    }

    fn remove_at(&mut self, pos: usize) -> PriorityEntry<P, T> {
        let last = self.heap.len() - 1;
        self.swap(pos, last);
        let entry = self.heap.swap_remove(last);
        self.positions.remove(&entry.id);
        if pos < self.heap.len() {
            self.repair(pos);
        }
        entry
    }

    fn repair(&mut self, pos: usize) {
        if pos > 0 && self.less(pos, (pos - 1) / 2) {
            self.sift_up(pos);
        } else {
            self.sift_down(pos);
        }
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !self.less(pos, parent) {
                break;
            }
            self.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left) {
                right
            } else {
                left
            };
            if !self.less(child, pos) {
                break;
            }
            self.swap(pos, child);
            pos = child;
        }
    }

    fn less(&self, a: usize, b: usize) -> bool {
        self.heap[a].order(&self.heap[b]) == Ordering::Less
    }

    fn swap(&mut self, a: usize, b: usize) {
        if a == b {
            return;
        }
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].id, a);
        self.positions.insert(self.heap[b].id, b);
    }
}

impl<P, T> fmt::Debug for PriorityQueue<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("len", &self.heap.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

/// Thread-safe priority queue; clones share the same heap.
#[cfg(feature = "concurrency")]
pub struct ConcurrentPriorityQueue<P, T> {
    inner: Arc<Mutex<PriorityQueue<P, T>>>,
}

#[cfg(feature = "concurrency")]
impl<P, T> Clone for ConcurrentPriorityQueue<P, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(feature = "concurrency")]
impl<P, T> fmt::Debug for ConcurrentPriorityQueue<P, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConcurrentPriorityQueue")
            .field(&*self.inner.lock())
            .finish()
    }
}

#[cfg(feature = "concurrency")]
impl<P, T> ConcurrentPriorityQueue<P, T>
where
    P: Ord + Clone,
    T: Identified + Clone,
{
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PriorityQueue::new(capacity))),
        }
    }

    pub fn put(&self, priority: P, value: T) -> bool {
        self.inner.lock().put(priority, value)
    }

    pub fn get(&self, id: u64) -> Option<PriorityEntry<P, T>> {
        self.inner.lock().get(id).cloned()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.inner.lock().contains(id)
    }

    pub fn remove(&self, id: u64) -> Option<PriorityEntry<P, T>> {
        self.inner.lock().remove(id)
    }

    pub fn peek(&self) -> Option<PriorityEntry<P, T>> {
        self.inner.lock().peek().cloned()
    }

    pub fn tail(&self) -> Option<PriorityEntry<P, T>> {
        self.inner.lock().tail().cloned()
    }

    pub fn pop(&self) -> Option<PriorityEntry<P, T>> {
        self.inner.lock().pop()
    }

    pub fn elems(&self) -> Vec<PriorityEntry<P, T>> {
        self.inner.lock().elems().into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.inner.lock().check_invariants()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Operator {
        region_id: u64,
        kind: &'static str,
    }

    impl Identified for Operator {
        fn id(&self) -> u64 {
            self.region_id
        }
    }

    fn op(region_id: u64) -> Operator {
        Operator {
            region_id,
            kind: "balance-leader",
        }
    }

    fn ids(pq: &PriorityQueue<i64, Operator>) -> Vec<u64> {
        pq.elems().into_iter().map(|e| e.id()).collect()
    }

    mod basic_behavior {
        use super::*;

        #[test]
        fn update_and_remove_by_identity() {
            let mut pq = PriorityQueue::new(3);
            assert!(pq.put(1, op(1)));
            assert!(pq.put(2, op(2)));
            assert!(pq.put(3, op(4)));
            assert!(!pq.put(5, op(4 + 1)));
            assert_eq!(pq.len(), 3);

            let top = pq.peek().unwrap();
            assert_eq!(*top.priority(), 1);
            assert_eq!(top.id(), 1);

            assert!(pq.put(-1, op(4)));
            assert_eq!(pq.len(), 3);
            let top = pq.peek().unwrap();
            assert_eq!(*top.priority(), -1);
            assert_eq!(top.id(), 4);

            pq.remove(4);
            assert_eq!(pq.peek().map(|e| e.id()), Some(1));
            pq.remove(1);
            let top = pq.peek().unwrap();
            assert_eq!(*top.priority(), 2);
            assert_eq!(top.id(), 2);
            assert_eq!(pq.len(), 1);
            pq.check_invariants().unwrap();
        }

        #[test]
        fn peek_and_tail_track_extremes() {
            let mut pq = PriorityQueue::new(16);
            for (priority, id) in [(5, 1), (3, 2), (9, 3), (1, 4), (7, 5), (8, 6)] {
                pq.put(priority, op(id));
            }

            assert_eq!(pq.peek().map(|e| e.id()), Some(4));
            assert_eq!(pq.tail().map(|e| e.id()), Some(3));
            assert_eq!(ids(&pq), vec![4, 2, 1, 5, 6, 3]);

            pq.put(10, op(1));
            assert_eq!(pq.tail().map(|e| e.id()), Some(1));
            pq.check_invariants().unwrap();
        }

        #[test]
        fn get_does_not_reorder() {
            let mut pq = PriorityQueue::new(4);
            pq.put(2, op(7));
            pq.put(1, op(8));

            let entry = pq.get(7).unwrap();
            assert_eq!(*entry.priority(), 2);
            assert_eq!(entry.value().kind, "balance-leader");
            assert!(pq.get(99).is_none());
            assert_eq!(ids(&pq), vec![8, 7]);
        }

        #[test]
        fn equal_priorities_pop_in_arrival_order() {
            let mut pq = PriorityQueue::new(8);
            for id in [3, 1, 2] {
                pq.put(0, op(id));
            }
            let order: Vec<u64> = std::iter::from_fn(|| pq.pop().map(|e| e.id())).collect();
            assert_eq!(order, vec![3, 1, 2]);
        }

        #[test]
        fn update_replaces_value() {
            let mut pq = PriorityQueue::new(2);
            pq.put(1, op(1));
            pq.put(
                1,
                Operator {
                    region_id: 1,
                    kind: "merge-region",
                },
            );
            assert_eq!(pq.len(), 1);
            assert_eq!(pq.get(1).map(|e| e.value().kind), Some("merge-region"));
        }
    }

    mod admission {
        use super::*;

        #[test]
        fn full_queue_rejects_new_but_accepts_updates() {
            let mut pq = PriorityQueue::new(2);
            pq.put(1, op(1));
            pq.put(2, op(2));

            assert!(!pq.put(-100, op(3)));
            assert!(!pq.contains(3));
            assert_eq!(ids(&pq), vec![1, 2]);

            assert!(pq.put(3, op(1)));
            assert_eq!(ids(&pq), vec![2, 1]);
        }

        #[test]
        fn zero_capacity_rejects_everything() {
            let mut pq: PriorityQueue<i64, Operator> = PriorityQueue::new(0);
            assert!(!pq.put(1, op(1)));
            assert!(pq.is_empty());
            assert!(pq.peek().is_none());
            assert!(pq.tail().is_none());
        }

        #[test]
        fn draining_leaves_nothing() {
            let mut pq = PriorityQueue::new(4);
            for id in 0..4 {
                pq.put(id as i64, op(id));
            }
            for id in 0..4 {
                assert!(pq.remove(id).is_some());
            }
            assert!(pq.remove(0).is_none());
            assert_eq!(pq.len(), 0);
            assert!(pq.peek().is_none());
            assert!(pq.tail().is_none());
            pq.check_invariants().unwrap();
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Put(i64, u64),
            Remove(u64),
            Pop,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                4 => (-50i64..50, 0u64..16).prop_map(|(p, id)| Op::Put(p, id)),
                2 => (0u64..16).prop_map(Op::Remove),
                1 => Just(Op::Pop),
            ]
        }

        proptest! {
            #[test]
            fn extremes_match_sorted_model(
                capacity in 0usize..10,
                ops in prop::collection::vec(op_strategy(), 0..200),
            ) {
                let mut pq: PriorityQueue<i64, u64> = PriorityQueue::new(capacity);
                let mut model: Vec<(i64, u64)> = Vec::new();

                for step in ops {
                    match step {
                        Op::Put(priority, id) => {
                            let known = model.iter().any(|(_, m)| *m == id);
                            let accepted = pq.put(priority, id);
                            prop_assert_eq!(accepted, known || model.len() < capacity);
                            if known {
                                model.retain(|(_, m)| *m != id);
                            }
                            if accepted {
                                model.push((priority, id));
                            }
                        },
                        Op::Remove(id) => {
                            let removed = pq.remove(id).map(|e| e.id());
                            let expected = model.iter().position(|(_, m)| *m == id).map(|pos| model.remove(pos).1);
                            prop_assert_eq!(removed, expected);
                        },
                        Op::Pop => {
                            let min = model.iter().map(|(p, _)| *p).min();
                            let popped = pq.pop();
                            prop_assert_eq!(popped.as_ref().map(|e| *e.priority()), min);
                            if let Some(entry) = popped {
                                model.retain(|(_, m)| *m != entry.id());
                            }
                        },
                    }

                    prop_assert_eq!(pq.len(), model.len());
                    prop_assert_eq!(pq.peek().map(|e| *e.priority()), model.iter().map(|(p, _)| *p).min());
                    prop_assert_eq!(pq.tail().map(|e| *e.priority()), model.iter().map(|(p, _)| *p).max());

                    let priorities: Vec<i64> = pq.elems().into_iter().map(|e| *e.priority()).collect();
                    prop_assert!(priorities.windows(2).all(|w| w[0] <= w[1]));
                    prop_assert!(pq.check_invariants().is_ok());
                }
            }
        }
    }

    #[cfg(feature = "concurrency")]
    mod concurrent {
        use super::*;

        #[test]
        fn wrapper_returns_owned_entries() {
            let pq = ConcurrentPriorityQueue::new(2);
            assert!(pq.put(3, op(1)));
            assert!(pq.put(1, op(2)));
            assert!(!pq.put(0, op(3)));

            assert_eq!(pq.peek().map(|e| e.id()), Some(2));
            assert_eq!(pq.tail().map(|e| e.id()), Some(1));
            let (priority, value) = pq.pop().unwrap().into_parts();
            assert_eq!((priority, value.region_id), (1, 2));
            assert_eq!(pq.elems().len(), 1);
            pq.check_invariants().unwrap();
        }
    }
}
