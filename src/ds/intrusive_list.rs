//! Doubly linked list stored in a slot vector and addressed by [`SlotId`].
//!
//! Containers keep `key -> SlotId` in a side map and splice the node they
//! need in O(1) without holding a reference into the list. The list owns
//! every value; handles are plain indices.
//!
//! ## Layout
//!
//! ```text
//!   slots: Vec<Option<Node<T>>>          vacant: [1]
//!   ┌─────┬──────────────────────────────────────┐
//!   │  0  │ Some { A, prev: None,    next: 2 }   │ ◄── ends.next (front)
//!   │  1  │ None                                 │
//!   │  2  │ Some { B, prev: 0,       next: 3 }   │
//!   │  3  │ Some { C, prev: 2,       next: None }│ ◄── ends.prev (back)
//!   └─────┴──────────────────────────────────────┘
//! ```
//!
//! `ends` plays the part of a sentinel node: a missing neighbour resolves to
//! it, so linking and unlinking never special-case the front or the back.
//! A freed slot goes on `vacant` and is reused by the next insertion, which
//! means a stale `SlotId` may later name a different node. Callers drop a
//! handle as soon as they remove its node.

use crate::error::InvariantError;

/// Handle to one node of an [`IntrusiveList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(usize);

#[derive(Debug, Clone, Copy, Default)]
struct Links {
    prev: Option<SlotId>,
    next: Option<SlotId>,
}

#[derive(Debug)]
struct Node<T> {
    value: T,
    links: Links,
}

/// Linked list over a slot vector; every operation but iteration is O(1).
#[derive(Debug)]
pub struct IntrusiveList<T> {
    slots: Vec<Option<Node<T>>>,
    vacant: Vec<usize>,
    ends: Links,
    len: usize,
}

impl<T> IntrusiveList<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            vacant: Vec::new(),
            ends: Links::default(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn front(&self) -> Option<&T> {
        self.get(self.ends.next?)
    }

    pub fn back(&self) -> Option<&T> {
        self.get(self.ends.prev?)
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.node(id).map(|node| &node.value)
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .map(|node| &mut node.value)
    }

    pub fn push_front(&mut self, value: T) -> SlotId {
        let id = self.alloc(value);
        let next = self.ends.next;
        self.link(id, None, next);
        id
    }

    pub fn push_back(&mut self, value: T) -> SlotId {
        let id = self.alloc(value);
        let prev = self.ends.prev;
        self.link(id, prev, None);
        id
    }

    pub fn pop_front(&mut self) -> Option<T> {
        let id = self.ends.next?;
        self.remove(id)
    }

    pub fn pop_back(&mut self) -> Option<T> {
        let id = self.ends.prev?;
        self.remove(id)
    }

    /// Unlinks node `id`, frees its slot and returns its value.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        self.unlink(id)?;
        let node = self.slots.get_mut(id.0)?.take()?;
        self.vacant.push(id.0);
        self.len -= 1;
        Some(node.value)
    }

    /// Splices node `id` to the front. Returns `false` for a freed slot.
    pub fn move_to_front(&mut self, id: SlotId) -> bool {
        if self.ends.next == Some(id) {
            return true;
        }
        if self.unlink(id).is_none() {
            return false;
        }
        let next = self.ends.next;
        self.link(id, None, next);
        true
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.vacant.clear();
        self.ends = Links::default();
        self.len = 0;
    }

    /// Values from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.walk(self.ends.next).map(|(_, value)| value)
    }

    /// Values strictly behind `id`, towards the back. Empty when `id` is
    /// freed or is the back node.
    pub fn iter_after(&self, id: SlotId) -> impl Iterator<Item = &T> {
        let start = self.node(id).and_then(|node| node.links.next);
        self.walk(start).map(|(_, value)| value)
    }

    /// `(SlotId, value)` pairs from front to back.
    pub fn iter_entries(&self) -> impl Iterator<Item = (SlotId, &T)> {
        self.walk(self.ends.next)
    }

    /// Walks the list front to back and checks it against the slot vector.
    pub fn check_links(&self) -> Result<(), InvariantError> {
        let occupied = self.slots.iter().filter(|slot| slot.is_some()).count();
        if occupied != self.len || occupied + self.vacant.len() != self.slots.len() {
            return Err(InvariantError::new(format!(
                "list counts {} nodes, {} occupied and {} vacant of {} slots",
                self.len,
                occupied,
                self.vacant.len(),
                self.slots.len()
            )));
        }

        let mut expected_prev = None;
        let mut cursor = self.ends.next;
        let mut seen = 0usize;
        while let Some(id) = cursor {
            let node = self
                .node(id)
                .ok_or_else(|| InvariantError::new(format!("link to freed slot {:?}", id)))?;
            if node.links.prev != expected_prev {
                return Err(InvariantError::new(format!(
                    "slot {:?} links back to {:?} instead of {:?}",
                    id, node.links.prev, expected_prev
                )));
            }
            seen += 1;
            if seen > self.len {
                return Err(InvariantError::new("list links form a cycle"));
            }
            expected_prev = Some(id);
            cursor = node.links.next;
        }

        if expected_prev != self.ends.prev || seen != self.len {
            return Err(InvariantError::new(format!(
                "walk reached {} nodes ending at {:?}; list records {} ending at {:?}",
                seen, expected_prev, self.len, self.ends.prev
            )));
        }
        Ok(())
    }

    fn node(&self, id: SlotId) -> Option<&Node<T>> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    /// Links of `at`, or of the sentinel when `at` is `None`.
    fn links_mut(&mut self, at: Option<SlotId>) -> Option<&mut Links> {
        match at {
            Some(id) => self
                .slots
                .get_mut(id.0)
                .and_then(Option::as_mut)
                .map(|node| &mut node.links),
            None => Some(&mut self.ends),
        }
    }

    fn alloc(&mut self, value: T) -> SlotId {
        let node = Some(Node {
            value,
            links: Links::default(),
        });
        self.len += 1;
        match self.vacant.pop() {
            Some(index) => {
                self.slots[index] = node;
                SlotId(index)
            },
            None => {
                self.slots.push(node);
                SlotId(self.slots.len() - 1)
            },
        }
    }

    /// Places detached node `id` between `prev` and `next`.
    fn link(&mut self, id: SlotId, prev: Option<SlotId>, next: Option<SlotId>) {
        if let Some(links) = self.links_mut(Some(id)) {
            *links = Links { prev, next };
        }
        if let Some(links) = self.links_mut(prev) {
            links.next = Some(id);
        }
        if let Some(links) = self.links_mut(next) {
            links.prev = Some(id);
        }
    }

    /// Joins the neighbours of `id` and leaves `id` detached.
    fn unlink(&mut self, id: SlotId) -> Option<()> {
        let Links { prev, next } = self.node(id)?.links;
        if let Some(links) = self.links_mut(prev) {
            links.next = next;
        }
        if let Some(links) = self.links_mut(next) {
            links.prev = prev;
        }
        if let Some(links) = self.links_mut(Some(id)) {
            *links = Links::default();
        }
        Some(())
    }

    fn walk(&self, start: Option<SlotId>) -> impl Iterator<Item = (SlotId, &T)> {
        let mut cursor = start;
        std::iter::from_fn(move || {
            let id = cursor?;
            let node = self.node(id)?;
            cursor = node.links.next;
            Some((id, &node.value))
        })
    }
}
