//! # Wait Queue
//!
//! Singly-linked list of threads ordered by priority (highest first), FIFO
//! among equal priorities. Links live in the thread table, so the list
//! itself is just a head and never owns a thread.
//!
//! The same list backs an object's blocked threads and the scheduler's
//! ready list. A thread is on at most one list at a time.
//!
//! Waiter counts are small, so insertion and arbitrary removal are O(n)
//! scans.

use crate::thread::{ThreadId, ThreadTable};

/// Head of a priority-ordered thread list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadList {
    head: Option<ThreadId>,
}

impl ThreadList {
    pub const fn new() -> Self {
        Self { head: None }
    }

    /// True when no thread is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Highest-priority (then earliest) thread, without removing it.
    #[inline]
    pub fn head(&self) -> Option<ThreadId> {
        self.head
    }

    /// Insert `id` behind every thread of greater or equal priority.
    pub fn insert(&mut self, threads: &mut ThreadTable, id: ThreadId) {
        let priority = threads.tcb(id).priority;

        let mut prev: Option<ThreadId> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            if threads.tcb(current).priority < priority {
                break;
            }
            prev = Some(current);
            cursor = threads.tcb(current).next;
        }

        threads.tcb_mut(id).next = cursor;
        match prev {
            Some(prev) => threads.tcb_mut(prev).next = Some(id),
            None => self.head = Some(id),
        }
    }

    /// Remove and return the head.
    pub fn pop_highest(&mut self, threads: &mut ThreadTable) -> Option<ThreadId> {
        let id = self.head?;
        self.head = threads.tcb(id).next;
        threads.tcb_mut(id).next = None;
        Some(id)
    }

    /// Remove `id` from anywhere in the list. Returns `false` if absent.
    pub fn remove(&mut self, threads: &mut ThreadTable, id: ThreadId) -> bool {
        let mut prev: Option<ThreadId> = None;
        let mut cursor = self.head;
        while let Some(current) = cursor {
            let next = threads.tcb(current).next;
            if current == id {
                match prev {
                    Some(prev) => threads.tcb_mut(prev).next = next,
                    None => self.head = next,
                }
                threads.tcb_mut(id).next = None;
                return true;
            }
            prev = Some(current);
            cursor = next;
        }
        false
    }

    /// Walk the list in wake-up order.
    #[cfg(test)]
    pub(crate) fn iter<'a>(&self, threads: &'a ThreadTable) -> impl Iterator<Item = ThreadId> + 'a {
        let mut cursor = self.head;
        core::iter::from_fn(move || {
            let id = cursor?;
            cursor = threads.tcb(id).next;
            Some(id)
        })
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ThreadAttr;

    fn table_with(priorities: &[u8]) -> (ThreadTable, Vec<ThreadId>) {
        let mut table = ThreadTable::new();
        let ids = priorities
            .iter()
            .map(|&priority| table.alloc(ThreadAttr { name: None, priority }).unwrap())
            .collect();
        (table, ids)
    }

    #[test]
    fn test_priority_then_fifo_order() {
        let (mut table, ids) = table_with(&[1, 3, 1, 3, 2]);
        let mut list = ThreadList::new();
        for &id in &ids {
            list.insert(&mut table, id);
        }

        let order: Vec<_> = list.iter(&table).collect();
        assert_eq!(order, vec![ids[1], ids[3], ids[4], ids[0], ids[2]]);
        assert_eq!(list.iter(&table).count(), 5);
    }

    #[test]
    fn test_pop_highest_empties_list() {
        let (mut table, ids) = table_with(&[1, 2]);
        let mut list = ThreadList::new();
        list.insert(&mut table, ids[0]);
        list.insert(&mut table, ids[1]);

        assert_eq!(list.pop_highest(&mut table), Some(ids[1]));
        assert_eq!(list.pop_highest(&mut table), Some(ids[0]));
        assert_eq!(list.pop_highest(&mut table), None);
        assert!(list.is_empty());
    }

    #[test]
    fn test_remove_middle_and_last() {
        let (mut table, ids) = table_with(&[3, 2, 1]);
        let mut list = ThreadList::new();
        for &id in &ids {
            list.insert(&mut table, id);
        }

        assert!(list.remove(&mut table, ids[1]));
        assert!(!list.remove(&mut table, ids[1]));
        assert_eq!(list.iter(&table).collect::<Vec<_>>(), vec![ids[0], ids[2]]);

        assert!(list.remove(&mut table, ids[2]));
        assert!(list.remove(&mut table, ids[0]));
        assert!(list.is_empty());
    }

    #[test]
    fn test_reinsert_after_pop() {
        let (mut table, ids) = table_with(&[2, 2]);
        let mut list = ThreadList::new();
        list.insert(&mut table, ids[0]);
        list.insert(&mut table, ids[1]);

        let first = list.pop_highest(&mut table).unwrap();
        list.insert(&mut table, first);
        assert_eq!(list.iter(&table).collect::<Vec<_>>(), vec![ids[1], ids[0]]);
    }
}
