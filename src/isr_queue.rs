//! # Deferred Completion Queue
//!
//! Interrupt handlers never touch wait queues or the scheduler. A successful
//! release from interrupt context records its object here instead, and the
//! kernel drains the queue at one point: [`Kernel::post_process`], run by the
//! PendSV handler after the last nested interrupt returns and before any
//! thread resumes.
//!
//! The queue is a fixed ring of object references. Each object's header
//! carries a `pending` flag so an object appears at most once no matter how
//! many releases hit it before the drain; the drain wakes as many waiters as
//! the counter allows.
//!
//! [`Kernel::post_process`]: crate::kernel::Kernel::post_process

use core::cell::RefCell;

use critical_section::Mutex;

use crate::config::ISR_QUEUE_SIZE;
use crate::error::{Error, Result};
use crate::object::ObjectRef;
use crate::sync;

struct Ring {
    slots: [Option<ObjectRef>; ISR_QUEUE_SIZE],
    head: usize,
    len: usize,
}

/// Fixed-capacity queue of objects with pending completions.
pub struct IsrQueue {
    ring: Mutex<RefCell<Ring>>,
}

impl IsrQueue {
    pub const fn new() -> Self {
        Self {
            ring: Mutex::new(RefCell::new(Ring {
                slots: [None; ISR_QUEUE_SIZE],
                head: 0,
                len: 0,
            })),
        }
    }

    /// Record a pending completion for `object`.
    ///
    /// Recording an object that is already pending succeeds without using a
    /// slot. A full queue is a resource error and leaves the object
    /// unmarked.
    pub fn put(&self, object: ObjectRef) -> Result<()> {
        let Some(header) = object.block().header() else {
            return Err(Error::Parameter);
        };

        sync::critical_section(|cs| {
            if !header.set_pending() {
                return Ok(());
            }

            let mut ring = self.ring.borrow_ref_mut(cs);
            if ring.len == ISR_QUEUE_SIZE {
                header.clear_pending();
                log::error!("ISR queue overflow, {:?} dropped", object);
                return Err(Error::Resource);
            }
            let tail = (ring.head + ring.len) % ISR_QUEUE_SIZE;
            ring.slots[tail] = Some(object);
            ring.len += 1;
            Ok(())
        })
    }

    /// Take the oldest pending object and clear its mark.
    pub fn get(&self) -> Option<ObjectRef> {
        sync::critical_section(|cs| {
            let mut ring = self.ring.borrow_ref_mut(cs);
            if ring.len == 0 {
                return None;
            }
            let head = ring.head;
            let object = ring.slots[head].take();
            ring.head = (head + 1) % ISR_QUEUE_SIZE;
            ring.len -= 1;

            if let Some(header) = object.and_then(|object| object.block().header()) {
                header.clear_pending();
            }
            object
        })
    }

    /// Number of objects waiting for the drain.
    pub fn len(&self) -> usize {
        sync::critical_section(|cs| self.ring.borrow_ref(cs).len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{leak_pool, occupy};

    fn objects(n: usize) -> Vec<ObjectRef> {
        leak_pool(n)
            .iter_mut()
            .map(|block| {
                // SAFETY: leaked blocks live for the rest of the test binary.
                let object = unsafe { ObjectRef::from_raw(core::ptr::NonNull::from(block)) };
                occupy(object);
                object
            })
            .collect()
    }

    #[test]
    fn test_fifo_drain() {
        let queue = IsrQueue::new();
        let objs = objects(3);
        for &obj in &objs {
            queue.put(obj).unwrap();
        }
        assert_eq!(queue.len(), 3);

        let drained: Vec<_> = core::iter::from_fn(|| queue.get()).collect();
        assert_eq!(drained, objs);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_repeated_put_coalesces() {
        let queue = IsrQueue::new();
        let obj = objects(1)[0];
        queue.put(obj).unwrap();
        queue.put(obj).unwrap();
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.get(), Some(obj));
        // Mark cleared by the drain, so the object can be queued again
        queue.put(obj).unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_overflow_reports_resource_error() {
        let queue = IsrQueue::new();
        let objs = objects(ISR_QUEUE_SIZE + 1);
        for &obj in &objs[..ISR_QUEUE_SIZE] {
            queue.put(obj).unwrap();
        }
        assert_eq!(queue.put(objs[ISR_QUEUE_SIZE]), Err(Error::Resource));

        // The rejected object was not left marked
        queue.get();
        assert_eq!(queue.put(objs[ISR_QUEUE_SIZE]), Ok(()));
    }

    #[test]
    fn test_vacant_object_rejected() {
        let queue = IsrQueue::new();
        let block = leak_pool(1);
        // SAFETY: leaked block lives for the rest of the test binary.
        let obj = unsafe { ObjectRef::from_raw(core::ptr::NonNull::from(&mut block[0])) };
        assert_eq!(queue.put(obj), Err(Error::Parameter));
    }
}
