//! # Control Block Pool
//!
//! Fixed-block allocator for kernel-owned control blocks. The pool is a
//! `'static` array handed to the kernel at initialization; a block is free
//! while it holds [`ControlBlock::Vacant`].

use core::ptr::NonNull;

use crate::object::{ControlBlock, ObjectRef};

/// Pool of control blocks.
pub struct MemoryPool {
    base: NonNull<ControlBlock>,
    len: usize,
}

// SAFETY: the pool only hands out pointers into its own 'static array and is
// itself only used inside the service boundary.
unsafe impl Send for MemoryPool {}

impl MemoryPool {
    /// Take ownership of `blocks`. Every block must be vacant on entry.
    pub fn new(blocks: &'static mut [ControlBlock]) -> Self {
        let len = blocks.len();
        let base = NonNull::from(blocks).cast::<ControlBlock>();
        Self { base, len }
    }

    /// Total number of blocks.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.len
    }

    fn block(&self, index: usize) -> ObjectRef {
        debug_assert!(index < self.len);
        // SAFETY: index is in bounds of the 'static array we own.
        unsafe { ObjectRef::from_raw(NonNull::new_unchecked(self.base.as_ptr().add(index))) }
    }

    /// Find a vacant block. The caller must initialize it before leaving the
    /// service boundary.
    pub fn alloc(&mut self) -> Option<ObjectRef> {
        (0..self.len)
            .map(|index| self.block(index))
            .find(|block| matches!(block.block(), ControlBlock::Vacant))
    }

    /// Whether `object` points into this pool.
    pub fn contains(&self, object: ObjectRef) -> bool {
        let start = self.base.as_ptr() as usize;
        let end = start + self.len * core::mem::size_of::<ControlBlock>();
        (start..end).contains(&(object.as_ptr() as usize))
    }

    /// Return a block to the pool. Returns `false` for foreign blocks.
    pub fn free(&mut self, object: ObjectRef) -> bool {
        if !self.contains(object) {
            return false;
        }
        // SAFETY: called from the service boundary after the object was
        // deactivated and its waiters released; nothing borrows the block.
        unsafe { object.write(ControlBlock::Vacant) };
        true
    }

    /// Number of vacant blocks.
    pub fn available(&self) -> usize {
        (0..self.len)
            .filter(|&index| matches!(self.block(index).block(), ControlBlock::Vacant))
            .count()
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::leak_pool;

    #[test]
    fn test_alloc_until_exhausted() {
        let mut pool = MemoryPool::new(leak_pool(2));
        assert_eq!(pool.capacity(), 2);

        let first = pool.alloc().unwrap();
        // A block stays allocatable until it is written
        assert_eq!(pool.alloc(), Some(first));

        crate::testing::occupy(first);
        let second = pool.alloc().unwrap();
        assert_ne!(first, second);
        crate::testing::occupy(second);

        assert_eq!(pool.alloc(), None);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_free_returns_block() {
        let mut pool = MemoryPool::new(leak_pool(1));
        let block = pool.alloc().unwrap();
        crate::testing::occupy(block);

        assert!(pool.free(block));
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.alloc(), Some(block));
    }

    #[test]
    fn test_foreign_block_not_freed() {
        let mut pool = MemoryPool::new(leak_pool(1));
        let other = MemoryPool::new(leak_pool(1)).alloc().unwrap();
        assert!(!pool.contains(other));
        assert!(!pool.free(other));
    }
}
