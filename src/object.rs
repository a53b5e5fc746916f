//! # Kernel Objects
//!
//! Every synchronization object lives in a [`ControlBlock`]: a tagged
//! variant whose discriminant is the object kind. Each live variant embeds
//! an [`ObjectHeader`] carrying the state shared by all primitives (liveness,
//! storage ownership, display name and the head of the wait queue).
//!
//! Control blocks sit in `'static` memory, either caller-supplied or taken
//! from the kernel's [`MemoryPool`](crate::memory::MemoryPool), and are
//! referenced through [`ObjectRef`]. Validation of a reference checks the
//! discriminant and the liveness of the header; it is the only gate between a
//! caller's handle and kernel state.
//!
//! ```text
//!   create()                 delete()
//!  ──────────► Active ─────────────────► Inactive ──► (storage released
//!                                                      if SYSTEM_OBJECT)
//! ```

use core::cell::Cell;
use core::fmt;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::semaphore::Semaphore;
use crate::wait_queue::ThreadList;

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Discriminant identifying the concrete primitive behind a control block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Counting semaphore.
    Semaphore,
}

/// Liveness of an object. `Active` → `Inactive` happens once, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ObjectState {
    /// Deleted. Every operation on it fails.
    Inactive = 0,
    /// Created and usable.
    Active = 1,
}

bitflags! {
    /// Storage ownership flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ObjectFlags: u8 {
        /// Storage was taken from the kernel pool and is returned on delete.
        const SYSTEM_OBJECT = 0x01;
    }
}

/// State common to every kernel object.
///
/// `state` and `pending` are read from interrupt context and are therefore
/// atomics. `thread_list` is only touched inside the service boundary.
pub struct ObjectHeader {
    state: AtomicU8,
    flags: ObjectFlags,
    name: Option<&'static str>,
    thread_list: Cell<ThreadList>,
    pending: AtomicBool,
}

impl ObjectHeader {
    /// Header of a freshly created, active object.
    pub const fn new(flags: ObjectFlags, name: Option<&'static str>) -> Self {
        Self {
            state: AtomicU8::new(ObjectState::Active as u8),
            flags,
            name,
            thread_list: Cell::new(ThreadList::new()),
            pending: AtomicBool::new(false),
        }
    }

    /// Current liveness.
    #[inline]
    pub fn state(&self) -> ObjectState {
        if self.state.load(Ordering::Acquire) == ObjectState::Active as u8 {
            ObjectState::Active
        } else {
            ObjectState::Inactive
        }
    }

    /// Whether the object is still usable.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state() == ObjectState::Active
    }

    /// Mark the object deleted. Returns `false` if it already was.
    pub(crate) fn deactivate(&self) -> bool {
        self.state.swap(ObjectState::Inactive as u8, Ordering::AcqRel) == ObjectState::Active as u8
    }

    /// Storage ownership flags.
    #[inline]
    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    /// Display name given at creation.
    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Whether any thread is blocked on this object.
    #[inline]
    pub fn has_waiters(&self) -> bool {
        !self.thread_list.get().is_empty()
    }

    /// Run `f` on the object's wait queue and store the result back.
    ///
    /// Only called inside the service boundary.
    pub(crate) fn with_thread_list<R>(&self, f: impl FnOnce(&mut ThreadList) -> R) -> R {
        let mut list = self.thread_list.get();
        let result = f(&mut list);
        self.thread_list.set(list);
        result
    }

    /// Mark the object as recorded in the deferred completion queue.
    /// Returns `false` if it already was.
    pub(crate) fn set_pending(&self) -> bool {
        !self.pending.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn clear_pending(&self) {
        self.pending.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Control block
// ---------------------------------------------------------------------------

/// Fixed-layout storage backing one kernel object.
pub enum ControlBlock {
    /// Never used, or returned to the pool after delete.
    Vacant,
    /// Counting semaphore.
    Semaphore(Semaphore),
}

impl ControlBlock {
    /// Initializer for static pool arrays.
    pub const VACANT: ControlBlock = ControlBlock::Vacant;

    /// Kind of the object stored here, `None` if vacant.
    pub fn kind(&self) -> Option<ObjectKind> {
        match self {
            ControlBlock::Vacant => None,
            ControlBlock::Semaphore(_) => Some(ObjectKind::Semaphore),
        }
    }

    /// Header of the object stored here, `None` if vacant.
    pub fn header(&self) -> Option<&ObjectHeader> {
        match self {
            ControlBlock::Vacant => None,
            ControlBlock::Semaphore(sem) => Some(sem.header()),
        }
    }

    /// Check that this block holds a live object of `kind`.
    ///
    /// Wrong kind (including vacant) is a parameter error; a deleted object
    /// is a resource error.
    pub fn validate(&self, kind: ObjectKind) -> Result<&ObjectHeader> {
        match self.header() {
            Some(header) if self.kind() == Some(kind) => {
                if header.is_active() {
                    Ok(header)
                } else {
                    Err(Error::Resource)
                }
            }
            _ => Err(Error::Parameter),
        }
    }
}

/// Reference to a control block in `'static` memory.
///
/// Only the kernel creates these (from its pool or from caller-supplied
/// `'static` storage), so the pointee is always mapped and initialized.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ObjectRef(NonNull<ControlBlock>);

// SAFETY: the pointee is 'static and every mutation of it happens either in
// the service boundary's critical section or through atomics / the token
// counter's own synchronization.
unsafe impl Send for ObjectRef {}
unsafe impl Sync for ObjectRef {}

impl ObjectRef {
    /// Wrap a raw control-block pointer.
    ///
    /// # Safety
    /// `ptr` must point to an initialized `ControlBlock` that stays valid for
    /// the rest of the program.
    pub const unsafe fn from_raw(ptr: NonNull<ControlBlock>) -> Self {
        Self(ptr)
    }

    /// Raw pointer to the control block.
    #[inline]
    pub fn as_ptr(self) -> *mut ControlBlock {
        self.0.as_ptr()
    }

    /// Borrow the control block.
    ///
    /// The returned reference must not be held across a call that rewrites
    /// the block (create or free).
    #[inline]
    pub(crate) fn block(self) -> &'static ControlBlock {
        // SAFETY: construction guarantees a live, initialized 'static block.
        unsafe { &*self.0.as_ptr() }
    }

    /// Overwrite the control block.
    ///
    /// # Safety
    /// Must run inside the service boundary with no outstanding borrow of
    /// the block.
    pub(crate) unsafe fn write(self, block: ControlBlock) {
        // SAFETY: upheld by the caller.
        unsafe { self.0.as_ptr().write(block) }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:p})", self.0)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::TokenCounter;

    fn semaphore_block() -> ControlBlock {
        ControlBlock::Semaphore(Semaphore::from_parts(
            ObjectHeader::new(ObjectFlags::empty(), Some("sem")),
            TokenCounter::new(0, 1),
        ))
    }

    #[test]
    fn test_vacant_block_fails_kind_check() {
        let block = ControlBlock::VACANT;
        assert_eq!(block.kind(), None);
        assert_eq!(block.validate(ObjectKind::Semaphore).err(), Some(Error::Parameter));
    }

    #[test]
    fn test_active_block_validates() {
        let block = semaphore_block();
        let header = block.validate(ObjectKind::Semaphore).unwrap();
        assert_eq!(header.name(), Some("sem"));
        assert_eq!(header.state(), ObjectState::Active);
        assert!(!header.has_waiters());
    }

    #[test]
    fn test_deactivate_happens_once() {
        let block = semaphore_block();
        let header = block.header().unwrap();
        assert!(header.deactivate());
        assert!(!header.deactivate());
        assert_eq!(block.validate(ObjectKind::Semaphore).err(), Some(Error::Resource));
    }

    #[test]
    fn test_pending_flag_dedups() {
        let header = ObjectHeader::new(ObjectFlags::SYSTEM_OBJECT, None);
        assert!(header.set_pending());
        assert!(!header.set_pending());
        header.clear_pending();
        assert!(header.set_pending());
        assert!(header.flags().contains(ObjectFlags::SYSTEM_OBJECT));
    }
}
