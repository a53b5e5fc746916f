//! # Semaphore
//!
//! Counting semaphore built from an [`ObjectHeader`], a [`TokenCounter`] and
//! the thread wait protocol.
//!
//! ## Protocols
//!
//! - **Acquire**: validate, take a token if one is available, otherwise fail
//!   immediately (`timeout == 0`) or suspend the caller on the wait queue.
//! - **Release**: validate; if a thread waits, hand the token straight to the
//!   highest-priority waiter without touching the counter; otherwise
//!   increment, failing at `max_count`.
//! - **Delete**: validate, mark inactive, wake every waiter with
//!   `Err(Resource)`, dispatch once, return kernel-owned storage to the pool.
//!
//! In thread context the counter is therefore 0 whenever the wait queue is
//! non-empty. Releases from interrupt context deposit the token in the
//! counter and leave the hand-off to [`Semaphore::post_process`], which runs
//! before any thread resumes.

use core::fmt;
use core::mem::{align_of, size_of, MaybeUninit};
use core::ptr::NonNull;

use crate::config::TOKEN_LIMIT;
use crate::counter::TokenCounter;
use crate::error::{Error, Result};
use crate::isr_queue::IsrQueue;
use crate::kernel::KernelState;
use crate::object::{ControlBlock, ObjectFlags, ObjectHeader, ObjectKind, ObjectRef};
use crate::svc::ServiceCall;
use crate::thread::WaitReason;
use crate::wait::Completion;

/// Bytes a caller-supplied control block must provide.
pub const SEMAPHORE_CB_SIZE: usize = size_of::<ControlBlock>();

/// Alignment a caller-supplied control block must have (4 on Cortex-M).
pub const SEMAPHORE_CB_ALIGN: usize = align_of::<ControlBlock>();

// ---------------------------------------------------------------------------
// Control block and handle
// ---------------------------------------------------------------------------

/// Semaphore control block.
pub struct Semaphore {
    header: ObjectHeader,
    tokens: TokenCounter,
}

impl Semaphore {
    pub(crate) const fn from_parts(header: ObjectHeader, tokens: TokenCounter) -> Self {
        Self { header, tokens }
    }

    /// Common object header.
    #[inline]
    pub fn header(&self) -> &ObjectHeader {
        &self.header
    }

    /// Tokens currently available.
    #[inline]
    pub fn count(&self) -> u16 {
        self.tokens.count()
    }

    /// Deferred completion: hand tokens deposited from interrupt context to
    /// waiting threads, highest priority first. Dispatch is left to the
    /// caller, which drains all pending objects first.
    pub(crate) fn post_process(&self, kernel: &mut KernelState) {
        if !self.header.is_active() {
            return;
        }
        while self.header.has_waiters() && self.tokens.decrement_if_available() {
            if let Some(id) = self.header.with_thread_list(|list| list.pop_highest(&mut kernel.threads)) {
                kernel.wait_exit(id, Ok(()), false);
                log::trace!("semaphore token handed to {:?} after ISR release", id);
            }
        }
    }
}

/// Handle to a semaphore.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SemaphoreId(ObjectRef);

impl SemaphoreId {
    /// Build a handle from a raw control-block pointer.
    ///
    /// # Safety
    /// `ptr` must point to an initialized `ControlBlock` that stays valid for
    /// the rest of the program. It need not hold a semaphore; validation
    /// rejects other kinds.
    pub const unsafe fn from_raw(ptr: NonNull<ControlBlock>) -> Self {
        // SAFETY: forwarded to the caller.
        Self(unsafe { ObjectRef::from_raw(ptr) })
    }

    /// The underlying object reference.
    #[inline]
    pub fn object(self) -> ObjectRef {
        self.0
    }

    /// Look up the live semaphore behind this handle.
    ///
    /// Parameter error for anything that is not a semaphore, resource error
    /// for a deleted one.
    pub fn validate(self) -> Result<&'static Semaphore> {
        let block = self.0.block();
        block.validate(ObjectKind::Semaphore)?;
        match block {
            ControlBlock::Semaphore(sem) => Ok(sem),
            ControlBlock::Vacant => Err(Error::Parameter),
        }
    }
}

impl fmt::Debug for SemaphoreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Semaphore({:p})", self.0.as_ptr())
    }
}

/// Creation attributes.
#[derive(Default)]
pub struct SemaphoreAttr {
    /// Display name.
    pub name: Option<&'static str>,
    /// Caller-supplied control block storage. `None` takes a block from the
    /// kernel pool.
    pub cb_mem: Option<&'static mut [MaybeUninit<u8>]>,
}

/// View a typed static slot as control-block storage for [`SemaphoreAttr`].
pub fn control_block_mem(slot: &'static mut MaybeUninit<ControlBlock>) -> &'static mut [MaybeUninit<u8>] {
    // SAFETY: the slot is exactly SEMAPHORE_CB_SIZE bytes of possibly
    // uninitialized memory, exclusively borrowed for 'static.
    unsafe { core::slice::from_raw_parts_mut(slot.as_mut_ptr().cast(), SEMAPHORE_CB_SIZE) }
}

/// Check alignment and size of caller storage.
fn static_block(mem: &'static mut [MaybeUninit<u8>]) -> Result<ObjectRef> {
    let ptr = mem.as_mut_ptr();
    if ptr as usize % SEMAPHORE_CB_ALIGN != 0 || mem.len() < SEMAPHORE_CB_SIZE {
        log::warn!(
            "semaphore: invalid control block at {:p} ({} bytes, need {} aligned to {})",
            ptr,
            mem.len(),
            SEMAPHORE_CB_SIZE,
            SEMAPHORE_CB_ALIGN
        );
        return Err(Error::Parameter);
    }
    // SAFETY: non-null, aligned, large enough and 'static. The block is
    // written before the handle escapes.
    Ok(unsafe { ObjectRef::from_raw(NonNull::new_unchecked(ptr.cast())) })
}

fn report(id: SemaphoreId, error: Error) -> Error {
    log::warn!("{:?}: {}", id, error);
    error
}

/// Token count of a live semaphore, 0 otherwise. Safe in any context.
pub(crate) fn count_of(id: SemaphoreId) -> u32 {
    id.validate().map_or(0, |sem| u32::from(sem.count()))
}

// ---------------------------------------------------------------------------
// Services (thread context)
// ---------------------------------------------------------------------------

/// Create a semaphore with `initial_count` of `max_count` tokens.
pub struct SemaphoreNew {
    pub max_count: u32,
    pub initial_count: u32,
    pub attr: SemaphoreAttr,
}

impl ServiceCall for SemaphoreNew {
    type Output = Result<SemaphoreId>;

    fn call(self, kernel: &mut KernelState) -> Self::Output {
        let SemaphoreNew { max_count, initial_count, attr } = self;

        if max_count == 0 || max_count > TOKEN_LIMIT || initial_count > max_count {
            log::warn!("semaphore: bad counts {}/{}", initial_count, max_count);
            return Err(Error::Parameter);
        }

        let (object, flags) = match attr.cb_mem {
            Some(mem) => (static_block(mem)?, ObjectFlags::empty()),
            None => {
                let block = kernel.pool.as_mut().and_then(|pool| pool.alloc());
                let Some(block) = block else {
                    log::warn!("semaphore: no control block available");
                    return Err(Error::NoMemory);
                };
                (block, ObjectFlags::SYSTEM_OBJECT)
            }
        };

        // Both values fit: max_count <= TOKEN_LIMIT == u16::MAX
        let sem = Semaphore::from_parts(
            ObjectHeader::new(flags, attr.name),
            TokenCounter::new(initial_count as u16, max_count as u16),
        );
        // SAFETY: inside the service boundary; the block is either vacant
        // pool memory or fresh caller storage, and nothing borrows it.
        unsafe { object.write(ControlBlock::Semaphore(sem)) };

        let id = SemaphoreId(object);
        log::debug!("{:?} {:?} created, {}/{} tokens", id, attr.name, initial_count, max_count);
        Ok(id)
    }
}

/// Display name of a semaphore.
pub struct SemaphoreGetName(pub SemaphoreId);

impl ServiceCall for SemaphoreGetName {
    type Output = Option<&'static str>;

    fn call(self, _kernel: &mut KernelState) -> Self::Output {
        self.0.validate().ok().and_then(|sem| sem.header.name())
    }
}

/// Take a token, waiting up to `timeout` ticks.
pub struct SemaphoreAcquire {
    pub id: SemaphoreId,
    pub timeout: u32,
}

impl ServiceCall for SemaphoreAcquire {
    type Output = Result<Completion>;

    fn call(self, kernel: &mut KernelState) -> Self::Output {
        let sem = self.id.validate().map_err(|e| report(self.id, e))?;

        if sem.tokens.decrement_if_available() {
            log::trace!("{:?} acquired", self.id);
            return Ok(Completion::Done);
        }
        if self.timeout == 0 {
            log::trace!("{:?} not acquired", self.id);
            return Err(Error::Resource);
        }

        match kernel.wait_enter(WaitReason::Semaphore, self.timeout) {
            Some(thread) => {
                kernel.wait_on(thread, self.id.0);
                log::trace!("{:?} acquire pending for {:?}", self.id, thread);
                Ok(Completion::Suspended(thread))
            }
            None => Err(Error::Timeout),
        }
    }
}

/// Give a token back, waking the highest-priority waiter if there is one.
pub struct SemaphoreRelease(pub SemaphoreId);

impl ServiceCall for SemaphoreRelease {
    type Output = Result<()>;

    fn call(self, kernel: &mut KernelState) -> Self::Output {
        let id = self.0;
        let sem = id.validate().map_err(|e| report(id, e))?;

        if let Some(thread) = sem.header.with_thread_list(|list| list.pop_highest(&mut kernel.threads)) {
            kernel.wait_exit(thread, Ok(()), true);
            log::trace!("{:?} released to {:?}", id, thread);
            return Ok(());
        }

        if sem.tokens.increment_if_below_max() {
            log::trace!("{:?} released", id);
            Ok(())
        } else {
            log::warn!("{:?}: count limit {} reached", id, sem.tokens.max());
            Err(Error::Resource)
        }
    }
}

/// Current token count, 0 for an invalid handle.
pub struct SemaphoreGetCount(pub SemaphoreId);

impl ServiceCall for SemaphoreGetCount {
    type Output = u32;

    fn call(self, _kernel: &mut KernelState) -> Self::Output {
        count_of(self.0)
    }
}

/// Delete a semaphore, aborting every wait on it.
pub struct SemaphoreDelete(pub SemaphoreId);

impl ServiceCall for SemaphoreDelete {
    type Output = Result<()>;

    fn call(self, kernel: &mut KernelState) -> Self::Output {
        let id = self.0;
        let sem = id.validate().map_err(|e| report(id, e))?;

        sem.header.deactivate();

        let mut woken = 0usize;
        while let Some(thread) = sem.header.with_thread_list(|list| list.pop_highest(&mut kernel.threads)) {
            kernel.wait_exit(thread, Err(Error::Resource), false);
            woken += 1;
        }
        if woken > 0 {
            kernel.dispatch();
        }

        if sem.header.flags().contains(ObjectFlags::SYSTEM_OBJECT) {
            if let Some(pool) = kernel.pool.as_mut() {
                pool.free(id.0);
            }
        }

        log::debug!("{:?} destroyed, {} waiters aborted", id, woken);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Interrupt context
// ---------------------------------------------------------------------------

/// Non-blocking acquire. Any non-zero timeout is refused.
pub(crate) fn isr_acquire(id: SemaphoreId, timeout: u32) -> Result<()> {
    if timeout != 0 {
        return Err(report(id, Error::Isr));
    }
    let sem = id.validate().map_err(|e| report(id, e))?;
    if sem.tokens.decrement_if_available() {
        log::trace!("{:?} acquired from ISR", id);
        Ok(())
    } else {
        log::trace!("{:?} not acquired from ISR", id);
        Err(Error::Resource)
    }
}

/// Release from an interrupt handler: deposit the token and record a
/// deferred completion for the drain point.
///
/// Nothing is recorded for a release that fails the counting limit. If the
/// completion cannot be recorded the token is taken back.
pub(crate) fn isr_release(id: SemaphoreId, queue: &IsrQueue) -> Result<()> {
    let sem = id.validate().map_err(|e| report(id, e))?;
    if !sem.tokens.increment_if_below_max() {
        log::warn!("{:?}: count limit {} reached", id, sem.tokens.max());
        return Err(Error::Resource);
    }
    if let Err(error) = queue.put(id.0) {
        sem.tokens.decrement_if_available();
        return Err(error);
    }
    log::trace!("{:?} released from ISR", id);
    Ok(())
}
