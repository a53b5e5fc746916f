//! # Kernel
//!
//! The kernel context value and its public API.
//!
//! [`Kernel`] owns all thread-context state (thread table, ready list, tick,
//! control-block pool) behind the service boundary, plus the deferred
//! completion queue that interrupt handlers write to. It is an explicit
//! value: firmware keeps one in a `static` and passes `&Kernel` around;
//! tests create as many as they like.
//!
//! Each public operation picks its path by execution context:
//!
//! | Operation | Thread context | Interrupt context |
//! |-----------|----------------|-------------------|
//! | `semaphore_new` / `semaphore_delete` | service | `Err(Isr)` |
//! | `semaphore_get_name` | service | `None` |
//! | `semaphore_acquire` | service, may suspend | non-blocking only |
//! | `semaphore_release` | service, direct hand-off | deferred completion |
//! | `semaphore_get_count` | service | direct read |
//! | `delay` / `delay_until` / `thread_new` | service | `Err(Isr)` |
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► KERNEL.initialize(pool)   ← hand over control-block pool
//!         ├─► KERNEL.thread_new(..)     ← register threads (×N)
//!         ├─► KERNEL.semaphore_new(..)  ← create objects
//!         └─► configure SysTick / PendSV priorities
//!               ├─► SysTick  → KERNEL.tick()
//!               └─► PendSV   → KERNEL.post_process()
//! ```

use core::cell::RefCell;
use core::marker::PhantomData;

use critical_section::Mutex;

use crate::arch::Port;
use crate::delay::{Delay, DelayUntil};
use crate::error::{Error, Result};
use crate::isr_queue::IsrQueue;
use crate::memory::MemoryPool;
use crate::object::ControlBlock;
use crate::semaphore::{
    self, SemaphoreAcquire, SemaphoreAttr, SemaphoreDelete, SemaphoreGetCount, SemaphoreGetName,
    SemaphoreId, SemaphoreNew, SemaphoreRelease,
};
use crate::thread::{ThreadAttr, ThreadId, ThreadNew, ThreadState, ThreadTable};
use crate::wait::Completion;
use crate::wait_queue::ThreadList;

// ---------------------------------------------------------------------------
// Kernel state
// ---------------------------------------------------------------------------

/// Thread-context kernel state. Only reachable through the service
/// boundary, which hands out `&mut KernelState` inside a critical section.
pub struct KernelState {
    pub(crate) threads: ThreadTable,
    pub(crate) ready: ThreadList,
    pub(crate) running: Option<ThreadId>,
    pub(crate) tick: u32,
    pub(crate) pool: Option<MemoryPool>,
    pub(crate) initialized: bool,
    /// Set by the scheduler when a context switch is due.
    pub(crate) switch_pending: bool,
}

impl KernelState {
    pub const fn new() -> Self {
        Self {
            threads: ThreadTable::new(),
            ready: ThreadList::new(),
            running: None,
            tick: 0,
            pool: None,
            initialized: false,
            switch_pending: false,
        }
    }

    /// Ticks since start.
    #[inline]
    pub fn tick_count(&self) -> u32 {
        self.tick
    }
}

// ---------------------------------------------------------------------------
// Kernel
// ---------------------------------------------------------------------------

/// The kernel context.
pub struct Kernel<P: Port> {
    pub(crate) state: Mutex<RefCell<KernelState>>,
    pub(crate) isr_queue: IsrQueue,
    _port: PhantomData<fn() -> P>,
}

impl<P: Port> Kernel<P> {
    /// An empty kernel. Usable in a `static`.
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(RefCell::new(KernelState::new())),
            isr_queue: IsrQueue::new(),
            _port: PhantomData,
        }
    }

    /// Hand the kernel its control-block pool. Without one, only objects
    /// with caller-supplied storage can be created.
    ///
    /// Fails with `Err(Resource)` when called twice.
    pub fn initialize(&self, pool: Option<&'static mut [ControlBlock]>) -> Result<()> {
        self.svc(InitKernel(pool))?
    }

    // -----------------------------------------------------------------------
    // Interrupt-level entry points
    // -----------------------------------------------------------------------

    /// Advance kernel time by one tick. Called from the SysTick handler.
    pub fn tick(&self) {
        self.enter(KernelState::tick);
    }

    /// Drain the deferred completion queue and re-dispatch.
    ///
    /// Called from the PendSV handler, i.e. after all other interrupt
    /// handlers have returned and before any thread resumes.
    pub fn post_process(&self) {
        self.enter(|state| {
            while let Some(object) = self.isr_queue.get() {
                match object.block() {
                    ControlBlock::Semaphore(sem) => sem.post_process(state),
                    ControlBlock::Vacant => {}
                }
            }
            state.dispatch();
        });
    }

    /// Vacant blocks left in the control-block pool, 0 without a pool.
    pub fn free_control_blocks(&self) -> usize {
        self.enter(|state| state.pool.as_ref().map_or(0, MemoryPool::available))
    }

    /// Objects still waiting for [`post_process`](Self::post_process).
    pub fn pending_completions(&self) -> usize {
        self.isr_queue.len()
    }

    // -----------------------------------------------------------------------
    // Threads and time
    // -----------------------------------------------------------------------

    /// Create a thread and make it ready.
    pub fn thread_new(&self, attr: ThreadAttr) -> Result<ThreadId> {
        self.svc(ThreadNew(attr))?
    }

    /// Currently running thread, `None` when idle.
    pub fn running_thread(&self) -> Option<ThreadId> {
        self.enter(|state| state.running())
    }

    /// Execution state of a thread.
    pub fn thread_state(&self, id: ThreadId) -> Option<ThreadState> {
        self.enter(|state| state.threads.get(id).map(|thread| thread.state()))
    }

    /// Status delivered by the thread's last wait.
    pub fn thread_wait_result(&self, id: ThreadId) -> Option<Result<()>> {
        self.enter(|state| state.threads.get(id).map(|thread| thread.wait_result()))
    }

    /// Ticks since start.
    pub fn tick_count(&self) -> u32 {
        self.enter(|state| state.tick_count())
    }

    /// Suspend the calling thread for `ticks` ticks.
    pub fn delay(&self, ticks: u32) -> Result<()> {
        let completion = self.svc(Delay(ticks))?;
        self.resume(completion)
    }

    /// Suspend the calling thread until the tick counter reaches `tick`.
    pub fn delay_until(&self, tick: u32) -> Result<()> {
        let completion = self.svc(DelayUntil(tick))??;
        self.resume(completion)
    }

    /// Final status of a service that may have suspended the caller.
    ///
    /// A suspended caller parks in the port until release, timeout or
    /// delete has ended its wait and the scheduler runs it again. Only then
    /// is `wait_result` final.
    fn resume(&self, completion: Completion) -> Result<()> {
        let Completion::Suspended(id) = completion else {
            return Ok(());
        };
        loop {
            let resumed = self.enter(|state| {
                let thread = state.threads.get(id)?;
                Some((thread.state() == ThreadState::Running).then(|| thread.wait_result()))
            });
            match resumed {
                None => return Err(Error::Parameter),
                Some(Some(result)) => return result,
                Some(None) => P::wait_for_wakeup(),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Semaphores
    // -----------------------------------------------------------------------

    /// Create a semaphore holding `initial_count` of `max_count` tokens.
    pub fn semaphore_new(&self, max_count: u32, initial_count: u32, attr: SemaphoreAttr) -> Result<SemaphoreId> {
        self.svc(SemaphoreNew { max_count, initial_count, attr })?
    }

    /// Name given at creation. `None` for invalid handles and in interrupt
    /// context.
    pub fn semaphore_get_name(&self, id: SemaphoreId) -> Option<&'static str> {
        self.svc(SemaphoreGetName(id)).ok().flatten()
    }

    /// Take a token, waiting up to `timeout` ticks (`0` polls,
    /// [`WAIT_FOREVER`](crate::config::WAIT_FOREVER) never expires).
    ///
    /// From interrupt context only `timeout == 0` is allowed.
    pub fn semaphore_acquire(&self, id: SemaphoreId, timeout: u32) -> Result<()> {
        if P::in_interrupt() {
            return semaphore::isr_acquire(id, timeout);
        }
        let completion = self.svc(SemaphoreAcquire { id, timeout })??;
        self.resume(completion)
    }

    /// Return a token.
    ///
    /// From interrupt context the wake-up of a waiter is deferred to
    /// [`post_process`](Self::post_process).
    pub fn semaphore_release(&self, id: SemaphoreId) -> Result<()> {
        if P::in_interrupt() {
            semaphore::isr_release(id, &self.isr_queue)?;
            P::request_dispatch();
            return Ok(());
        }
        self.svc(SemaphoreRelease(id))?
    }

    /// Tokens currently available, 0 for an invalid handle.
    pub fn semaphore_get_count(&self, id: SemaphoreId) -> u32 {
        if P::in_interrupt() {
            return semaphore::count_of(id);
        }
        self.svc(SemaphoreGetCount(id)).unwrap_or(0)
    }

    /// Delete a semaphore. Waiters wake with `Err(Resource)`.
    pub fn semaphore_delete(&self, id: SemaphoreId) -> Result<()> {
        self.svc(SemaphoreDelete(id))?
    }
}

impl<P: Port> Default for Kernel<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Install the control-block pool.
struct InitKernel(Option<&'static mut [ControlBlock]>);

impl crate::svc::ServiceCall for InitKernel {
    type Output = Result<()>;

    fn call(self, kernel: &mut KernelState) -> Self::Output {
        if kernel.initialized {
            log::warn!("kernel already initialized");
            return Err(Error::Resource);
        }
        kernel.pool = self.0.map(MemoryPool::new);
        kernel.initialized = true;
        log::debug!(
            "kernel initialized, {} pooled control blocks",
            kernel.pool.as_ref().map_or(0, MemoryPool::capacity)
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------
