//! # Thread Control Block
//!
//! The subset of a thread object the synchronization core works with:
//! priority, execution state, and the wait bookkeeping (`wait_timeout`,
//! `wait_result`, back-link to the object waited on, and the intrusive link
//! used by [`ThreadList`](crate::wait_queue::ThreadList)).
//!
//! Threads live in a fixed table inside the kernel state and are named by
//! their index, [`ThreadId`].
//!
//! ```text
//!   ┌──────────┐     dispatch()      ┌─────────┐
//!   │  Ready   │ ──────────────────► │ Running │
//!   └──────────┘ ◄────────────────── └─────────┘
//!        ▲            preempt             │
//!        │                                │ wait_enter()
//!        │     wait_exit()           ┌──────────┐
//!        └────────────────────────── │ Blocked  │
//!       release / timeout / delete   └──────────┘
//! ```

use core::fmt;

use crate::config::MAX_THREADS;
use crate::error::{Error, Result};
use crate::kernel::KernelState;
use crate::object::ObjectRef;
use crate::svc::ServiceCall;

// ---------------------------------------------------------------------------
// Identity and state
// ---------------------------------------------------------------------------

/// Index of a thread in the kernel's thread table.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(u8);

impl ThreadId {
    /// Position in the thread table.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// Why a thread is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitReason {
    /// Sleeping for a number of ticks.
    Delay,
    /// Waiting for a semaphore token.
    Semaphore,
}

/// Execution state of a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Unused table slot.
    Inactive,
    /// Runnable, queued in the ready list.
    Ready,
    /// Currently executing.
    Running,
    /// Suspended until woken or timed out.
    Blocked(WaitReason),
}

/// Creation parameters for a thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadAttr {
    /// Display name.
    pub name: Option<&'static str>,
    /// Scheduling priority, higher runs first.
    pub priority: u8,
}

// ---------------------------------------------------------------------------
// Thread Control Block
// ---------------------------------------------------------------------------

/// Thread Control Block (TCB).
pub struct ThreadCb {
    pub(crate) name: Option<&'static str>,
    pub(crate) priority: u8,
    pub(crate) state: ThreadState,

    /// Remaining ticks before the wait expires. `WAIT_FOREVER` never expires.
    pub(crate) wait_timeout: u32,

    /// Status delivered when the thread resumes from a wait.
    pub(crate) wait_result: Result<()>,

    /// Object whose wait queue holds this thread, if any.
    pub(crate) wait_object: Option<ObjectRef>,

    /// Next thread in whichever list (ready or object wait queue) holds us.
    pub(crate) next: Option<ThreadId>,
}

impl ThreadCb {
    /// An unallocated slot. Used to initialize the static table.
    pub const EMPTY: ThreadCb = ThreadCb {
        name: None,
        priority: 0,
        state: ThreadState::Inactive,
        wait_timeout: 0,
        wait_result: Ok(()),
        wait_object: None,
        next: None,
    };

    fn init(&mut self, attr: ThreadAttr) {
        *self = ThreadCb {
            name: attr.name,
            priority: attr.priority,
            state: ThreadState::Ready,
            ..ThreadCb::EMPTY
        };
    }

    /// Display name given at creation.
    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }

    /// Scheduling priority.
    #[inline]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Current execution state.
    #[inline]
    pub fn state(&self) -> ThreadState {
        self.state
    }

    /// Result of the last completed wait.
    #[inline]
    pub fn wait_result(&self) -> Result<()> {
        self.wait_result
    }

    /// Check if this thread is blocked for any reason.
    #[inline]
    pub fn is_blocked(&self) -> bool {
        matches!(self.state, ThreadState::Blocked(_))
    }
}

// ---------------------------------------------------------------------------
// Thread table
// ---------------------------------------------------------------------------

/// Fixed-size table of TCBs.
pub struct ThreadTable {
    threads: [ThreadCb; MAX_THREADS],
    count: usize,
}

impl ThreadTable {
    pub const fn new() -> Self {
        Self {
            threads: [ThreadCb::EMPTY; MAX_THREADS],
            count: 0,
        }
    }

    /// Claim the next free slot. `None` when the table is full.
    pub(crate) fn alloc(&mut self, attr: ThreadAttr) -> Option<ThreadId> {
        if self.count >= MAX_THREADS {
            return None;
        }
        let id = ThreadId(self.count as u8);
        self.threads[id.index()].init(attr);
        self.count += 1;
        Some(id)
    }

    /// Number of allocated threads.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Ids of all allocated threads, in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ThreadId> {
        (0..self.count as u8).map(ThreadId)
    }

    /// Look up an allocated thread.
    pub fn get(&self, id: ThreadId) -> Option<&ThreadCb> {
        self.threads[..self.count].get(id.index())
    }

    #[inline]
    pub(crate) fn tcb(&self, id: ThreadId) -> &ThreadCb {
        &self.threads[id.index()]
    }

    #[inline]
    pub(crate) fn tcb_mut(&mut self, id: ThreadId) -> &mut ThreadCb {
        &mut self.threads[id.index()]
    }
}

// ---------------------------------------------------------------------------
// Services
// ---------------------------------------------------------------------------

/// Create a thread and make it ready.
pub struct ThreadNew(pub ThreadAttr);

impl ServiceCall for ThreadNew {
    type Output = Result<ThreadId>;

    fn call(self, kernel: &mut KernelState) -> Self::Output {
        let Some(id) = kernel.threads.alloc(self.0) else {
            log::warn!("thread table full ({} threads)", MAX_THREADS);
            return Err(Error::NoMemory);
        };
        log::debug!("thread {:?} {:?} created, priority {}", id, self.0.name, self.0.priority);
        kernel.ready_put(id);
        kernel.dispatch();
        Ok(id)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tcb_initialization() {
        let mut table = ThreadTable::new();
        assert_eq!(table.len(), 0);

        let id = table
            .alloc(ThreadAttr { name: Some("worker"), priority: 5 })
            .unwrap();
        let tcb = table.get(id).unwrap();

        assert_eq!(tcb.state(), ThreadState::Ready);
        assert_eq!(tcb.priority(), 5);
        assert_eq!(tcb.name(), Some("worker"));
        assert_eq!(tcb.wait_result(), Ok(()));
        assert!(!tcb.is_blocked());
    }

    #[test]
    fn test_table_full() {
        let mut table = ThreadTable::new();
        for _ in 0..MAX_THREADS {
            assert!(table.alloc(ThreadAttr::default()).is_some());
        }
        assert!(table.alloc(ThreadAttr::default()).is_none());
        assert_eq!(table.ids().count(), MAX_THREADS);
    }

    #[test]
    fn test_unallocated_lookup() {
        let table = ThreadTable::new();
        assert!(table.get(ThreadId(0)).is_none());
    }
}
