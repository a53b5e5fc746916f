//! # Scheduler
//!
//! The minimal ready-queue dispatcher the synchronization core calls into.
//! Policy is fixed: the highest-priority ready thread runs, FIFO among
//! equals, and a running thread is only preempted by a strictly higher
//! priority.
//!
//! Dispatching only updates the bookkeeping (`running`, ready list) and
//! records that a context switch is due. The service boundary turns that
//! record into a PendSV request once it leaves its critical section; the
//! PendSV handler drains deferred completions and re-dispatches; a suspended
//! caller resumes once it finds itself the running thread again.

use crate::kernel::KernelState;
use crate::thread::{ThreadId, ThreadState};

impl KernelState {
    /// Currently running thread, `None` when idle.
    #[inline]
    pub fn running(&self) -> Option<ThreadId> {
        self.running
    }

    /// Queue a thread as ready. Does not dispatch.
    pub(crate) fn ready_put(&mut self, id: ThreadId) {
        self.threads.tcb_mut(id).state = ThreadState::Ready;
        self.ready.insert(&mut self.threads, id);
    }

    /// Re-evaluate which thread should run.
    ///
    /// Switches when nothing is running, or when the head of the ready list
    /// outranks the running thread; the preempted thread goes back into the
    /// ready list behind its equals.
    pub(crate) fn dispatch(&mut self) {
        let Some(next) = self.ready.head() else {
            return;
        };

        if let Some(current) = self.running {
            if self.threads.tcb(current).priority >= self.threads.tcb(next).priority {
                return;
            }
            self.ready_put(current);
        }

        self.ready.pop_highest(&mut self.threads);
        self.switch_to(Some(next));
    }

    /// Make `next` the running thread (or idle for `None`) and request a
    /// context switch.
    pub(crate) fn switch_to(&mut self, next: Option<ThreadId>) {
        if let Some(next) = next {
            self.threads.tcb_mut(next).state = ThreadState::Running;
        }
        log::trace!("switch {:?} -> {:?}", self.running, next);
        self.running = next;
        self.switch_pending = true;
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::kernel::KernelState;
    use crate::thread::{ThreadAttr, ThreadState};

    fn spawn(state: &mut KernelState, priority: u8) -> crate::thread::ThreadId {
        let id = state.threads.alloc(ThreadAttr { name: None, priority }).unwrap();
        state.ready_put(id);
        state.dispatch();
        id
    }

    #[test]
    fn test_first_thread_runs() {
        let mut state = KernelState::new();
        let a = spawn(&mut state, 1);
        assert_eq!(state.running(), Some(a));
        assert_eq!(state.threads.tcb(a).state, ThreadState::Running);
        assert!(state.switch_pending);
    }

    #[test]
    fn test_higher_priority_preempts() {
        let mut state = KernelState::new();
        let low = spawn(&mut state, 1);
        let high = spawn(&mut state, 4);

        assert_eq!(state.running(), Some(high));
        assert_eq!(state.threads.tcb(low).state, ThreadState::Ready);
        assert_eq!(state.ready.head(), Some(low));
    }

    #[test]
    fn test_equal_priority_does_not_preempt() {
        let mut state = KernelState::new();
        let first = spawn(&mut state, 2);
        let second = spawn(&mut state, 2);

        assert_eq!(state.running(), Some(first));
        assert_eq!(state.ready.head(), Some(second));
    }

    #[test]
    fn test_idle_picks_ready_head() {
        let mut state = KernelState::new();
        let a = spawn(&mut state, 1);
        let b = spawn(&mut state, 3);
        assert_eq!(state.running(), Some(b));

        // Running thread leaves the CPU without being re-queued
        state.threads.tcb_mut(b).state = ThreadState::Inactive;
        state.running = None;
        state.dispatch();
        assert_eq!(state.running(), Some(a));
    }
}
