//! # Thread Wait Controller
//!
//! Moves threads between Running, Blocked and Ready, and ages wait timeouts.
//!
//! A wait ends for exactly one of three causes, whichever comes first:
//!
//! | Cause | Delivered result |
//! |-------|------------------|
//! | release hands a token over | `Ok(())` |
//! | timeout expiry (semaphore) | `Err(Timeout)` |
//! | timeout expiry (delay) | `Ok(())` |
//! | object deleted | `Err(Resource)` |
//!
//! [`wait_exit`](KernelState::wait_exit) is idempotent: once the thread has
//! left the Blocked state, later causes find nothing to do.

use crate::config::WAIT_FOREVER;
use crate::error::{Error, Result};
use crate::kernel::KernelState;
use crate::object::ObjectRef;
use crate::thread::{ThreadId, ThreadState, WaitReason};

/// How a potentially blocking service finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Finished without suspending the caller.
    Done,
    /// The caller was suspended. Its final status is the thread's
    /// `wait_result` once it runs again.
    Suspended(ThreadId),
}

impl KernelState {
    /// Suspend the running thread.
    ///
    /// Fails (returns `None`) for a zero timeout or when no thread is
    /// running. On success the thread is Blocked with `Err(Timeout)` as its
    /// provisional result and the next ready thread is dispatched. The
    /// caller attaches it to an object queue if the wait has one.
    pub(crate) fn wait_enter(&mut self, reason: WaitReason, timeout: u32) -> Option<ThreadId> {
        if timeout == 0 {
            return None;
        }
        let id = self.running?;

        let thread = self.threads.tcb_mut(id);
        thread.state = ThreadState::Blocked(reason);
        thread.wait_timeout = timeout;
        thread.wait_result = Err(Error::Timeout);
        thread.wait_object = None;
        log::trace!("thread {:?} waits ({:?}, timeout {})", id, reason, timeout);

        self.switch_to(None);
        self.dispatch();
        Some(id)
    }

    /// Queue a freshly blocked thread on `object`'s wait queue.
    pub(crate) fn wait_on(&mut self, id: ThreadId, object: ObjectRef) {
        let Some(header) = object.block().header() else {
            return;
        };
        header.with_thread_list(|list| list.insert(&mut self.threads, id));
        self.threads.tcb_mut(id).wait_object = Some(object);
    }

    /// End a wait with `result`.
    ///
    /// Unlinks the thread from the object queue it is still on, disarms the
    /// timeout and makes it ready. Re-dispatches when `dispatch` is set;
    /// callers waking several threads pass `false` and dispatch once.
    pub(crate) fn wait_exit(&mut self, id: ThreadId, result: Result<()>, dispatch: bool) {
        if !self.threads.tcb(id).is_blocked() {
            return;
        }

        if let Some(object) = self.threads.tcb_mut(id).wait_object.take() {
            if let Some(header) = object.block().header() {
                header.with_thread_list(|list| list.remove(&mut self.threads, id));
            }
        }

        let thread = self.threads.tcb_mut(id);
        thread.wait_timeout = 0;
        thread.wait_result = result;
        log::trace!("thread {:?} wakes with {:?}", id, result);

        self.ready_put(id);
        if dispatch {
            self.dispatch();
        }
    }

    /// Advance kernel time by one tick and expire due waits.
    pub(crate) fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);

        let mut woke = false;
        for id in self.threads.ids() {
            let thread = self.threads.tcb_mut(id);
            let ThreadState::Blocked(reason) = thread.state else {
                continue;
            };
            if thread.wait_timeout == WAIT_FOREVER || thread.wait_timeout == 0 {
                continue;
            }

            thread.wait_timeout -= 1;
            if thread.wait_timeout == 0 {
                let result = match reason {
                    WaitReason::Delay => Ok(()),
                    WaitReason::Semaphore => Err(Error::Timeout),
                };
                self.wait_exit(id, result, false);
                woke = true;
            }
        }

        if woke {
            self.dispatch();
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thread::ThreadAttr;

    fn running_thread(state: &mut KernelState, priority: u8) -> ThreadId {
        let id = state.threads.alloc(ThreadAttr { name: None, priority }).unwrap();
        state.ready_put(id);
        state.dispatch();
        id
    }

    #[test]
    fn test_zero_timeout_does_not_block() {
        let mut state = KernelState::new();
        let id = running_thread(&mut state, 1);

        assert_eq!(state.wait_enter(WaitReason::Delay, 0), None);
        assert_eq!(state.running(), Some(id));
    }

    #[test]
    fn test_no_running_thread_cannot_block() {
        let mut state = KernelState::new();
        assert_eq!(state.wait_enter(WaitReason::Delay, 5), None);
    }

    #[test]
    fn test_wait_enter_dispatches_next() {
        let mut state = KernelState::new();
        let low = running_thread(&mut state, 1);
        let high = running_thread(&mut state, 2);

        assert_eq!(state.wait_enter(WaitReason::Delay, 3), Some(high));
        assert_eq!(state.threads.tcb(high).state, ThreadState::Blocked(WaitReason::Delay));
        assert_eq!(state.threads.tcb(high).wait_result, Err(Error::Timeout));
        assert_eq!(state.running(), Some(low));
    }

    #[test]
    fn test_delay_expires_after_exact_ticks() {
        let mut state = KernelState::new();
        let id = running_thread(&mut state, 1);
        state.wait_enter(WaitReason::Delay, 3);
        assert_eq!(state.running(), None);

        state.tick();
        state.tick();
        assert!(state.threads.tcb(id).is_blocked());

        state.tick();
        assert_eq!(state.running(), Some(id));
        assert_eq!(state.threads.tcb(id).wait_result, Ok(()));
        assert_eq!(state.tick, 3);
    }

    #[test]
    fn test_wait_forever_never_expires() {
        let mut state = KernelState::new();
        let id = running_thread(&mut state, 1);
        state.wait_enter(WaitReason::Semaphore, WAIT_FOREVER);

        for _ in 0..1000 {
            state.tick();
        }
        assert!(state.threads.tcb(id).is_blocked());
    }

    #[test]
    fn test_wait_exit_is_idempotent() {
        let mut state = KernelState::new();
        let id = running_thread(&mut state, 1);
        state.wait_enter(WaitReason::Semaphore, 10);

        state.wait_exit(id, Err(Error::Resource), true);
        state.wait_exit(id, Ok(()), true);
        assert_eq!(state.threads.tcb(id).wait_result, Err(Error::Resource));
        assert_eq!(state.running(), Some(id));

        // Timer no longer armed
        for _ in 0..20 {
            state.tick();
        }
        assert_eq!(state.threads.tcb(id).wait_result, Err(Error::Resource));
    }
}
