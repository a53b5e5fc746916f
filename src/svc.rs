//! # Service Boundary
//!
//! Every thread-context operation that reads or mutates kernel objects is a
//! [`ServiceCall`] executed through [`Kernel::svc`]. That single transition
//! point:
//!
//! 1. refuses callers in interrupt context (they must use the non-blocking
//!    variants instead),
//! 2. runs the service inside one critical section with exclusive access to
//!    the [`KernelState`], so only one service is ever in flight,
//! 3. pends PendSV after leaving the critical section when the scheduler
//!    decided on a context switch.
//!
//! ```text
//!   thread ──► Kernel::semaphore_acquire()
//!                 │ in_interrupt()? ──yes──► semaphore::isr_acquire()
//!                 ▼ no
//!              Kernel::svc(SemaphoreAcquire { .. })
//!                 │  critical section { service.call(&mut state) }
//!                 ▼
//!              Port::request_dispatch()   (if a switch is due)
//! ```

use crate::arch::Port;
use crate::error::{Error, Result};
use crate::kernel::{Kernel, KernelState};
use crate::sync;

/// A kernel service executed with exclusive access to kernel state.
pub trait ServiceCall {
    /// Value handed back to the caller.
    type Output;

    /// Run the service. Must not block and must not re-enter the boundary.
    fn call(self, kernel: &mut KernelState) -> Self::Output;
}

impl<P: Port> Kernel<P> {
    /// Execute `service` from thread context.
    ///
    /// Returns `Err(Error::Isr)` without touching kernel state when called
    /// from an interrupt handler or with interrupts masked.
    pub fn svc<S: ServiceCall>(&self, service: S) -> Result<S::Output> {
        if P::in_interrupt() {
            log::warn!("kernel service called from interrupt context");
            return Err(Error::Isr);
        }
        Ok(self.enter(|state| service.call(state)))
    }

    /// Run `f` with exclusive access to kernel state, then pend a context
    /// switch if one was requested.
    ///
    /// Also used by the kernel's own interrupt-level entry points (tick,
    /// deferred completion drain), which are serialized with services the
    /// same way.
    pub(crate) fn enter<R>(&self, f: impl FnOnce(&mut KernelState) -> R) -> R {
        let (result, switch) = sync::critical_section(|cs| {
            let mut state = self.state.borrow_ref_mut(cs);
            let result = f(&mut state);
            (result, core::mem::take(&mut state.switch_pending))
        });
        if switch {
            P::request_dispatch();
        }
        result
    }
}
