//! # Architecture Abstraction Layer
//!
//! The kernel needs three things from the processor: to know whether the
//! caller runs in interrupt context, to request a deferred context switch,
//! and to park a suspended caller until something wakes it. [`Port`] names that boundary; the Cortex-M4 port implements it on
//! the target, host tests provide their own.

#[cfg(target_arch = "arm")]
pub mod cortex_m4;

/// Processor services used by the kernel.
pub trait Port {
    /// True in an exception handler, or in thread mode with interrupts
    /// masked. Blocking kernel calls are refused in either case.
    fn in_interrupt() -> bool;

    /// Pend the lowest-priority switch exception. The switch (and the
    /// deferred completion drain) runs once no other handler is active.
    fn request_dispatch();

    /// Park the calling thread until kernel state may have changed, i.e.
    /// until an interrupt has been taken.
    ///
    /// A suspended caller loops on this until the kernel makes it the
    /// running thread again.
    fn wait_for_wakeup();
}
