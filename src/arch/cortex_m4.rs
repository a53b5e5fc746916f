//! # Cortex-M4 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M4 (Thumb-2) processor:
//! execution-context detection, PendSV pending, sleeping until the next
//! interrupt and SysTick configuration.
//!
//! ## Suspension
//!
//! Threads share the one hardware context. A thread suspended by a kernel
//! call sleeps in `wfi` inside [`Kernel`](crate::kernel::Kernel) until an
//! interrupt (SysTick expiry, a release, the PendSV drain) has made it the
//! running thread again.
//!
//! ## Execution context
//!
//! `IPSR` holds the active exception number; anything other than thread
//! mode is interrupt context. Thread code running with `PRIMASK` set is
//! treated the same way, since it cannot be preempted to let a blocked call
//! make progress.
//!
//! ## Interrupt Priorities
//!
//! - SysTick: Priority 0xFF (lowest) — can be preempted
//! - PendSV: Priority 0xFF (lowest) — runs only when no other ISR is active
//!
//! PendSV at the lowest priority is what makes it the drain point for
//! deferred completions: it only runs after every interrupt handler that
//! could have released an object has returned.

use cortex_m::peripheral::scb::{SystemHandler, VectActive};
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
use cortex_m::register::primask;

use super::Port;
use crate::config::{SYSTEM_CLOCK_HZ, TICK_HZ};

/// Port for single-core Cortex-M4 parts.
pub struct CortexM4;

impl Port for CortexM4 {
    #[inline]
    fn in_interrupt() -> bool {
        SCB::vect_active() != VectActive::ThreadMode || primask::read().is_active()
    }

    #[inline]
    fn request_dispatch() {
        SCB::set_pendsv();
    }

    #[inline]
    fn wait_for_wakeup() {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// SysTick configuration
// ---------------------------------------------------------------------------

/// Configure the SysTick timer for the kernel tick.
///
/// Sets up SysTick to fire at `TICK_HZ` using the processor clock. The
/// handler is expected to call [`Kernel::tick`](crate::kernel::Kernel::tick).
pub fn configure_systick(syst: &mut SYST) {
    let reload = SYSTEM_CLOCK_HZ / TICK_HZ - 1;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
}

// ---------------------------------------------------------------------------
// Interrupt priority configuration
// ---------------------------------------------------------------------------

/// Set PendSV and SysTick to the lowest interrupt priority.
///
/// Context switches and the deferred completion drain then never preempt
/// application ISRs, and the tick is serialized with the drain.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // SAFETY: lowering these two handlers' priority cannot break a
    // priority-based critical section; the kernel uses PRIMASK only.
    unsafe {
        scb.set_priority(SystemHandler::PendSV, 0xFF);
        scb.set_priority(SystemHandler::SysTick, 0xFF);
    }
}
