//! # rtkern Demo Firmware
//!
//! Exercises the deferred completion path on real hardware:
//!
//! | Context | Role |
//! |---------|------|
//! | SysTick | advances kernel time, releases `tick_sem` from interrupt context every `RELEASE_PERIOD` ticks |
//! | PendSV | drains deferred completions, re-dispatches |
//! | `main` thread | blocks on `tick_sem` with a timeout, counts tokens |
//!
//! The counter semaphore is placed in caller-owned static storage; the
//! pool backs a second, kernel-owned semaphore that `main` creates and
//! deletes once to show block reuse.

#![no_std]
#![no_main]

use core::cell::Cell;
use core::mem::MaybeUninit;

use cortex_m_rt::{entry, exception};
use critical_section::Mutex;
use panic_halt as _;

use rtkern::arch::cortex_m4::{self, CortexM4};
use rtkern::semaphore::control_block_mem;
use rtkern::{ControlBlock, Error, Kernel, SemaphoreAttr, SemaphoreId, ThreadAttr};

/// Ticks between two interrupt-context releases.
const RELEASE_PERIOD: u32 = 100;

/// Kernel-owned control blocks.
const POOL_BLOCKS: usize = 4;

static KERNEL: Kernel<CortexM4> = Kernel::new();

static TICK_SEM: Mutex<Cell<Option<SemaphoreId>>> = Mutex::new(Cell::new(None));

// ---------------------------------------------------------------------------
// Exception handlers
// ---------------------------------------------------------------------------

#[exception]
fn SysTick() {
    KERNEL.tick();

    if KERNEL.tick_count() % RELEASE_PERIOD == 0 {
        if let Some(sem) = critical_section::with(|cs| TICK_SEM.borrow(cs).get()) {
            match KERNEL.semaphore_release(sem) {
                Ok(()) => {}
                Err(Error::Resource) => log::trace!("tick_sem full, main is behind"),
                Err(error) => log::warn!("tick_sem release failed: {}", error),
            }
        }
    }
}

#[exception]
fn PendSV() {
    KERNEL.post_process();
}

// ---------------------------------------------------------------------------
// Main entry point
// ---------------------------------------------------------------------------

/// Firmware entry point. Initializes the kernel, creates the semaphores and
/// consumes tokens released by SysTick. Does not return.
///
/// `main` is the only registered thread, so it runs on the reset context.
#[entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().unwrap();

    let pool: &'static mut [ControlBlock] =
        cortex_m::singleton!(: [ControlBlock; POOL_BLOCKS] = [ControlBlock::VACANT; POOL_BLOCKS]).unwrap();
    KERNEL.initialize(Some(pool)).expect("kernel init failed");

    KERNEL
        .thread_new(ThreadAttr { name: Some("main"), priority: 1 })
        .expect("failed to register main thread");

    // Kernel-owned object: allocated from the pool, returned on delete
    let scratch = KERNEL
        .semaphore_new(1, 1, SemaphoreAttr { name: Some("scratch"), cb_mem: None })
        .expect("failed to create scratch semaphore");
    KERNEL.semaphore_delete(scratch).expect("failed to delete scratch semaphore");

    // Caller-owned object
    let slot: &'static mut MaybeUninit<ControlBlock> =
        cortex_m::singleton!(: MaybeUninit<ControlBlock> = MaybeUninit::uninit()).unwrap();
    let sem = KERNEL
        .semaphore_new(
            8,
            0,
            SemaphoreAttr { name: Some("tick_sem"), cb_mem: Some(control_block_mem(slot)) },
        )
        .expect("failed to create tick_sem");
    critical_section::with(|cs| TICK_SEM.borrow(cs).set(Some(sem)));

    cortex_m4::set_interrupt_priorities(&mut cp.SCB);
    cortex_m4::configure_systick(&mut cp.SYST);

    let mut received: u32 = 0;
    loop {
        // Sleeps in the kernel until SysTick hands over the next token
        match KERNEL.semaphore_acquire(sem, 2 * RELEASE_PERIOD) {
            Ok(()) => received = received.wrapping_add(1),
            Err(error) => log::warn!("tick_sem after {} tokens: {}", received, error),
        }
    }
}
