//! Host test support: a fake port and leaked `'static` storage.
//!
//! The host has one execution context per test. A suspended caller parks in
//! [`TestPort::wait_for_wakeup`], which plays the next scripted event queued
//! with [`on_wakeup`]: a tick, a release from another thread, an interrupt.
//! Running out of events while still suspended fails the test.

use core::cell::{Cell, RefCell};
use core::mem::MaybeUninit;
use std::collections::VecDeque;

use crate::arch::Port;
use crate::counter::TokenCounter;
use crate::kernel::Kernel;
use crate::object::{ControlBlock, ObjectFlags, ObjectHeader, ObjectRef};
use crate::semaphore::{self, Semaphore};

std::thread_local! {
    static IN_ISR: Cell<bool> = const { Cell::new(false) };
    static DISPATCHES: Cell<usize> = const { Cell::new(0) };
    static WAKEUPS: RefCell<VecDeque<Box<dyn FnOnce()>>> = RefCell::new(VecDeque::new());
}

/// Port whose execution context is switched by [`in_isr`]. State is per
/// test thread.
pub struct TestPort;

impl Port for TestPort {
    fn in_interrupt() -> bool {
        IN_ISR.with(Cell::get)
    }

    fn request_dispatch() {
        DISPATCHES.with(|n| n.set(n.get() + 1));
    }

    fn wait_for_wakeup() {
        let event = WAKEUPS.with(|events| events.borrow_mut().pop_front());
        match event {
            Some(event) => event(),
            None => panic!("suspended caller has nothing left to wake it"),
        }
    }
}

/// Queue an event for the next time a suspended caller parks.
pub fn on_wakeup(event: impl FnOnce() + 'static) {
    WAKEUPS.with(|events| events.borrow_mut().push_back(Box::new(event)));
}

/// Queue `n` timer ticks, one per park.
pub fn on_ticks(kernel: &'static TestKernel, n: u32) {
    for _ in 0..n {
        on_wakeup(move || kernel.tick());
    }
}

/// Scripted events not consumed yet.
pub fn pending_wakeups() -> usize {
    WAKEUPS.with(|events| events.borrow().len())
}

pub type TestKernel = Kernel<TestPort>;

/// Run `f` as if inside an interrupt handler.
pub fn in_isr<R>(f: impl FnOnce() -> R) -> R {
    IN_ISR.with(|flag| flag.set(true));
    let result = f();
    IN_ISR.with(|flag| flag.set(false));
    result
}

/// PendSV requests made by the current test thread so far.
pub fn dispatch_requests() -> usize {
    DISPATCHES.with(Cell::get)
}

/// `n` vacant control blocks living for the rest of the test binary.
pub fn leak_pool(n: usize) -> &'static mut [ControlBlock] {
    let blocks: Vec<ControlBlock> = (0..n).map(|_| ControlBlock::VACANT).collect();
    Box::leak(blocks.into_boxed_slice())
}

/// One properly sized and aligned caller-owned control block.
pub fn leak_storage() -> &'static mut [MaybeUninit<u8>] {
    semaphore::control_block_mem(Box::leak(Box::new(MaybeUninit::uninit())))
}

/// Fill a block with a minimal live semaphore.
pub fn occupy(object: ObjectRef) {
    let sem = Semaphore::from_parts(ObjectHeader::new(ObjectFlags::empty(), None), TokenCounter::new(0, 1));
    // SAFETY: test blocks are leaked and not borrowed elsewhere.
    unsafe { object.write(ControlBlock::Semaphore(sem)) };
}

/// Kernel that scripted events can refer to.
pub fn leak_kernel(kernel: TestKernel) -> &'static TestKernel {
    Box::leak(Box::new(kernel))
}

/// Kernel initialized with a pool of `blocks` control blocks.
pub fn kernel_with_pool(blocks: usize) -> TestKernel {
    let kernel = TestKernel::new();
    kernel.initialize(Some(leak_pool(blocks))).unwrap();
    kernel
}
