//! # rtkern — synchronization core for a Cortex-M4 RTOS
//!
//! Priority-ordered wait/wake machinery and counting semaphores, usable
//! from threads and interrupt handlers.
//!
//! ## Overview
//!
//! Every kernel object starts with a common [`ObjectHeader`](object::ObjectHeader)
//! carrying its lifecycle state and the queue of threads blocked on it.
//! Threads suspend through one wait protocol whose outcome is decided by
//! whichever comes first: a release handing over a token, timeout expiry,
//! or deletion of the object. Interrupt handlers never touch wait queues;
//! their releases are recorded in a deferred completion queue and finished
//! before any thread resumes.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │             Application threads and ISRs                │
//! ├────────────────────────────────────────────────────────┤
//! │                 Kernel API (kernel.rs)                  │
//! │  semaphore_new · acquire · release · delete · delay    │
//! ├──────────────────────────┬─────────────────────────────┤
//! │  Service boundary        │  Deferred completions       │
//! │  svc.rs                  │  isr_queue.rs               │
//! ├──────────────┬───────────┴──────┬──────────────────────┤
//! │  Semaphore   │  Wait controller │  Scheduler           │
//! │  semaphore.rs│  wait.rs         │  scheduler.rs        │
//! │  counter.rs  │  wait_queue.rs   │                      │
//! ├──────────────┴──────────────────┴──────────────────────┤
//! │   Objects (object.rs) · Threads (thread.rs) · Pool     │
//! ├────────────────────────────────────────────────────────┤
//! │            Arch Port (arch/cortex_m4.rs)                │
//! │        context detection · PendSV · SysTick            │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Memory Model
//!
//! - **No heap**: control blocks come from a caller-provided pool or from
//!   caller-owned static storage
//! - **Fixed-size thread table**: `[ThreadCb; MAX_THREADS]`
//! - **Critical sections**: the `critical-section` crate; on the target
//!   `cortex-m` provides the single-core implementation
//! - **Token counter**: interrupt masking by default, lock-free
//!   compare-exchange with the `exclusive-access` feature

#![cfg_attr(not(test), no_std)]

pub mod arch;
pub mod config;
pub mod counter;
pub mod delay;
pub mod error;
pub mod isr_queue;
pub mod kernel;
pub mod memory;
pub mod object;
pub mod scheduler;
pub mod semaphore;
pub mod svc;
pub mod sync;
pub mod thread;
pub mod wait;
pub mod wait_queue;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
pub use kernel::Kernel;
pub use object::ControlBlock;
pub use semaphore::{SemaphoreAttr, SemaphoreId};
pub use thread::{ThreadAttr, ThreadId};
