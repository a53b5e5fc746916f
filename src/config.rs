//! # Kernel Configuration
//!
//! Compile-time constants governing the synchronization core.
//! All limits are fixed at compile time — no dynamic allocation.

/// Maximum number of threads the kernel can manage simultaneously.
/// Bounds the static thread table; thread ids are indices into it.
pub const MAX_THREADS: usize = 8;

/// Upper bound for a semaphore's `max_count`. Tokens are stored in 16 bits.
pub const TOKEN_LIMIT: u32 = 65_535;

/// Timeout value meaning "wait until woken, never expire".
pub const WAIT_FOREVER: u32 = u32::MAX;

/// Capacity of the deferred completion queue filled by interrupt handlers.
/// Each object occupies at most one slot at a time, so this bounds the
/// number of distinct objects released from interrupt context between two
/// drain points.
pub const ISR_QUEUE_SIZE: usize = 16;

/// SysTick frequency in Hz. One kernel tick per SysTick interrupt.
pub const TICK_HZ: u32 = 1000;

/// System clock frequency in Hz (default for STM32F4 at 16 MHz HSI).
pub const SYSTEM_CLOCK_HZ: u32 = 16_000_000;
