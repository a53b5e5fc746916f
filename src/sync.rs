//! # Critical Sections
//!
//! Interrupt-safe critical section abstraction. Kernel state shared between
//! thread context and interrupt handlers is only touched inside one of
//! these, which is what gives kernel calls their atomicity.
//!
//! On Cortex-M the implementation is provided by `cortex-m`'s
//! `critical-section-single-core` feature (save PRIMASK, `cpsid i`, restore).
//! Host test builds link the `std` implementation instead.

pub use critical_section::CriticalSection;

/// Execute a closure within a critical section (interrupts disabled).
///
/// Interrupts are disabled on entry and the previous enable state is
/// restored on exit, so nesting is allowed.
///
/// # Usage
/// ```ignore
/// sync::critical_section(|cs| {
///     // Access shared state safely
/// });
/// ```
///
/// Keep critical sections as short as possible to minimize interrupt latency.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(CriticalSection<'_>) -> R,
{
    critical_section::with(f)
}
