//! # Token Counter
//!
//! Interrupt-safe bounded counter backing a semaphore. Both operations are
//! atomic with respect to kernel calls on the same object and to interrupt
//! handlers using the non-blocking path, which bypasses the kernel-wide
//! critical section of the service boundary.
//!
//! Two strategies with identical observable behavior, selected at build time:
//!
//! - **default**: read-modify-write inside a critical section (PRIMASK saved,
//!   interrupts disabled, PRIMASK restored). Works on every Cortex-M.
//! - **`exclusive-access`**: compare-exchange retry loop on an `AtomicU16`,
//!   compiled to LDREX/STREX on ARMv7-M. Never masks interrupts.

#[cfg(not(feature = "exclusive-access"))]
use core::cell::Cell;
#[cfg(feature = "exclusive-access")]
use core::sync::atomic::{AtomicU16, Ordering};

#[cfg(not(feature = "exclusive-access"))]
use crate::sync;

/// Bounded token counter, `0 <= count <= max`.
pub struct TokenCounter {
    #[cfg(not(feature = "exclusive-access"))]
    tokens: Cell<u16>,
    #[cfg(feature = "exclusive-access")]
    tokens: AtomicU16,
    max: u16,
}

impl TokenCounter {
    /// Create a counter holding `initial` of `max` tokens.
    ///
    /// Callers validate `initial <= max` beforehand.
    pub const fn new(initial: u16, max: u16) -> Self {
        Self {
            #[cfg(not(feature = "exclusive-access"))]
            tokens: Cell::new(initial),
            #[cfg(feature = "exclusive-access")]
            tokens: AtomicU16::new(initial),
            max,
        }
    }

    /// Capacity fixed at creation.
    #[inline]
    pub fn max(&self) -> u16 {
        self.max
    }
}

#[cfg(not(feature = "exclusive-access"))]
impl TokenCounter {
    /// Take one token if any is available.
    pub fn decrement_if_available(&self) -> bool {
        sync::critical_section(|_cs| {
            let tokens = self.tokens.get();
            if tokens != 0 {
                self.tokens.set(tokens - 1);
                true
            } else {
                false
            }
        })
    }

    /// Return one token unless the counter is already full.
    pub fn increment_if_below_max(&self) -> bool {
        sync::critical_section(|_cs| {
            let tokens = self.tokens.get();
            if tokens < self.max {
                self.tokens.set(tokens + 1);
                true
            } else {
                false
            }
        })
    }

    /// Current number of available tokens.
    #[inline]
    pub fn count(&self) -> u16 {
        self.tokens.get()
    }
}

#[cfg(feature = "exclusive-access")]
impl TokenCounter {
    /// Take one token if any is available.
    pub fn decrement_if_available(&self) -> bool {
        self.tokens
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |tokens| tokens.checked_sub(1))
            .is_ok()
    }

    /// Return one token unless the counter is already full.
    pub fn increment_if_below_max(&self) -> bool {
        let max = self.max;
        self.tokens
            .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |tokens| {
                (tokens < max).then(|| tokens + 1)
            })
            .is_ok()
    }

    /// Current number of available tokens.
    #[inline]
    pub fn count(&self) -> u16 {
        self.tokens.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrement_stops_at_zero() {
        let counter = TokenCounter::new(2, 3);
        assert!(counter.decrement_if_available());
        assert!(counter.decrement_if_available());
        assert!(!counter.decrement_if_available());
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn test_increment_stops_at_max() {
        let counter = TokenCounter::new(1, 2);
        assert!(counter.increment_if_below_max());
        assert!(!counter.increment_if_below_max());
        assert_eq!(counter.count(), 2);
        assert_eq!(counter.max(), 2);
    }

    #[test]
    fn test_full_width_counter() {
        let counter = TokenCounter::new(u16::MAX - 1, u16::MAX);
        assert!(counter.increment_if_below_max());
        assert!(!counter.increment_if_below_max());
        assert_eq!(counter.count(), u16::MAX);
    }

    #[test]
    fn test_concurrent_updates_stay_bounded() {
        use std::sync::Arc;
        use std::thread;

        struct Shared(TokenCounter);
        // SAFETY: every access goes through the counter's own
        // critical-section or atomic strategy.
        unsafe impl Sync for Shared {}
        unsafe impl Send for Shared {}

        let shared = Arc::new(Shared(TokenCounter::new(0, 100)));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    let mut released = 0u32;
                    for _ in 0..50 {
                        if shared.0.increment_if_below_max() {
                            released += 1;
                        }
                    }
                    released
                })
            })
            .collect();
        let released: u32 = workers.into_iter().map(|w| w.join().unwrap()).sum();

        assert_eq!(released, 100);
        assert_eq!(shared.0.count(), 100);
    }
}
