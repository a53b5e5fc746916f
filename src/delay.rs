//! # Delay Services
//!
//! Time-based suspension of the running thread, reusing the wait protocol
//! with [`WaitReason::Delay`]. A delay always ends successfully; it has no
//! object and therefore no other wake-up cause.

use crate::error::{Error, Result};
use crate::kernel::KernelState;
use crate::svc::ServiceCall;
use crate::thread::WaitReason;
use crate::wait::Completion;

/// Suspend the running thread for a number of ticks. Zero returns at once.
pub struct Delay(pub u32);

impl ServiceCall for Delay {
    type Output = Completion;

    fn call(self, kernel: &mut KernelState) -> Self::Output {
        match kernel.wait_enter(WaitReason::Delay, self.0) {
            Some(thread) => Completion::Suspended(thread),
            None => Completion::Done,
        }
    }
}

/// Suspend the running thread until the kernel tick reaches the given value.
pub struct DelayUntil(pub u32);

impl ServiceCall for DelayUntil {
    type Output = Result<Completion>;

    fn call(self, kernel: &mut KernelState) -> Self::Output {
        let ticks = self.0.wrapping_sub(kernel.tick);
        if ticks == u32::MAX {
            log::warn!("delay until {}: already passed (now {})", self.0, kernel.tick);
            return Err(Error::Parameter);
        }
        Ok(Delay(ticks).call(kernel))
    }
}
