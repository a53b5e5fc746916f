//! # Status Codes
//!
//! Every failing kernel operation reports one of these values. Nothing is
//! retried by the kernel and nothing is swallowed: finer-grained diagnostic
//! detail (which check failed) goes to the log, the category goes to the
//! caller.

use core::fmt;

/// Failure category of a kernel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Malformed handle, bad argument or unusable control-block storage.
    Parameter,
    /// Object deleted, no token available, or counting limit reached.
    Resource,
    /// A bounded wait expired before the resource became available.
    Timeout,
    /// Blocking or administrative call made from interrupt context.
    Isr,
    /// Kernel-allocated storage was requested but none is left.
    NoMemory,
}

impl Error {
    /// Short, stable name used in log records.
    pub const fn as_str(self) -> &'static str {
        match self {
            Error::Parameter => "parameter error",
            Error::Resource => "resource error",
            Error::Timeout => "timeout",
            Error::Isr => "not allowed in interrupt context",
            Error::NoMemory => "out of memory",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type used throughout the kernel.
pub type Result<T> = core::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(Error::Timeout.to_string(), "timeout");
        assert_eq!(Error::Isr.to_string(), Error::Isr.as_str());
    }
}
