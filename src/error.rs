//! # Status Codes
//!
//! Every kernel operation reports failure through [`Error`]; success is
//! `Ok`. Nothing at this layer is fatal; callers decide how to recover.

use core::fmt;

/// Failure outcome of a kernel operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Unspecified failure, e.g. an operation that needs a running task
    /// was called before the scheduler started.
    Generic,
    /// A blocking acquire timed out with the resource still unavailable.
    Timeout,
    /// A non-blocking acquire could not proceed.
    ResourceUnavailable,
    /// Absent or stale handle, missing entry point, or inconsistent
    /// initial values.
    InvalidArgument,
    /// A fixed-size pool (tasks, semaphores, mutexes) is full.
    ResourceExhausted,
    /// Releasing would push a semaphore count above its maximum.
    InvariantViolation,
    /// Mutex released by a task that does not own it, or already free.
    OwnershipViolation,
    /// The primitive was deleted while the caller was waiting on it.
    Deleted,
    /// A blocking call was made from interrupt context.
    Isr,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Error::Generic => "kernel error",
            Error::Timeout => "timed out waiting for resource",
            Error::ResourceUnavailable => "resource unavailable",
            Error::InvalidArgument => "invalid argument",
            Error::ResourceExhausted => "no free slot",
            Error::InvariantViolation => "count already at maximum",
            Error::OwnershipViolation => "caller does not own the mutex",
            Error::Deleted => "object deleted while waiting",
            Error::Isr => "blocking call from interrupt context",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
