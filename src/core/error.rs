//! Error types
//!
//! Uses Rust's Result pattern instead of C-style error pointers.

use core::fmt;

/// Kernel error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
pub enum OsError {
    // ============ Argument errors ============
    /// Bad handle, uninitialized object or detached-thread join
    InvalidArgument = 10001,
    /// Object is in a state that does not allow the operation
    InvalidState = 10002,

    // ============ Context errors ============
    /// Blocking call issued from interrupt context
    InterruptContext = 11001,
    /// Blocking call issued with preemption locked
    SchedLocked = 11002,
    /// The kernel has no running task yet
    NotRunning = 11003,
    /// Scheduler lock nesting overflow
    LockNestingOvf = 11004,
    /// Scheduler is not locked
    SchedNotLocked = 11005,

    // ============ Pend errors ============
    /// Non-blocking operation had nothing to do
    WouldBlock = 12001,
    /// Deadline elapsed
    TimedOut = 12002,
    /// Wait ended by a signal before completion
    Interrupted = 12003,

    // ============ Object errors ============
    /// Object has holders, waiters or running work
    Busy = 13001,
    /// Joining the calling thread
    Deadlock = 13002,
    /// No such join record or pending item
    NotFound = 13003,
    /// Work item is already queued
    AlreadyQueued = 13004,
    /// A fixed pool is exhausted
    NoResources = 13005,
}

/// Result type alias for kernel operations
pub type OsResult<T> = Result<T, OsError>;

impl OsError {
    /// Negated POSIX errno for the system-call shims
    pub fn errno(self) -> i32 {
        let e = match self {
            OsError::InvalidArgument => 22,    // EINVAL
            OsError::InvalidState => 1,        // EPERM
            OsError::InterruptContext => 1,    // EPERM
            OsError::SchedLocked => 35,        // EDEADLK
            OsError::NotRunning => 1,          // EPERM
            OsError::LockNestingOvf => 75,     // EOVERFLOW
            OsError::SchedNotLocked => 1,      // EPERM
            OsError::WouldBlock => 11,         // EAGAIN
            OsError::TimedOut => 110,          // ETIMEDOUT
            OsError::Interrupted => 4,         // EINTR
            OsError::Busy => 16,               // EBUSY
            OsError::Deadlock => 35,           // EDEADLK
            OsError::NotFound => 3,            // ESRCH
            OsError::AlreadyQueued => 114,     // EALREADY
            OsError::NoResources => 12,        // ENOMEM
        };
        -e
    }
}

impl fmt::Display for OsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            OsError::InvalidArgument => "invalid argument",
            OsError::InvalidState => "invalid state",
            OsError::InterruptContext => "not allowed in interrupt context",
            OsError::SchedLocked => "scheduler is locked",
            OsError::NotRunning => "kernel is not running",
            OsError::LockNestingOvf => "lock nesting overflow",
            OsError::SchedNotLocked => "scheduler is not locked",
            OsError::WouldBlock => "operation would block",
            OsError::TimedOut => "timed out",
            OsError::Interrupted => "interrupted",
            OsError::Busy => "resource busy",
            OsError::Deadlock => "deadlock",
            OsError::NotFound => "not found",
            OsError::AlreadyQueued => "already queued",
            OsError::NoResources => "out of resources",
        };
        f.write_str(msg)
    }
}
