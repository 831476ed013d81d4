//! Core type definitions
//!
//! Handles are small indices into the kernel's fixed arenas. Priorities grow
//! with urgency: 0 is the idle task, 255 the most urgent.

/// Task priority (0 = idle, larger = more urgent)
pub type OsPrio = u8;

/// Tick counter type
pub type OsTick = u32;

/// Semaphore counter type
pub type OsSemCtr = i16;

/// Nesting counter
pub type OsNestingCtr = u8;

/// Handle to a task control block.
///
/// Carries the generation of the arena slot at creation time, so a handle to
/// a task that has exited does not match the task that later reuses the slot.
/// The generation wraps after 65536 reuses of one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TaskId {
    slot: u8,
    gen: u16,
}

impl TaskId {
    pub(crate) const fn new(slot: usize, gen: u16) -> Self {
        TaskId { slot: slot as u8, gen }
    }

    /// Arena slot of the task
    #[inline(always)]
    pub const fn slot(self) -> usize {
        self.slot as usize
    }

    /// Generation of the slot when the task was created
    #[inline(always)]
    pub const fn generation(self) -> u16 {
        self.gen
    }
}

/// Handle to a semaphore slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SemId(pub(crate) u16);

impl SemId {
    /// Handle for the semaphore slot `index`
    pub const fn new(index: usize) -> Self {
        SemId(index as u16)
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a work item slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WorkId(pub(crate) u16);

impl WorkId {
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a task group (a task and the threads it spawned)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GroupId(pub(crate) u8);

impl GroupId {
    #[inline(always)]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Task state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsTaskState {
    /// Slot is not in use
    Free = 0,
    /// Task is ready to run (the running task is ready too)
    Ready = 1,
    /// Task is delayed
    Delayed = 2,
    /// Task is waiting on a semaphore
    Pend = 3,
    /// Task is waiting on a semaphore with a deadline
    PendTimeout = 4,
}

/// Outcome recorded when a waiting task is made ready again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OsPendStatus {
    /// A unit was handed over by a post
    Ok = 0,
    /// The wait was interrupted
    Abort = 1,
    /// The deadline passed
    Timeout = 2,
}

/// Result of an operation that may suspend the calling task.
///
/// `Blocked` means the caller was taken off the ready list. Once it runs
/// again the caller issues the same call, which then returns the outcome
/// recorded when the task was resumed.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pend<T> {
    Ready(T),
    Blocked,
}

impl<T> Pend<T> {
    #[inline]
    pub fn is_blocked(&self) -> bool {
        matches!(self, Pend::Blocked)
    }

    #[inline]
    pub fn ready(self) -> Option<T> {
        match self {
            Pend::Ready(v) => Some(v),
            Pend::Blocked => None,
        }
    }
}

/// Priority protocol of a semaphore
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SemProtocol {
    /// Holders inherit the priority of their highest waiter
    Inherit,
    /// Plain counting semaphore, holders are not tracked
    None,
}
