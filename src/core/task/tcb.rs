//! Task Control Block (TCB) definition
//!
//! The TCB contains all the information the synchronization core keeps
//! about a task. It carries a single list link, used by whichever list the
//! task is on: a ready list or the wait queue, never both.

use crate::core::types::{GroupId, OsPendStatus, OsPrio, OsTaskState, OsTick, SemId, TaskId};

/// Intrusive doubly-linked list link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    pub(crate) next: Option<TaskId>,
    pub(crate) prev: Option<TaskId>,
}

impl Link {
    pub(crate) const fn new() -> Self {
        Link { next: None, prev: None }
    }
}

/// Task Control Block
#[derive(Debug, Clone, Copy)]
pub struct OsTcb {
    // ============ Task identification ============
    /// Task name
    pub(crate) name: &'static str,
    /// Bumped every time the slot is released
    pub(crate) gen: u16,

    // ============ Priority ============
    /// Effective priority, base priority raised by inheritance
    pub(crate) prio: OsPrio,
    /// Base priority
    pub(crate) base_prio: OsPrio,

    // ============ State ============
    pub(crate) task_state: OsTaskState,

    // ============ List links ============
    /// Ready list or wait queue
    pub(crate) link: Link,
    /// Tick wheel
    pub(crate) tick_link: Link,
    /// Which tick wheel slot this task is in
    pub(crate) tick_wheel_slot: Option<u8>,
    /// Absolute tick of a delay or wait deadline
    pub(crate) deadline: OsTick,

    // ============ Semaphore wait ============
    /// Semaphore the task is blocked on
    pub(crate) waitsem: Option<SemId>,
    /// Outcome of the last finished wait
    pub(crate) pend_status: OsPendStatus,
    /// Semaphore whose finished wait has not been collected yet
    pub(crate) pend_done: Option<SemId>,

    // ============ Threads ============
    pub(crate) group: Option<GroupId>,
    /// Thread this task is blocked joining
    pub(crate) joining: Option<TaskId>,
}

impl OsTcb {
    pub(crate) const EMPTY: OsTcb = OsTcb::new();

    /// Create a new, unused TCB
    pub const fn new() -> Self {
        OsTcb {
            name: "",
            gen: 0,

            prio: 0,
            base_prio: 0,

            task_state: OsTaskState::Free,

            link: Link::new(),
            tick_link: Link::new(),
            tick_wheel_slot: None,
            deadline: 0,

            waitsem: None,
            pend_status: OsPendStatus::Ok,
            pend_done: None,

            group: None,
            joining: None,
        }
    }

    /// Reset to a freshly created task, keeping the slot generation
    pub(crate) fn init(&mut self, name: &'static str, prio: OsPrio) {
        let gen = self.gen;
        *self = Self::new();
        self.gen = gen;
        self.name = name;
        self.prio = prio;
        self.base_prio = prio;
        self.task_state = OsTaskState::Ready;
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Effective priority
    #[inline]
    pub fn prio(&self) -> OsPrio {
        self.prio
    }

    #[inline]
    pub fn base_prio(&self) -> OsPrio {
        self.base_prio
    }

    #[inline]
    pub fn state(&self) -> OsTaskState {
        self.task_state
    }

    /// Semaphore the task is blocked on
    #[inline]
    pub fn waitsem(&self) -> Option<SemId> {
        self.waitsem
    }

    /// Whether the task runs above its base priority
    #[inline]
    pub fn is_boosted(&self) -> bool {
        self.prio > self.base_prio
    }

    /// Check if task is ready to run
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.task_state == OsTaskState::Ready
    }

    /// Check if task is pending
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.task_state, OsTaskState::Pend | OsTaskState::PendTimeout)
    }

    /// Check if task is delayed
    #[inline]
    pub fn is_delayed(&self) -> bool {
        self.task_state == OsTaskState::Delayed
    }

    #[inline]
    pub(crate) fn is_free(&self) -> bool {
        self.task_state == OsTaskState::Free
    }
}

impl Default for OsTcb {
    fn default() -> Self {
        Self::new()
    }
}
