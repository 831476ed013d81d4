//! Ready list - doubly linked list of TCBs at a given priority
//!
//! Each priority level has its own ready list. Tasks are added to the
//! tail (FIFO among equals) and scheduled from the head. Links live in the
//! TCBs, so every operation takes the task table.

use crate::core::task::TaskTable;
use crate::core::types::TaskId;

/// Ready list for a single priority level
#[derive(Debug, Clone, Copy)]
pub struct ReadyList {
    head: Option<TaskId>,
    tail: Option<TaskId>,
}

impl ReadyList {
    pub(crate) const EMPTY: ReadyList = ReadyList::new();

    /// Create a new empty ready list
    pub const fn new() -> Self {
        ReadyList {
            head: None,
            tail: None,
        }
    }

    /// Initialize/reset the ready list
    pub fn init(&mut self) {
        self.head = None;
        self.tail = None;
    }

    /// Get head of list (first to be scheduled)
    #[inline]
    pub fn head(&self) -> Option<TaskId> {
        self.head
    }

    /// Check if list is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert a task at the tail of the list (FIFO order)
    ///
    /// The task must not be on any list.
    pub(crate) fn insert_tail(&mut self, tasks: &mut TaskTable, id: TaskId) {
        {
            let link = &mut tasks.tcb_mut(id).link;
            link.next = None;
            link.prev = self.tail;
        }

        match self.tail {
            Some(tail) => tasks.tcb_mut(tail).link.next = Some(id),
            None => self.head = Some(id),
        }

        self.tail = Some(id);
    }

    /// Remove a task from the list
    ///
    /// The task must be on this list.
    pub(crate) fn remove(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let link = tasks.tcb(id).link;

        match link.prev {
            Some(prev) => tasks.tcb_mut(prev).link.next = link.next,
            None => self.head = link.next,
        }

        match link.next {
            Some(next) => tasks.tcb_mut(next).link.prev = link.prev,
            None => self.tail = link.prev,
        }

        let link = &mut tasks.tcb_mut(id).link;
        link.next = None;
        link.prev = None;
    }
}

impl Default for ReadyList {
    fn default() -> Self {
        Self::new()
    }
}
