//! Kernel-wide wait queue
//!
//! Every task blocked on a semaphore is linked here through its single TCB
//! link, tagged with the semaphore in `waitsem`. The list is ordered by
//! effective priority, highest first; a task goes behind entries of equal
//! priority, so waiters of one semaphore are released highest first and
//! FIFO among equals.

use crate::core::task::TaskTable;
use crate::core::types::{SemId, TaskId};

#[derive(Debug, Clone, Copy)]
pub struct WaitQueue {
    head: Option<TaskId>,
    tail: Option<TaskId>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        WaitQueue {
            head: None,
            tail: None,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Link a task by its effective priority
    ///
    /// The task must not be on any list.
    pub(crate) fn insert(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let prio = tasks.tcb(id).prio;

        // First entry strictly less urgent than the new one
        let mut before = self.head;
        while let Some(cur) = before {
            if tasks.tcb(cur).prio < prio {
                break;
            }
            before = tasks.tcb(cur).link.next;
        }

        let prev = match before {
            Some(next) => tasks.tcb(next).link.prev,
            None => self.tail,
        };

        {
            let link = &mut tasks.tcb_mut(id).link;
            link.prev = prev;
            link.next = before;
        }

        match prev {
            Some(p) => tasks.tcb_mut(p).link.next = Some(id),
            None => self.head = Some(id),
        }
        match before {
            Some(n) => tasks.tcb_mut(n).link.prev = Some(id),
            None => self.tail = Some(id),
        }
    }

    /// Unlink a task
    ///
    /// The task must be on this queue.
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

    /// Move a task after its effective priority changed
    pub(crate) fn reposition(&mut self, tasks: &mut TaskTable, id: TaskId) {
        self.remove(tasks, id);
        self.insert(tasks, id);
    }

    /// Highest priority task waiting on `sem`
    pub fn first_waiting_on(&self, tasks: &TaskTable, sem: SemId) -> Option<TaskId> {
        self.iter(tasks).find(|&id| tasks.tcb(id).waitsem == Some(sem))
    }

    pub fn count_waiting_on(&self, tasks: &TaskTable, sem: SemId) -> usize {
        self.iter(tasks)
            .filter(|&id| tasks.tcb(id).waitsem == Some(sem))
            .count()
    }

    #[inline]
    pub fn has_waiters(&self, tasks: &TaskTable, sem: SemId) -> bool {
        self.first_waiting_on(tasks, sem).is_some()
    }

    /// Queued tasks, most urgent first
    pub fn iter<'a>(&self, tasks: &'a TaskTable) -> WaitIter<'a> {
        WaitIter {
            tasks,
            next: self.head,
        }
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

pub struct WaitIter<'a> {
    tasks: &'a TaskTable,
    next: Option<TaskId>,
}

impl Iterator for WaitIter<'_> {
    type Item = TaskId;

    fn next(&mut self) -> Option<TaskId> {
        let cur = self.next?;
        self.next = self.tasks.tcb(cur).link.next;
        Some(cur)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::core::kernel::Kernel;
    use std::vec::Vec;

    fn spawn(k: &mut Kernel, name: &'static str, prio: u8, sem: SemId) -> TaskId {
        let id = k.task_spawn(name, prio, None).unwrap();
        k.rdy_remove(id);
        k.tasks.tcb_mut(id).waitsem = Some(sem);
        id
    }

    fn order(q: &WaitQueue, tasks: &TaskTable) -> Vec<TaskId> {
        q.iter(tasks).collect()
    }

    #[test]
    fn test_priority_order_fifo_among_equals() {
        let mut k = Kernel::new();
        let s = SemId::new(0);
        let a = spawn(&mut k, "a", 10, s);
        let b = spawn(&mut k, "b", 30, s);
        let c = spawn(&mut k, "c", 10, s);
        let d = spawn(&mut k, "d", 20, s);

        let mut q = WaitQueue::new();
        for id in [a, b, c, d] {
            q.insert(&mut k.tasks, id);
        }

        assert_eq!(order(&q, &k.tasks), [b, d, a, c]);
        assert_eq!(q.first_waiting_on(&k.tasks, s), Some(b));
        assert_eq!(q.count_waiting_on(&k.tasks, s), 4);
    }

    #[test]
    fn test_first_waiting_on_filters_by_sem() {
        let mut k = Kernel::new();
        let s1 = SemId::new(1);
        let s2 = SemId::new(2);
        let hi = spawn(&mut k, "hi", 50, s1);
        let lo = spawn(&mut k, "lo", 5, s2);

        let mut q = WaitQueue::new();
        q.insert(&mut k.tasks, lo);
        q.insert(&mut k.tasks, hi);

        assert_eq!(q.first_waiting_on(&k.tasks, s2), Some(lo));
        assert!(!q.has_waiters(&k.tasks, SemId::new(3)));

        q.remove(&mut k.tasks, lo);
        assert!(!q.has_waiters(&k.tasks, s2));
        assert_eq!(q.first_waiting_on(&k.tasks, s1), Some(hi));

        q.remove(&mut k.tasks, hi);
        assert!(q.is_empty());
    }

    #[test]
    fn test_reposition_goes_behind_equals() {
        let mut k = Kernel::new();
        let s = SemId::new(0);
        let a = spawn(&mut k, "a", 20, s);
        let b = spawn(&mut k, "b", 10, s);

        let mut q = WaitQueue::new();
        q.insert(&mut k.tasks, a);
        q.insert(&mut k.tasks, b);

        k.tasks.tcb_mut(b).prio = 20;
        q.reposition(&mut k.tasks, b);
        assert_eq!(order(&q, &k.tasks), [a, b]);

        k.tasks.tcb_mut(b).prio = 25;
        q.reposition(&mut k.tasks, b);
        assert_eq!(order(&q, &k.tasks), [b, a]);
    }
}
