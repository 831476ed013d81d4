//! Scheduler module
//!
//! Fixed-priority preemptive scheduler: the running task is the head of the
//! highest non-empty ready list.

mod rdy_list;
mod wait_queue;

pub use rdy_list::ReadyList;
pub use wait_queue::{WaitIter, WaitQueue};

use crate::core::config::CFG_PRIO_MAX;
use crate::core::kernel::Kernel;
use crate::core::prio::PrioTable;
use crate::core::types::{OsPrio, OsTaskState, TaskId};

/// Ready lists with their priority bitmap
pub struct SchedState {
    prio_tbl: PrioTable,
    rdy_list: [ReadyList; CFG_PRIO_MAX],
}

impl SchedState {
    pub const fn new() -> Self {
        SchedState {
            prio_tbl: PrioTable::new(),
            rdy_list: [ReadyList::EMPTY; CFG_PRIO_MAX],
        }
    }

    pub fn init(&mut self) {
        self.prio_tbl.init();
        for list in self.rdy_list.iter_mut() {
            list.init();
        }
    }

    /// Head of the highest non-empty ready list
    #[inline]
    pub fn highest_ready(&self) -> Option<TaskId> {
        self.rdy_list[self.prio_tbl.get_highest() as usize].head()
    }
}

impl Default for SchedState {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Main scheduling point
    ///
    /// Picks the highest priority ready task and requests a context switch
    /// when it differs from the running one. Called after any operation that
    /// may change task readiness. Does nothing inside an ISR (the outermost
    /// `int_exit` reschedules) or while the scheduler is locked and the
    /// running task can keep running.
    pub(crate) fn sched(&mut self) {
        if !self.is_running() || self.int_nesting() > 0 {
            return;
        }

        if self.sched_lock_nesting > 0 {
            if let Some(cur) = self.running {
                if self.tasks.tcb(cur).is_ready() {
                    return;
                }
            }
        }

        let high_rdy = self.sched.highest_ready();
        if high_rdy != self.running {
            self.running = high_rdy;
            self.ctx_sw_ctr = self.ctx_sw_ctr.wrapping_add(1);
            crate::trace!("switch to slot {}", high_rdy.map(TaskId::slot));
            crate::port::os_ctx_sw();
        }
    }

    /// Make a task ready
    pub(crate) fn rdy_insert(&mut self, id: TaskId) {
        let tcb = self.tasks.tcb_mut(id);
        tcb.task_state = OsTaskState::Ready;
        let prio = tcb.prio;

        self.sched.rdy_list[prio as usize].insert_tail(&mut self.tasks, id);
        self.sched.prio_tbl.insert(prio);
    }

    /// Remove a task from ready list
    pub(crate) fn rdy_remove(&mut self, id: TaskId) {
        let prio = self.tasks.tcb(id).prio;
        let list = &mut self.sched.rdy_list[prio as usize];
        list.remove(&mut self.tasks, id);
        if list.is_empty() {
            self.sched.prio_tbl.remove(prio);
        }
    }

    /// Move a ready task to a different priority
    pub(crate) fn rdy_change_prio(&mut self, id: TaskId, new_prio: OsPrio) {
        if self.tasks.tcb(id).prio == new_prio {
            return;
        }

        self.rdy_remove(id);
        self.tasks.tcb_mut(id).prio = new_prio;
        self.sched.rdy_list[new_prio as usize].insert_tail(&mut self.tasks, id);
        self.sched.prio_tbl.insert(new_prio);
    }
}
