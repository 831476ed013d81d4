//! Priority inheritance
//!
//! A task's effective priority is the maximum of its base priority and the
//! priority of the most urgent task waiting on any inheriting semaphore it
//! holds. It is recomputed from scratch rather than undone step by step, so
//! a release can never leave a stale boost behind.
//!
//! A change can cascade: a boosted task that is itself blocked raises the
//! holders of the semaphore it waits on, and so on down the chain. The walk
//! is iterative over a bounded worklist; each task is queued at most once at
//! a time and the total number of steps is capped.

use crate::core::config::{CFG_PI_WALK_BUDGET, CFG_TASK_MAX};
use crate::core::kernel::Kernel;
use crate::core::types::{OsPrio, OsTaskState, SemId, TaskId};

/// Tasks whose effective priority must be recomputed
struct PiWorklist {
    stack: [TaskId; CFG_TASK_MAX],
    len: usize,
    queued: [bool; CFG_TASK_MAX],
}

impl PiWorklist {
    const fn new() -> Self {
        PiWorklist {
            stack: [TaskId::new(0, 0); CFG_TASK_MAX],
            len: 0,
            queued: [false; CFG_TASK_MAX],
        }
    }

    fn push(&mut self, id: TaskId) {
        let slot = id.slot();
        if self.queued[slot] || self.len == CFG_TASK_MAX {
            return;
        }
        self.queued[slot] = true;
        self.stack[self.len] = id;
        self.len += 1;
    }

    fn pop(&mut self) -> Option<TaskId> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        let id = self.stack[self.len];
        self.queued[id.slot()] = false;
        Some(id)
    }
}

impl Kernel {
    /// Priority owed to `task` by the waiters of what it holds
    #[cfg(feature = "prio-inherit")]
    fn inherited_prio(&self, task: TaskId) -> Option<OsPrio> {
        // The wait queue is sorted, so the first match is the most urgent
        self.waitq.iter(&self.tasks).find_map(|w| {
            let tcb = self.tasks.tcb(w);
            let sem = self.sems.slot(tcb.waitsem?);
            (sem.inherits() && sem.holders.counts(&self.holders, task) > 0).then_some(tcb.prio)
        })
    }

    #[cfg(not(feature = "prio-inherit"))]
    #[inline(always)]
    fn inherited_prio(&self, _task: TaskId) -> Option<OsPrio> {
        None
    }

    /// Bring the effective priority of `seeds`, and of every task their
    /// change affects, up to date.
    pub(crate) fn pi_update(&mut self, seeds: &[TaskId]) {
        let mut work = PiWorklist::new();
        for &id in seeds {
            work.push(id);
        }

        let mut budget = CFG_PI_WALK_BUDGET;
        while let Some(id) = work.pop() {
            if budget == 0 {
                crate::warn!("priority walk budget exhausted");
                break;
            }
            budget -= 1;

            let Ok(tcb) = self.tasks.get(id) else {
                continue;
            };
            let (base, prio) = (tcb.base_prio, tcb.prio);

            let target = match self.inherited_prio(id) {
                Some(p) if p > base => p,
                _ => base,
            };
            if target == prio {
                continue;
            }

            self.set_effective_prio(id, target);

            // A blocked task passes the change on to the holders it waits for
            if let Some(sem) = self.tasks.tcb(id).waitsem {
                if self.sems.slot(sem).inherits() {
                    for &h in self.sems.slot(sem).holders.snapshot(&self.holders).as_slice() {
                        work.push(h);
                    }
                }
            }
        }
    }

    /// Recompute every holder of `sem`
    pub(crate) fn pi_update_holders(&mut self, sem: SemId) {
        let s = self.sems.slot(sem);
        if !s.inherits() || s.holders.is_empty() {
            return;
        }
        let holders = s.holders.snapshot(&self.holders);
        self.pi_update(holders.as_slice());
    }

    fn set_effective_prio(&mut self, id: TaskId, prio: OsPrio) {
        let tcb = self.tasks.tcb(id);
        let (old, base) = (tcb.prio, tcb.base_prio);

        match tcb.task_state {
            OsTaskState::Ready => self.rdy_change_prio(id, prio),
            OsTaskState::Pend | OsTaskState::PendTimeout => {
                self.tasks.tcb_mut(id).prio = prio;
                self.waitq.reposition(&mut self.tasks, id);
            }
            _ => self.tasks.tcb_mut(id).prio = prio,
        }

        if prio > old {
            crate::debug!("slot {} boosted {} -> {}", id.slot(), old, prio);
        } else if prio == base {
            crate::debug!("slot {} restored to {}", id.slot(), prio);
        } else {
            crate::debug!("slot {} lowered {} -> {}", id.slot(), old, prio);
        }
    }
}
