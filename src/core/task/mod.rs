//! Task management module
//!
//! Provides task creation, deletion, and control functions.

mod tcb;

pub use tcb::OsTcb;

use crate::core::config::{CFG_PRIO_IDLE, CFG_TASK_MAX};
use crate::core::error::{OsError, OsResult};
use crate::core::kernel::Kernel;
use crate::core::types::{GroupId, OsPendStatus, OsPrio, OsTaskState, TaskId};
use crate::join::THREAD_CANCELED;

/// Fixed arena of task control blocks
pub struct TaskTable {
    tcbs: [OsTcb; CFG_TASK_MAX],
}

impl TaskTable {
    pub const fn new() -> Self {
        TaskTable {
            tcbs: [OsTcb::EMPTY; CFG_TASK_MAX],
        }
    }

    /// Look up a live task
    pub fn get(&self, id: TaskId) -> OsResult<&OsTcb> {
        match self.tcbs.get(id.slot()) {
            Some(tcb) if !tcb.is_free() && tcb.gen == id.generation() => Ok(tcb),
            _ => Err(OsError::InvalidArgument),
        }
    }

    pub(crate) fn get_mut(&mut self, id: TaskId) -> OsResult<&mut OsTcb> {
        match self.tcbs.get_mut(id.slot()) {
            Some(tcb) if !tcb.is_free() && tcb.gen == id.generation() => Ok(tcb),
            _ => Err(OsError::InvalidArgument),
        }
    }

    /// TCB of a handle already known to be live
    #[inline(always)]
    pub(crate) fn tcb(&self, id: TaskId) -> &OsTcb {
        &self.tcbs[id.slot()]
    }

    #[inline(always)]
    pub(crate) fn tcb_mut(&mut self, id: TaskId) -> &mut OsTcb {
        &mut self.tcbs[id.slot()]
    }

    fn alloc(&mut self, name: &'static str, prio: OsPrio) -> OsResult<TaskId> {
        let slot = self
            .tcbs
            .iter()
            .position(OsTcb::is_free)
            .ok_or(OsError::NoResources)?;
        let tcb = &mut self.tcbs[slot];
        tcb.init(name, prio);
        Ok(TaskId::new(slot, tcb.gen))
    }

    fn release(&mut self, id: TaskId) {
        let tcb = &mut self.tcbs[id.slot()];
        let gen = tcb.gen.wrapping_add(1);
        *tcb = OsTcb::EMPTY;
        tcb.gen = gen;
    }

    /// Unused TCB slots
    pub fn free_count(&self) -> usize {
        self.tcbs.iter().filter(|tcb| tcb.is_free()).count()
    }

    /// Live tasks with their handles
    pub fn iter(&self) -> impl Iterator<Item = (TaskId, &OsTcb)> {
        self.tcbs
            .iter()
            .enumerate()
            .filter(|(_, tcb)| !tcb.is_free())
            .map(|(slot, tcb)| (TaskId::new(slot, tcb.gen), tcb))
    }
}

impl Default for TaskTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Create a task leading a new task group
    ///
    /// # Arguments
    /// * `name` - Task name for debugging
    /// * `prio` - Task priority (larger = more urgent, 0 is reserved for idle)
    ///
    /// # Returns
    /// * `Ok(TaskId)` - Handle of the new task
    /// * `Err(OsError::InvalidArgument)` - Idle priority requested
    /// * `Err(OsError::InterruptContext)` - Called from an ISR
    /// * `Err(OsError::NoResources)` - Task, group or semaphore arena full
    pub fn task_create(&mut self, name: &'static str, prio: OsPrio) -> OsResult<TaskId> {
        if prio == CFG_PRIO_IDLE {
            return Err(OsError::InvalidArgument);
        }
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }

        self.locked(|k| {
            let group = k.group_create()?;
            k.task_spawn(name, prio, Some(group)).map_err(|e| {
                k.group_discard(group);
                e
            })
        })
    }

    /// Allocate a TCB and make it ready. Does not reschedule.
    pub(crate) fn task_spawn(
        &mut self,
        name: &'static str,
        prio: OsPrio,
        group: Option<GroupId>,
    ) -> OsResult<TaskId> {
        let id = self.tasks.alloc(name, prio)?;
        self.tasks.tcb_mut(id).group = group;
        if let Some(g) = group {
            self.group_join(g);
        }
        self.rdy_insert(id);
        crate::debug!("task {} created at prio {}", name, prio);
        Ok(id)
    }

    /// Look up a live task
    #[inline]
    pub fn task(&self, id: TaskId) -> OsResult<&OsTcb> {
        self.tasks.get(id)
    }

    /// Live tasks
    #[inline]
    pub fn tasks(&self) -> &TaskTable {
        &self.tasks
    }

    /// Delete a task
    ///
    /// Joiners of a deleted thread see [`THREAD_CANCELED`].
    pub fn task_delete(&mut self, id: TaskId) -> OsResult<()> {
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }
        self.tasks.get(id)?;
        if Some(id) == self.idle_task() {
            return Err(OsError::InvalidArgument);
        }

        self.task_teardown(id, THREAD_CANCELED);
        Ok(())
    }

    /// Terminate the calling task, publishing `value` to its joiners
    pub fn task_exit(&mut self, value: usize) -> OsResult<()> {
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }
        let me = self.caller()?;
        if Some(me) == self.idle_task() {
            return Err(OsError::InvalidArgument);
        }

        self.task_teardown(me, value);
        Ok(())
    }

    fn task_teardown(&mut self, id: TaskId, value: usize) {
        self.locked(|k| {
            match k.tasks.tcb(id).task_state {
                OsTaskState::Ready => k.rdy_remove(id),
                OsTaskState::Pend | OsTaskState::PendTimeout => {
                    if let Some(sem) = k.sem_wait_cancel(id) {
                        k.pi_update_holders(sem);
                    }
                }
                OsTaskState::Delayed => k.wheel_cancel(id),
                OsTaskState::Free => {}
            }

            k.join_task_gone(id, value);
            k.sem_release_all(id);
            k.work_forget_worker(id);
            k.group_leave(id);
            k.tasks.release(id);

            if k.running == Some(id) {
                k.running = None;
            }
            crate::debug!("task slot {} released", id.slot());
        });
    }

    /// Change the base priority of a task
    ///
    /// The effective priority stays at least as high as any waiter on a
    /// semaphore the task holds.
    pub fn task_set_priority(&mut self, id: TaskId, prio: OsPrio) -> OsResult<()> {
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }
        if prio == CFG_PRIO_IDLE && Some(id) != self.idle_task() {
            return Err(OsError::InvalidArgument);
        }

        self.tasks.get_mut(id)?.base_prio = prio;
        self.pi_update(&[id]);
        self.sched();
        Ok(())
    }

    /// Deliver a signal: a task blocked on a semaphore wakes with
    /// `Interrupted`. No effect on a task that is not waiting.
    pub fn task_interrupt(&mut self, id: TaskId) -> OsResult<()> {
        if !self.tasks.get(id)?.is_pending() {
            return Ok(());
        }

        self.sem_wait_abort(id, OsPendStatus::Abort);
        self.sched();
        Ok(())
    }
}
