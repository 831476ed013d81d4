//! Semaphore implementation
//!
//! Counting semaphores with optional priority inheritance.
//!
//! `count > 0` is the number of available units. A task that finds no unit
//! decrements the count before it blocks, so `-count` is the number of
//! waiters. A timeout, an interrupted wait or the deletion of a waiter gives
//! that decrement back. A post on a count that stays `<= 0` hands its unit
//! directly to the most urgent waiter.
//!
//! For inheriting semaphores every unit taken by a task is recorded in a
//! holder record until the same task posts it.

use crate::core::config::CFG_SEM_MAX;
use crate::core::error::{OsError, OsResult};
use crate::core::kernel::Kernel;
use crate::core::time::tick_reached;
use crate::core::types::{OsPendStatus, OsSemCtr, OsTaskState, OsTick, Pend, SemId, SemProtocol, TaskId};
use crate::sync::holder::HolderList;

/// Inheritance disabled for this instance
pub const SEM_PRIO_NONE: u8 = 0x01;
/// Slot holds an initialized semaphore
pub const SEM_INITIALIZED: u8 = 0x02;

/// Semaphore control block
#[derive(Debug, Clone, Copy)]
pub struct OsSem {
    pub(crate) count: OsSemCtr,
    pub(crate) flags: u8,
    pub(crate) holders: HolderList,
}

impl OsSem {
    const EMPTY: OsSem = OsSem {
        count: 0,
        flags: 0,
        holders: HolderList::new(),
    };

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.flags & SEM_INITIALIZED != 0
    }

    /// Whether waiters boost the holders of this semaphore
    #[inline]
    pub fn inherits(&self) -> bool {
        cfg!(feature = "prio-inherit") && self.flags & SEM_PRIO_NONE == 0
    }

    #[inline]
    pub fn count(&self) -> OsSemCtr {
        self.count
    }
}

/// Fixed arena of semaphores
pub struct SemTable {
    sems: [OsSem; CFG_SEM_MAX],
}

impl SemTable {
    pub const fn new() -> Self {
        SemTable {
            sems: [OsSem::EMPTY; CFG_SEM_MAX],
        }
    }

    /// Look up an initialized semaphore
    pub fn get(&self, id: SemId) -> OsResult<&OsSem> {
        match self.sems.get(id.index()) {
            Some(s) if s.is_initialized() => Ok(s),
            _ => Err(OsError::InvalidArgument),
        }
    }

    fn get_mut(&mut self, id: SemId) -> OsResult<&mut OsSem> {
        match self.sems.get_mut(id.index()) {
            Some(s) if s.is_initialized() => Ok(s),
            _ => Err(OsError::InvalidArgument),
        }
    }

    /// Semaphore of a handle already validated
    #[inline(always)]
    pub(crate) fn slot(&self, id: SemId) -> &OsSem {
        &self.sems[id.index()]
    }

    #[inline(always)]
    pub(crate) fn slot_mut(&mut self, id: SemId) -> &mut OsSem {
        &mut self.sems[id.index()]
    }

    fn free_slot(&self) -> Option<SemId> {
        self.sems
            .iter()
            .position(|s| !s.is_initialized())
            .map(SemId::new)
    }
}

impl Default for SemTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Initialize a semaphore
    ///
    /// Inheritance is enabled by default.
    ///
    /// # Returns
    /// * `Ok(())` - Semaphore ready
    /// * `Err(OsError::InvalidArgument)` - Negative count or bad handle
    /// * `Err(OsError::InvalidState)` - Semaphore in use (holders or waiters)
    pub fn sem_init(&mut self, sem: SemId, count: OsSemCtr) -> OsResult<()> {
        if count < 0 || sem.index() >= CFG_SEM_MAX {
            return Err(OsError::InvalidArgument);
        }

        let s = self.sems.slot(sem);
        if s.is_initialized()
            && (!s.holders.is_empty() || s.count < 0 || self.waitq.has_waiters(&self.tasks, sem))
        {
            return Err(OsError::InvalidState);
        }

        let s = self.sems.slot_mut(sem);
        s.holders.clear(&mut self.holders);
        s.count = count;
        s.flags = SEM_INITIALIZED;
        Ok(())
    }

    /// Initialize a semaphore in a free slot
    pub fn sem_create(&mut self, count: OsSemCtr) -> OsResult<SemId> {
        if count < 0 {
            return Err(OsError::InvalidArgument);
        }
        let Some(sem) = self.sems.free_slot() else {
            crate::warn!("semaphore arena exhausted");
            return Err(OsError::NoResources);
        };
        self.sem_init(sem, count)?;
        Ok(sem)
    }

    /// Enable or disable priority inheritance for one semaphore
    ///
    /// Disabling forgets the recorded holders and drops any boost they got.
    pub fn sem_set_protocol(&mut self, sem: SemId, protocol: SemProtocol) -> OsResult<()> {
        let s = self.sems.get_mut(sem)?;
        match protocol {
            SemProtocol::Inherit => s.flags &= !SEM_PRIO_NONE,
            SemProtocol::None => {
                s.flags |= SEM_PRIO_NONE;
                let holders = s.holders.snapshot(&self.holders);
                s.holders.clear(&mut self.holders);
                self.pi_update(holders.as_slice());
                self.sched();
            }
        }
        Ok(())
    }

    /// Raw count, for diagnostics
    pub fn sem_getvalue(&self, sem: SemId) -> OsResult<OsSemCtr> {
        Ok(self.sems.get(sem)?.count)
    }

    /// Units of `sem` recorded for `task`
    pub fn sem_holder_counts(&self, sem: SemId, task: TaskId) -> OsResult<OsSemCtr> {
        Ok(self.sems.get(sem)?.holders.counts(&self.holders, task))
    }

    /// Tasks blocked on `sem`
    pub fn sem_waiter_count(&self, sem: SemId) -> OsResult<usize> {
        self.sems.get(sem)?;
        Ok(self.waitq.count_waiting_on(&self.tasks, sem))
    }

    /// Wait for a unit
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(()))` - Unit taken
    /// * `Ok(Pend::Blocked)` - Caller suspended, re-issue once running
    /// * `Err(OsError::Interrupted)` - Wait ended by [`Kernel::task_interrupt`]
    /// * `Err(OsError::InterruptContext)` - Called from an ISR
    /// * `Err(OsError::SchedLocked)` - No unit and preemption is locked
    pub fn sem_wait(&mut self, sem: SemId) -> OsResult<Pend<()>> {
        self.sem_pend(sem, None)
    }

    /// Wait for a unit until the absolute tick `deadline`
    ///
    /// An available unit is taken even when the deadline has passed.
    pub fn sem_timedwait(&mut self, sem: SemId, deadline: OsTick) -> OsResult<Pend<()>> {
        self.sem_pend(sem, Some(deadline))
    }

    fn sem_pend(&mut self, sem: SemId, deadline: Option<OsTick>) -> OsResult<Pend<()>> {
        self.sems.get(sem)?;
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }
        let me = self.caller()?;

        // Collect the outcome of the wait that suspended us
        let tcb = self.tasks.tcb_mut(me);
        if tcb.pend_done == Some(sem) {
            tcb.pend_done = None;
            return match tcb.pend_status {
                OsPendStatus::Ok => Ok(Pend::Ready(())),
                OsPendStatus::Abort => Err(OsError::Interrupted),
                OsPendStatus::Timeout => Err(OsError::TimedOut),
            };
        }

        let s = self.sems.slot_mut(sem);
        if s.count > 0 {
            s.count -= 1;
            self.holder_add(sem, me);
            return Ok(Pend::Ready(()));
        }

        if let Some(d) = deadline {
            if tick_reached(self.tick, d) {
                return Err(OsError::TimedOut);
            }
        }
        if self.sched_lock_nesting > 0 {
            return Err(OsError::SchedLocked);
        }

        self.sems.slot_mut(sem).count -= 1;
        self.rdy_remove(me);

        let tcb = self.tasks.tcb_mut(me);
        tcb.waitsem = Some(sem);
        tcb.pend_status = OsPendStatus::Ok;
        tcb.pend_done = None;
        match deadline {
            Some(d) => {
                tcb.task_state = OsTaskState::PendTimeout;
                self.wheel.insert(&mut self.tasks, me, d);
            }
            None => tcb.task_state = OsTaskState::Pend,
        }
        self.waitq.insert(&mut self.tasks, me);

        self.pi_update_holders(sem);
        self.sched();
        Ok(Pend::Blocked)
    }

    /// Take a unit if one is available, never blocks
    ///
    /// Callable from an ISR; no holder is recorded there.
    ///
    /// # Returns
    /// * `Ok(())` - Unit taken
    /// * `Err(OsError::WouldBlock)` - No unit, count unchanged
    pub fn sem_trywait(&mut self, sem: SemId) -> OsResult<()> {
        let s = self.sems.get_mut(sem)?;
        if s.count <= 0 {
            return Err(OsError::WouldBlock);
        }
        s.count -= 1;

        if !self.in_isr() {
            if let Ok(me) = self.caller() {
                self.holder_add(sem, me);
            }
        }
        Ok(())
    }

    /// Release a unit
    ///
    /// Callable from an ISR. Never blocks. A unit posted while tasks wait
    /// goes to the most urgent of them.
    ///
    /// # Panics
    /// When the count would overflow.
    pub fn sem_post(&mut self, sem: SemId) -> OsResult<()> {
        self.sems.get(sem)?;
        let poster = if self.in_isr() { None } else { self.caller().ok() };

        let mut released = None;
        if let Some(me) = poster {
            if self.sems.slot_mut(sem).holders.release(&mut self.holders, me) {
                released = Some(me);
            }
        }

        let s = self.sems.slot_mut(sem);
        assert!(s.count < OsSemCtr::MAX, "semaphore count overflow");
        s.count += 1;

        if s.count <= 0 {
            if let Some(waiter) = self.waitq.first_waiting_on(&self.tasks, sem) {
                self.pend_unlink(waiter);
                let tcb = self.tasks.tcb_mut(waiter);
                tcb.pend_done = Some(sem);
                tcb.pend_status = OsPendStatus::Ok;
                self.rdy_insert(waiter);
                self.holder_add(sem, waiter);
                crate::debug!("sem {} handed to slot {}", sem.index(), waiter.slot());
            }
        }

        if let Some(me) = released {
            self.pi_update(&[me]);
        }
        self.pi_update_holders(sem);
        self.sched();
        Ok(())
    }

    /// Destroy a semaphore
    ///
    /// # Returns
    /// * `Ok(())` - Slot freed
    /// * `Err(OsError::Busy)` - Holders or waiters remain
    pub fn sem_destroy(&mut self, sem: SemId) -> OsResult<()> {
        let s = self.sems.get(sem)?;
        if !s.holders.is_empty() || s.count < 0 || self.waitq.has_waiters(&self.tasks, sem) {
            return Err(OsError::Busy);
        }

        *self.sems.slot_mut(sem) = OsSem::EMPTY;
        Ok(())
    }

    fn holder_add(&mut self, sem: SemId, task: TaskId) {
        let s = self.sems.slot_mut(sem);
        if s.inherits() && !s.holders.add(&mut self.holders, task) {
            crate::warn!("no holder record for sem {}", sem.index());
        }
    }

    /// Take a waiting task off the wait queue and the tick wheel
    fn pend_unlink(&mut self, task: TaskId) -> Option<SemId> {
        let sem = self.tasks.tcb(task).waitsem?;
        self.waitq.remove(&mut self.tasks, task);
        self.wheel_cancel(task);
        self.tasks.tcb_mut(task).waitsem = None;
        Some(sem)
    }

    /// Withdraw a waiting task, giving back its count decrement.
    /// The task is left off every list.
    pub(crate) fn sem_wait_cancel(&mut self, task: TaskId) -> Option<SemId> {
        let sem = self.pend_unlink(task)?;
        self.sems.slot_mut(sem).count += 1;
        Some(sem)
    }

    /// End the wait of `task` without a unit and make it ready
    pub(crate) fn sem_wait_abort(&mut self, task: TaskId, status: OsPendStatus) {
        let Some(sem) = self.sem_wait_cancel(task) else {
            return;
        };

        let tcb = self.tasks.tcb_mut(task);
        tcb.pend_done = Some(sem);
        tcb.pend_status = status;
        self.rdy_insert(task);

        self.pi_update_holders(sem);
    }

    /// Drop every holder record of a task that is going away
    pub(crate) fn sem_release_all(&mut self, task: TaskId) {
        for s in self.sems.sems.iter_mut() {
            if s.is_initialized() && s.holders.remove_task(&mut self.holders, task) {
                crate::debug!("holder record of slot {} dropped", task.slot());
            }
        }
    }
}
