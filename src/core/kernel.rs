//! Kernel state and initialization
//!
//! One [`Kernel`] value owns every table of the synchronization core: the
//! task arena, ready lists, tick wheel, the kernel-wide wait queue, the
//! semaphore arena with its holder pool, the work queues and the join
//! records. Operations act on behalf of the running task, or of an interrupt
//! handler between [`Kernel::int_enter`] and [`Kernel::int_exit`].

use crate::core::config::{CFG_GROUP_MAX, CFG_JOIN_MAX, CFG_PRIO_IDLE};
use crate::core::critical::{critical_section, is_isr_context};
use crate::core::error::{OsError, OsResult};
use crate::core::sched::{SchedState, WaitQueue};
use crate::core::task::TaskTable;
use crate::core::time::TickWheel;
use crate::core::types::{OsNestingCtr, OsTick, TaskId};
use crate::join::{JoinRecord, TaskGroup};
use crate::sync::holder::HolderPool;
use crate::sync::sem::SemTable;
use crate::wqueue::{DelayFreeList, WorkQueue, WorkTable, WORK_QUEUE_COUNT};

/// Kernel context
pub struct Kernel {
    pub(crate) tasks: TaskTable,
    pub(crate) sched: SchedState,
    pub(crate) wheel: TickWheel,
    pub(crate) waitq: WaitQueue,
    pub(crate) sems: SemTable,
    pub(crate) holders: HolderPool,
    pub(crate) works: WorkTable,
    pub(crate) wqueues: [WorkQueue; WORK_QUEUE_COUNT],
    pub(crate) delay_free: DelayFreeList,
    pub(crate) groups: [TaskGroup; CFG_GROUP_MAX],
    pub(crate) joins: [JoinRecord; CFG_JOIN_MAX],

    pub(crate) running: Option<TaskId>,
    idle: Option<TaskId>,
    pub(crate) tick: OsTick,
    int_nesting: OsNestingCtr,
    pub(crate) sched_lock_nesting: OsNestingCtr,
    initialized: bool,
    started: bool,
    pub(crate) ctx_sw_ctr: u32,
}

impl Kernel {
    /// Create an empty kernel. `const` so a target can keep it in a
    /// `static CsCell<Kernel>`.
    pub const fn new() -> Self {
        Kernel {
            tasks: TaskTable::new(),
            sched: SchedState::new(),
            wheel: TickWheel::new(),
            waitq: WaitQueue::new(),
            sems: SemTable::new(),
            holders: HolderPool::new(),
            works: WorkTable::new(),
            wqueues: [WorkQueue::EMPTY; WORK_QUEUE_COUNT],
            delay_free: DelayFreeList::new(),
            groups: [TaskGroup::EMPTY; CFG_GROUP_MAX],
            joins: [JoinRecord::EMPTY; CFG_JOIN_MAX],

            running: None,
            idle: None,
            tick: 0,
            int_nesting: 0,
            sched_lock_nesting: 0,
            initialized: false,
            started: false,
            ctx_sw_ctr: 0,
        }
    }

    /// Initialize the kernel
    ///
    /// Creates the idle task. Must be called before any other operation.
    ///
    /// # Returns
    /// * `Ok(())` - Initialization successful
    /// * `Err(OsError::InvalidState)` - Already initialized
    pub fn init(&mut self) -> OsResult<()> {
        if self.initialized {
            return Err(OsError::InvalidState);
        }

        critical_section(|_cs| {
            self.sched.init();
            let idle = self.task_spawn("Idle", CFG_PRIO_IDLE, None)?;
            self.idle = Some(idle);
            self.initialized = true;
            crate::info!("kernel initialized");
            Ok(())
        })
    }

    /// Start multitasking: the highest priority ready task becomes running
    pub fn start(&mut self) -> OsResult<()> {
        if !self.initialized {
            return Err(OsError::InvalidState);
        }
        if self.started {
            return Err(OsError::InvalidState);
        }

        self.started = true;
        self.sched();
        Ok(())
    }

    /// Check if the kernel is running
    #[inline(always)]
    pub fn is_running(&self) -> bool {
        self.started
    }

    /// Task selected by the scheduler
    #[inline(always)]
    pub fn current(&self) -> Option<TaskId> {
        self.running
    }

    /// The idle task
    #[inline(always)]
    pub fn idle_task(&self) -> Option<TaskId> {
        self.idle
    }

    /// Task on whose behalf an operation runs
    pub(crate) fn caller(&self) -> OsResult<TaskId> {
        if !self.started {
            return Err(OsError::NotRunning);
        }
        self.running.ok_or(OsError::NotRunning)
    }

    /// Check if executing on behalf of an interrupt handler
    #[inline]
    pub fn in_isr(&self) -> bool {
        self.int_nesting > 0 || is_isr_context()
    }

    /// Get interrupt nesting level
    #[inline(always)]
    pub fn int_nesting(&self) -> OsNestingCtr {
        self.int_nesting
    }

    /// Get scheduler lock nesting level
    #[inline(always)]
    pub fn sched_lock_nesting(&self) -> OsNestingCtr {
        self.sched_lock_nesting
    }

    /// Number of times the running task changed
    #[inline(always)]
    pub fn ctx_switches(&self) -> u32 {
        self.ctx_sw_ctr
    }

    /// Enter ISR
    pub fn int_enter(&mut self) {
        self.int_nesting = self.int_nesting.saturating_add(1);
    }

    /// Exit ISR, rescheduling when the outermost handler returns
    pub fn int_exit(&mut self) {
        if self.int_nesting == 0 {
            return;
        }
        self.int_nesting -= 1;
        if self.int_nesting == 0 {
            self.sched();
        }
    }

    /// Lock the scheduler
    pub fn sched_lock(&mut self) -> OsResult<()> {
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }
        if self.sched_lock_nesting == OsNestingCtr::MAX {
            return Err(OsError::LockNestingOvf);
        }
        self.sched_lock_nesting += 1;
        Ok(())
    }

    /// Unlock the scheduler
    pub fn sched_unlock(&mut self) -> OsResult<()> {
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }
        if self.sched_lock_nesting == 0 {
            return Err(OsError::SchedNotLocked);
        }
        self.sched_lock_nesting -= 1;
        if self.sched_lock_nesting == 0 {
            self.sched();
        }
        Ok(())
    }

    /// Run `f` with preemption held off. The caller reschedules.
    pub(crate) fn preempt_off<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        self.sched_lock_nesting += 1;
        let r = f(self);
        self.sched_lock_nesting -= 1;
        r
    }

    /// Run a compound operation with preemption held off, then reschedule.
    ///
    /// Used where one call issues several posts and must keep acting for the
    /// same task throughout.
    pub(crate) fn locked<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let r = self.preempt_off(f);
        if self.sched_lock_nesting == 0 {
            self.sched();
        }
        r
    }
}

impl Default for Kernel {
    fn default() -> Self {
        Self::new()
    }
}
