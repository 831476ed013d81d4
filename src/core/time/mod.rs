//! Time management module
//!
//! Provides tick handling, time delays, and timeout management.
//!
//! Tasks with a deadline sit in the tick wheel slot `deadline % size`; each
//! tick visits one slot and expires the entries whose deadline is reached.

use crate::core::config::{CFG_TICK_RATE_HZ, CFG_TICK_WHEEL_SIZE};
use crate::core::error::{OsError, OsResult};
use crate::core::kernel::Kernel;
use crate::core::task::TaskTable;
use crate::core::types::{OsPendStatus, OsTaskState, OsTick, Pend, TaskId};

/// Whether `now` is at or past `deadline`, modulo counter wrap
#[inline]
pub fn tick_reached(now: OsTick, deadline: OsTick) -> bool {
    (now.wrapping_sub(deadline) as i32) >= 0
}

/// Convert milliseconds to ticks, rounding up
#[inline]
pub fn ms_to_ticks(ms: u32) -> OsTick {
    ((ms as u64 * CFG_TICK_RATE_HZ as u64 + 999) / 1000) as OsTick
}

/// Tick wheel of tasks waiting for a deadline
pub struct TickWheel {
    slots: [Option<TaskId>; CFG_TICK_WHEEL_SIZE],
}

impl TickWheel {
    pub const fn new() -> Self {
        TickWheel {
            slots: [None; CFG_TICK_WHEEL_SIZE],
        }
    }

    pub(crate) fn insert(&mut self, tasks: &mut TaskTable, id: TaskId, deadline: OsTick) {
        let slot = deadline as usize % CFG_TICK_WHEEL_SIZE;
        let head = self.slots[slot];

        let tcb = tasks.tcb_mut(id);
        tcb.deadline = deadline;
        tcb.tick_wheel_slot = Some(slot as u8);
        tcb.tick_link.prev = None;
        tcb.tick_link.next = head;

        if let Some(h) = head {
            tasks.tcb_mut(h).tick_link.prev = Some(id);
        }
        self.slots[slot] = Some(id);
    }

    /// Unlink a task; no effect when it is not in the wheel
    pub(crate) fn remove(&mut self, tasks: &mut TaskTable, id: TaskId) {
        let tcb = tasks.tcb_mut(id);
        let Some(slot) = tcb.tick_wheel_slot.take() else {
            return;
        };
        let link = tcb.tick_link;
        tcb.tick_link.next = None;
        tcb.tick_link.prev = None;

        match link.prev {
            Some(prev) => tasks.tcb_mut(prev).tick_link.next = link.next,
            None => self.slots[slot as usize] = link.next,
        }
        if let Some(next) = link.next {
            tasks.tcb_mut(next).tick_link.prev = link.prev;
        }
    }

    /// First task of `slot` whose deadline is reached
    fn first_expired(&self, tasks: &TaskTable, slot: usize, now: OsTick) -> Option<TaskId> {
        let mut cur = self.slots[slot];
        while let Some(id) = cur {
            let tcb = tasks.tcb(id);
            if tick_reached(now, tcb.deadline) {
                return Some(id);
            }
            cur = tcb.tick_link.next;
        }
        None
    }
}

impl Default for TickWheel {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Get current tick count
    #[inline]
    pub fn time_get(&self) -> OsTick {
        self.tick
    }

    /// Tick handler
    ///
    /// Wakes delayed tasks, expires timed waits and moves due work items to
    /// their queues. Runs as an interrupt: rescheduling happens on exit.
    pub fn tick(&mut self) {
        if !self.is_running() {
            return;
        }

        self.int_enter();

        self.tick = self.tick.wrapping_add(1);
        let now = self.tick;
        let slot = now as usize % CFG_TICK_WHEEL_SIZE;

        // Expiring a task edits the slot, so restart the scan each time
        while let Some(id) = self.wheel.first_expired(&self.tasks, slot, now) {
            match self.tasks.tcb(id).task_state {
                OsTaskState::Delayed => {
                    self.wheel.remove(&mut self.tasks, id);
                    self.rdy_insert(id);
                }
                OsTaskState::PendTimeout => {
                    crate::debug!("wait of slot {} timed out", id.slot());
                    self.sem_wait_abort(id, OsPendStatus::Timeout);
                }
                _ => self.wheel.remove(&mut self.tasks, id),
            }
        }

        self.work_timer_expire(now);

        self.int_exit();
    }

    /// Time delay in ticks
    ///
    /// Delays the calling task for the specified number of system ticks.
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(()))` - Zero delay, nothing to wait for
    /// * `Ok(Pend::Blocked)` - Task moved to the tick wheel
    /// * `Err(OsError::InterruptContext)` - Cannot delay from ISR
    /// * `Err(OsError::SchedLocked)` - Scheduler is locked
    pub fn task_delay(&mut self, ticks: OsTick) -> OsResult<Pend<()>> {
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }
        let me = self.caller()?;

        if self.sched_lock_nesting > 0 {
            return Err(OsError::SchedLocked);
        }
        if ticks == 0 {
            return Ok(Pend::Ready(()));
        }

        self.rdy_remove(me);
        self.tasks.tcb_mut(me).task_state = OsTaskState::Delayed;
        let deadline = self.tick.wrapping_add(ticks);
        self.wheel.insert(&mut self.tasks, me, deadline);

        self.sched();
        Ok(Pend::Blocked)
    }

    /// Take a task off the tick wheel
    #[inline]
    pub(crate) fn wheel_cancel(&mut self, id: TaskId) {
        self.wheel.remove(&mut self.tasks, id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_reached_wraps() {
        assert!(tick_reached(10, 10));
        assert!(tick_reached(11, 10));
        assert!(!tick_reached(9, 10));
        assert!(tick_reached(3, u32::MAX - 2));
        assert!(!tick_reached(u32::MAX - 2, 3));
    }

    #[test]
    fn test_ms_to_ticks() {
        assert_eq!(ms_to_ticks(0), 0);
        assert_eq!(ms_to_ticks(1), 1);
        assert_eq!(ms_to_ticks(250), 250 * CFG_TICK_RATE_HZ / 1000);
    }
}
