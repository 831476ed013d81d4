//! Unit tests for core RTOS modules
//!
//! These tests run on the host (not embedded target) to verify
//! the core algorithms work correctly.

#[cfg(test)]
mod prio_tests {
    use rtsync::config::{CFG_PRIO_IDLE, CFG_PRIO_MAX};
    use rtsync::prio::PrioTable;

    #[test]
    fn test_empty_table() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), CFG_PRIO_IDLE);
    }

    #[test]
    fn test_multiple_priorities() {
        let mut table = PrioTable::new();

        // Insert in random order
        table.insert(20);
        table.insert(5);
        table.insert(10);
        table.insert(0);
        table.insert(15);

        // Highest number is the most urgent
        assert_eq!(table.get_highest(), 20);

        table.remove(20);
        assert_eq!(table.get_highest(), 15);

        table.remove(15);
        assert_eq!(table.get_highest(), 10);

        table.remove(10);
        assert_eq!(table.get_highest(), 5);

        table.remove(5);
        assert_eq!(table.get_highest(), 0);

        table.remove(0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_all_priorities() {
        let mut table = PrioTable::new();

        for i in 0..CFG_PRIO_MAX {
            table.insert(i as u8);
        }

        // Remove from most to least urgent
        for i in (0..CFG_PRIO_MAX).rev() {
            assert_eq!(table.get_highest(), i as u8);
            table.remove(i as u8);
        }

        assert!(table.is_empty());
    }
}

#[cfg(test)]
mod error_tests {
    use rtsync::error::OsError;

    #[test]
    fn test_errno_values() {
        assert_eq!(OsError::InvalidArgument.errno(), -22);
        assert_eq!(OsError::WouldBlock.errno(), -11);
        assert_eq!(OsError::TimedOut.errno(), -110);
        assert_eq!(OsError::Busy.errno(), -16);
        assert_eq!(OsError::Deadlock.errno(), -35);
        assert_eq!(OsError::NotFound.errno(), -3);
        assert_eq!(OsError::Interrupted.errno(), -4);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(format!("{}", OsError::TimedOut), "timed out");
        let _ = format!("{:?}", OsError::AlreadyQueued);
    }
}

#[cfg(test)]
mod types_tests {
    use rtsync::types::*;

    #[test]
    fn test_pend_helpers() {
        let done: Pend<u32> = Pend::Ready(7);
        assert!(!done.is_blocked());
        assert_eq!(done.ready(), Some(7));

        let blocked: Pend<u32> = Pend::Blocked;
        assert!(blocked.is_blocked());
        assert_eq!(blocked.ready(), None);
    }

    #[test]
    fn test_task_state_enum() {
        let state = OsTaskState::Ready;
        assert_eq!(state, OsTaskState::Ready);
        assert_ne!(state, OsTaskState::Delayed);
    }
}

#[cfg(test)]
mod time_tests {
    use rtsync::time::{ms_to_ticks, tick_reached};

    #[test]
    fn test_deadline_compare_wraps() {
        assert!(tick_reached(0, u32::MAX));
        assert!(!tick_reached(u32::MAX, 0));
        assert_eq!(ms_to_ticks(10), 10);
    }
}

#[cfg(test)]
mod kernel_tests {
    use rtsync::critical::CriticalSection;
    use rtsync::{CsCell, Kernel, OsError, OsTaskState, Pend};

    fn boot() -> Kernel {
        let mut k = Kernel::new();
        k.init().unwrap();
        k.start().unwrap();
        k
    }

    #[test]
    fn test_init_and_start() {
        let mut k = Kernel::new();
        assert_eq!(k.start(), Err(OsError::InvalidState));

        k.init().unwrap();
        assert_eq!(k.init(), Err(OsError::InvalidState));
        assert!(!k.is_running());

        k.start().unwrap();
        assert!(k.is_running());
        assert_eq!(k.current(), k.idle_task());
        assert_eq!(k.start(), Err(OsError::InvalidState));
    }

    #[test]
    fn test_static_kernel() {
        static KERNEL: CsCell<Kernel> = CsCell::new(Kernel::new());

        KERNEL.with(|k| {
            k.init().unwrap();
            k.start().unwrap();
        });
        let a = KERNEL.with(|k| {
            assert!(CriticalSection::is_active());
            k.task_create("a", 10)
        })
        .unwrap();
        assert_eq!(KERNEL.with(|k| k.current()), Some(a));
    }

    #[test]
    fn test_highest_priority_runs() {
        let mut k = boot();

        let a = k.task_create("a", 10).unwrap();
        assert_eq!(k.current(), Some(a));

        let b = k.task_create("b", 20).unwrap();
        assert_eq!(k.current(), Some(b));

        // FIFO among equals
        let c = k.task_create("c", 20).unwrap();
        assert_eq!(k.current(), Some(b));

        k.task_delete(b).unwrap();
        assert_eq!(k.current(), Some(c));

        k.task_exit(0).unwrap();
        assert_eq!(k.current(), Some(a));
    }

    #[test]
    fn test_stale_handle_rejected() {
        let mut k = boot();

        let a = k.task_create("a", 10).unwrap();
        k.task_delete(a).unwrap();
        assert_eq!(k.task(a).err(), Some(OsError::InvalidArgument));
        assert_eq!(k.task_delete(a), Err(OsError::InvalidArgument));

        let b = k.task_create("b", 10).unwrap();
        assert_eq!(a.slot(), b.slot());
        assert_ne!(a, b);
        assert_eq!(k.task(b).unwrap().name(), "b");

        // Idle and b
        let live: Vec<_> = k.tasks().iter().map(|(id, _)| id).collect();
        assert_eq!(live, [k.idle_task().unwrap(), b]);
    }

    #[test]
    fn test_stale_handle_after_many_reuses() {
        let mut k = boot();

        let a = k.task_create("a", 10).unwrap();
        k.task_delete(a).unwrap();

        for _ in 0..300 {
            let t = k.task_create("t", 10).unwrap();
            assert_eq!(t.slot(), a.slot());
            assert_ne!(t, a);
            k.task_delete(t).unwrap();
        }
        assert_eq!(k.task(a).err(), Some(OsError::InvalidArgument));
    }

    #[test]
    fn test_create_errors() {
        let mut k = boot();

        assert_eq!(k.task_create("zero", 0), Err(OsError::InvalidArgument));

        k.int_enter();
        assert_eq!(k.task_create("isr", 5), Err(OsError::InterruptContext));
        k.int_exit();

        let idle = k.idle_task().unwrap();
        assert_eq!(k.task_delete(idle), Err(OsError::InvalidArgument));
    }

    #[test]
    fn test_sched_lock_defers_preemption() {
        let mut k = boot();
        let a = k.task_create("a", 10).unwrap();

        k.sched_lock().unwrap();
        let b = k.task_create("b", 20).unwrap();
        assert_eq!(k.current(), Some(a));

        k.sched_unlock().unwrap();
        assert_eq!(k.current(), Some(b));
        assert_eq!(k.sched_unlock(), Err(OsError::SchedNotLocked));
    }

    #[test]
    fn test_tick_reschedules_on_exit() {
        let mut k = boot();
        let a = k.task_create("a", 10).unwrap();
        let b = k.task_create("b", 20).unwrap();
        assert_eq!(k.task_delay(3), Ok(Pend::Blocked));
        assert_eq!(k.current(), Some(a));

        let switches = k.ctx_switches();
        for _ in 0..3 {
            k.tick();
        }
        assert_eq!(k.current(), Some(b));
        assert_eq!(k.ctx_switches(), switches + 1);
    }

    #[test]
    fn test_task_delay() {
        let mut k = boot();
        let a = k.task_create("a", 10).unwrap();

        assert_eq!(k.task_delay(0), Ok(Pend::Ready(())));
        assert_eq!(k.task_delay(5), Ok(Pend::Blocked));
        assert_eq!(k.task(a).unwrap().state(), OsTaskState::Delayed);
        assert!(k.task(a).unwrap().is_delayed());
        assert_eq!(k.current(), k.idle_task());

        for _ in 0..4 {
            k.tick();
        }
        assert_eq!(k.current(), k.idle_task());

        k.tick();
        assert_eq!(k.current(), Some(a));
        assert_eq!(k.time_get(), 5);
    }

    #[test]
    fn test_long_delay_wraps_wheel() {
        let mut k = boot();
        let a = k.task_create("a", 10).unwrap();

        assert_eq!(k.task_delay(40), Ok(Pend::Blocked));
        for _ in 0..39 {
            k.tick();
            assert_ne!(k.current(), Some(a));
        }
        k.tick();
        assert_eq!(k.current(), Some(a));
    }

    #[test]
    fn test_delay_errors() {
        let mut k = boot();
        k.task_create("a", 10).unwrap();

        k.sched_lock().unwrap();
        assert_eq!(k.task_delay(1), Err(OsError::SchedLocked));
        k.sched_unlock().unwrap();

        k.int_enter();
        assert_eq!(k.task_delay(1), Err(OsError::InterruptContext));
        k.int_exit();
    }

    #[test]
    fn test_set_priority_preempts() {
        let mut k = boot();
        let a = k.task_create("a", 10).unwrap();
        let b = k.task_create("b", 20).unwrap();
        assert_eq!(k.current(), Some(b));

        k.task_set_priority(a, 30).unwrap();
        assert_eq!(k.current(), Some(a));
        assert_eq!(k.task(a).unwrap().prio(), 30);
        assert_eq!(k.task(a).unwrap().base_prio(), 30);
        assert_eq!(k.task_set_priority(a, 0), Err(OsError::InvalidArgument));
    }
}
