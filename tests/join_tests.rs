//! Thread join tests

#[cfg(test)]
mod join_tests {
    use rtsync::{Kernel, OsError, Pend, ThreadAttr, WorkQueueId, THREAD_CANCELED};

    fn boot() -> Kernel {
        let mut k = Kernel::new();
        k.init().unwrap();
        k.start().unwrap();
        k
    }

    #[test]
    fn test_join_self_is_deadlock() {
        let mut k = boot();
        let main = k.task_create("main", 10).unwrap();

        assert_eq!(k.thread_tryjoin(main), Err(OsError::Deadlock));
        assert_eq!(k.thread_join(main), Err(OsError::Deadlock));
    }

    #[test]
    fn test_kernel_task_join_self_is_deadlock() {
        let mut k = boot();
        k.work_start(WorkQueueId::High, 200, 1).unwrap();
        let worker = k.work_worker(WorkQueueId::High, 0).unwrap();
        assert_eq!(k.current(), Some(worker));

        assert_eq!(k.thread_tryjoin(worker), Err(OsError::Deadlock));
        assert_eq!(k.thread_join(worker), Err(OsError::Deadlock));

        // Joining anyone else still needs a group
        let idle = k.idle_task().unwrap();
        assert_eq!(k.thread_tryjoin(idle), Err(OsError::InvalidState));
    }

    #[test]
    fn test_tryjoin_after_exit() {
        let mut k = boot();
        let main = k.task_create("main", 10).unwrap();

        let t = k.thread_create("worker", 20, ThreadAttr::default()).unwrap();
        assert_eq!(k.current(), Some(t));
        assert_eq!(k.task_group(t), k.task_group(main));
        assert_eq!(k.join_records(), 1);

        k.task_exit(7).unwrap();
        assert_eq!(k.current(), Some(main));

        assert_eq!(k.thread_tryjoin(t), Ok(7));
        assert_eq!(k.join_records(), 0);
        assert_eq!(k.thread_tryjoin(t), Err(OsError::NotFound));
    }

    #[test]
    fn test_tryjoin_running_thread() {
        let mut k = boot();
        k.task_create("main", 10).unwrap();
        let t = k.thread_create("worker", 5, ThreadAttr::default()).unwrap();

        assert_eq!(k.thread_tryjoin(t), Err(OsError::WouldBlock));
        assert_eq!(k.join_records(), 1);
    }

    #[test]
    fn test_detached_not_joinable() {
        let mut k = boot();
        k.task_create("main", 10).unwrap();

        let t = k.thread_create("bg", 5, ThreadAttr { detached: true }).unwrap();
        assert_eq!(k.join_records(), 0);
        assert_eq!(k.thread_tryjoin(t), Err(OsError::InvalidArgument));

        let u = k.thread_create("worker", 5, ThreadAttr::default()).unwrap();
        k.thread_detach(u).unwrap();
        assert_eq!(k.thread_tryjoin(u), Err(OsError::InvalidArgument));
        assert_eq!(k.thread_join(u), Err(OsError::InvalidArgument));

        // The record goes away with the thread
        k.task_delete(u).unwrap();
        assert_eq!(k.join_records(), 0);
    }

    #[test]
    fn test_join_unknown_thread() {
        let mut k = boot();
        let other = k.task_create("other", 5).unwrap();
        k.task_create("main", 10).unwrap();

        // A task of another group is not ours to join
        assert_eq!(k.thread_tryjoin(other), Err(OsError::NotFound));

        let t = k.thread_create("worker", 5, ThreadAttr::default()).unwrap();
        k.task_delete(t).unwrap();
        k.thread_tryjoin(t).unwrap();
        assert_eq!(k.thread_join(t), Err(OsError::NotFound));
    }

    #[test]
    fn test_tryjoin_busy_while_records_locked() {
        let mut k = boot();
        let main = k.task_create("main", 10).unwrap();
        let t = k.thread_create("worker", 5, ThreadAttr::default()).unwrap();

        let group = k.task_group(main).unwrap().unwrap();
        let join_sem = k.group_join_sem(group).unwrap();

        k.int_enter();
        k.sem_trywait(join_sem).unwrap();
        k.int_exit();
        assert_eq!(k.thread_tryjoin(t), Err(OsError::Busy));

        k.int_enter();
        k.sem_post(join_sem).unwrap();
        k.int_exit();
        assert_eq!(k.thread_tryjoin(t), Err(OsError::WouldBlock));
    }

    #[test]
    fn test_join_blocks_until_exit() {
        let mut k = boot();
        let main = k.task_create("main", 10).unwrap();
        let t = k.thread_create("worker", 5, ThreadAttr::default()).unwrap();

        assert_eq!(k.thread_join(t), Ok(Pend::Blocked));
        assert_eq!(k.current(), Some(t));

        // The pinned record outlives the thread
        k.task_exit(42).unwrap();
        assert_eq!(k.current(), Some(main));
        assert_eq!(k.join_records(), 1);

        assert_eq!(k.thread_join(t), Ok(Pend::Ready(42)));
        assert_eq!(k.join_records(), 0);
    }

    #[test]
    fn test_join_after_exit_returns_at_once() {
        let mut k = boot();
        let main = k.task_create("main", 10).unwrap();
        let t = k.thread_create("worker", 20, ThreadAttr::default()).unwrap();
        k.task_exit(3).unwrap();
        assert_eq!(k.current(), Some(main));

        assert_eq!(k.thread_join(t), Ok(Pend::Ready(3)));
        assert_eq!(k.join_records(), 0);
    }

    #[test]
    fn test_join_deleted_thread_sees_cancel() {
        let mut k = boot();
        let main = k.task_create("main", 10).unwrap();

        let t = k.thread_create("worker", 20, ThreadAttr::default()).unwrap();
        assert_eq!(k.task_delay(5), Ok(Pend::Blocked));
        assert_eq!(k.current(), Some(main));

        let reaper = k.task_create("reaper", 3).unwrap();
        assert_eq!(k.thread_join(t), Ok(Pend::Blocked));
        assert_eq!(k.current(), Some(reaper));

        k.task_delete(t).unwrap();
        assert_eq!(k.current(), Some(main));
        assert_eq!(k.thread_join(t), Ok(Pend::Ready(THREAD_CANCELED)));
        assert_eq!(k.join_records(), 0);
    }

    #[test]
    fn test_interrupted_join_keeps_record() {
        let mut k = boot();
        let main = k.task_create("main", 10).unwrap();
        let t = k.thread_create("worker", 5, ThreadAttr::default()).unwrap();

        assert_eq!(k.thread_join(t), Ok(Pend::Blocked));
        assert_eq!(k.current(), Some(t));

        k.task_interrupt(main).unwrap();
        assert_eq!(k.current(), Some(main));
        assert_eq!(k.thread_join(t), Err(OsError::Interrupted));
        assert_eq!(k.join_records(), 1);
        assert_eq!(k.thread_tryjoin(t), Err(OsError::WouldBlock));
    }

    #[test]
    fn test_kernel_task_cannot_spawn_threads() {
        let mut k = boot();
        let idle = k.idle_task().unwrap();
        assert_eq!(k.task_group(idle), Ok(None));

        assert_eq!(
            k.thread_create("t", 5, ThreadAttr::default()),
            Err(OsError::InvalidState)
        );

        k.task_create("main", 10).unwrap();
        assert_eq!(
            k.thread_create("t", 0, ThreadAttr::default()),
            Err(OsError::InvalidArgument)
        );
    }

    #[test]
    fn test_group_outlives_leader() {
        let mut k = boot();
        let main = k.task_create("main", 10).unwrap();
        let t = k.thread_create("worker", 5, ThreadAttr::default()).unwrap();
        let group = k.task_group(main).unwrap();

        k.task_exit(0).unwrap();
        assert_eq!(k.current(), Some(t));
        assert_eq!(k.task_group(t), Ok(group));
        assert!(k.group_join_sem(group.unwrap()).is_some());
    }
}
