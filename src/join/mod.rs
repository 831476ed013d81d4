//! Thread join
//!
//! A task created with [`Kernel::task_create`] leads a task group; threads it
//! spawns with [`Kernel::thread_create`] join that group. Each joinable
//! thread gets a join record holding its exit value until someone joins it.
//! Every access to a group's records goes through the group's `join_sem`.
//!
//! A joiner pins the record (`ref_count`) before it drops `join_sem`, so the
//! record cannot disappear while the joiner looks at it. The record is
//! destroyed once it is unpinned and its thread has terminated and been
//! joined or detached.

use crate::core::config::{CFG_JOIN_MAX, CFG_PRIO_IDLE};
use crate::core::error::{OsError, OsResult};
use crate::core::kernel::Kernel;
use crate::core::types::{GroupId, OsPrio, Pend, SemId, SemProtocol, TaskId};

/// Exit value seen by joiners of a deleted thread
pub const THREAD_CANCELED: usize = usize::MAX;

/// Thread creation attributes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadAttr {
    /// No join record; the thread cannot be joined
    pub detached: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct TaskGroup {
    in_use: bool,
    join_sem: Option<SemId>,
    members: u8,
}

impl TaskGroup {
    pub(crate) const EMPTY: TaskGroup = TaskGroup {
        in_use: false,
        join_sem: None,
        members: 0,
    };
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct JoinRecord {
    in_use: bool,
    thread: Option<TaskId>,
    group: GroupId,
    ref_count: u8,
    terminated: bool,
    detached: bool,
    exit_value: usize,
    exit_sem: Option<SemId>,
}

impl JoinRecord {
    pub(crate) const EMPTY: JoinRecord = JoinRecord {
        in_use: false,
        thread: None,
        group: GroupId(0),
        ref_count: 0,
        terminated: false,
        detached: false,
        exit_value: 0,
        exit_sem: None,
    };
}

impl Kernel {
    // ============ Groups ============

    pub(crate) fn group_create(&mut self) -> OsResult<GroupId> {
        let Some(idx) = self.groups.iter().position(|g| !g.in_use) else {
            crate::warn!("task group arena exhausted");
            return Err(OsError::NoResources);
        };
        let join_sem = self.sem_create(1)?;

        self.groups[idx] = TaskGroup {
            in_use: true,
            join_sem: Some(join_sem),
            members: 0,
        };
        Ok(GroupId(idx as u8))
    }

    /// Free a group and everything its threads left behind
    pub(crate) fn group_discard(&mut self, group: GroupId) {
        for r in 0..CFG_JOIN_MAX {
            if self.joins[r].in_use && self.joins[r].group == group {
                self.join_destroy(r);
            }
        }
        if let Some(sem) = self.groups[group.index()].join_sem {
            if self.sem_destroy(sem).is_err() {
                crate::warn!("join_sem of group {} still in use", group.index());
            }
        }
        self.groups[group.index()] = TaskGroup::EMPTY;
    }

    pub(crate) fn group_join(&mut self, group: GroupId) {
        let g = &mut self.groups[group.index()];
        g.members = g.members.saturating_add(1);
    }

    pub(crate) fn group_leave(&mut self, task: TaskId) {
        let Some(group) = self.tasks.tcb(task).group else {
            return;
        };
        let g = &mut self.groups[group.index()];
        g.members = g.members.saturating_sub(1);
        if g.members == 0 {
            crate::debug!("task group {} empty", group.index());
            self.group_discard(group);
        }
    }

    /// Group a task belongs to; kernel tasks belong to none
    pub fn task_group(&self, task: TaskId) -> OsResult<Option<GroupId>> {
        Ok(self.tasks.get(task)?.group)
    }

    /// Semaphore guarding the join records of `group`
    pub fn group_join_sem(&self, group: GroupId) -> Option<SemId> {
        self.groups.get(group.index())?.join_sem
    }

    /// Join records currently allocated
    pub fn join_records(&self) -> usize {
        self.joins.iter().filter(|r| r.in_use).count()
    }

    // ============ Records ============

    fn join_lock(&mut self, group: GroupId) -> OsResult<()> {
        let sem = self.groups[group.index()]
            .join_sem
            .ok_or(OsError::InvalidState)?;
        self.sem_trywait(sem).map_err(|e| match e {
            OsError::WouldBlock => OsError::Busy,
            e => e,
        })
    }

    fn join_unlock(&mut self, group: GroupId) {
        if let Some(sem) = self.groups[group.index()].join_sem {
            let posted = self.sem_post(sem);
            debug_assert!(posted.is_ok(), "join_sem gone while held");
        }
    }

    fn join_find(&self, thread: TaskId) -> Option<usize> {
        self.joins
            .iter()
            .position(|r| r.in_use && r.thread == Some(thread))
    }

    fn join_destroy(&mut self, r: usize) {
        if let Some(sem) = self.joins[r].exit_sem {
            if self.sem_destroy(sem).is_err() {
                crate::warn!("exit_sem of join record {} still in use", r);
            }
        }
        self.joins[r] = JoinRecord::EMPTY;
        crate::debug!("join record {} destroyed", r);
    }

    /// Drop one pin; destroy the record if that was the last pin on a
    /// terminated thread
    fn join_unpin(&mut self, r: usize) {
        let rec = &mut self.joins[r];
        rec.ref_count = rec.ref_count.saturating_sub(1);
        if rec.ref_count == 0 && rec.terminated {
            self.join_destroy(r);
        }
    }

    /// Find and validate the record of `thread` in `group`. Caller holds the
    /// group's `join_sem`.
    fn join_lookup(&self, group: GroupId, thread: TaskId) -> OsResult<usize> {
        let Some(r) = self.join_find(thread).filter(|&r| self.joins[r].group == group) else {
            // Live thread of the group without a record: it was detached
            return match self.tasks.get(thread) {
                Ok(tcb) if tcb.group == Some(group) => Err(OsError::InvalidArgument),
                _ => Err(OsError::NotFound),
            };
        };
        if self.joins[r].detached {
            return Err(OsError::InvalidArgument);
        }
        Ok(r)
    }

    /// Group of the calling task, which must be a thread-capable task
    fn caller_group(&self) -> OsResult<(TaskId, GroupId)> {
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }
        let me = self.caller()?;
        let group = self.tasks.tcb(me).group.ok_or(OsError::InvalidState)?;
        Ok((me, group))
    }

    /// Caller and group for a join on `thread`. Self-join fails first, even
    /// for a task without a group.
    fn join_caller(&self, thread: TaskId) -> OsResult<(TaskId, GroupId)> {
        if !self.in_isr() && self.caller()? == thread {
            return Err(OsError::Deadlock);
        }
        self.caller_group()
    }

    // ============ Threads ============

    /// Create a thread in the caller's task group
    ///
    /// # Returns
    /// * `Ok(TaskId)` - Handle of the new thread
    /// * `Err(OsError::InvalidState)` - Caller is a kernel task without a group
    /// * `Err(OsError::NoResources)` - Task, join record or semaphore arena full
    pub fn thread_create(&mut self, name: &'static str, prio: OsPrio, attr: ThreadAttr) -> OsResult<TaskId> {
        if prio == CFG_PRIO_IDLE {
            return Err(OsError::InvalidArgument);
        }
        let (_, group) = self.caller_group()?;

        self.locked(|k| {
            // Reserve the record before the thread exists
            let record = if attr.detached {
                None
            } else {
                let Some(r) = k.joins.iter().position(|r| !r.in_use) else {
                    crate::warn!("join record arena exhausted");
                    return Err(OsError::NoResources);
                };
                let exit_sem = k.sem_create(0)?;
                k.sem_set_protocol(exit_sem, SemProtocol::None)?;
                k.joins[r] = JoinRecord {
                    in_use: true,
                    group,
                    exit_sem: Some(exit_sem),
                    ..JoinRecord::EMPTY
                };
                Some(r)
            };

            match k.task_spawn(name, prio, Some(group)) {
                Ok(thread) => {
                    if let Some(r) = record {
                        k.joins[r].thread = Some(thread);
                    }
                    Ok(thread)
                }
                Err(e) => {
                    if let Some(r) = record {
                        k.join_destroy(r);
                    }
                    Err(e)
                }
            }
        })
    }

    /// Collect the exit value of a terminated thread without blocking
    ///
    /// # Returns
    /// * `Ok(value)` - Thread has terminated
    /// * `Err(OsError::WouldBlock)` - Thread still running
    /// * `Err(OsError::Deadlock)` - Joining the caller itself
    /// * `Err(OsError::Busy)` - The group's `join_sem` is held elsewhere
    /// * `Err(OsError::InvalidArgument)` - Thread is detached
    /// * `Err(OsError::NotFound)` - No such joinable thread in the group
    pub fn thread_tryjoin(&mut self, thread: TaskId) -> OsResult<usize> {
        let (_, group) = self.join_caller(thread)?;

        self.locked(|k| {
            k.join_lock(group)?;
            let r = match k.join_lookup(group, thread) {
                Ok(r) => r,
                Err(e) => {
                    k.join_unlock(group);
                    return Err(e);
                }
            };
            k.joins[r].ref_count += 1;
            k.join_unlock(group);

            let rec = k.joins[r];
            let result = if rec.terminated {
                Ok(rec.exit_value)
            } else {
                Err(OsError::WouldBlock)
            };

            let relocked = k.join_lock(group).is_ok();
            k.join_unpin(r);
            if relocked {
                k.join_unlock(group);
            }
            result
        })
    }

    /// Wait for a thread to terminate and collect its exit value
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(value))` - Thread has terminated
    /// * `Ok(Pend::Blocked)` - Caller suspended, re-issue once running
    /// * `Err(OsError::Interrupted)` - Wait ended by [`Kernel::task_interrupt`]
    /// * other errors as [`Kernel::thread_tryjoin`]
    pub fn thread_join(&mut self, thread: TaskId) -> OsResult<Pend<usize>> {
        let (me, group) = self.join_caller(thread)?;

        if self.tasks.tcb(me).joining == Some(thread) {
            return self.thread_join_resume(me, group, thread);
        }

        let pinned = self.preempt_off(|k| {
            k.join_lock(group)?;
            let r = match k.join_lookup(group, thread) {
                Ok(r) => r,
                Err(e) => {
                    k.join_unlock(group);
                    return Err(e);
                }
            };

            let rec = k.joins[r];
            if rec.terminated {
                if rec.ref_count == 0 {
                    k.join_destroy(r);
                }
                k.join_unlock(group);
                return Ok(Err(rec.exit_value));
            }

            k.joins[r].ref_count += 1;
            k.join_unlock(group);
            Ok(Ok(r))
        })?;

        let r = match pinned {
            Ok(r) => r,
            Err(value) => {
                self.sched();
                return Ok(Pend::Ready(value));
            }
        };

        let Some(exit_sem) = self.joins[r].exit_sem else {
            return Err(OsError::InvalidState);
        };
        self.tasks.tcb_mut(me).joining = Some(thread);
        match self.sem_wait(exit_sem) {
            Ok(Pend::Blocked) => Ok(Pend::Blocked),
            Ok(Pend::Ready(())) => self.thread_join_resume(me, group, thread),
            Err(e) => {
                self.tasks.tcb_mut(me).joining = None;
                self.join_unpin(r);
                Err(e)
            }
        }
    }

    fn thread_join_resume(&mut self, me: TaskId, group: GroupId, thread: TaskId) -> OsResult<Pend<usize>> {
        let r = self.join_find(thread).filter(|&r| self.joins[r].group == group);
        let Some(r) = r else {
            self.tasks.tcb_mut(me).joining = None;
            return Err(OsError::NotFound);
        };

        if let Some(exit_sem) = self.joins[r].exit_sem {
            if self.tasks.tcb(me).pend_done == Some(exit_sem) {
                if let Err(e) = self.sem_wait(exit_sem) {
                    self.tasks.tcb_mut(me).joining = None;
                    self.join_unpin(r);
                    return Err(e);
                }
            }
        }

        self.tasks.tcb_mut(me).joining = None;
        let rec = self.joins[r];
        self.join_unpin(r);
        if !rec.terminated {
            return Err(OsError::InvalidState);
        }
        Ok(Pend::Ready(rec.exit_value))
    }

    /// Mark a thread detached: its record goes away as soon as it terminates
    pub fn thread_detach(&mut self, thread: TaskId) -> OsResult<()> {
        let (_, group) = self.caller_group()?;

        self.locked(|k| {
            k.join_lock(group)?;
            let result = k.join_lookup(group, thread).map(|r| {
                let rec = &mut k.joins[r];
                if rec.terminated && rec.ref_count == 0 {
                    k.join_destroy(r);
                } else {
                    rec.detached = true;
                }
            });
            k.join_unlock(group);
            result
        })
    }

    /// Publish the exit of `task` and drop the pin it held as a joiner.
    /// Teardown context: the task is off every list.
    pub(crate) fn join_task_gone(&mut self, task: TaskId, value: usize) {
        if let Some(thread) = self.tasks.tcb_mut(task).joining.take() {
            if let Some(r) = self.join_find(thread) {
                self.join_unpin(r);
            }
        }

        let Some(r) = self.join_find(task) else {
            return;
        };
        let rec = &mut self.joins[r];
        rec.terminated = true;
        rec.exit_value = value;
        crate::debug!("thread slot {} exited", task.slot());

        // One unit per blocked joiner
        if let Some(sem) = rec.exit_sem {
            while self.sems.slot(sem).count() < 0 {
                if let Err(e) = self.sem_post(sem) {
                    crate::warn!("exit_sem post failed: {}", e.errno());
                    break;
                }
            }
        }

        let rec = self.joins[r];
        if rec.detached && rec.ref_count == 0 {
            self.join_destroy(r);
        }
    }
}
