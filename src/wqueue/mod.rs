//! Kernel work queues
//!
//! Interrupt handlers defer work to a pool of worker tasks instead of doing
//! it in interrupt context. There is a high priority and a low priority
//! queue; each owns a FIFO of queued items, a list of delayed items sorted by
//! due tick and a signalling semaphore posted once per queued item.
//!
//! Worker 0 of each queue also drains the deferred-free list and waits with
//! a timeout so that reclamation runs even when no work arrives.

mod delay_free;

pub use delay_free::{DelayFreeList, FreeFn};

use crate::core::config::{
    CFG_PRIO_IDLE, CFG_WORK_GC_PERIOD, CFG_WORK_HPNTHREADS, CFG_WORK_HPPRIO,
    CFG_WORK_LPNTHREADS, CFG_WORK_LPPRIO, CFG_WORK_MAX, CFG_WORK_MAXTHREADS,
};
use crate::core::error::{OsError, OsResult};
use crate::core::kernel::Kernel;
use crate::core::types::{OsPrio, OsTick, Pend, SemId, SemProtocol, TaskId, WorkId};

/// Work callback: runs on a worker task with the item's argument
///
/// Returns `Pend::Blocked` when a kernel call inside it suspended the worker.
/// The callback is then issued again once the worker runs.
pub type WorkFn = fn(&mut Kernel, usize) -> Pend<()>;

pub const WORK_QUEUE_COUNT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WorkQueueId {
    High = 0,
    Low = 1,
}

impl WorkQueueId {
    fn task_name(self) -> &'static str {
        match self {
            WorkQueueId::High => "hpwork",
            WorkQueueId::Low => "lpwork",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WorkState {
    /// Slot not allocated
    Free,
    Idle,
    /// Parked until its due tick
    Delayed,
    Queued,
    /// Claimed by a worker, callback running
    Running,
}

#[derive(Clone, Copy)]
struct Work {
    state: WorkState,
    worker: Option<WorkFn>,
    arg: usize,
    due: OsTick,
    queue: WorkQueueId,
    next: Option<WorkId>,
}

impl Work {
    const EMPTY: Work = Work {
        state: WorkState::Free,
        worker: None,
        arg: 0,
        due: 0,
        queue: WorkQueueId::High,
        next: None,
    };
}

/// Fixed arena of work items
pub struct WorkTable {
    items: [Work; CFG_WORK_MAX],
}

impl WorkTable {
    pub const fn new() -> Self {
        WorkTable {
            items: [Work::EMPTY; CFG_WORK_MAX],
        }
    }

    fn get(&self, id: WorkId) -> OsResult<&Work> {
        match self.items.get(id.index()) {
            Some(w) if w.state != WorkState::Free => Ok(w),
            _ => Err(OsError::InvalidArgument),
        }
    }

    #[inline(always)]
    fn item(&mut self, id: WorkId) -> &mut Work {
        &mut self.items[id.index()]
    }
}

impl Default for WorkTable {
    fn default() -> Self {
        Self::new()
    }
}

/// One worker task of a queue
#[derive(Debug, Clone, Copy)]
pub struct WorkerRecord {
    task: Option<TaskId>,
    busy: bool,
    current: Option<WorkId>,
    call: Option<(WorkFn, usize)>,
}

impl WorkerRecord {
    const EMPTY: WorkerRecord = WorkerRecord {
        task: None,
        busy: false,
        current: None,
        call: None,
    };

    #[inline]
    pub fn task(&self) -> Option<TaskId> {
        self.task
    }

    #[inline]
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Item whose callback the worker is running
    #[inline]
    pub fn current(&self) -> Option<WorkId> {
        self.current
    }
}

pub struct WorkQueue {
    head: Option<WorkId>,
    tail: Option<WorkId>,
    delayed: Option<WorkId>,
    sem: Option<SemId>,
    workers: [WorkerRecord; CFG_WORK_MAXTHREADS],
    nthreads: usize,
}

impl WorkQueue {
    pub(crate) const EMPTY: WorkQueue = WorkQueue {
        head: None,
        tail: None,
        delayed: None,
        sem: None,
        workers: [WorkerRecord::EMPTY; CFG_WORK_MAXTHREADS],
        nthreads: 0,
    };

    #[inline]
    pub fn is_started(&self) -> bool {
        self.sem.is_some()
    }

    pub fn workers(&self) -> &[WorkerRecord] {
        &self.workers[..self.nthreads]
    }

    fn push_back(&mut self, items: &mut WorkTable, id: WorkId) {
        items.item(id).next = None;
        match self.tail {
            Some(t) => items.item(t).next = Some(id),
            None => self.head = Some(id),
        }
        self.tail = Some(id);
    }

    fn pop_front(&mut self, items: &mut WorkTable) -> Option<WorkId> {
        let id = self.head?;
        self.head = items.item(id).next.take();
        if self.head.is_none() {
            self.tail = None;
        }
        Some(id)
    }

    fn unlink_queued(&mut self, items: &mut WorkTable, id: WorkId) {
        let mut prev = None;
        let mut cur = self.head;
        while let Some(c) = cur {
            if c == id {
                let next = items.item(c).next.take();
                match prev {
                    Some(p) => items.item(p).next = next,
                    None => self.head = next,
                }
                if self.tail == Some(id) {
                    self.tail = prev;
                }
                return;
            }
            prev = cur;
            cur = items.item(c).next;
        }
    }

    /// Park an item, ordered by due tick relative to `now`, FIFO on ties
    fn insert_delayed(&mut self, items: &mut WorkTable, id: WorkId, now: OsTick) {
        let remain = items.item(id).due.wrapping_sub(now);

        let mut prev = None;
        let mut cur = self.delayed;
        while let Some(c) = cur {
            if items.item(c).due.wrapping_sub(now) > remain {
                break;
            }
            prev = cur;
            cur = items.item(c).next;
        }

        items.item(id).next = cur;
        match prev {
            Some(p) => items.item(p).next = Some(id),
            None => self.delayed = Some(id),
        }
    }

    fn unlink_delayed(&mut self, items: &mut WorkTable, id: WorkId) {
        let mut prev = None;
        let mut cur = self.delayed;
        while let Some(c) = cur {
            if c == id {
                let next = items.item(c).next.take();
                match prev {
                    Some(p) => items.item(p).next = next,
                    None => self.delayed = next,
                }
                return;
            }
            prev = cur;
            cur = items.item(c).next;
        }
    }
}

impl Kernel {
    fn wqueue(&self, qid: WorkQueueId) -> OsResult<(&WorkQueue, SemId)> {
        let q = &self.wqueues[qid as usize];
        q.sem.map(|sem| (q, sem)).ok_or(OsError::InvalidState)
    }

    /// Start a work queue with `nthreads` workers at priority `prio`
    ///
    /// # Returns
    /// * `Err(OsError::InvalidArgument)` - No workers, too many workers, or idle priority
    /// * `Err(OsError::InvalidState)` - Queue already started
    /// * `Err(OsError::NoResources)` - Not enough task or semaphore slots
    pub fn work_start(&mut self, qid: WorkQueueId, prio: OsPrio, nthreads: usize) -> OsResult<()> {
        if self.in_isr() {
            return Err(OsError::InterruptContext);
        }
        if nthreads == 0 || nthreads > CFG_WORK_MAXTHREADS || prio == CFG_PRIO_IDLE {
            return Err(OsError::InvalidArgument);
        }
        if self.wqueues[qid as usize].is_started() {
            return Err(OsError::InvalidState);
        }
        if self.tasks.free_count() < nthreads {
            return Err(OsError::NoResources);
        }

        self.locked(|k| {
            let sem = k.sem_create(0)?;
            k.sem_set_protocol(sem, SemProtocol::None)?;

            for idx in 0..nthreads {
                let task = k.task_spawn(qid.task_name(), prio, None)?;
                k.wqueues[qid as usize].workers[idx] = WorkerRecord {
                    task: Some(task),
                    ..WorkerRecord::EMPTY
                };
            }

            let q = &mut k.wqueues[qid as usize];
            q.nthreads = nthreads;
            q.sem = Some(sem);
            crate::info!("work queue {} started, {} workers", qid, nthreads);
            Ok(())
        })
    }

    /// Start both queues with the configured priorities and worker counts
    pub fn work_start_default(&mut self) -> OsResult<()> {
        self.work_start(WorkQueueId::High, CFG_WORK_HPPRIO, CFG_WORK_HPNTHREADS)?;
        self.work_start(WorkQueueId::Low, CFG_WORK_LPPRIO, CFG_WORK_LPNTHREADS)
    }

    /// Task of worker `idx`
    pub fn work_worker(&self, qid: WorkQueueId, idx: usize) -> Option<TaskId> {
        self.wqueues[qid as usize].workers().get(idx)?.task
    }

    #[inline]
    pub fn work_queue_state(&self, qid: WorkQueueId) -> &WorkQueue {
        &self.wqueues[qid as usize]
    }

    /// Allocate an idle work item
    pub fn work_alloc(&mut self) -> OsResult<WorkId> {
        let Some(idx) = self.works.items.iter().position(|w| w.state == WorkState::Free) else {
            crate::warn!("work item arena exhausted");
            return Err(OsError::NoResources);
        };
        self.works.items[idx] = Work {
            state: WorkState::Idle,
            ..Work::EMPTY
        };
        Ok(WorkId(idx as u16))
    }

    /// Return a work item to the arena
    ///
    /// # Returns
    /// * `Err(OsError::Busy)` - Item is queued, delayed or running
    pub fn work_free(&mut self, work: WorkId) -> OsResult<()> {
        if self.works.get(work)?.state != WorkState::Idle {
            return Err(OsError::Busy);
        }
        *self.works.item(work) = Work::EMPTY;
        Ok(())
    }

    pub fn work_state(&self, work: WorkId) -> OsResult<WorkState> {
        Ok(self.works.get(work)?.state)
    }

    /// Whether the item can be queued now
    pub fn work_available(&self, work: WorkId) -> OsResult<bool> {
        Ok(matches!(
            self.works.get(work)?.state,
            WorkState::Idle | WorkState::Running
        ))
    }

    /// Queue work to run `worker(kernel, arg)` on a worker task
    ///
    /// Callable from an ISR. A `delay` of zero queues at once; otherwise the
    /// item is queued by the tick handler `delay` ticks from now. An item may
    /// queue itself again from its own callback.
    ///
    /// # Returns
    /// * `Err(OsError::AlreadyQueued)` - Item is queued or delayed
    /// * `Err(OsError::InvalidState)` - Queue not started
    pub fn work_queue(
        &mut self,
        qid: WorkQueueId,
        work: WorkId,
        worker: WorkFn,
        arg: usize,
        delay: OsTick,
    ) -> OsResult<()> {
        let (_, sem) = self.wqueue(qid)?;
        match self.works.get(work)?.state {
            WorkState::Queued | WorkState::Delayed => return Err(OsError::AlreadyQueued),
            _ => {}
        }

        let now = self.tick;
        let item = self.works.item(work);
        item.worker = Some(worker);
        item.arg = arg;
        item.queue = qid;
        item.due = now.wrapping_add(delay);

        let q = &mut self.wqueues[qid as usize];
        if delay == 0 {
            item.state = WorkState::Queued;
            q.push_back(&mut self.works, work);
            self.sem_post(sem)
        } else {
            item.state = WorkState::Delayed;
            q.insert_delayed(&mut self.works, work, now);
            Ok(())
        }
    }

    /// Remove queued or delayed work before it runs
    ///
    /// # Returns
    /// * `Ok(())` - Item discarded without running
    /// * `Err(OsError::Busy)` - A worker already claimed it
    /// * `Err(OsError::NotFound)` - Item is not pending on `qid`
    pub fn work_cancel(&mut self, qid: WorkQueueId, work: WorkId) -> OsResult<()> {
        let (_, sem) = self.wqueue(qid)?;
        let item = *self.works.get(work)?;
        if item.queue != qid && matches!(item.state, WorkState::Queued | WorkState::Delayed) {
            return Err(OsError::NotFound);
        }

        let q = &mut self.wqueues[qid as usize];
        match item.state {
            WorkState::Queued => {
                q.unlink_queued(&mut self.works, work);
                // Take back the unit posted for it
                let s = self.sems.slot_mut(sem);
                if s.count > 0 {
                    s.count -= 1;
                }
            }
            WorkState::Delayed => q.unlink_delayed(&mut self.works, work),
            WorkState::Running => return Err(OsError::Busy),
            WorkState::Idle | WorkState::Free => return Err(OsError::NotFound),
        }

        let item = self.works.item(work);
        item.state = WorkState::Idle;
        item.worker = None;
        Ok(())
    }

    /// Body of worker `idx`: wait for work and run one item
    ///
    /// Must be called by that worker's task. Worker 0 waits with a timeout
    /// and frees deferred tokens on every pass. The callback runs with
    /// preemption enabled; when it blocks, the item stays claimed and the
    /// next call resumes it.
    ///
    /// # Returns
    /// * `Ok(Pend::Ready(Some(id)))` - Item `id` ran to completion
    /// * `Ok(Pend::Ready(None))` - Woke without work
    /// * `Ok(Pend::Blocked)` - Waiting for work or inside a blocked callback,
    ///   re-issue once running
    pub fn work_process(&mut self, qid: WorkQueueId, idx: usize) -> OsResult<Pend<Option<WorkId>>> {
        let (q, sem) = self.wqueue(qid)?;
        let Some(rec) = q.workers().get(idx) else {
            return Err(OsError::InvalidArgument);
        };
        if rec.task.is_none() || rec.task != self.current() {
            return Err(OsError::InvalidState);
        }
        let resume = rec.current;
        if let Some(id) = resume {
            return Ok(self.work_run(qid, idx, id));
        }

        let wait = if idx == 0 {
            let deadline = self.tick.wrapping_add(CFG_WORK_GC_PERIOD);
            self.sem_timedwait(sem, deadline)
        } else {
            self.sem_wait(sem)
        };
        let got_unit = match wait {
            Ok(Pend::Ready(())) => true,
            Ok(Pend::Blocked) => return Ok(Pend::Blocked),
            Err(OsError::TimedOut) | Err(OsError::Interrupted) => false,
            Err(e) => return Err(e),
        };

        if idx == 0 {
            self.mm_gc();
        }
        if !got_unit {
            return Ok(Pend::Ready(None));
        }

        let q = &mut self.wqueues[qid as usize];
        let Some(id) = q.pop_front(&mut self.works) else {
            return Ok(Pend::Ready(None));
        };

        let item = self.works.item(id);
        item.state = WorkState::Running;
        let call = item.worker.take().map(|f| (f, item.arg));
        let rec = &mut q.workers[idx];
        rec.busy = true;
        rec.current = Some(id);
        rec.call = call;
        crate::trace!("worker {} claims item {}", idx, id.index());

        Ok(self.work_run(qid, idx, id))
    }

    /// Issue the claimed item's callback and release the item once it returns
    fn work_run(&mut self, qid: WorkQueueId, idx: usize, id: WorkId) -> Pend<Option<WorkId>> {
        let call = self.wqueues[qid as usize].workers[idx].call;
        if let Some((f, arg)) = call {
            if f(self, arg).is_blocked() {
                return Pend::Blocked;
            }
        }

        let item = self.works.item(id);
        if item.state == WorkState::Running {
            item.state = WorkState::Idle;
        }
        let rec = &mut self.wqueues[qid as usize].workers[idx];
        *rec = WorkerRecord {
            task: rec.task,
            ..WorkerRecord::EMPTY
        };

        Pend::Ready(Some(id))
    }

    /// Move delayed items that are due to their queue. Tick context.
    pub(crate) fn work_timer_expire(&mut self, now: OsTick) {
        for qi in 0..WORK_QUEUE_COUNT {
            let Some(sem) = self.wqueues[qi].sem else {
                continue;
            };

            while let Some(id) = self.wqueues[qi].delayed {
                let item = self.works.item(id);
                if !crate::core::time::tick_reached(now, item.due) {
                    break;
                }
                let q = &mut self.wqueues[qi];
                q.delayed = item.next.take();
                item.state = WorkState::Queued;
                q.push_back(&mut self.works, id);
                let posted = self.sem_post(sem);
                debug_assert!(posted.is_ok(), "work queue semaphore gone");
            }
        }
    }

    /// Forget a worker task that is being deleted
    pub(crate) fn work_forget_worker(&mut self, task: TaskId) {
        for q in self.wqueues.iter_mut() {
            for rec in q.workers.iter_mut() {
                if rec.task != Some(task) {
                    continue;
                }
                crate::warn!("work queue worker deleted");
                if let Some(id) = rec.current.take() {
                    let item = self.works.item(id);
                    if item.state == WorkState::Running {
                        item.state = WorkState::Idle;
                    }
                }
                *rec = WorkerRecord::EMPTY;
            }
        }
    }
}
