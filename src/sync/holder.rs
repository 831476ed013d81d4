//! Semaphore holder records
//!
//! A holder record counts the units of one semaphore a task currently holds.
//! By default records come from one kernel-wide pool of
//! `CFG_SEM_PREALLOCHOLDERS` entries and each semaphore keeps a singly
//! linked list of its own. With the `single-holder` feature every semaphore
//! carries one inline record instead and the pool is empty.
//!
//! Records name their task by [`TaskId`], never by reference.

use crate::core::types::{OsSemCtr, TaskId};

#[cfg(not(feature = "single-holder"))]
use crate::core::config::CFG_SEM_PREALLOCHOLDERS;

/// Most holders one semaphore can report at once
#[cfg(not(feature = "single-holder"))]
pub const HOLDER_SET_MAX: usize = CFG_SEM_PREALLOCHOLDERS;
#[cfg(feature = "single-holder")]
pub const HOLDER_SET_MAX: usize = 1;

/// Copy of the tasks holding a semaphore
pub struct HolderSet {
    ids: [TaskId; HOLDER_SET_MAX],
    len: usize,
}

impl HolderSet {
    const fn new() -> Self {
        HolderSet {
            ids: [TaskId::new(0, 0); HOLDER_SET_MAX],
            len: 0,
        }
    }

    fn push(&mut self, id: TaskId) {
        if self.len < HOLDER_SET_MAX {
            self.ids[self.len] = id;
            self.len += 1;
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[TaskId] {
        &self.ids[..self.len]
    }
}

#[cfg(not(feature = "single-holder"))]
mod imp {
    use super::*;

    type HolderIdx = u16;

    #[derive(Debug, Clone, Copy)]
    struct SemHolder {
        task: TaskId,
        counts: OsSemCtr,
        next: Option<HolderIdx>,
    }

    impl SemHolder {
        const EMPTY: SemHolder = SemHolder {
            task: TaskId::new(0, 0),
            counts: 0,
            next: None,
        };
    }

    /// Preallocated holder records shared by every semaphore
    pub struct HolderPool {
        recs: [SemHolder; CFG_SEM_PREALLOCHOLDERS],
        free: Option<HolderIdx>,
    }

    impl HolderPool {
        pub const fn new() -> Self {
            let mut recs = [SemHolder::EMPTY; CFG_SEM_PREALLOCHOLDERS];
            let mut i = 0;
            while i + 1 < CFG_SEM_PREALLOCHOLDERS {
                recs[i].next = Some((i + 1) as HolderIdx);
                i += 1;
            }
            HolderPool {
                recs,
                free: if CFG_SEM_PREALLOCHOLDERS > 0 { Some(0) } else { None },
            }
        }

        fn alloc(&mut self, task: TaskId) -> Option<HolderIdx> {
            let idx = self.free?;
            let rec = &mut self.recs[idx as usize];
            self.free = rec.next;
            *rec = SemHolder {
                task,
                counts: 0,
                next: None,
            };
            Some(idx)
        }

        fn free(&mut self, idx: HolderIdx) {
            self.recs[idx as usize] = SemHolder {
                next: self.free,
                ..SemHolder::EMPTY
            };
            self.free = Some(idx);
        }

        /// Records not in use by any semaphore
        pub fn available(&self) -> usize {
            let mut n = 0;
            let mut cur = self.free;
            while let Some(idx) = cur {
                n += 1;
                cur = self.recs[idx as usize].next;
            }
            n
        }
    }

    /// Holders of one semaphore
    #[derive(Debug, Clone, Copy)]
    pub struct HolderList {
        head: Option<HolderIdx>,
    }

    impl HolderList {
        pub const fn new() -> Self {
            HolderList { head: None }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.head.is_none()
        }

        /// Record index for `task` and its predecessor in the list
        fn find(&self, pool: &HolderPool, task: TaskId) -> Option<(Option<HolderIdx>, HolderIdx)> {
            let mut prev = None;
            let mut cur = self.head;
            while let Some(idx) = cur {
                let rec = &pool.recs[idx as usize];
                if rec.task == task {
                    return Some((prev, idx));
                }
                prev = Some(idx);
                cur = rec.next;
            }
            None
        }

        fn unlink(&mut self, pool: &mut HolderPool, prev: Option<HolderIdx>, idx: HolderIdx) {
            let next = pool.recs[idx as usize].next;
            match prev {
                Some(p) => pool.recs[p as usize].next = next,
                None => self.head = next,
            }
            pool.free(idx);
        }

        pub fn counts(&self, pool: &HolderPool, task: TaskId) -> OsSemCtr {
            self.find(pool, task)
                .map_or(0, |(_, idx)| pool.recs[idx as usize].counts)
        }

        /// Add one unit for `task`. False when the pool is exhausted.
        pub fn add(&mut self, pool: &mut HolderPool, task: TaskId) -> bool {
            if let Some((_, idx)) = self.find(pool, task) {
                let rec = &mut pool.recs[idx as usize];
                rec.counts = rec.counts.saturating_add(1);
                return true;
            }

            let Some(idx) = pool.alloc(task) else {
                return false;
            };
            let rec = &mut pool.recs[idx as usize];
            rec.counts = 1;
            rec.next = self.head;
            self.head = Some(idx);
            true
        }

        /// Drop one unit of `task`, freeing the record at zero.
        /// False when `task` holds nothing.
        pub fn release(&mut self, pool: &mut HolderPool, task: TaskId) -> bool {
            let Some((prev, idx)) = self.find(pool, task) else {
                return false;
            };
            let rec = &mut pool.recs[idx as usize];
            rec.counts -= 1;
            if rec.counts <= 0 {
                self.unlink(pool, prev, idx);
            }
            true
        }

        /// Drop the whole record of `task`
        pub fn remove_task(&mut self, pool: &mut HolderPool, task: TaskId) -> bool {
            match self.find(pool, task) {
                Some((prev, idx)) => {
                    self.unlink(pool, prev, idx);
                    true
                }
                None => false,
            }
        }

        pub fn clear(&mut self, pool: &mut HolderPool) {
            while let Some(idx) = self.head {
                self.unlink(pool, None, idx);
            }
        }

        pub fn snapshot(&self, pool: &HolderPool) -> HolderSet {
            let mut set = HolderSet::new();
            let mut cur = self.head;
            while let Some(idx) = cur {
                let rec = &pool.recs[idx as usize];
                set.push(rec.task);
                cur = rec.next;
            }
            set
        }
    }
}

#[cfg(feature = "single-holder")]
mod imp {
    use super::*;

    /// Nothing to share: each semaphore has its own slot
    pub struct HolderPool;

    impl HolderPool {
        pub const fn new() -> Self {
            HolderPool
        }
    }

    /// The single holder of one semaphore
    #[derive(Debug, Clone, Copy)]
    pub struct HolderList {
        slot: Option<(TaskId, OsSemCtr)>,
    }

    impl HolderList {
        pub const fn new() -> Self {
            HolderList { slot: None }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.slot.is_none()
        }

        pub fn counts(&self, _pool: &HolderPool, task: TaskId) -> OsSemCtr {
            match self.slot {
                Some((t, n)) if t == task => n,
                _ => 0,
            }
        }

        /// Add one unit for `task`. False when another task owns the slot.
        pub fn add(&mut self, _pool: &mut HolderPool, task: TaskId) -> bool {
            match &mut self.slot {
                Some((t, n)) if *t == task => {
                    *n = n.saturating_add(1);
                    true
                }
                Some(_) => false,
                None => {
                    self.slot = Some((task, 1));
                    true
                }
            }
        }

        pub fn release(&mut self, _pool: &mut HolderPool, task: TaskId) -> bool {
            match &mut self.slot {
                Some((t, n)) if *t == task => {
                    *n -= 1;
                    if *n <= 0 {
                        self.slot = None;
                    }
                    true
                }
                _ => false,
            }
        }

        pub fn remove_task(&mut self, _pool: &mut HolderPool, task: TaskId) -> bool {
            match self.slot {
                Some((t, _)) if t == task => {
                    self.slot = None;
                    true
                }
                _ => false,
            }
        }

        pub fn clear(&mut self, _pool: &mut HolderPool) {
            self.slot = None;
        }

        pub fn snapshot(&self, _pool: &HolderPool) -> HolderSet {
            let mut set = HolderSet::new();
            if let Some((t, _)) = self.slot {
                set.push(t);
            }
            set
        }
    }
}

pub use imp::{HolderList, HolderPool};

impl Default for HolderPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for HolderList {
    fn default() -> Self {
        Self::new()
    }
}
