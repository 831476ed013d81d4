//! Compile-time configuration
//!
//! These constants size every kernel table; nothing is allocated at run time.

use crate::core::types::{OsPrio, OsTick};

/// Number of priority levels
pub const CFG_PRIO_MAX: usize = 256;

/// Idle task priority (lowest)
pub const CFG_PRIO_IDLE: OsPrio = 0;

/// System tick rate in Hz
pub const CFG_TICK_RATE_HZ: u32 = 1000;

/// Number of entries in tick wheel
pub const CFG_TICK_WHEEL_SIZE: usize = 16;

/// Task control blocks, idle and worker tasks included
pub const CFG_TASK_MAX: usize = 32;

/// Semaphore slots (join locks, join exit semaphores and work queue
/// semaphores are drawn from the same arena)
pub const CFG_SEM_MAX: usize = 64;

/// Holder records shared by all semaphores
pub const CFG_SEM_PREALLOCHOLDERS: usize = 16;

/// Step budget of one priority-inheritance walk
pub const CFG_PI_WALK_BUDGET: usize = CFG_TASK_MAX * CFG_TASK_MAX;

/// Work item slots
pub const CFG_WORK_MAX: usize = 32;

/// Upper bound on worker tasks per queue
pub const CFG_WORK_MAXTHREADS: usize = 4;

/// High priority work queue
pub const CFG_WORK_HPPRIO: OsPrio = 224;
pub const CFG_WORK_HPNTHREADS: usize = 1;

/// Low priority work queue
pub const CFG_WORK_LPPRIO: OsPrio = 100;
pub const CFG_WORK_LPNTHREADS: usize = 2;

/// Poll period of worker 0, so deferred frees are reclaimed without work
pub const CFG_WORK_GC_PERIOD: OsTick = 50;

/// Frees that may be parked for the worker
pub const CFG_MM_DELAYFREE_MAX: usize = 16;

/// Task groups
pub const CFG_GROUP_MAX: usize = 16;

/// Join records
pub const CFG_JOIN_MAX: usize = 16;
