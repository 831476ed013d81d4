//! Synchronization core of a small real-time kernel
//!
//! - Counting semaphores with priority inheritance
//! - A kernel-wide prioritized wait queue
//! - High and low priority work queues for deferred work
//! - Thread join with pinned join records
//!
//! All state lives in one [`Kernel`] value; nothing is allocated at run time.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]

// ============ Critical Section ============

#[cfg(target_arch = "arm")]
mod cs_impl {
    use cortex_m::interrupt;
    use cortex_m::register::primask;
    use critical_section::{set_impl, Impl, RawRestoreState};

    struct SingleCoreCriticalSection;
    set_impl!(SingleCoreCriticalSection);

    unsafe impl Impl for SingleCoreCriticalSection {
        unsafe fn acquire() -> RawRestoreState {
            let was_active = primask::read().is_active();
            interrupt::disable();
            was_active
        }

        unsafe fn release(was_active: RawRestoreState) {
            if was_active {
                unsafe { interrupt::enable() }
            }
        }
    }
}

// ============ Modules ============

pub mod log;

pub mod core;
pub mod join;
pub mod port;
pub mod sync;
pub mod wqueue;

// ============ Re-exports ============

pub use crate::core::config;
pub use crate::core::config::*;
pub use crate::core::critical;
pub use crate::core::cs_cell::CsCell;
pub use crate::core::error;
pub use crate::core::error::{OsError, OsResult};
pub use crate::core::kernel;
pub use crate::core::kernel::Kernel;
pub use crate::core::prio;
pub use crate::core::sched;
pub use crate::core::task;
pub use crate::core::task::OsTcb;
pub use crate::core::time;
pub use crate::core::types;
pub use crate::core::types::*;

pub use crate::join::{ThreadAttr, THREAD_CANCELED};
pub use crate::sync::sem;
pub use crate::wqueue::{WorkFn, WorkQueueId, WorkState};
