//! Core RTOS modules
//!
//! Contains the kernel context, scheduler, task management, and time
//! management.

pub mod config;
pub mod critical;
pub mod cs_cell;
pub mod error;
pub mod kernel;
pub mod prio;
pub mod sched;
pub mod task;
pub mod time;
pub mod types;
