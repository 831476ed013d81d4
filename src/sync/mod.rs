//! Synchronization primitives
//!
//! Counting semaphores with priority inheritance.

pub mod holder;
mod inherit;
pub mod sem;

pub use sem::{OsSem, SEM_INITIALIZED, SEM_PRIO_NONE};
