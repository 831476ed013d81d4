//! Critical section protected cell
//!
//! Lets a target keep its [`Kernel`](crate::Kernel) in a `static` and reach
//! it only while interrupts are masked.

use core::cell::UnsafeCell;
use crate::core::critical::{critical_section, CriticalSection};

/// A cell that can only be accessed within a critical section.
pub struct CsCell<T>(UnsafeCell<T>);

unsafe impl<T> Sync for CsCell<T> {}

impl<T> CsCell<T> {
    /// Create a new CsCell
    #[inline(always)]
    pub const fn new(value: T) -> Self {
        Self(UnsafeCell::new(value))
    }

    /// Get a mutable reference to the inner value.
    ///
    /// The reference must not outlive the guard nor be taken twice under
    /// nested guards.
    #[allow(clippy::mut_from_ref)]
    #[inline(always)]
    pub fn get<'cs>(&'cs self, _cs: &'cs CriticalSection) -> &'cs mut T {
        unsafe { &mut *self.0.get() }
    }

    /// Run `f` on the inner value inside a fresh critical section
    #[inline]
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section(|cs| f(self.get(cs)))
    }
}
