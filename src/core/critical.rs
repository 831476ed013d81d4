//! Critical section handling
//!
//! Every mutation of kernel lists and counters happens under a
//! [`CriticalSection`]. On Cortex-M entering masks interrupts through the
//! `critical-section` implementation registered in the crate root; on the
//! host only the nesting count is kept.

use portable_atomic::{AtomicU8, Ordering};

/// Nesting depth of live guards
static CS_NESTING: AtomicU8 = AtomicU8::new(0);

/// RAII guard for critical sections
///
/// When this guard is created, interrupts are disabled.
/// When it is dropped, interrupts are restored to their previous state,
/// so guards nest.
pub struct CriticalSection {
    #[cfg(target_arch = "arm")]
    restore: critical_section::RawRestoreState,
    _private: (),
}

impl CriticalSection {
    /// Enter a critical section by disabling interrupts.
    #[inline(always)]
    pub fn enter() -> Self {
        #[cfg(target_arch = "arm")]
        let restore = unsafe { critical_section::acquire() };

        CS_NESTING.fetch_add(1, Ordering::AcqRel);
        CriticalSection {
            #[cfg(target_arch = "arm")]
            restore,
            _private: (),
        }
    }

    /// Check if we're currently in a critical section
    #[inline(always)]
    pub fn is_active() -> bool {
        CS_NESTING.load(Ordering::Acquire) > 0
    }
}

impl Drop for CriticalSection {
    #[inline(always)]
    fn drop(&mut self) {
        CS_NESTING.fetch_sub(1, Ordering::AcqRel);

        #[cfg(target_arch = "arm")]
        unsafe {
            critical_section::release(self.restore)
        };
    }
}

/// Execute a closure with interrupts disabled
///
/// The closure receives a reference to the critical section guard,
/// which can be used to access [`CsCell`](crate::core::cs_cell::CsCell)
/// protected data.
#[inline]
pub fn critical_section<F, R>(f: F) -> R
where
    F: FnOnce(&CriticalSection) -> R,
{
    let cs = CriticalSection::enter();
    f(&cs)
}

/// Check if currently executing in an exception handler
#[inline]
pub fn is_isr_context() -> bool {
    #[cfg(target_arch = "arm")]
    {
        let ipsr: u32;
        unsafe {
            core::arch::asm!(
                "mrs {}, IPSR",
                out(reg) ipsr,
                options(nomem, nostack, preserves_flags)
            );
        }
        ipsr != 0
    }

    #[cfg(not(target_arch = "arm"))]
    {
        false
    }
}
