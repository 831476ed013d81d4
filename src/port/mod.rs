//! Port layer - CPU-specific hooks
//!
//! The core never switches context itself. When the scheduler picks a new
//! running task it asks the port to switch; on Cortex-M that pends PendSV,
//! whose handler belongs to the board support code.

/// Request a context switch
#[cfg(target_arch = "arm")]
#[inline(always)]
pub fn os_ctx_sw() {
    cortex_m::peripheral::SCB::set_pendsv();
}

// Host builds (tests): the caller plays the scheduler
#[cfg(not(target_arch = "arm"))]
#[inline(always)]
pub fn os_ctx_sw() {}
