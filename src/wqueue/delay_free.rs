//! Deferred frees
//!
//! Memory cannot be returned from an interrupt handler, so the handler parks
//! the token here and worker 0 of a work queue hands it to the free hook the
//! next time it runs.

use crate::core::config::CFG_MM_DELAYFREE_MAX;
use crate::core::error::{OsError, OsResult};
use crate::core::kernel::Kernel;

/// Releases one parked token
pub type FreeFn = fn(usize);

/// Ring of tokens waiting to be freed
pub struct DelayFreeList {
    tokens: [usize; CFG_MM_DELAYFREE_MAX],
    head: usize,
    len: usize,
    hook: Option<FreeFn>,
}

impl DelayFreeList {
    pub const fn new() -> Self {
        DelayFreeList {
            tokens: [0; CFG_MM_DELAYFREE_MAX],
            head: 0,
            len: 0,
            hook: None,
        }
    }

    fn push(&mut self, token: usize) -> bool {
        if self.len == CFG_MM_DELAYFREE_MAX {
            return false;
        }
        self.tokens[(self.head + self.len) % CFG_MM_DELAYFREE_MAX] = token;
        self.len += 1;
        true
    }

    fn pop(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        let token = self.tokens[self.head];
        self.head = (self.head + 1) % CFG_MM_DELAYFREE_MAX;
        self.len -= 1;
        Some(token)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for DelayFreeList {
    fn default() -> Self {
        Self::new()
    }
}

impl Kernel {
    /// Install the function that frees parked tokens
    pub fn mm_set_free_hook(&mut self, hook: FreeFn) {
        self.delay_free.hook = Some(hook);
    }

    /// Park a token for worker 0 to free. Callable from an ISR.
    pub fn mm_delay_free(&mut self, token: usize) -> OsResult<()> {
        if !self.delay_free.push(token) {
            crate::warn!("deferred free list full");
            return Err(OsError::NoResources);
        }
        Ok(())
    }

    /// Tokens parked and not yet freed
    #[inline]
    pub fn mm_pending_frees(&self) -> usize {
        self.delay_free.len()
    }

    /// Free every parked token. Tokens stay parked until a hook is set.
    pub(crate) fn mm_gc(&mut self) -> usize {
        let Some(hook) = self.delay_free.hook else {
            return 0;
        };

        let mut n = 0;
        while let Some(token) = self.delay_free.pop() {
            hook(token);
            n += 1;
        }
        if n > 0 {
            crate::trace!("freed {} deferred tokens", n);
        }
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_wraps() {
        let mut list = DelayFreeList::new();
        for round in 0..3 {
            for i in 0..CFG_MM_DELAYFREE_MAX {
                assert!(list.push(round * 100 + i));
            }
            assert!(!list.push(0));
            for i in 0..CFG_MM_DELAYFREE_MAX {
                assert_eq!(list.pop(), Some(round * 100 + i));
            }
            assert!(list.is_empty());
        }
    }
}
