//! Priority bitmap management for O(1) highest-ready lookup
//!
//! One bit per priority level; bit `p % 32` of word `p / 32` is set while
//! at least one task is ready at priority `p`. The highest set bit wins, so
//! the lookup scans words from the top and uses the CLZ instruction.

use crate::core::config::{CFG_PRIO_IDLE, CFG_PRIO_MAX};
use crate::core::types::OsPrio;

/// Number of words needed for the priority bitmap
const PRIO_TBL_SIZE: usize = (CFG_PRIO_MAX + 31) / 32;

/// Priority bitmap table
pub struct PrioTable {
    bitmap: [u32; PRIO_TBL_SIZE],
}

impl PrioTable {
    pub const fn new() -> Self {
        PrioTable {
            bitmap: [0; PRIO_TBL_SIZE],
        }
    }

    pub fn init(&mut self) {
        for word in self.bitmap.iter_mut() {
            *word = 0;
        }
    }

    #[inline(always)]
    fn locate(prio: OsPrio) -> (usize, u32) {
        ((prio / 32) as usize, 1 << (prio % 32))
    }

    /// Insert a priority into the bitmap
    #[inline]
    pub fn insert(&mut self, prio: OsPrio) {
        let (word, bit) = Self::locate(prio);
        self.bitmap[word] |= bit;
    }

    /// Remove a priority from the bitmap
    #[inline]
    pub fn remove(&mut self, prio: OsPrio) {
        let (word, bit) = Self::locate(prio);
        self.bitmap[word] &= !bit;
    }

    /// Get the highest priority with a ready task, idle when empty
    #[inline]
    pub fn get_highest(&self) -> OsPrio {
        for (idx, &word) in self.bitmap.iter().enumerate().rev() {
            if word != 0 {
                return (idx * 32 + 31 - word.leading_zeros() as usize) as OsPrio;
            }
        }
        CFG_PRIO_IDLE
    }

    /// Check if a specific priority has any ready tasks
    #[inline]
    pub fn is_set(&self, prio: OsPrio) -> bool {
        let (word, bit) = Self::locate(prio);
        self.bitmap[word] & bit != 0
    }

    /// Check if the priority table is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bitmap.iter().all(|&w| w == 0)
    }
}

impl Default for PrioTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_table() {
        let table = PrioTable::new();
        assert!(table.is_empty());
        assert_eq!(table.get_highest(), CFG_PRIO_IDLE);
    }

    #[test]
    fn test_insert_remove() {
        let mut table = PrioTable::new();

        table.insert(5);
        assert!(table.is_set(5));
        assert!(!table.is_set(4));
        assert_eq!(table.get_highest(), 5);

        table.insert(3);
        assert_eq!(table.get_highest(), 5);

        table.remove(5);
        assert_eq!(table.get_highest(), 3);

        table.remove(3);
        assert!(table.is_empty());
    }

    #[test]
    fn test_word_boundaries() {
        let mut table = PrioTable::new();

        table.insert(31);
        table.insert(32);
        assert_eq!(table.get_highest(), 32);

        table.remove(32);
        assert_eq!(table.get_highest(), 31);

        table.insert(255);
        assert_eq!(table.get_highest(), 255);
    }
}
