//! Bounded fault ledgers.
//!
//! Each subsystem that talks to hardware keeps a small overwrite-oldest
//! ring of the faults it has seen, plus a saturating lifetime counter.
//! The ring never indexes outside its storage and never loses the most
//! recent entries; when full, the oldest entry is dropped.

use heapless::Deque;

/// Fixed-capacity fault ring with a saturating total count.
///
/// `T` is expected to be a small `Copy` enum (a fault code).
#[derive(Debug, Default)]
pub struct FaultLog<T: Copy, const N: usize> {
    entries: Deque<T, N>,
    total: u32,
}

impl<T: Copy, const N: usize> FaultLog<T, N> {
    pub fn new() -> Self {
        Self {
            entries: Deque::new(),
            total: 0,
        }
    }

    /// Record a fault, dropping the oldest entry if the ring is full.
    pub fn record(&mut self, fault: T) {
        if self.entries.is_full() {
            let _ = self.entries.pop_front();
        }
        // Cannot fail: a slot was just freed if the ring was full.
        let _ = self.entries.push_back(fault);
        self.total = self.total.saturating_add(1);
    }

    /// Most recent fault, if any.
    pub fn latest(&self) -> Option<T> {
        self.entries.back().copied()
    }

    /// Number of entries currently held (<= N).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lifetime fault count (saturating).
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Iterate oldest-first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let mut log: FaultLog<u8, 4> = FaultLog::new();
        log.record(1);
        log.record(2);
        log.record(3);
        assert_eq!(log.len(), 3);
        assert_eq!(log.latest(), Some(3));
        let seen: Vec<u8> = log.iter().copied().collect();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut log: FaultLog<u8, 4> = FaultLog::new();
        for i in 0..10u8 {
            log.record(i);
        }
        assert_eq!(log.len(), 4, "ring must never exceed capacity");
        let seen: Vec<u8> = log.iter().copied().collect();
        assert_eq!(seen, vec![6, 7, 8, 9], "oldest entries are dropped first");
        assert_eq!(log.total(), 10, "total counts every record");
    }

    #[test]
    fn total_saturates() {
        let mut log: FaultLog<u8, 2> = FaultLog::new();
        log.total = u32::MAX - 1;
        log.record(0);
        log.record(0);
        log.record(0);
        assert_eq!(log.total(), u32::MAX, "total must saturate, not wrap");
    }

    #[test]
    fn clear_keeps_total() {
        let mut log: FaultLog<u8, 4> = FaultLog::new();
        log.record(7);
        log.clear();
        assert!(log.is_empty());
        assert_eq!(log.total(), 1);
    }
}
