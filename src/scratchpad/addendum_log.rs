use super::*;

/// Enough to undo one addendum: the height before it and how many words it added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddendumEntry {
    pub prev: ScratchpadHeight,
    pub patch_word_count: usize,
}

impl AddendumEntry {
    pub fn is_empty(&self) -> bool {
        self.prev.is_empty()
    }
}

/// Fixed-size journal of the most recent addendums, oldest first. Once full, recording a
/// new entry forgets the oldest one and with it the ability to rewind that far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddendumLog {
    slots: Vec<AddendumEntry>,
}

impl AddendumLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![AddendumEntry::default(); capacity.max(1)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(AddendumEntry::is_empty)
    }

    pub fn record(&mut self, prev: ScratchpadHeight, patch_word_count: usize) {
        let entry = AddendumEntry {
            prev,
            patch_word_count,
        };

        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_empty()) {
            *slot = entry;
            return;
        }

        self.slots.rotate_left(1);

        if let Some(last) = self.slots.last_mut() {
            *last = entry;
        }
    }

    pub fn pop_newest(&mut self) -> Option<AddendumEntry> {
        let slot = self.slots.iter_mut().rev().find(|slot| !slot.is_empty())?;
        Some(std::mem::take(slot))
    }

    /// Occupied entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &AddendumEntry> {
        self.slots.iter().filter(|slot| !slot.is_empty())
    }

    pub(crate) fn slots(&self) -> &[AddendumEntry] {
        &self.slots
    }

    /// Rebuilds a journal from persisted slots, keeping the newest entries if there are more
    /// than fit.
    pub(crate) fn from_slots(capacity: usize, slots: Vec<AddendumEntry>) -> Self {
        let mut log = Self::new(capacity);

        for entry in slots.into_iter().filter(|entry| !entry.is_empty()) {
            log.record(entry.prev, entry.patch_word_count);
        }

        log
    }

    pub fn clear(&mut self) {
        self.slots.fill(AddendumEntry::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn height(height: u64) -> ScratchpadHeight {
        ScratchpadHeight {
            height,
            prevhash: Hash32::from([height as u8; 32]),
        }
    }

    fn heights(log: &AddendumLog) -> Vec<u64> {
        log.entries().map(|entry| entry.prev.height).collect()
    }

    #[test]
    fn fills_first_empty_slot() {
        let mut log = AddendumLog::new(3);
        assert!(log.is_empty());

        log.record(height(1), 4);
        log.record(height(2), 8);

        assert_eq!(heights(&log), vec![1, 2]);
        assert_eq!(log.len(), 2);
        assert!(log.slots()[2].is_empty());
    }

    #[test]
    fn full_log_evicts_oldest() {
        let mut log = AddendumLog::new(3);

        for h in 1..=5 {
            log.record(height(h), 4);
        }

        assert_eq!(heights(&log), vec![3, 4, 5]);
        assert_eq!(log.capacity(), 3);
    }

    #[test]
    fn pop_newest_clears_slot() {
        let mut log = AddendumLog::new(3);
        log.record(height(1), 4);
        log.record(height(2), 12);

        let entry = log.pop_newest().unwrap();
        assert_eq!(entry.prev, height(2));
        assert_eq!(entry.patch_word_count, 12);
        assert_eq!(heights(&log), vec![1]);

        log.record(height(7), 4);
        assert_eq!(heights(&log), vec![1, 7]);

        log.pop_newest();
        log.pop_newest();
        assert_eq!(log.pop_newest(), None);
    }

    #[test]
    fn rebuild_keeps_newest() {
        let slots = (1..=5)
            .map(|h| AddendumEntry {
                prev: height(h),
                patch_word_count: 4,
            })
            .collect();

        let log = AddendumLog::from_slots(2, slots);
        assert_eq!(heights(&log), vec![4, 5]);
    }

    #[test]
    fn zero_capacity_still_holds_one() {
        let mut log = AddendumLog::new(0);
        log.record(height(1), 4);
        log.record(height(2), 4);
        assert_eq!(heights(&log), vec![2]);
    }
}
