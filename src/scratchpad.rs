use {super::*, snafu::ensure};

pub use {
    addendum_log::{AddendumEntry, AddendumLog},
    cache::{CACHE_EXPIRATION, CacheError},
};

mod addendum_log;
mod cache;

/// Hard ceiling on scratchpad growth, in words (256 MiB).
pub const SCRATCHPAD_CAPACITY_WORDS: usize = 1 << 25;

pub const ADDENDUM_LOG_CAPACITY: usize = 60;

/// Version of the scratchpad: the height it has been patched up to and the id of the block
/// that produced it. Height zero means nothing has been loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScratchpadHeight {
    pub height: u64,
    pub prevhash: Hash32,
}

impl ScratchpadHeight {
    pub const EMPTY: Self = Self {
        height: 0,
        prevhash: Hash32::ZERO,
    };

    pub fn is_empty(&self) -> bool {
        self.height == 0
    }
}

impl From<HeightInfo> for ScratchpadHeight {
    fn from(hi: HeightInfo) -> Self {
        Self {
            height: hi.height,
            prevhash: hi.block_id,
        }
    }
}

impl fmt::Display for ScratchpadHeight {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.height)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ScratchpadError {
    #[snafu(display(
        "scratchpad capacity exceeded: {size} + {count} words > {capacity} words"
    ))]
    CapacityExceeded {
        size: usize,
        count: usize,
        capacity: usize,
    },

    #[snafu(display("patch of {count} words is not a whole number of quads"))]
    Misaligned { count: usize },

    #[snafu(display("cannot patch an empty scratchpad"))]
    Empty,

    #[snafu(display("cannot roll back {count} words from a scratchpad of {size} words"))]
    Rollback { count: usize, size: usize },
}

impl ScratchpadError {
    /// Capacity exhaustion is a deployment problem and must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResyncReason {
    Gap { current: u64, incoming: u64 },
    PrevhashMismatch { height: u64 },
}

impl fmt::Display for ResyncReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gap { current, incoming } => {
                write!(f, "addendum for height {incoming} does not follow height {current}")
            }
            Self::PrevhashMismatch { height } => {
                write!(f, "addendum for height {height} chains to an unknown block")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddendumOutcome {
    Applied { from: u64, to: u64, words: usize },
    Stale { incoming: u64, current: u64 },
    Resync(ResyncReason),
}

/// The scratchpad words together with their height and the journal needed to undo recent
/// patches. All three change together.
#[derive(Debug)]
pub struct ScratchpadStore {
    words: Vec<u64>,
    capacity: usize,
    height: ScratchpadHeight,
    log: AddendumLog,
    needs_resync: bool,
}

impl Default for ScratchpadStore {
    fn default() -> Self {
        Self::new(SCRATCHPAD_CAPACITY_WORDS, ADDENDUM_LOG_CAPACITY)
    }
}

impl ScratchpadStore {
    pub fn new(capacity: usize, log_capacity: usize) -> Self {
        Self {
            words: Vec::new(),
            capacity,
            height: ScratchpadHeight::EMPTY,
            log: AddendumLog::new(log_capacity),
            needs_resync: false,
        }
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn size(&self) -> usize {
        self.words.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn height(&self) -> ScratchpadHeight {
        self.height
    }

    pub fn log(&self) -> &AddendumLog {
        &self.log
    }

    pub fn needs_resync(&self) -> bool {
        self.needs_resync
    }

    pub fn mark_needs_resync(&mut self) {
        self.needs_resync = true;
    }

    /// The height info to send with `getjob`, if there is one.
    pub fn height_info(&self) -> Option<HeightInfo> {
        (!self.height.is_empty()).then_some(HeightInfo {
            height: self.height.height,
            block_id: self.height.prevhash,
        })
    }

    /// XOR-mixes each quad of `patch` into the existing words, then appends the patch.
    /// Either everything happens or nothing does.
    pub fn apply_patch(&mut self, patch: &[u64]) -> Result<(), ScratchpadError> {
        ensure!(
            patch.len() % QUAD_WORDS == 0,
            MisalignedSnafu { count: patch.len() }
        );

        if patch.is_empty() {
            return Ok(());
        }

        ensure!(!self.words.is_empty(), EmptySnafu);

        ensure!(
            self.words.len() + patch.len() <= self.capacity,
            CapacityExceededSnafu {
                size: self.words.len(),
                count: patch.len(),
                capacity: self.capacity,
            }
        );

        mix(&mut self.words, patch);

        self.words.extend_from_slice(patch);

        Ok(())
    }

    /// Undoes the newest patch described by `entry`. The tail of the buffer is the patch
    /// itself, so mixing it into the words before it again cancels the original XOR.
    pub fn rollback_patch(&mut self, entry: AddendumEntry) -> Result<(), ScratchpadError> {
        let count = entry.patch_word_count;
        let size = self.words.len();

        ensure!(
            count % QUAD_WORDS == 0 && count < size,
            RollbackSnafu { count, size }
        );

        let base = size - count;

        let (head, tail) = self.words.split_at_mut(base);
        mix(head, tail);

        self.words.truncate(base);
        self.height = entry.prev;

        Ok(())
    }

    /// Rewinds every journaled patch, newest first. Returns how many were undone.
    pub fn rollback_all(&mut self) -> Result<usize, ScratchpadError> {
        let mut undone = 0;

        while let Some(entry) = self.log.pop_newest() {
            self.rollback_patch(entry)?;
            undone += 1;
        }

        Ok(undone)
    }

    /// Applies an addendum if it is the direct successor of the current height, skips it
    /// if it is old news, and otherwise rewinds the journal and flags a resync.
    pub fn apply_addendum(
        &mut self,
        addendum: &Addendum,
    ) -> Result<AddendumOutcome, ScratchpadError> {
        let incoming = addendum.hi.height;
        let current = self.height.height;

        if incoming <= current {
            return Ok(AddendumOutcome::Stale { incoming, current });
        }

        if incoming > current + 1 {
            return self.resync(ResyncReason::Gap { current, incoming });
        }

        if addendum.prev_id != self.height.prevhash {
            return self.resync(ResyncReason::PrevhashMismatch { height: incoming });
        }

        let words = addendum.addm.as_slice();

        let previous = self.height;

        self.apply_patch(words)?;

        self.log.record(previous, words.len());
        self.height = addendum.hi.into();

        Ok(AddendumOutcome::Applied {
            from: current,
            to: incoming,
            words: words.len(),
        })
    }

    fn resync(&mut self, reason: ResyncReason) -> Result<AddendumOutcome, ScratchpadError> {
        let undone = self.rollback_all()?;

        warn!(
            "Scratchpad out of sync ({reason}), rolled back {undone} addendums to height {}",
            self.height
        );

        self.needs_resync = true;

        Ok(AddendumOutcome::Resync(reason))
    }

    /// Installs a freshly downloaded scratchpad, dropping the journal.
    pub fn replace(&mut self, words: Vec<u64>, hi: HeightInfo) -> Result<(), ScratchpadError> {
        ensure!(
            words.len() % QUAD_WORDS == 0,
            MisalignedSnafu { count: words.len() }
        );

        ensure!(
            words.len() <= self.capacity,
            CapacityExceededSnafu {
                size: 0usize,
                count: words.len(),
                capacity: self.capacity,
            }
        );

        self.words = words;
        self.height = hi.into();
        self.log.clear();
        self.needs_resync = false;

        Ok(())
    }
}

fn mix(buffer: &mut [u64], patch: &[u64]) {
    let quads = (buffer.len() / QUAD_WORDS) as u64;

    for quad in patch.chunks_exact(QUAD_WORDS) {
        let index = (quad[0] % quads) as usize * QUAD_WORDS;

        for (word, mask) in buffer[index..index + QUAD_WORDS].iter_mut().zip(quad) {
            *word ^= mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    fn block_id(height: u64) -> Hash32 {
        let mut bytes = [0; 32];
        bytes[..8].copy_from_slice(&height.to_le_bytes());
        bytes[31] = 0xaa;
        Hash32::from(bytes)
    }

    fn hi(height: u64) -> HeightInfo {
        HeightInfo {
            height,
            block_id: block_id(height),
        }
    }

    fn patch(seed: u64, quads: usize) -> Vec<u64> {
        (0..quads as u64 * 4)
            .map(|i| seed.wrapping_mul(0x9e37_79b9_7f4a_7c15).wrapping_add(i * 7919))
            .collect()
    }

    fn addendum(height: u64, words: Vec<u64>) -> Addendum {
        Addendum {
            hi: hi(height),
            prev_id: block_id(height - 1),
            addm: words.into(),
        }
    }

    fn store_at(height: u64, log_capacity: usize) -> ScratchpadStore {
        let mut store = ScratchpadStore::new(1 << 12, log_capacity);
        store.replace((0..64).collect(), hi(height)).unwrap();
        store
    }

    #[test]
    fn apply_mixes_then_appends() {
        let mut store = ScratchpadStore::new(64, 4);
        store.replace(vec![0; 8], hi(1)).unwrap();

        store.apply_patch(&[3, 10, 20, 30]).unwrap();

        // 3 % 2 quads selects the second quad.
        assert_eq!(store.words(), &[0, 0, 0, 0, 3, 10, 20, 30, 3, 10, 20, 30]);
    }

    #[test]
    fn misaligned_patch_rejected() {
        let mut store = store_at(1, 4);
        assert!(matches!(
            store.apply_patch(&[1, 2, 3]),
            Err(ScratchpadError::Misaligned { count: 3 })
        ));
        assert_eq!(store.size(), 64);
    }

    #[test]
    fn empty_store_cannot_be_patched() {
        let mut store = ScratchpadStore::new(64, 4);
        assert!(matches!(
            store.apply_patch(&[1, 2, 3, 4]),
            Err(ScratchpadError::Empty)
        ));
        assert!(store.apply_patch(&[]).is_ok());
    }

    #[test]
    fn apply_then_rollback_restores_everything() {
        let mut store = store_at(10, 8);
        let original = store.words().to_vec();
        let original_height = store.height();

        for height in 11..=18 {
            let outcome = store
                .apply_addendum(&addendum(height, patch(height, height as usize % 3 + 1)))
                .unwrap();
            assert!(matches!(outcome, AddendumOutcome::Applied { .. }));
        }

        assert_eq!(store.height().height, 18);
        assert_ne!(store.words(), original.as_slice());

        assert_eq!(store.rollback_all().unwrap(), 8);
        assert_eq!(store.words(), original.as_slice());
        assert_eq!(store.height(), original_height);
    }

    #[test]
    fn rollback_in_steps_walks_back_through_heights() {
        let mut store = store_at(1, 4);
        let mut snapshots = vec![(store.words().to_vec(), store.height())];

        for height in 2..=4 {
            store
                .apply_addendum(&addendum(height, patch(height * 31, 2)))
                .unwrap();
            snapshots.push((store.words().to_vec(), store.height()));
        }

        snapshots.pop();

        while let Some(entry) = store.log.pop_newest() {
            store.rollback_patch(entry).unwrap();
            let (words, height) = snapshots.pop().unwrap();
            assert_eq!(store.words(), words.as_slice());
            assert_eq!(store.height(), height);
        }
    }

    #[test]
    fn same_addendum_twice_is_skipped() {
        let mut store = store_at(5, 4);
        let next = addendum(6, patch(6, 2));

        store.apply_addendum(&next).unwrap();
        let words = store.words().to_vec();
        let log = store.log().clone();

        assert_eq!(
            store.apply_addendum(&next).unwrap(),
            AddendumOutcome::Stale {
                incoming: 6,
                current: 6
            }
        );
        assert_eq!(store.words(), words.as_slice());
        assert_eq!(store.log(), &log);
        assert!(!store.needs_resync());
    }

    #[test]
    fn gap_rolls_back_and_requests_resync() {
        let mut store = store_at(5, 4);
        let base = store.words().to_vec();

        store.apply_addendum(&addendum(6, patch(6, 1))).unwrap();
        store.apply_addendum(&addendum(7, patch(7, 1))).unwrap();

        assert_eq!(
            store.apply_addendum(&addendum(10, patch(10, 1))).unwrap(),
            AddendumOutcome::Resync(ResyncReason::Gap {
                current: 7,
                incoming: 10
            })
        );

        assert_eq!(store.words(), base.as_slice());
        assert_eq!(store.height().height, 5);
        assert!(store.log().is_empty());
        assert!(store.needs_resync());
    }

    #[test]
    fn prevhash_mismatch_requests_resync() {
        let mut store = store_at(5, 4);
        store.apply_addendum(&addendum(6, patch(6, 1))).unwrap();

        let mut forked = addendum(7, patch(7, 1));
        forked.prev_id = Hash32::from([0xee; 32]);

        assert_eq!(
            store.apply_addendum(&forked).unwrap(),
            AddendumOutcome::Resync(ResyncReason::PrevhashMismatch { height: 7 })
        );
        assert_eq!(store.height().height, 5);
        assert!(store.needs_resync());
    }

    #[test]
    fn capacity_boundary_is_strict() {
        let mut store = ScratchpadStore::new(16, 4);
        store.replace(vec![1; 8], hi(1)).unwrap();

        store.apply_addendum(&addendum(2, patch(2, 2))).unwrap();
        assert_eq!(store.size(), 16);

        let words = store.words().to_vec();
        let height = store.height();

        let err = store
            .apply_addendum(&addendum(3, patch(3, 1)))
            .unwrap_err();

        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "scratchpad capacity exceeded: 16 + 4 words > 16 words"
        );
        assert_eq!(store.words(), words.as_slice());
        assert_eq!(store.height(), height);
        assert_eq!(store.log().len(), 1);
    }

    #[test]
    fn height_six_evicts_oldest_journal_entry() {
        let mut store = store_at(2, 3);

        for height in 3..=5 {
            store
                .apply_addendum(&addendum(height, patch(height, 1)))
                .unwrap();
        }

        assert_eq!(
            store
                .log()
                .entries()
                .map(|entry| entry.prev.height + 1)
                .collect::<Vec<u64>>(),
            vec![3, 4, 5]
        );

        let size = store.size();
        let quads = (size / 4) as u64;
        let words = patch(6, 2);
        let targets = [words[0] % quads, words[4] % quads];

        let mut expected = store.words().to_vec();
        for (quad, target) in words.chunks(4).zip(targets) {
            for (i, word) in quad.iter().enumerate() {
                expected[target as usize * 4 + i] ^= word;
            }
        }
        expected.extend_from_slice(&words);

        assert_eq!(
            store.apply_addendum(&addendum(6, words)).unwrap(),
            AddendumOutcome::Applied {
                from: 5,
                to: 6,
                words: 8
            }
        );

        assert_eq!(store.size(), size + 8);
        assert_eq!(store.words(), expected.as_slice());
        assert_eq!(store.height(), ScratchpadHeight::from(hi(6)));
        assert_eq!(
            store
                .log()
                .entries()
                .map(|entry| entry.prev.height + 1)
                .collect::<Vec<u64>>(),
            vec![4, 5, 6]
        );
    }

    #[test]
    fn replace_resets_journal_and_resync_flag() {
        let mut store = store_at(1, 4);
        store.apply_addendum(&addendum(2, patch(2, 1))).unwrap();
        store.mark_needs_resync();

        store.replace(vec![9; 32], hi(40)).unwrap();

        assert_eq!(store.size(), 32);
        assert_eq!(store.height().height, 40);
        assert!(store.log().is_empty());
        assert!(!store.needs_resync());
    }

    #[test]
    fn height_info_only_when_loaded() {
        assert_eq!(ScratchpadStore::new(16, 1).height_info(), None);
        assert_eq!(store_at(3, 1).height_info(), Some(hi(3)));
    }
}
