use super::*;

/// Nonces left untouched at the end of every partition.
pub const NONCE_MARGIN: u32 = 0x20;

/// One worker's slice `[start, end)` of the 32-bit nonce space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    pub start: u32,
    pub end: u32,
}

impl NonceRange {
    pub fn partition(id: usize, threads: usize) -> Self {
        let threads = threads.max(1) as u32;
        let stride = u32::MAX / threads;
        let start = stride * id as u32;

        Self {
            start,
            end: (start + stride).saturating_sub(NONCE_MARGIN).max(start),
        }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A worker's position inside its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceCursor {
    range: NonceRange,
    next: u32,
}

impl NonceCursor {
    pub fn new(range: NonceRange) -> Self {
        Self {
            range,
            next: range.start,
        }
    }

    pub fn next(&self) -> u32 {
        self.next
    }

    /// Back to the start of the partition, for a job the worker has not scanned yet.
    pub fn rebase(&mut self) {
        self.next = self.range.start;
    }

    /// The next batch of at most `max` nonces, or `None` once the partition is exhausted.
    pub fn next_batch(&self, max: u64) -> Option<Range<u32>> {
        if self.next >= self.range.end {
            return None;
        }

        let end = (u64::from(self.next) + max.max(1)).min(u64::from(self.range.end)) as u32;

        Some(self.next..end)
    }

    /// Records that every nonce below `to` has been tried.
    pub fn advance(&mut self, to: u32) {
        self.next = to.clamp(self.next, self.range.end);
    }
}

/// How many hashes the next batch may take: enough to fill the time left before fresh work
/// is expected, at the rate this worker last measured. Stratum pushes work at any moment, so
/// its horizon does not shrink with the job's age.
pub fn max_hashes(mode: ScanMode, scantime: Duration, job_age: Duration, rate: HashRate) -> u64 {
    let budget = match mode {
        ScanMode::Stratum => LP_SCANTIME.as_secs_f64(),
        ScanMode::LongPoll => LP_SCANTIME.as_secs_f64() - job_age.as_secs_f64(),
        ScanMode::Polled => scantime.as_secs_f64() - job_age.as_secs_f64(),
    };

    let hashes = rate.hashes_in(budget);

    if hashes.is_finite() && hashes >= 1.0 {
        hashes as u64
    } else {
        FALLBACK_MAX_HASHES
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_are_disjoint_and_cover_the_space() {
        for threads in [1, 2, 3, 4, 7, 16, 64, 9999] {
            let ranges = (0..threads)
                .map(|id| NonceRange::partition(id, threads))
                .collect::<Vec<NonceRange>>();

            assert_eq!(ranges[0].start, 0);

            let stride = u32::MAX / threads as u32;

            for (id, range) in ranges.iter().enumerate() {
                assert_eq!(range.start, stride * id as u32);
                assert_eq!(range.len(), stride - NONCE_MARGIN);
            }

            for pair in ranges.windows(2) {
                assert_eq!(pair[1].start - pair[0].end, NONCE_MARGIN, "{threads} threads");
            }

            let last = ranges[threads - 1];
            assert!(last.end <= u32::MAX);
            assert!(u32::MAX - last.end < NONCE_MARGIN + threads as u32);
        }
    }

    #[test]
    fn single_thread_gets_almost_everything() {
        assert_eq!(
            NonceRange::partition(0, 1),
            NonceRange {
                start: 0,
                end: u32::MAX - NONCE_MARGIN,
            }
        );
    }

    #[test]
    fn cursor_walks_its_partition() {
        let range = NonceRange { start: 100, end: 110 };
        let mut cursor = NonceCursor::new(range);

        assert_eq!(cursor.next_batch(4), Some(100..104));
        cursor.advance(104);
        assert_eq!(cursor.next_batch(4), Some(104..108));
        cursor.advance(108);
        assert_eq!(cursor.next_batch(4), Some(108..110));
        cursor.advance(110);
        assert_eq!(cursor.next_batch(4), None);

        cursor.rebase();
        assert_eq!(cursor.next(), 100);
    }

    #[test]
    fn cursor_never_moves_backwards_or_past_the_end() {
        let mut cursor = NonceCursor::new(NonceRange { start: 0, end: 10 });
        cursor.advance(6);
        cursor.advance(3);
        assert_eq!(cursor.next(), 6);
        cursor.advance(50);
        assert_eq!(cursor.next(), 10);
    }

    #[test]
    fn zero_budget_still_makes_progress() {
        let cursor = NonceCursor::new(NonceRange { start: 5, end: 10 });
        assert_eq!(cursor.next_batch(0), Some(5..6));
    }

    #[test]
    fn budget_follows_scan_mode() {
        let rate = HashRate(1000.0);

        assert_eq!(
            max_hashes(ScanMode::Stratum, Duration::from_secs(5), Duration::ZERO, rate),
            60_000
        );
        assert_eq!(
            max_hashes(
                ScanMode::Stratum,
                Duration::from_secs(5),
                Duration::from_secs(50),
                rate
            ),
            60_000
        );
        assert_eq!(
            max_hashes(ScanMode::Polled, Duration::from_secs(5), Duration::from_secs(2), rate),
            3000
        );
    }

    #[test]
    fn long_poll_budget_shrinks_with_job_age() {
        let rate = HashRate(1000.0);
        let scantime = Duration::from_secs(5);

        let fresh = max_hashes(ScanMode::LongPoll, scantime, Duration::ZERO, rate);
        let aged = max_hashes(ScanMode::LongPoll, scantime, Duration::from_secs(45), rate);

        assert_eq!(fresh, 60_000);
        assert_eq!(aged, 15_000);

        assert_eq!(
            max_hashes(
                ScanMode::LongPoll,
                scantime,
                LP_SCANTIME + Duration::from_secs(1),
                rate
            ),
            FALLBACK_MAX_HASHES
        );
    }

    #[test]
    fn budget_falls_back_when_empty() {
        assert_eq!(
            max_hashes(
                ScanMode::Polled,
                Duration::from_secs(5),
                Duration::from_secs(9),
                HashRate(1000.0)
            ),
            FALLBACK_MAX_HASHES
        );
        assert_eq!(
            max_hashes(ScanMode::Stratum, Duration::from_secs(5), Duration::ZERO, HashRate::ZERO),
            FALLBACK_MAX_HASHES
        );
    }
}
