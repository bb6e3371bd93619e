use super::*;

/// Hashes between checks of the restart flag and the cancellation token. The scratchpad
/// read lock is held for one chunk at a time.
const SCAN_CHUNK: u32 = 64;

const IDLE: Duration = Duration::from_millis(100);

pub(crate) struct Worker {
    pub(crate) id: usize,
    pub(crate) ctx: Arc<MiningContext>,
    pub(crate) hasher: Arc<dyn Hasher>,
    pub(crate) config: WorkerConfig,
    pub(crate) solutions: mpsc::UnboundedSender<Solution>,
    pub(crate) cancel: CancellationToken,
}

impl Worker {
    pub(crate) fn run(self) {
        let range = NonceRange::partition(self.id, self.config.threads);
        let mut cursor = NonceCursor::new(range);
        let mut job = None;
        let mut exhausted_logged = false;

        debug!(
            "miner thread {} scanning {:#010x}..{:#010x}",
            self.id, range.start, range.end
        );

        while !self.cancel.is_cancelled() {
            if self.ctx.jobs.snapshot_into(&mut job) {
                cursor.rebase();
                exhausted_logged = false;
            }

            let Some(current) = job.as_ref() else {
                thread::sleep(IDLE);
                continue;
            };

            let max = max_hashes(
                self.config.mode,
                self.config.scantime,
                self.ctx.jobs.age(),
                self.ctx.stats.thread_rate(self.id),
            );

            let Some(batch) = cursor.next_batch(max) else {
                if !exhausted_logged {
                    debug!("miner thread {} exhausted its nonces for job {}", self.id, current.job_id);
                    exhausted_logged = true;
                }
                thread::sleep(IDLE);
                continue;
            };

            let scanned_to = self.scan(current, batch);

            cursor.advance(scanned_to);
        }

        debug!("miner thread {} stopped", self.id);
    }

    /// Hashes `batch` against `job`. Returns the first nonce not tried, which is short of the
    /// batch end when a restart or shutdown interrupted the scan.
    pub(crate) fn scan(&self, job: &Job, batch: Range<u32>) -> u32 {
        let started = Instant::now();
        let mut blob = job.blob.as_bytes().to_vec();
        let mut nonce = batch.start;

        while nonce < batch.end {
            let chunk_end = batch.end.min(nonce.saturating_add(SCAN_CHUNK));

            {
                let scratchpad = self.ctx.scratchpad.read();
                let words = scratchpad.words();

                while nonce < chunk_end {
                    LittleEndian::write_u32(&mut blob[NONCE_OFFSET..NONCE_OFFSET + 4], nonce);

                    let hash = self.hasher.hash(words, &blob);

                    if job.target.is_met_by(&hash) {
                        self.found(job, &blob, hash);
                    }

                    nonce += 1;
                }
            }

            if self.ctx.take_restart(self.id) || self.cancel.is_cancelled() {
                break;
            }
        }

        self.ctx.stats.record_scan(
            self.id,
            u64::from(nonce - batch.start),
            started.elapsed(),
        );

        nonce
    }

    fn found(&self, job: &Job, blob: &[u8], hash: [u8; 32]) {
        let solution = Solution {
            job_id: job.job_id.clone(),
            nonce: hex::encode(&blob[NONCE_OFFSET..NONCE_OFFSET + NONCE_SIZE]),
            result: Hash32::from(hash),
        };

        debug!(
            "miner thread {} found nonce {} for job {}",
            self.id, solution.nonce, solution.job_id
        );

        if self.solutions.send(solution).is_err() {
            warn!("Submission queue closed, dropping share for job {}", job.job_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    /// Puts the little-endian nonce into the top word, so a target of N accepts nonces <= N.
    struct NonceHasher;

    impl Hasher for NonceHasher {
        fn hash(&self, _scratchpad: &[u64], blob: &[u8]) -> [u8; 32] {
            let mut hash = [0xff; 32];
            hash[28..32].copy_from_slice(&blob[NONCE_OFFSET..NONCE_OFFSET + 4]);
            hash
        }
    }

    fn job(job_id: &str, target: u32) -> Job {
        Job {
            job_id: job_id.into(),
            blob: Blob::new(vec![0x55; 76]).unwrap(),
            target: Target::from(target),
        }
    }

    fn worker(threads: usize) -> (Worker, mpsc::UnboundedReceiver<Solution>) {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut store = ScratchpadStore::new(64, 4);
        store
            .replace(
                (0..16).collect(),
                HeightInfo {
                    height: 1,
                    block_id: Hash32::ZERO,
                },
            )
            .unwrap();

        (
            Worker {
                id: 0,
                ctx: Arc::new(MiningContext::new(store, threads)),
                hasher: Arc::new(NonceHasher),
                config: WorkerConfig {
                    threads,
                    scantime: Duration::from_secs(5),
                    mode: ScanMode::Stratum,
                },
                solutions: tx,
                cancel: CancellationToken::new(),
            },
            rx,
        )
    }

    #[test]
    fn scan_reports_solutions_with_full_nonce_field() {
        let (worker, mut rx) = worker(1);

        assert_eq!(worker.scan(&job("1", 3), 0..10), 10);

        let nonces = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|solution| solution.nonce)
            .collect::<Vec<String>>();

        assert_eq!(
            nonces,
            [
                "0000000055555555",
                "0100000055555555",
                "0200000055555555",
                "0300000055555555",
            ]
        );

        assert_eq!(worker.ctx.stats.total_hashes(), 10);
    }

    #[test]
    fn restart_interrupts_scan_at_chunk_boundary() {
        let (worker, _rx) = worker(1);

        worker.ctx.restart_workers();

        assert_eq!(worker.scan(&job("1", 0), 0..1000), SCAN_CHUNK);
        assert!(!worker.ctx.take_restart(0));
    }

    #[test]
    fn cancel_interrupts_scan() {
        let (worker, _rx) = worker(1);
        worker.cancel.cancel();
        assert_eq!(worker.scan(&job("1", 0), 500..1000), 500 + SCAN_CHUNK);
    }

    #[test]
    fn new_job_rebases_cursor() {
        let (worker, _rx) = worker(4);
        let range = NonceRange::partition(0, 4);
        let mut cursor = NonceCursor::new(range);
        let mut local = None;

        worker.ctx.jobs.set(job("a", 0));
        assert!(worker.ctx.jobs.snapshot_into(&mut local));
        cursor.rebase();

        let batch = cursor.next_batch(500).unwrap();
        let reached = worker.scan(local.as_ref().unwrap(), batch);
        cursor.advance(reached);
        assert_eq!(cursor.next(), 500);

        assert!(!worker.ctx.jobs.snapshot_into(&mut local));
        assert_eq!(cursor.next_batch(500), Some(500..1000));

        worker.ctx.jobs.set(job("b", 0));
        assert!(worker.ctx.jobs.snapshot_into(&mut local));
        cursor.rebase();

        assert_eq!(local.unwrap().job_id, "b");
        assert_eq!(cursor.next_batch(500), Some(range.start..range.start + 500));
    }
}
