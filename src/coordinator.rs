use {
    super::*,
    nonce_range::{NonceCursor, max_hashes},
    worker::Worker,
};

pub use nonce_range::{NONCE_MARGIN, NonceRange};

mod nonce_range;
mod worker;

/// Scan horizon when the pool pushes new work (Stratum or long-poll).
pub const LP_SCANTIME: Duration = Duration::from_secs(60);

/// Batch size used until a worker has measured its own hash rate.
pub const FALLBACK_MAX_HASHES: u64 = 0x1f_ffff;

/// How fresh work reaches the workers, which decides how long a batch may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Jobs are pushed over a persistent connection whenever the pool has them.
    Stratum,
    /// A `getjob` long-poll is expected to return new work within `LP_SCANTIME` of the last.
    LongPoll,
    /// The job is re-fetched every `scantime`.
    Polled,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerConfig {
    pub threads: usize,
    pub scantime: Duration,
    pub mode: ScanMode,
}

/// A nonce whose hash met the job target, ready to be submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub job_id: String,
    pub nonce: String,
    pub result: Hash32,
}

/// Owns the hashing threads. Workers stop when `cancel` fires.
pub struct WorkerCoordinator {
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerCoordinator {
    pub fn spawn(
        ctx: Arc<MiningContext>,
        hasher: Arc<dyn Hasher>,
        config: WorkerConfig,
        solutions: mpsc::UnboundedSender<Solution>,
        cancel: CancellationToken,
    ) -> io::Result<Self> {
        info!("Starting {} miner threads", config.threads);

        let mut handles = Vec::with_capacity(config.threads);

        for id in 0..config.threads {
            let worker = Worker {
                id,
                ctx: ctx.clone(),
                hasher: hasher.clone(),
                config,
                solutions: solutions.clone(),
                cancel: cancel.clone(),
            };

            let handle = thread::Builder::new()
                .name(format!("miner-{id}"))
                .spawn(move || worker.run());

            match handle {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    cancel.cancel();
                    Self { handles }.join();
                    return Err(err);
                }
            }
        }

        Ok(Self { handles })
    }

    pub fn threads(&self) -> usize {
        self.handles.len()
    }

    pub fn join(self) {
        for handle in self.handles {
            if let Err(panic) = handle.join() {
                error!("Miner thread panicked: {panic:?}");
            }
        }
    }
}
