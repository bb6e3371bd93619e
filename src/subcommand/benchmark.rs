use {
    super::*,
    anyhow::{Context, ensure},
    rand::{Rng, SeedableRng, rngs::StdRng},
};

const DEFAULT_SCRATCHPAD_WORDS: usize = 1 << 22;

#[derive(Debug, Parser)]
pub(crate) struct Benchmark {
    #[arg(long, help = "Stop after <DURATION> seconds instead of waiting for Ctrl-C.")]
    duration: Option<u64>,
    #[arg(
        long,
        default_value_t = DEFAULT_SCRATCHPAD_WORDS,
        help = "Hash against a random scratchpad of <SCRATCHPAD_WORDS> words."
    )]
    scratchpad_words: usize,
    #[arg(long, default_value_t = 0, help = "Seed the random scratchpad with <SEED>.")]
    seed: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct Report {
    pub(crate) threads: usize,
    pub(crate) seconds: f64,
    pub(crate) hashes: u64,
    pub(crate) hashrate: f64,
}

impl Benchmark {
    pub(crate) async fn run(self, settings: Settings, cancel: CancellationToken) -> Result {
        let words = self.scratchpad_words - self.scratchpad_words % QUAD_WORDS;

        ensure!(
            (QUAD_WORDS..=SCRATCHPAD_CAPACITY_WORDS).contains(&words),
            "scratchpad words must be between {QUAD_WORDS} and {SCRATCHPAD_CAPACITY_WORDS}, got {}",
            self.scratchpad_words
        );

        let threads = settings.threads();

        info!("Benchmarking {threads} threads against {words} scratchpad words");

        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut store = ScratchpadStore::new(SCRATCHPAD_CAPACITY_WORDS, ADDENDUM_LOG_CAPACITY);
        store.replace(
            (0..words).map(|_| rng.random()).collect(),
            HeightInfo {
                height: 1,
                block_id: Hash32::ZERO,
            },
        )?;

        let ctx = Arc::new(MiningContext::new(store, threads));

        ctx.jobs.set(Job {
            job_id: "benchmark".into(),
            blob: Blob::new(vec![0x55; 76])?,
            target: Target::ZERO,
        });

        let stop = cancel.child_token();
        let (solutions, _keep) = mpsc::unbounded_channel();

        let start = Instant::now();

        let workers = WorkerCoordinator::spawn(
            ctx.clone(),
            Arc::new(WildKeccak),
            WorkerConfig {
                threads,
                scantime: LP_SCANTIME,
                mode: ScanMode::Stratum,
            },
            solutions,
            stop.clone(),
        )
        .context("failed to start miner threads")?;

        let mut tasks = JoinSet::new();
        stats::spawn_reporter(ctx.clone(), stop.clone(), &mut tasks);

        match self.duration {
            Some(seconds) => {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = sleep(Duration::from_secs(seconds)) => {}
                }
            }
            None => cancel.cancelled().await,
        }

        stop.cancel();

        task::spawn_blocking(move || workers.join())
            .await
            .context("failed to join miner threads")?;

        while tasks.join_next().await.is_some() {}

        let elapsed = start.elapsed();
        let hashes = ctx.stats.total_hashes();

        let report = Report {
            threads,
            seconds: elapsed.as_secs_f64(),
            hashes,
            hashrate: HashRate::measure(hashes, elapsed).0,
        };

        println!("{}", serde_json::to_string_pretty(&report)?);

        Ok(())
    }
}
