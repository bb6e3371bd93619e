use {super::*, anyhow::Context};

#[derive(Debug, Parser)]
pub(crate) struct Mine {
    #[arg(long, help = "Skip the scratchpad cache and start from the pool's copy.")]
    no_cache: bool,
}

impl Mine {
    pub(crate) async fn run(self, settings: Settings, cancel: CancellationToken) -> Result {
        let config = settings.session_config()?;
        let threads = settings.threads();
        let cache = settings.scratchpad_cache().filter(|_| !self.no_cache);

        info!(
            "Mining at {} as {} with {threads} threads",
            config.url, config.user
        );

        let store = bootstrap::scratchpad(
            cache,
            settings.scratchpad_url.as_ref(),
            config.retry,
            &cancel,
        )
        .await?;

        if cancel.is_cancelled() {
            return Ok(());
        }

        let ctx = Arc::new(MiningContext::new(store, threads));

        let (solutions_tx, solutions_rx) = mpsc::unbounded_channel();

        let workers = WorkerCoordinator::spawn(
            ctx.clone(),
            Arc::new(WildKeccak),
            WorkerConfig {
                threads,
                scantime: config.scantime,
                mode: config.scan_mode(),
            },
            solutions_tx,
            cancel.clone(),
        )
        .context("failed to start miner threads")?;

        let mut tasks = JoinSet::new();

        stats::spawn_reporter(ctx.clone(), cancel.clone(), &mut tasks);

        let result = match config.url.transport() {
            Transport::Stratum => {
                StratumSession::new(
                    config,
                    ctx.clone(),
                    Arc::new(DnsResolver::default()),
                    solutions_rx,
                    cancel.clone(),
                )
                .run()
                .await
            }
            Transport::Http => {
                match HttpSession::new(config, ctx.clone(), solutions_rx, cancel.clone()) {
                    Ok(session) => session.run().await,
                    Err(err) => Err(err),
                }
            }
        };

        cancel.cancel();

        if let Err(err) = task::spawn_blocking(move || workers.join()).await {
            warn!("Failed to join miner threads: {err}");
        }

        while tasks.join_next().await.is_some() {}

        let empty = ctx.scratchpad.read().is_empty();

        if let Some(cache) = cache
            && !empty
        {
            ctx.persist(cache).await;
        }

        info!("{}", ctx.stats.status_line());

        result.context("mining session failed")
    }
}
