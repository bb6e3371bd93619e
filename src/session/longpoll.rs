use {
    super::*,
    backon::Retryable,
    snafu::{OptionExt, ResultExt, ensure},
};

/// The HTTP transport. With long-polling the pool holds each `getjob` open until it has new
/// work; without it the job is re-fetched every `scantime`. Shares go out through a separate
/// submission task so a slow long-poll never delays them.
pub struct HttpSession {
    config: SessionConfig,
    ctx: Arc<MiningContext>,
    client: Arc<RpcClient>,
    solutions: mpsc::UnboundedReceiver<Solution>,
    cancel: CancellationToken,
}

impl HttpSession {
    pub fn new(
        config: SessionConfig,
        ctx: Arc<MiningContext>,
        solutions: mpsc::UnboundedReceiver<Solution>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        Ok(Self {
            client: Arc::new(RpcClient::new(&config)?),
            config,
            ctx,
            solutions,
            cancel,
        })
    }

    pub async fn run(self) -> Result {
        let Self {
            config,
            ctx,
            client,
            solutions,
            cancel,
        } = self;

        let session = Poller {
            config,
            ctx,
            client,
            cancel: cancel.child_token(),
        };

        if !session.login().await? {
            return Ok(());
        }

        let mut tasks = JoinSet::new();

        workio::spawn_submitter(
            session.client.clone(),
            session.ctx.clone(),
            session.config.retry,
            solutions,
            session.cancel.clone(),
            &mut tasks,
        );

        let result = session.poll().await;

        session.cancel.cancel();

        while tasks.join_next().await.is_some() {}

        result
    }
}

struct Poller {
    config: SessionConfig,
    ctx: Arc<MiningContext>,
    client: Arc<RpcClient>,
    cancel: CancellationToken,
}

impl Poller {
    /// Returns false if cancelled before the pool accepted us.
    async fn login(&self) -> Result<bool> {
        let login = (|| self.client.login())
            .retry(self.config.retry.backoff())
            .sleep(sleep)
            .when(|err: &SessionError| !err.is_fatal())
            .notify(|err: &SessionError, pause: Duration| {
                warn!(
                    "Login to {} failed: {err}. Retrying in {}s",
                    self.config.url,
                    pause.as_secs()
                );
            });

        let template = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(false),
            template = login => template?,
        };

        if let Some(template) = template
            && !self.ctx.needs_scratchpad()
        {
            self.install(&template)?;
        }

        Ok(true)
    }

    async fn poll(&self) -> Result {
        let mut failures = 0;

        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                result = self.refresh() => result,
            };

            match result {
                Ok(()) => failures = 0,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) if err.is_timeout() && self.config.longpoll => {
                    debug!("Long-poll timed out, restarting workers");
                    self.ctx.jobs.age_by(LP_SCANTIME);
                    self.ctx.restart_workers();
                    continue;
                }
                Err(err) => {
                    failures += 1;

                    ensure!(
                        self.config.retry.allows(failures),
                        RetriesExhaustedSnafu { failures }
                    );

                    warn!(
                        "Fetching work from {} failed: {err}. Retrying in {}s",
                        self.config.url,
                        self.config.retry.pause.as_secs()
                    );

                    if !self.config.retry.pause(&self.cancel).await {
                        return Ok(());
                    }

                    continue;
                }
            }

            if !self.config.longpoll {
                tokio::select! {
                    _ = self.cancel.cancelled() => return Ok(()),
                    _ = sleep(self.config.scantime) => {}
                }
            }
        }
    }

    async fn refresh(&self) -> Result {
        if self.ctx.needs_scratchpad() {
            self.fetch_scratchpad().await?;
        }

        let limit = if self.config.longpoll {
            self.config.longpoll_timeout
        } else {
            Some(RPC_TIMEOUT)
        };

        let template = self.client.getjob(self.ctx.height_info(), limit).await?;

        self.install(&template)
    }

    async fn fetch_scratchpad(&self) -> Result {
        info!("Requesting full scratchpad");

        let response = self.client.get_full_scratchpad().await?;

        let hi = response.hi.context(ProtocolSnafu {
            message: "getfullscratchpad response carries no height info",
        })?;

        self.ctx
            .replace_scratchpad(response.scratchpad_hex.into_inner(), hi)
            .context(ScratchpadSnafu)?;

        if let Some(path) = &self.config.cache_path {
            self.ctx.persist(path).await;
        }

        Ok(())
    }

    fn install(&self, template: &JobTemplate) -> Result {
        let update = self.ctx.install_job(template).context(JobSnafu)?;

        if update.resync {
            warn!("Scratchpad out of sync with the pool, requesting a full copy");
        }

        Ok(())
    }
}
