use {
    super::*,
    connection::Connection,
    snafu::{OptionExt, ResultExt, ensure},
};

/// Drives one pool over line-delimited JSON-RPC: login, scratchpad download, job
/// notifications with addendums, and share submission. Reconnects per the retry policy.
pub struct StratumSession {
    config: SessionConfig,
    ctx: Arc<MiningContext>,
    resolver: Arc<dyn Resolve>,
    solutions: mpsc::UnboundedReceiver<Solution>,
    cancel: CancellationToken,
    state: SessionState,
    auth_id: Option<String>,
    rerequest: bool,
    pending_submits: HashSet<u64>,
    last_save: Instant,
    failures: u32,
}

impl StratumSession {
    pub fn new(
        config: SessionConfig,
        ctx: Arc<MiningContext>,
        resolver: Arc<dyn Resolve>,
        solutions: mpsc::UnboundedReceiver<Solution>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            ctx,
            resolver,
            solutions,
            cancel,
            state: SessionState::default(),
            auth_id: None,
            rerequest: false,
            pending_submits: HashSet::new(),
            last_save: Instant::now(),
            failures: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs until cancelled, a fatal error, or the retry budget is spent.
    pub async fn run(mut self) -> Result {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(());
            }

            let err = match self.connect_and_serve().await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_fatal() => return Err(err),
                Err(_) if self.cancel.is_cancelled() => return Ok(()),
                Err(err) => err,
            };

            self.reset();
            self.failures += 1;

            ensure!(
                self.config.retry.allows(self.failures),
                RetriesExhaustedSnafu {
                    failures: self.failures
                }
            );

            warn!(
                "Stratum connection to {} failed: {err}. Retrying in {}s",
                self.config.url,
                self.config.retry.pause.as_secs()
            );

            if !self.config.retry.pause(&self.cancel).await {
                return Ok(());
            }
        }
    }

    fn reset(&mut self) {
        self.transition(SessionEvent::Failed);
        self.auth_id = None;
        self.pending_submits.clear();
        self.ctx.jobs.clear();
        self.ctx.restart_workers();
    }

    fn transition(&mut self, event: SessionEvent) {
        let next = self.state.on(event);

        if next != self.state {
            debug!("Stratum session {} -> {next} on {event:?}", self.state);
        }

        self.state = next;
    }

    async fn connect_and_serve(&mut self) -> Result {
        self.transition(SessionEvent::Connect);

        let addresses = self
            .resolver
            .resolve(self.config.url.host(), self.config.url.port())
            .await?;

        let mut connection = Connection::connect(
            &addresses,
            self.config.stratum_timeout,
            self.config.protocol_dump,
        )
        .await?;

        self.transition(SessionEvent::Connected);

        info!("Connected to Stratum pool {}", self.config.url);

        loop {
            if !self.state.is_authorized() {
                self.login(&mut connection).await?;
                continue;
            }

            if self.ctx.needs_scratchpad() {
                self.fetch_scratchpad(&mut connection).await?;
                continue;
            }

            if self.rerequest {
                self.request_job(&mut connection).await?;
                continue;
            }

            if self.last_save.elapsed() >= SAVE_INTERVAL {
                self.save().await;
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                Some(solution) = self.solutions.recv() => {
                    self.submit(&mut connection, solution).await?;
                }
                message = connection.recv(self.config.stratum_timeout) => {
                    self.dispatch(message?)?;
                }
            }
        }
    }

    /// Sends a request and waits for its response, handling whatever else the pool sends in
    /// the meantime.
    async fn call(
        &mut self,
        connection: &mut Connection,
        method: &str,
        params: impl Serialize,
    ) -> Result<Value> {
        let id = connection.send(method, params).await?;

        loop {
            let message = tokio::select! {
                _ = self.cancel.cancelled() => return DisconnectedSnafu.fail(),
                message = connection.recv(self.config.stratum_timeout) => message?,
            };

            match message {
                Message::Response {
                    id: Id::Number(response_id),
                    result,
                    error,
                } if response_id == id => {
                    if let Some(error) = error {
                        return PoolSnafu { error }.fail();
                    }

                    return result.context(ProtocolSnafu {
                        message: format!("empty `{method}` response"),
                    });
                }
                message => self.dispatch(message)?,
            }
        }
    }

    /// Maps an `Unauthenticated` error to `None` after dropping our session.
    fn authenticated<T>(&mut self, result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_unauthenticated() => {
                self.lose_auth();
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn lose_auth(&mut self) {
        warn!("Pool no longer recognizes our session, logging in again");

        self.auth_id = None;

        if self.state.is_authorized() {
            self.transition(SessionEvent::AuthLost);
        }
    }

    async fn login(&mut self, connection: &mut Connection) -> Result {
        let login = Login {
            login: self.config.user.clone(),
            pass: self.config.pass.clone(),
            agent: USER_AGENT.into(),
        };

        let value = self.call(connection, METHOD_LOGIN, login).await?;

        let result = serde_json::from_value::<LoginResult>(value).context(SerializationSnafu)?;

        ensure!(
            result.is_ok(),
            LoginSnafu {
                status: result.status
            }
        );

        info!("Logged in to {} as {}", self.config.url, self.config.user);

        self.auth_id = Some(result.id);
        self.failures = 0;
        self.transition(SessionEvent::LoggedIn);

        match result.job {
            Some(template) if !self.ctx.needs_scratchpad() => self.install(&template)?,
            _ => self.rerequest = true,
        }

        Ok(())
    }

    async fn fetch_scratchpad(&mut self, connection: &mut Connection) -> Result {
        let request = GetFullScratchpad {
            id: self.auth_id.clone().unwrap_or_default(),
            agent: USER_AGENT.into(),
        };

        info!("Requesting full scratchpad");

        let result = self
            .call(connection, METHOD_GETFULLSCRATCHPAD, request)
            .await;

        let Some(value) = self.authenticated(result)? else {
            return Ok(());
        };

        let response =
            serde_json::from_value::<FullScratchpad>(value).context(SerializationSnafu)?;

        ensure!(
            response.is_ok(),
            ProtocolSnafu {
                message: format!("getfullscratchpad failed with status `{}`", response.status),
            }
        );

        let hi = response.hi.context(ProtocolSnafu {
            message: "getfullscratchpad response carries no height info",
        })?;

        self.ctx
            .replace_scratchpad(response.scratchpad_hex.into_inner(), hi)
            .context(ScratchpadSnafu)?;

        self.save().await;

        self.rerequest = true;

        Ok(())
    }

    async fn request_job(&mut self, connection: &mut Connection) -> Result {
        let request = GetJob {
            id: self.auth_id.clone().unwrap_or_default(),
            hi: self.ctx.height_info(),
        };

        let result = self.call(connection, METHOD_GETJOB, request).await;

        let Some(value) = self.authenticated(result)? else {
            return Ok(());
        };

        let template = serde_json::from_value::<JobTemplate>(value).context(SerializationSnafu)?;

        self.rerequest = false;

        self.install(&template)
    }

    fn install(&mut self, template: &JobTemplate) -> Result {
        let update = self.ctx.install_job(template).context(JobSnafu)?;

        if update.resync {
            warn!("Scratchpad out of sync with the pool, requesting a full copy");
            self.rerequest = true;
        }

        if self.state.is_authorized() && self.ctx.jobs.is_ready() {
            self.transition(SessionEvent::WorkReady);
        }

        Ok(())
    }

    fn dispatch(&mut self, message: Message) -> Result {
        match message {
            Message::Notification { method, params } | Message::Request { method, params, .. }
                if method == METHOD_JOB =>
            {
                match serde_json::from_value::<JobTemplate>(params) {
                    Ok(template) => self.install(&template)?,
                    Err(err) => {
                        warn!("Malformed job notification: {err}");
                        self.rerequest = true;
                    }
                }
            }
            Message::Response {
                id: Id::Number(id),
                result,
                error,
            } if self.pending_submits.remove(&id) => self.submit_response(result, error),
            Message::Response { id, .. } => warn!("Unmatched response id={id}"),
            Message::Notification { method, .. } | Message::Request { method, .. } => {
                warn!("Unhandled method `{method}`");
            }
        }

        Ok(())
    }

    fn submit_response(&mut self, result: Option<Value>, error: Option<RpcError>) {
        match (result, error) {
            (_, Some(error)) => {
                self.ctx.stats.share_result(false, Some(&error.message));

                if error.is_unauthenticated() {
                    self.lose_auth();
                }
            }
            (Some(result), None) => match serde_json::from_value::<SubmitResult>(result) {
                Ok(result) if result.is_ok() => self.ctx.stats.share_result(true, None),
                Ok(result) => self.ctx.stats.share_result(false, Some(&result.status)),
                Err(err) => {
                    warn!("Malformed submit response: {err}");
                    self.ctx.stats.share_result(false, None);
                }
            },
            (None, None) => self.ctx.stats.share_result(false, None),
        }
    }

    async fn submit(&mut self, connection: &mut Connection, solution: Solution) -> Result {
        if !self.ctx.jobs.is_current(&solution.job_id) {
            debug!("Dropping share for stale job {}", solution.job_id);
            return Ok(());
        }

        let Some(id) = self.auth_id.clone() else {
            debug!("Dropping share for job {}: not logged in", solution.job_id);
            return Ok(());
        };

        let submit = Submit {
            id,
            job_id: solution.job_id,
            nonce: solution.nonce,
            result: solution.result.to_string(),
        };

        debug!("Submitting nonce {} for job {}", submit.nonce, submit.job_id);

        let request_id = connection.send(METHOD_SUBMIT, submit).await?;

        self.pending_submits.insert(request_id);

        Ok(())
    }

    async fn save(&mut self) {
        self.last_save = Instant::now();

        let empty = self.ctx.scratchpad.read().is_empty();

        if let Some(path) = &self.config.cache_path
            && !empty
        {
            self.ctx.persist(path).await;
        }
    }
}
