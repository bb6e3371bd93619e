use {
    super::*,
    snafu::{ResultExt, ensure},
};

/// Re-logins allowed for a single call before its `Unauthenticated` error is returned.
const MAX_RELOGINS: u32 = 5;

const RELOGIN_PAUSE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShareOutcome {
    Accepted,
    Rejected(String),
}

/// JSON-RPC over HTTP with basic auth. The pool session id lives behind its own lock, which
/// also serializes re-logins between the long-poll loop and the submission task.
pub struct RpcClient {
    client: reqwest::Client,
    endpoint: Url,
    user: String,
    pass: String,
    identity: tokio::sync::Mutex<Option<String>>,
    next_id: AtomicU64,
    protocol_dump: bool,
}

impl RpcClient {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context(HttpSnafu)?;

        Ok(Self {
            client,
            endpoint: config.url.endpoint(),
            user: config.user.clone(),
            pass: config.pass.clone(),
            identity: tokio::sync::Mutex::new(None),
            next_id: AtomicU64::new(1),
            protocol_dump: config.protocol_dump,
        })
    }

    async fn post(&self, method: &str, params: impl Serialize, limit: Option<Duration>) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let message = Message::request(id, method, params).context(SerializationSnafu)?;

        if self.protocol_dump {
            debug!(
                "-> {}",
                serde_json::to_string(&message).context(SerializationSnafu)?
            );
        }

        let mut request = self
            .client
            .post(self.endpoint.clone())
            .basic_auth(&self.user, Some(&self.pass))
            .json(&message);

        if let Some(limit) = limit {
            request = request.timeout(limit);
        }

        let body = request
            .send()
            .await
            .context(HttpSnafu)?
            .error_for_status()
            .context(HttpSnafu)?
            .text()
            .await
            .context(HttpSnafu)?;

        if self.protocol_dump {
            debug!("<- {body}");
        }

        match serde_json::from_str::<Message>(&body).context(SerializationSnafu)? {
            Message::Response {
                error: Some(error), ..
            } => PoolSnafu { error }.fail(),
            Message::Response {
                result: Some(result),
                ..
            } => Ok(result),
            _ => ProtocolSnafu {
                message: format!("unexpected `{method}` response"),
            }
            .fail(),
        }
    }

    /// Logs in and records the new session id. Returns the job the pool sent along, if any.
    pub async fn login(&self) -> Result<Option<JobTemplate>> {
        let mut identity = self.identity.lock().await;
        self.login_locked(&mut identity).await
    }

    async fn login_locked(&self, identity: &mut Option<String>) -> Result<Option<JobTemplate>> {
        let login = Login {
            login: self.user.clone(),
            pass: self.pass.clone(),
            agent: USER_AGENT.into(),
        };

        let value = self.post(METHOD_LOGIN, login, Some(RPC_TIMEOUT)).await?;

        let result = serde_json::from_value::<LoginResult>(value).context(SerializationSnafu)?;

        ensure!(
            result.is_ok(),
            LoginSnafu {
                status: result.status
            }
        );

        info!("Logged in to {} as {}", self.endpoint, self.user);

        *identity = Some(result.id);

        Ok(result.job)
    }

    /// Logs in again unless another task already did since `stale` was read.
    async fn relogin(&self, stale: Option<&str>) -> Result {
        let mut identity = self.identity.lock().await;

        if identity.as_deref() == stale {
            self.login_locked(&mut identity).await?;
        }

        Ok(())
    }

    /// Calls `method` with the current session id, logging in again on `Unauthenticated`.
    async fn call<P: Serialize>(
        &self,
        method: &str,
        limit: Option<Duration>,
        params: impl Fn(String) -> P,
    ) -> Result<Value> {
        let mut relogins = 0;

        loop {
            let auth_id = self.identity.lock().await.clone();

            let Some(id) = auth_id.clone() else {
                self.relogin(None).await?;
                continue;
            };

            match self.post(method, params(id), limit).await {
                Err(err) if err.is_unauthenticated() && relogins < MAX_RELOGINS => {
                    relogins += 1;
                    warn!("Pool reports our session unauthenticated, logging in again");
                    self.relogin(auth_id.as_deref()).await?;
                    sleep(RELOGIN_PAUSE).await;
                }
                result => return result,
            }
        }
    }

    pub async fn getjob(&self, hi: Option<HeightInfo>, limit: Option<Duration>) -> Result<JobTemplate> {
        let value = self
            .call(METHOD_GETJOB, limit, |id| GetJob { id, hi })
            .await?;

        serde_json::from_value(value).context(SerializationSnafu)
    }

    pub async fn get_full_scratchpad(&self) -> Result<FullScratchpad> {
        let value = self
            .call(METHOD_GETFULLSCRATCHPAD, None, |id| GetFullScratchpad {
                id,
                agent: USER_AGENT.into(),
            })
            .await?;

        let response =
            serde_json::from_value::<FullScratchpad>(value).context(SerializationSnafu)?;

        ensure!(
            response.is_ok(),
            ProtocolSnafu {
                message: format!("getfullscratchpad failed with status `{}`", response.status),
            }
        );

        Ok(response)
    }

    pub async fn submit(&self, solution: &Solution) -> Result<ShareOutcome> {
        let result = self
            .call(METHOD_SUBMIT, Some(RPC_TIMEOUT), |id| Submit {
                id,
                job_id: solution.job_id.clone(),
                nonce: solution.nonce.clone(),
                result: solution.result.to_string(),
            })
            .await;

        match result {
            Ok(value) => {
                let result =
                    serde_json::from_value::<SubmitResult>(value).context(SerializationSnafu)?;

                Ok(if result.is_ok() {
                    ShareOutcome::Accepted
                } else {
                    ShareOutcome::Rejected(result.status)
                })
            }
            Err(SessionError::Pool { error }) if error.is_share_rejection() => {
                Ok(ShareOutcome::Rejected(error.message))
            }
            Err(err) => Err(err),
        }
    }
}
