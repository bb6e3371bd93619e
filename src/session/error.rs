use super::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SessionError {
    #[snafu(display("Timed out after {}s", timeout.as_secs()))]
    Timeout { timeout: Duration },

    #[snafu(display("IO error: {source}"))]
    Io { source: io::Error },

    #[snafu(display("Serialization error: {source}"))]
    Serialization { source: serde_json::Error },

    #[snafu(display("{message}"))]
    Protocol { message: String },

    #[snafu(display("Pool closed the connection"))]
    Disconnected,

    #[snafu(display("{error}"))]
    Pool { error: RpcError },

    #[snafu(display("Login rejected with status `{status}`"))]
    Login { status: String },

    #[snafu(display("Scratchpad error: {source}"))]
    Scratchpad { source: ScratchpadError },

    #[snafu(display("Job error: {source}"))]
    Job { source: JobError },

    #[snafu(display("Failed to resolve `{host}`: {source}"))]
    Resolve {
        host: String,
        source: hickory_resolver::ResolveError,
    },

    #[snafu(display("No addresses found for `{host}`"))]
    NoAddresses { host: String },

    #[snafu(display("HTTP error: {source}"))]
    Http { source: reqwest::Error },

    #[snafu(display("Giving up after {failures} failed attempts"))]
    RetriesExhausted { failures: u32 },
}

impl SessionError {
    /// Errors that must stop the miner rather than trigger a reconnect.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Scratchpad { source } => source.is_fatal(),
            Self::Job { source } => source.is_fatal(),
            Self::RetriesExhausted { .. } => true,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Http { source } => source.is_timeout(),
            _ => false,
        }
    }

    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Pool { error } if error.is_unauthenticated())
    }

    pub fn pool_error(&self) -> Option<&RpcError> {
        match self {
            Self::Pool { error } => Some(error),
            _ => None,
        }
    }
}
