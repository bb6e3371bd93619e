use {super::*, error::*};

pub use {
    error::SessionError,
    longpoll::HttpSession,
    pool_url::{PoolUrl, Transport},
    retry::RetryPolicy,
    rpc::{RpcClient, ShareOutcome},
    srv::{DnsResolver, Resolve, SrvTarget, order_targets},
    state::{SessionEvent, SessionState},
    stratum::StratumSession,
};

mod connection;
mod error;
mod longpoll;
mod pool_url;
mod retry;
mod rpc;
mod srv;
mod state;
mod stratum;
mod workio;

pub type Result<T = (), E = SessionError> = std::result::Result<T, E>;

/// How often a long-running Stratum session writes the scratchpad cache.
pub const SAVE_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Timeout for HTTP calls that are not long-polls.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: PoolUrl,
    pub user: String,
    pub pass: String,
    pub retry: RetryPolicy,
    pub stratum_timeout: Duration,
    /// `None` lets the pool hold a long-poll open indefinitely.
    pub longpoll_timeout: Option<Duration>,
    pub scantime: Duration,
    pub longpoll: bool,
    pub protocol_dump: bool,
    pub cache_path: Option<PathBuf>,
}

impl SessionConfig {
    pub fn scan_mode(&self) -> ScanMode {
        match self.url.transport() {
            Transport::Stratum => ScanMode::Stratum,
            Transport::Http if self.longpoll => ScanMode::LongPoll,
            Transport::Http => ScanMode::Polled,
        }
    }
}
