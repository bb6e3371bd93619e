use {
    super::*,
    anyhow::{Context, bail, ensure},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stratum,
    Http,
}

/// A pool address. Accepts `stratum+tcp://host:port`, `http(s)://host[:port]/path` or a bare
/// `host:port`, which is taken as HTTP. Credentials may be embedded as `user:pass@`. A
/// Stratum host starting with `_` is an SRV name and needs no port.
#[derive(Debug, Clone, PartialEq, Eq, DeserializeFromStr, SerializeDisplay)]
pub struct PoolUrl {
    url: Url,
    transport: Transport,
}

impl PoolUrl {
    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port_or_known_default()
    }

    pub fn is_srv(&self) -> bool {
        self.host().starts_with('_')
    }

    /// `user:pass` embedded in the URL, if any.
    pub fn credentials(&self) -> Option<(String, String)> {
        if self.url.username().is_empty() {
            return None;
        }

        Some((
            self.url.username().into(),
            self.url.password().unwrap_or_default().into(),
        ))
    }

    /// The URL to post JSON-RPC requests to, stripped of credentials.
    pub fn endpoint(&self) -> Url {
        let mut url = self.url.clone();
        let _ = url.set_username("");
        let _ = url.set_password(None);
        url
    }
}

impl FromStr for PoolUrl {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim();

        let url = if s.contains("://") {
            Url::parse(s)
        } else {
            Url::parse(&format!("http://{s}"))
        }
        .with_context(|| format!("invalid pool url `{s}`"))?;

        let transport = match url.scheme() {
            "stratum+tcp" => Transport::Stratum,
            "http" | "https" => Transport::Http,
            scheme => bail!("unsupported pool url scheme `{scheme}`"),
        };

        let pool = Self { url, transport };

        ensure!(!pool.host().is_empty(), "pool url `{s}` has no host");

        ensure!(
            transport == Transport::Http || pool.is_srv() || pool.port().is_some(),
            "stratum url `{s}` needs a port"
        );

        Ok(pool)
    }
}

impl Display for PoolUrl {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.endpoint())
    }
}
