use {
    super::*,
    hickory_resolver::{
        TokioResolver, config::ResolverConfig, name_server::TokioConnectionProvider,
    },
    snafu::{OptionExt, ResultExt, ensure},
};

/// Turns a pool host into the socket addresses to try, in order.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn resolve(&self, host: &str, port: Option<u16>) -> Result<Vec<SocketAddr>>;
}

/// One SRV answer with the addresses its target resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrvTarget {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub addresses: Vec<IpAddr>,
}

/// Lowest priority first, then heaviest weight, and within one target IPv4 before IPv6.
pub fn order_targets(mut targets: Vec<SrvTarget>) -> Vec<SocketAddr> {
    targets.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.weight.cmp(&a.weight))
    });

    targets
        .into_iter()
        .flat_map(|target| {
            let mut addresses = target.addresses;
            addresses.sort_by_key(|address| address.is_ipv6());
            addresses
                .into_iter()
                .map(move |address| SocketAddr::new(address, target.port))
        })
        .collect()
}

/// Resolves `_service._proto.domain` names through SRV records and anything else through
/// the system resolver.
pub struct DnsResolver {
    resolver: TokioResolver,
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self {
            resolver: TokioResolver::builder_with_config(
                ResolverConfig::default(),
                TokioConnectionProvider::default(),
            )
            .build(),
        }
    }
}

impl DnsResolver {
    async fn srv(&self, name: &str) -> Result<Vec<SocketAddr>> {
        let records = self
            .resolver
            .srv_lookup(name)
            .await
            .context(ResolveSnafu { host: name })?;

        let mut targets = Vec::new();

        for record in records.iter() {
            let target = record.target().to_utf8();

            let addresses = match self.resolver.lookup_ip(target.as_str()).await {
                Ok(lookup) => lookup.iter().collect(),
                Err(err) => {
                    warn!("Skipping SRV target {target}: {err}");
                    continue;
                }
            };

            targets.push(SrvTarget {
                priority: record.priority(),
                weight: record.weight(),
                port: record.port(),
                addresses,
            });
        }

        Ok(order_targets(targets))
    }
}

#[async_trait]
impl Resolve for DnsResolver {
    async fn resolve(&self, host: &str, port: Option<u16>) -> Result<Vec<SocketAddr>> {
        let addresses = if host.starts_with('_') {
            self.srv(host).await?
        } else {
            let port = port.context(ProtocolSnafu {
                message: format!("no port for pool host `{host}`"),
            })?;

            let mut addresses = lookup_host((host, port))
                .await
                .context(IoSnafu)?
                .collect::<Vec<SocketAddr>>();

            addresses.sort_by_key(|address| address.is_ipv6());
            addresses
        };

        ensure!(!addresses.is_empty(), NoAddressesSnafu { host });

        debug!("Resolved {host} to {addresses:?}");

        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use {super::*, pretty_assertions::assert_eq};

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn priority_then_weight_then_ipv4() {
        let ordered = order_targets(vec![
            SrvTarget {
                priority: 20,
                weight: 100,
                port: 1,
                addresses: vec![ip("10.0.0.1")],
            },
            SrvTarget {
                priority: 10,
                weight: 5,
                port: 2,
                addresses: vec![ip("10.0.0.2")],
            },
            SrvTarget {
                priority: 10,
                weight: 50,
                port: 3,
                addresses: vec![ip("::1"), ip("10.0.0.3")],
            },
        ]);

        assert_eq!(
            ordered,
            vec![
                "10.0.0.3:3".parse::<SocketAddr>().unwrap(),
                "[::1]:3".parse().unwrap(),
                "10.0.0.2:2".parse().unwrap(),
                "10.0.0.1:1".parse().unwrap(),
            ]
        );
    }

    #[tokio::test]
    async fn literal_host() {
        let addresses = DnsResolver::default()
            .resolve("127.0.0.1", Some(3333))
            .await
            .unwrap();

        assert_eq!(addresses, vec!["127.0.0.1:3333".parse().unwrap()]);
    }

    #[tokio::test]
    async fn unresolvable_srv_name_keeps_resolver_error() {
        let err = DnsResolver::default()
            .resolve("_stratum._tcp.scratchminer.invalid", None)
            .await
            .unwrap_err();

        let SessionError::Resolve { host, .. } = &err else {
            panic!("unexpected error: {err}");
        };

        assert_eq!(host, "_stratum._tcp.scratchminer.invalid");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn literal_host_needs_port() {
        assert!(matches!(
            DnsResolver::default().resolve("127.0.0.1", None).await,
            Err(SessionError::Protocol { .. })
        ));
    }
}
