// # DNS Address Resolver
//
// [`AddressResolver`] backed by `hickory-resolver`.
//
// ## Lookups
//
// - **Own address**: query the echo name (`myip.opendns.com` by default)
//   directly against the echo servers. They answer with the address the query
//   came from, so the A query must travel over IPv4 and the AAAA query over
//   IPv6. Each family therefore gets its own stub resolver.
// - **Domain address**: plain A/AAAA lookup through the system resolver
//   configuration (`/etc/resolv.conf`), or hickory's default upstreams when
//   that cannot be read.
//
// Caching is disabled everywhere. A stale cached answer would hide drift.
//
// ## Fail-soft
//
// Resolution never returns an error. NXDOMAIN, empty answers and transport
// failures all become [`Resolution::Unavailable`], which the engine treats as
// "do nothing this tick".

mod config;

pub use config::{DEFAULT_ECHO_NAME, DnsResolverConfig, OPENDNS_V4, OPENDNS_V6};

use async_trait::async_trait;
use dipper_core::Result;
use dipper_core::traits::{AddressFamily, AddressResolver, AddressSnapshot};
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use std::fmt::Display;
use std::net::IpAddr;
use std::time::Duration;

const DNS_PORT: u16 = 53;

/// Resolver for own and published addresses over DNS
pub struct DnsAddressResolver {
    echo_name: String,
    echo_v4: Option<TokioAsyncResolver>,
    echo_v6: Option<TokioAsyncResolver>,
    domains: TokioAsyncResolver,
}

impl std::fmt::Debug for DnsAddressResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsAddressResolver")
            .field("echo_name", &self.echo_name)
            .field("echo_v4", &self.echo_v4.is_some())
            .field("echo_v6", &self.echo_v6.is_some())
            .finish_non_exhaustive()
    }
}

impl DnsAddressResolver {
    /// Build the echo and domain resolvers
    ///
    /// Fails only on invalid settings. An unreadable system configuration
    /// falls back to hickory's defaults with a warning.
    pub fn new(config: &DnsResolverConfig) -> Result<Self> {
        config.validate()?;
        let timeout = config.timeout();

        let echo_v4 = echo_resolver(&config.echo_servers_v4, timeout);
        let echo_v6 = echo_resolver(&config.echo_servers_v6, timeout);

        let domains = match hickory_resolver::system_conf::read_system_conf() {
            Ok((system, mut opts)) => {
                apply_options(&mut opts, timeout);
                TokioAsyncResolver::tokio(system, opts)
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Cannot read system resolver configuration, using defaults"
                );
                TokioAsyncResolver::tokio(ResolverConfig::default(), lookup_options(timeout))
            }
        };

        tracing::debug!(
            echo_name = %config.echo_name,
            echo_v4 = ?config.echo_servers_v4,
            echo_v6 = ?config.echo_servers_v6,
            ?timeout,
            "DNS resolver ready"
        );

        Ok(Self {
            echo_name: config.echo_name.clone(),
            echo_v4,
            echo_v6,
            domains,
        })
    }

    async fn lookup(
        resolver: &TokioAsyncResolver,
        name: &str,
        family: AddressFamily,
    ) -> AddressSnapshot {
        let answers = match family {
            AddressFamily::Ipv4 => resolver
                .ipv4_lookup(name)
                .await
                .map(|lookup| lookup.iter().map(|a| a.0.to_string()).collect::<Vec<_>>()),
            AddressFamily::Ipv6 => resolver
                .ipv6_lookup(name)
                .await
                .map(|lookup| lookup.iter().map(|aaaa| aaaa.0.to_string()).collect::<Vec<_>>()),
        };

        let snapshot = snapshot_from_answers(family, answers);
        if let Some(reason) = snapshot_failure(&snapshot) {
            tracing::debug!(name, %family, reason, "Lookup unavailable");
        }
        snapshot
    }
}

#[async_trait]
impl AddressResolver for DnsAddressResolver {
    async fn my_public_address(&self, family: AddressFamily) -> AddressSnapshot {
        let echo = match family {
            AddressFamily::Ipv4 => self.echo_v4.as_ref(),
            AddressFamily::Ipv6 => self.echo_v6.as_ref(),
        };

        match echo {
            Some(resolver) => Self::lookup(resolver, &self.echo_name, family).await,
            None => AddressSnapshot::unavailable(family, "no echo servers configured"),
        }
    }

    async fn domain_address(&self, domain: &str, family: AddressFamily) -> AddressSnapshot {
        Self::lookup(&self.domains, domain, family).await
    }
}

fn echo_resolver(servers: &[IpAddr], timeout: Duration) -> Option<TokioAsyncResolver> {
    if servers.is_empty() {
        return None;
    }
    let group = NameServerConfigGroup::from_ips_clear(servers, DNS_PORT, true);
    let config = ResolverConfig::from_parts(None, vec![], group);
    Some(TokioAsyncResolver::tokio(config, lookup_options(timeout)))
}

fn lookup_options(timeout: Duration) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    apply_options(&mut opts, timeout);
    opts
}

fn apply_options(opts: &mut ResolverOpts, timeout: Duration) {
    opts.cache_size = 0;
    opts.timeout = timeout;
    opts.attempts = 1;
}

/// Turn a lookup result into a snapshot
///
/// The first record wins. Addresses are already in canonical form because
/// they come from `Ipv4Addr`/`Ipv6Addr` `Display`.
fn snapshot_from_answers<E: Display>(
    family: AddressFamily,
    answers: std::result::Result<Vec<String>, E>,
) -> AddressSnapshot {
    match answers {
        Ok(addresses) => match addresses.into_iter().next() {
            Some(address) => AddressSnapshot::found(family, address),
            None => AddressSnapshot::unavailable(family, format!("no {} record", family.record_type())),
        },
        Err(e) => AddressSnapshot::unavailable(family, e.to_string()),
    }
}

fn snapshot_failure(snapshot: &AddressSnapshot) -> Option<&str> {
    match &snapshot.resolution {
        dipper_core::Resolution::Unavailable(reason) => Some(reason.as_str()),
        dipper_core::Resolution::Found(_) => None,
    }
}
