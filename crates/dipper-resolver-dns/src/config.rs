//! Resolver settings
//!
//! Read from the optional `[resolver]` section of the daemon configuration.
//! Every field has a default, so the section can be omitted entirely.

use dipper_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Name that the echo servers answer with the querying client's address
pub const DEFAULT_ECHO_NAME: &str = "myip.opendns.com.";

/// OpenDNS resolvers reachable over IPv4
pub const OPENDNS_V4: [IpAddr; 2] = [
    IpAddr::V4(std::net::Ipv4Addr::new(208, 67, 222, 222)),
    IpAddr::V4(std::net::Ipv4Addr::new(208, 67, 220, 220)),
];

/// OpenDNS resolvers reachable over IPv6
pub const OPENDNS_V6: [IpAddr; 2] = [
    IpAddr::V6(std::net::Ipv6Addr::new(0x2620, 0x119, 0x35, 0, 0, 0, 0, 0x35)),
    IpAddr::V6(std::net::Ipv6Addr::new(0x2620, 0x119, 0x53, 0, 0, 0, 0, 0x53)),
];

/// Settings for [`crate::DnsAddressResolver`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsResolverConfig {
    /// Echo name queried for the own address
    pub echo_name: String,

    /// Echo servers queried for the own IPv4 address (A record)
    pub echo_servers_v4: Vec<IpAddr>,

    /// Echo servers queried for the own IPv6 address (AAAA record)
    pub echo_servers_v6: Vec<IpAddr>,

    /// Per-query timeout in seconds
    pub timeout_sec: u64,
}

impl Default for DnsResolverConfig {
    fn default() -> Self {
        Self {
            echo_name: DEFAULT_ECHO_NAME.to_string(),
            echo_servers_v4: OPENDNS_V4.to_vec(),
            echo_servers_v6: OPENDNS_V6.to_vec(),
            timeout_sec: 5,
        }
    }
}

impl DnsResolverConfig {
    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.echo_name.trim().is_empty() {
            return Err(Error::config("resolver.echo_name cannot be empty"));
        }
        if self.echo_servers_v4.is_empty() && self.echo_servers_v6.is_empty() {
            return Err(Error::config("resolver needs at least one echo server"));
        }
        if self.timeout_sec == 0 {
            return Err(Error::config("resolver.timeout_sec must be greater than 0"));
        }
        Ok(())
    }

    /// Per-query timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }
}
