// # Address Resolver Trait
//
// Defines the interface for discovering the machine's own public address
// and the address currently published for a domain.
//
// ## Implementations
//
// - DNS echo + A/AAAA lookup: `dipper-resolver-dns` crate
//
// ## Usage
//
// ```rust,ignore
// use dipper_core::{AddressFamily, AddressResolver};
//
// let mine = resolver.my_public_address(AddressFamily::Ipv4).await;
// let published = resolver.domain_address("home.example.com", AddressFamily::Ipv4).await;
//
// if mine.address().is_some() && mine.address() != published.address() {
//     // drift
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Address family (IPv4 or IPv6), handled independently throughout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Both families, IPv4 first
    pub const ALL: [AddressFamily; 2] = [AddressFamily::Ipv4, AddressFamily::Ipv6];

    /// DNS record type holding addresses of this family
    pub fn record_type(self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "A",
            AddressFamily::Ipv6 => "AAAA",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => f.write_str("IPv4"),
            AddressFamily::Ipv6 => f.write_str("IPv6"),
        }
    }
}

/// Outcome of a single lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Textual address as returned by the resolver
    Found(String),
    /// The lookup failed or timed out; the string says why
    Unavailable(String),
}

/// Transient result of one resolver call
///
/// A failed lookup is an explicit [`Resolution::Unavailable`], never an empty
/// string, so two failed lookups can never compare as "equal addresses".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressSnapshot {
    /// Family that was queried
    pub family: AddressFamily,
    /// What the lookup produced
    pub resolution: Resolution,
}

impl AddressSnapshot {
    /// A successful lookup
    ///
    /// Empty or whitespace-only values are treated as unavailable.
    pub fn found(family: AddressFamily, value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            return Self::unavailable(family, "resolver returned an empty address");
        }

        Self {
            family,
            resolution: Resolution::Found(value),
        }
    }

    /// A failed lookup
    pub fn unavailable(family: AddressFamily, reason: impl Into<String>) -> Self {
        Self {
            family,
            resolution: Resolution::Unavailable(reason.into()),
        }
    }

    /// The resolved address, if any
    pub fn address(&self) -> Option<&str> {
        match &self.resolution {
            Resolution::Found(address) => Some(address),
            Resolution::Unavailable(_) => None,
        }
    }
}

/// Trait for address resolver implementations
///
/// # Contract
///
/// - **Fail soft**: every transport or protocol error becomes
///   [`Resolution::Unavailable`]. Methods never return an error.
/// - **No caching**: every call is a fresh lookup. The point is to detect
///   external drift.
/// - **Normalisation**: addresses must be returned in one canonical textual
///   form. The engine compares them with plain string equality.
/// - **No business logic**: resolvers never decide whether to push.
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Discover this machine's current public address for `family`
    async fn my_public_address(&self, family: AddressFamily) -> AddressSnapshot;

    /// Look up the address currently published for `domain` (A or AAAA)
    async fn domain_address(&self, domain: &str, family: AddressFamily) -> AddressSnapshot;
}
