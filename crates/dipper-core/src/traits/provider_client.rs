// # Provider Client Trait
//
// Defines the interface for pushing a new address to a dynamic DNS provider.
//
// ## Implementations
//
// - MyDNS: `dipper-provider-mydns` crate
// - Google Domains (dyndns2): `dipper-provider-google-domains` crate
//
// ## Usage
//
// ```rust,ignore
// use dipper_core::{AddressFamily, ProviderClient};
//
// let ack = client.push(&account, AddressFamily::Ipv4, "203.0.113.5").await?;
// ```

use async_trait::async_trait;

use crate::account::Account;
use crate::traits::AddressFamily;

/// What the provider said when it accepted a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushAck {
    /// The provider accepted (and possibly changed) the record
    Accepted,
    /// The provider reported the record already held this address
    Unchanged,
}

/// Trait for provider client implementations
///
/// A client knows one provider's update protocol. It reads endpoints and
/// credentials from the [`Account`] it is given, so one client instance can
/// serve every account of that provider type.
///
/// # Preconditions
///
/// The caller guarantees that `address` is non-empty and that `family` is
/// enabled on `account`. Clients check protocol mechanics only.
///
/// # Constraints
///
/// - One HTTP exchange per call. No retries, no sleeping: the next scheduled
///   cycle is the retry mechanism.
/// - No state between calls.
/// - Credentials are never logged.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Push `address` for `family` to the provider
    ///
    /// # Returns
    ///
    /// - `Ok(PushAck)`: the provider accepted the value
    /// - `Err(Error)`: transport failure, non-2xx status, or a protocol-level
    ///   rejection
    async fn push(
        &self,
        account: &Account,
        family: AddressFamily,
        address: &str,
    ) -> Result<PushAck, crate::Error>;

    /// Provider type name (matches `ProviderConfig::type_name`)
    fn provider_name(&self) -> &'static str;
}
