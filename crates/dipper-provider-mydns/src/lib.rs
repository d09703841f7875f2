// # MyDNS Provider
//
// Pushes addresses to MyDNS (mydns.jp). MyDNS has no update API as such: an
// authenticated GET against a per-family login endpoint records the address
// the request came from. The account therefore carries two URLs, one that
// resolves over IPv4 only and one over IPv6 only.
//
// ## Protocol
//
// - `GET <ipv4_url>` or `GET <ipv6_url>` with HTTP Basic authentication
// - Any 2xx status is success, the body is not inspected
// - Any other status, or a transport error, is a failure
//
// The client makes exactly one request per push. Retries belong to the next
// tick of the scheduler.

use async_trait::async_trait;
use dipper_core::traits::{AddressFamily, ProviderClient, PushAck};
use dipper_core::{Account, Error, ProviderConfig, ProviderRegistry, Result};
use std::sync::Arc;
use std::time::Duration;

/// Registered provider type name
pub const PROVIDER_NAME: &str = "mydns";

/// Default HTTP timeout for login requests
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// MyDNS client, shared by every MyDNS account
#[derive(Debug, Clone)]
pub struct MyDnsClient {
    client: reqwest::Client,
}

impl MyDnsClient {
    /// Create a client with the default request timeout
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client whose requests give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    fn endpoint<'a>(account: &'a Account, family: AddressFamily) -> Result<&'a str> {
        let ProviderConfig::MyDns { ipv4_url, ipv6_url } = &account.provider else {
            return Err(Error::config(format!(
                "Account {} is not a MyDNS account (provider: {})",
                account.domain,
                account.provider_name()
            )));
        };

        let url = match family {
            AddressFamily::Ipv4 => ipv4_url,
            AddressFamily::Ipv6 => ipv6_url,
        };

        url.as_deref().ok_or_else(|| {
            Error::config(format!(
                "Account {} has no {} endpoint configured",
                account.domain, family
            ))
        })
    }
}

#[async_trait]
impl ProviderClient for MyDnsClient {
    async fn push(&self, account: &Account, family: AddressFamily, address: &str) -> Result<PushAck> {
        let url = Self::endpoint(account, family)?;

        tracing::debug!(
            domain = %account.domain,
            %family,
            address,
            "Sending MyDNS login request"
        );

        let response = self
            .client
            .get(url)
            .basic_auth(
                account.credentials.username(),
                Some(account.credentials.password()),
            )
            .send()
            .await
            .map_err(|e| Error::http(format!("MyDNS request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::provider(
                PROVIDER_NAME,
                format!("{} login returned status {}", family, status),
            ));
        }

        Ok(PushAck::Accepted)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Register the MyDNS client with a provider registry
///
/// # Example
///
/// ```rust
/// use dipper_core::ProviderRegistry;
/// use std::time::Duration;
///
/// let registry = ProviderRegistry::new();
/// dipper_provider_mydns::register(&registry, Duration::from_secs(10)).unwrap();
/// assert!(registry.has_provider("mydns"));
/// ```
pub fn register(registry: &ProviderRegistry, http_timeout: Duration) -> Result<()> {
    let client = MyDnsClient::with_timeout(http_timeout)?;
    registry.register_provider(PROVIDER_NAME, Arc::new(client));
    Ok(())
}
