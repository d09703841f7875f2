// # Google Domains Provider
//
// Pushes addresses through the dyndns2 protocol used by Google Domains:
//
// ```http
// GET <url>?hostname=<domain>&myip=<address>
// Authorization: Basic <username:password>
// ```
//
// A push succeeds only when the status is 2xx AND the body starts with one of
// the protocol's acceptance sentinels:
//
// - `good <address>`: the record was updated
// - `nochg <address>`: the record already held this address
//
// Anything else, even under 200 OK, means the server understood the request
// and refused it (`badauth`, `nohost`, `notfqdn`, `abuse`, `911`, ...).

use async_trait::async_trait;
use dipper_core::traits::{AddressFamily, ProviderClient, PushAck};
use dipper_core::{Account, Error, ProviderConfig, ProviderRegistry, Result};
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;

/// Registered provider type name
pub const PROVIDER_NAME: &str = "google_domains";

/// Default HTTP timeout for update requests
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Google Domains client, shared by every Google Domains account
#[derive(Debug, Clone)]
pub struct GoogleDomainsClient {
    client: reqwest::Client,
}

impl GoogleDomainsClient {
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
}

/// Decide whether a dyndns2 response accepted the push
///
/// # Returns
///
/// - `Ok(PushAck::Accepted)` for 2xx with a `good` body
/// - `Ok(PushAck::Unchanged)` for 2xx with a `nochg` body
/// - `Err(Error::Provider)` for a non-2xx status, whatever the body
/// - `Err(Error::Rejected)` for 2xx with any other body
///
/// The keyword must open the body; leading whitespace is not skipped.
pub fn interpret_response(status: StatusCode, body: &str) -> Result<PushAck> {
    if !status.is_success() {
        return Err(Error::provider(
            PROVIDER_NAME,
            format!("update returned status {}: {}", status, body.trim()),
        ));
    }

    if body.starts_with("good") {
        Ok(PushAck::Accepted)
    } else if body.starts_with("nochg") {
        Ok(PushAck::Unchanged)
    } else {
        Err(Error::rejected(PROVIDER_NAME, describe_rejection(body.trim())))
    }
}

fn describe_rejection(body: &str) -> String {
    let hint = if body.starts_with("badauth") {
        "bad username or password"
    } else if body.starts_with("nohost") {
        "hostname does not exist in this account"
    } else if body.starts_with("notfqdn") {
        "hostname is not a fully-qualified domain name"
    } else if body.starts_with("badagent") {
        "user agent was refused"
    } else if body.starts_with("abuse") {
        "hostname is blocked for abuse"
    } else if body.starts_with("conflict") {
        "a conflicting record exists"
    } else if body.starts_with("911") {
        "server-side error, try again later"
    } else {
        return body.to_string();
    };
    format!("{} ({})", body, hint)
}

#[async_trait]
impl ProviderClient for GoogleDomainsClient {
    async fn push(&self, account: &Account, family: AddressFamily, address: &str) -> Result<PushAck> {
        let ProviderConfig::GoogleDomains { url } = &account.provider else {
            return Err(Error::config(format!(
                "Account {} is not a Google Domains account (provider: {})",
                account.domain,
                account.provider_name()
            )));
        };

        tracing::debug!(
            domain = %account.domain,
            %family,
            address,
            "Sending dyndns2 update"
        );

        let response = self
            .client
            .get(url)
            .query(&[("hostname", account.domain.as_str()), ("myip", address)])
            .basic_auth(
                account.credentials.username(),
                Some(account.credentials.password()),
            )
            .send()
            .await
            .map_err(|e| Error::http(format!("Google Domains request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("Failed to read Google Domains response: {}", e)))?;

        interpret_response(status, &body)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }
}

/// Register the Google Domains client with a provider registry
///
/// # Example
///
/// ```rust
/// use dipper_core::ProviderRegistry;
/// use std::time::Duration;
///
/// let registry = ProviderRegistry::new();
/// dipper_provider_google_domains::register(&registry, Duration::from_secs(10)).unwrap();
/// assert!(registry.has_provider("google_domains"));
/// ```
pub fn register(registry: &ProviderRegistry, http_timeout: Duration) -> Result<()> {
    let client = GoogleDomainsClient::with_timeout(http_timeout)?;
    registry.register_provider(PROVIDER_NAME, Arc::new(client));
    Ok(())
}
