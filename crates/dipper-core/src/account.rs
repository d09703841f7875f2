//! Account model
//!
//! An [`Account`] binds one hostname to one provider, with the credentials
//! and endpoints that provider needs and a flag per address family. Accounts
//! are built once at startup and never mutated afterwards.

use std::fmt;

use crate::config::{AccountConfig, ProviderConfig};
use crate::traits::AddressFamily;

/// Opaque provider credentials
///
/// The `Debug` implementation never exposes the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// The secret, for building an auth header only
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .finish()
    }
}

/// One configured hostname-to-provider binding
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    /// Hostname; unique key within the account registry
    pub domain: String,

    /// Provider login
    pub credentials: Credentials,

    /// Provider type and endpoints
    pub provider: ProviderConfig,

    /// Keep the A record current
    pub enable_ipv4: bool,

    /// Keep the AAAA record current
    pub enable_ipv6: bool,
}

impl Account {
    /// Create an account with both families disabled
    pub fn new(
        domain: impl Into<String>,
        credentials: Credentials,
        provider: ProviderConfig,
    ) -> Self {
        Self {
            domain: domain.into(),
            credentials,
            provider,
            enable_ipv4: false,
            enable_ipv6: false,
        }
    }

    /// Enable or disable IPv4
    pub fn with_ipv4(mut self, enabled: bool) -> Self {
        self.enable_ipv4 = enabled;
        self
    }

    /// Enable or disable IPv6
    pub fn with_ipv6(mut self, enabled: bool) -> Self {
        self.enable_ipv6 = enabled;
        self
    }

    /// Whether `family` is enabled
    pub fn is_enabled(&self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::Ipv4 => self.enable_ipv4,
            AddressFamily::Ipv6 => self.enable_ipv6,
        }
    }

    /// Enabled families, IPv4 first
    pub fn enabled_families(&self) -> impl Iterator<Item = AddressFamily> + '_ {
        AddressFamily::ALL
            .into_iter()
            .filter(|family| self.is_enabled(*family))
    }

    /// An account with no family enabled never does anything
    pub fn is_inert(&self) -> bool {
        !self.enable_ipv4 && !self.enable_ipv6
    }

    /// Provider type name used to pick a client
    pub fn provider_name(&self) -> &str {
        self.provider.type_name()
    }
}

impl From<AccountConfig> for Account {
    fn from(config: AccountConfig) -> Self {
        Account::new(
            config.domain,
            Credentials::new(config.username, config.password),
            config.provider,
        )
        .with_ipv4(config.use_ipv4)
        .with_ipv6(config.use_ipv6)
    }
}
