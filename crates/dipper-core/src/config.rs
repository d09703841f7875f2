//! Configuration types for the dipper reconciler
//!
//! This module defines the typed form of the configuration file. Reading the
//! file from disk is the daemon's job; everything here works on strings and
//! values so it can be tested without I/O.
//!
//! ## File format
//!
//! ```toml
//! [schedule]
//! notification_interval_sec = 21600
//! check_interval_sec = 300
//!
//! [accounts.MyDNS]
//! provider = "mydns"
//! username = "mydns123456"
//! password = "secret"
//! domain = "a.example.com"
//! use_ipv4 = true
//! use_ipv6 = false
//! ipv4_url = "https://ipv4.mydns.jp/login.html"
//! ipv6_url = "https://ipv6.mydns.jp/login.html"
//!
//! [accounts.GoogleDomains]
//! provider = "google_domains"
//! username = "generated-user"
//! password = "generated-pass"
//! domain = "b.example.com"
//! use_ipv6 = true
//! url = "https://domains.google.com/nic/update"
//! ```
//!
//! Account sections are registered in the order they appear in the file.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::traits::AddressFamily;

/// Main dipper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DipperConfig {
    /// Cycle intervals and network limits
    pub schedule: ScheduleConfig,

    /// Account sections, keyed by section identifier, in file order
    #[serde(default)]
    pub accounts: toml::Table,
}

impl DipperConfig {
    /// Parse a configuration document
    ///
    /// Only the syntax and the `[schedule]` section are checked here; call
    /// [`DipperConfig::validate`] before using the accounts.
    pub fn from_toml_str(input: &str) -> Result<Self, crate::Error> {
        Ok(toml::from_str(input)?)
    }

    /// Decode every account section, preserving file order
    pub fn account_configs(&self) -> Result<Vec<(String, AccountConfig)>, crate::Error> {
        self.accounts
            .iter()
            .map(|(section, value)| {
                let account: AccountConfig = value.clone().try_into().map_err(|e| {
                    crate::Error::config(format!("Account section [{}]: {}", section, e))
                })?;
                Ok((section.clone(), account))
            })
            .collect()
    }

    /// Validate the configuration
    ///
    /// Rejects bad schedule values, invalid accounts and domains that appear in
    /// more than one section.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.schedule.validate()?;

        let mut seen = HashSet::new();
        for (section, account) in self.account_configs()? {
            account.validate().map_err(|e| {
                crate::Error::config(format!("Account section [{}]: {}", section, e))
            })?;

            if !seen.insert(account.domain.clone()) {
                return Err(crate::Error::duplicate_domain(account.domain));
            }
        }

        Ok(())
    }
}

/// Schedule configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Seconds between unconditional pushes
    pub notification_interval_sec: u64,

    /// Seconds between drift checks
    pub check_interval_sec: u64,

    /// Upper bound for any single lookup or push (in seconds)
    #[serde(default = "default_network_timeout_sec")]
    pub network_timeout_sec: u64,

    /// Capacity of the scheduler's event channel
    ///
    /// When full, events are dropped (with a warning log) rather than
    /// stalling a cycle.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl ScheduleConfig {
    /// Create a schedule with default timeout and channel capacity
    pub fn new(notification_interval_sec: u64, check_interval_sec: u64) -> Self {
        Self {
            notification_interval_sec,
            check_interval_sec,
            network_timeout_sec: default_network_timeout_sec(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }

    /// Validate the schedule
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.notification_interval_sec == 0 {
            return Err(crate::Error::config("notification_interval_sec must be > 0"));
        }
        if self.check_interval_sec == 0 {
            return Err(crate::Error::config("check_interval_sec must be > 0"));
        }
        if self.network_timeout_sec == 0 {
            return Err(crate::Error::config("network_timeout_sec must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }

    pub fn notification_interval(&self) -> Duration {
        Duration::from_secs(self.notification_interval_sec)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_sec)
    }

    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(self.network_timeout_sec)
    }
}

fn default_network_timeout_sec() -> u64 {
    10
}

fn default_event_channel_capacity() -> usize {
    256
}

/// One account section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Provider login
    pub username: String,

    /// Provider secret, passed through opaquely
    pub password: String,

    /// Hostname kept up to date
    pub domain: String,

    /// Keep the A record current
    #[serde(default = "default_use_ipv4")]
    pub use_ipv4: bool,

    /// Keep the AAAA record current
    #[serde(default)]
    pub use_ipv6: bool,

    /// Provider type and its endpoint fields
    #[serde(flatten)]
    pub provider: ProviderConfig,
}

fn default_use_ipv4() -> bool {
    true
}

impl AccountConfig {
    /// Validate the account section
    pub fn validate(&self) -> Result<(), crate::Error> {
        validate_domain_name(&self.domain)?;

        if self.username.is_empty() {
            return Err(crate::Error::config("username cannot be empty"));
        }

        for family in AddressFamily::ALL {
            if self.uses(family) {
                self.provider.validate_for(family)?;
            }
        }

        self.provider.validate()
    }

    /// Whether `family` is enabled for this account
    pub fn uses(&self, family: AddressFamily) -> bool {
        match family {
            AddressFamily::Ipv4 => self.use_ipv4,
            AddressFamily::Ipv6 => self.use_ipv6,
        }
    }
}

/// Provider configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider")]
pub enum ProviderConfig {
    /// MyDNS: one login endpoint per address family
    #[serde(rename = "mydns")]
    MyDns {
        /// Endpoint used for IPv4 updates
        #[serde(default)]
        ipv4_url: Option<String>,
        /// Endpoint used for IPv6 updates
        #[serde(default)]
        ipv6_url: Option<String>,
    },

    /// Google Domains: one dyndns2 endpoint for both families
    #[serde(rename = "google_domains")]
    GoogleDomains {
        /// Update endpoint (`hostname` and `myip` are appended)
        url: String,
    },

    /// Out-of-tree provider
    #[serde(rename = "custom")]
    Custom {
        /// Registered client name to use
        factory: String,
        /// Provider-specific settings
        #[serde(default)]
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider fields that do not depend on enabled families
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::MyDns { ipv4_url, ipv6_url } => {
                for url in ipv4_url.iter().chain(ipv6_url.iter()) {
                    validate_url(url)?;
                }
                Ok(())
            }
            ProviderConfig::GoogleDomains { url } => validate_url(url),
            ProviderConfig::Custom { factory, .. } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Check that an endpoint exists for `family`
    pub fn validate_for(&self, family: AddressFamily) -> Result<(), crate::Error> {
        match (self, family) {
            (ProviderConfig::MyDns { ipv4_url: None, .. }, AddressFamily::Ipv4) => Err(
                crate::Error::config("ipv4_url is required when use_ipv4 is enabled"),
            ),
            (ProviderConfig::MyDns { ipv6_url: None, .. }, AddressFamily::Ipv6) => Err(
                crate::Error::config("ipv6_url is required when use_ipv6 is enabled"),
            ),
            _ => Ok(()),
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::MyDns { .. } => "mydns",
            ProviderConfig::GoogleDomains { .. } => "google_domains",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

fn validate_url(url: &str) -> Result<(), crate::Error> {
    if url.is_empty() {
        return Err(crate::Error::config("Provider URL cannot be empty"));
    }
    if !url.starts_with("https://") && !url.starts_with("http://") {
        return Err(crate::Error::config(format!(
            "Provider URL must use HTTP or HTTPS scheme. Got: {}",
            url
        )));
    }
    Ok(())
}

/// Validate that a string is a plausible DNS host name
///
/// Basic RFC 1035 checks; catches common typos, not every invalid name.
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}
