//! Account and provider registries
//!
//! - [`AccountRegistry`]: domain → [`Account`], in registration order
//! - [`ProviderRegistry`]: provider type name → shared [`ProviderClient`]
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dipper_core::{AccountRegistry, ProviderRegistry};
//!
//! let providers = ProviderRegistry::new();
//! dipper_provider_mydns::register(&providers, http_timeout)?;
//! dipper_provider_google_domains::register(&providers, http_timeout)?;
//!
//! let accounts = AccountRegistry::from_config(&config)?;
//! providers.ensure_clients_for(&accounts)?;
//! ```
//!
//! ## Thread Safety
//!
//! Both registries use interior mutability with `RwLock`, allowing concurrent
//! reads and exclusive writes. Readers take a snapshot and release the lock
//! before doing any network I/O.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::account::Account;
use crate::config::DipperConfig;
use crate::error::{Error, Result};
use crate::traits::ProviderClient;

#[derive(Debug, Default)]
struct Accounts {
    ordered: Vec<Arc<Account>>,
    by_domain: HashMap<String, usize>,
}

/// In-memory mapping of domain → account
///
/// Enumeration order is insertion order. Registering a domain that already
/// exists replaces the earlier account in place (last registration wins) and
/// keeps its original position.
#[derive(Debug, Default)]
pub struct AccountRegistry {
    accounts: RwLock<Accounts>,
}

impl AccountRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a validated configuration
    ///
    /// Unlike [`AccountRegistry::register`], a domain that appears in two
    /// sections is a configuration defect and fails here.
    pub fn from_config(config: &DipperConfig) -> Result<Self> {
        config.validate()?;

        let registry = Self::new();
        for (section, account_config) in config.account_configs()? {
            debug!(section = %section, domain = %account_config.domain, "Registering account");
            registry.register(Account::from(account_config));
        }

        Ok(registry)
    }

    /// Register an account
    ///
    /// # Returns
    ///
    /// The account previously registered under the same domain, if any.
    pub fn register(&self, account: Account) -> Option<Arc<Account>> {
        if account.is_inert() {
            warn!(domain = %account.domain, "Account has no address family enabled; it will never be updated");
        }

        let mut accounts = self
            .accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let account = Arc::new(account);

        let existing = accounts.by_domain.get(&account.domain).copied();
        if let Some(index) = existing {
            warn!(
                domain = %account.domain,
                provider = account.provider_name(),
                "Domain already registered; replacing previous account"
            );
            return Some(std::mem::replace(&mut accounts.ordered[index], account));
        }

        let index = accounts.ordered.len();
        accounts.by_domain.insert(account.domain.clone(), index);
        accounts.ordered.push(account);
        None
    }

    /// All accounts, in registration order
    ///
    /// The returned vector is a snapshot; later registrations do not affect it.
    pub fn snapshot(&self) -> Vec<Arc<Account>> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .clone()
    }

    /// Registered domains, in registration order
    pub fn domains(&self) -> Vec<String> {
        self.snapshot()
            .iter()
            .map(|account| account.domain.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .ordered
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Registry of provider clients, keyed by provider type name
///
/// Provider crates expose a `register(&ProviderRegistry, ..)` function, so the
/// daemon never needs an if-else chain over provider types.
#[derive(Default)]
pub struct ProviderRegistry {
    clients: RwLock<HashMap<String, Arc<dyn ProviderClient>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider client
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "mydns", "google_domains")
    /// - `client`: Client shared by every account of that type
    pub fn register_provider(&self, name: impl Into<String>, client: Arc<dyn ProviderClient>) {
        let name = name.into();
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.insert(name, client);
    }

    /// Get the client for an account's provider type
    pub fn client_for(&self, account: &Account) -> Result<Arc<dyn ProviderClient>> {
        self.get(account.provider_name())
            .ok_or_else(|| Error::unknown_provider(account.provider_name()))
    }

    /// Get a client by provider type name
    pub fn get(&self, name: &str) -> Option<Arc<dyn ProviderClient>> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.get(name).cloned()
    }

    /// Check that every registered account has a client
    ///
    /// Run once at startup so a typo in a provider name is fatal there rather
    /// than a failed outcome on every tick.
    pub fn ensure_clients_for(&self, accounts: &AccountRegistry) -> Result<()> {
        for account in accounts.snapshot() {
            if !self.has_provider(account.provider_name()) {
                return Err(Error::unknown_provider(account.provider_name()));
            }
        }
        Ok(())
    }

    /// List all registered provider types, sorted by name
    pub fn list_providers(&self) -> Vec<String> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = clients.keys().cloned().collect();
        names.sort();
        names
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::Credentials;
    use crate::config::ProviderConfig;
    use crate::traits::{AddressFamily, PushAck};

    struct NullClient;

    #[async_trait::async_trait]
    impl ProviderClient for NullClient {
        async fn push(&self, _: &Account, _: AddressFamily, _: &str) -> Result<PushAck> {
            Ok(PushAck::Accepted)
        }

        fn provider_name(&self) -> &'static str {
            "google_domains"
        }
    }

    fn account(domain: &str, provider: ProviderConfig) -> Account {
        Account::new(domain, Credentials::new("u", "p"), provider).with_ipv4(true)
    }

    fn google() -> ProviderConfig {
        ProviderConfig::GoogleDomains {
            url: "https://domains.google.com/nic/update".to_string(),
        }
    }

    fn mydns() -> ProviderConfig {
        ProviderConfig::MyDns {
            ipv4_url: Some("https://ipv4.mydns.jp/login.html".to_string()),
            ipv6_url: None,
        }
    }

    #[test]
    fn enumerates_in_registration_order() {
        let registry = AccountRegistry::new();
        registry.register(account("c.example.com", google()));
        registry.register(account("a.example.com", google()));
        registry.register(account("b.example.com", mydns()));

        assert_eq!(
            registry.domains(),
            vec!["c.example.com", "a.example.com", "b.example.com"]
        );
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn last_registration_wins_and_keeps_position() {
        let registry = AccountRegistry::new();
        registry.register(account("a.example.com", google()));
        registry.register(account("b.example.com", google()));

        let previous = registry.register(account("a.example.com", mydns()));
        assert_eq!(previous.unwrap().provider_name(), "google_domains");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.domains(), vec!["a.example.com", "b.example.com"]);
        assert_eq!(registry.snapshot()[0].provider_name(), "mydns");
    }

    #[test]
    fn snapshot_is_unaffected_by_later_registration() {
        let registry = AccountRegistry::new();
        registry.register(account("a.example.com", google()));

        let snapshot = registry.snapshot();
        registry.register(account("b.example.com", google()));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn provider_registration() {
        let registry = ProviderRegistry::new();
        assert!(!registry.has_provider("google_domains"));

        registry.register_provider("google_domains", Arc::new(NullClient));

        assert!(registry.has_provider("google_domains"));
        registry.register_provider("mydns", Arc::new(NullClient));
        assert_eq!(registry.list_providers(), vec!["google_domains", "mydns"]);
        assert!(registry.client_for(&account("a.example.com", google())).is_ok());
    }

    #[test]
    fn missing_client_is_reported() {
        let providers = ProviderRegistry::new();
        providers.register_provider("google_domains", Arc::new(NullClient));

        let accounts = AccountRegistry::new();
        accounts.register(account("a.example.com", google()));
        assert!(providers.ensure_clients_for(&accounts).is_ok());

        accounts.register(account("b.example.com", mydns()));
        let err = providers.ensure_clients_for(&accounts).unwrap_err();
        assert!(matches!(err, Error::UnknownProvider(ref name) if name == "mydns"));
    }
}
