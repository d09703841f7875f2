//! Reconciliation engine
//!
//! The ReconciliationEngine decides, for one (account, family) pair, whether
//! the provider must be told about the current address, and tells it.
//!
//! ## Architecture
//!
//! ```text
//!                     ┌──────────────────────┐
//!   (account, family) │ ReconciliationEngine │
//!  ──────────────────▶│  notify / check      │
//!                     └──────────────────────┘
//!                        │               │
//!              read      ▼               ▼     write (conditional)
//!             ┌─────────────────┐   ┌────────────────┐
//!             │ AddressResolver │   │ ProviderClient │
//!             └─────────────────┘   └────────────────┘
//! ```
//!
//! ## Flow
//!
//! - `notify`: resolve own address → push if present
//! - `check_and_reconcile`: resolve own + published address → push only on drift
//!
//! The engine holds no per-account state. It never retries; the next
//! scheduled cycle is the retry. Every network call is bounded by a timeout
//! and a timeout is handled exactly like an unavailable result.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::account::Account;
use crate::error::Error;
use crate::registry::ProviderRegistry;
use crate::traits::{AddressFamily, AddressResolver, AddressSnapshot, PushAck, Resolution};

/// Why an engine invocation ended the way it did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeReason {
    /// The provider accepted the push
    Pushed(PushAck),
    /// Own and published addresses match; nothing was written
    InSync,
    /// Own address lookup failed or timed out
    OwnAddressUnavailable(String),
    /// Published address lookup failed or timed out
    DomainAddressUnavailable(String),
    /// The family is not enabled on the account
    FamilyDisabled,
    /// The push was attempted and failed
    PushFailed(String),
    /// A resolver or provider client panicked; the pair was abandoned
    Panicked(String),
}

impl fmt::Display for OutcomeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeReason::Pushed(PushAck::Accepted) => f.write_str("pushed"),
            OutcomeReason::Pushed(PushAck::Unchanged) => f.write_str("pushed (provider reported no change)"),
            OutcomeReason::InSync => f.write_str("in sync"),
            OutcomeReason::OwnAddressUnavailable(why) => {
                write!(f, "own address unavailable: {}", why)
            }
            OutcomeReason::DomainAddressUnavailable(why) => {
                write!(f, "published address unavailable: {}", why)
            }
            OutcomeReason::FamilyDisabled => f.write_str("family disabled"),
            OutcomeReason::PushFailed(why) => write!(f, "push failed: {}", why),
            OutcomeReason::Panicked(why) => write!(f, "panicked: {}", why),
        }
    }
}

/// Transient result of one engine invocation
///
/// Not persisted; the caller logs it or forwards it to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationOutcome {
    /// Whether a push was sent
    pub attempted: bool,
    /// Whether the invocation ended in the desired state
    pub succeeded: bool,
    /// Details
    pub reason: OutcomeReason,
}

impl ReconciliationOutcome {
    fn pushed(ack: PushAck) -> Self {
        Self {
            attempted: true,
            succeeded: true,
            reason: OutcomeReason::Pushed(ack),
        }
    }

    fn push_failed(error: &Error) -> Self {
        Self {
            attempted: true,
            succeeded: false,
            reason: OutcomeReason::PushFailed(error.to_string()),
        }
    }

    pub(crate) fn panicked(message: impl Into<String>) -> Self {
        Self {
            attempted: false,
            succeeded: false,
            reason: OutcomeReason::Panicked(message.into()),
        }
    }

    fn in_sync() -> Self {
        Self {
            attempted: false,
            succeeded: true,
            reason: OutcomeReason::InSync,
        }
    }

    fn skipped(reason: OutcomeReason) -> Self {
        Self {
            attempted: false,
            succeeded: false,
            reason,
        }
    }
}

/// Core reconciliation engine
///
/// Cheap to share: wrap it in an `Arc` and hand it to every worker.
pub struct ReconciliationEngine {
    /// Address lookups
    resolver: Arc<dyn AddressResolver>,

    /// Provider clients by type
    providers: Arc<ProviderRegistry>,

    /// Upper bound for each lookup or push
    network_timeout: Duration,
}

impl ReconciliationEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `resolver`: Address resolver implementation
    /// - `providers`: Registry used to pick a client per account
    /// - `network_timeout`: Deadline applied to each network call
    pub fn new(
        resolver: Arc<dyn AddressResolver>,
        providers: Arc<ProviderRegistry>,
        network_timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            providers,
            network_timeout,
        }
    }

    /// Unconditionally push the current address for `family`
    ///
    /// Used by the notify cycle: some providers expect periodic re-assertion,
    /// and on first run the published state is unknown.
    pub async fn notify(&self, account: &Account, family: AddressFamily) -> ReconciliationOutcome {
        if !account.is_enabled(family) {
            return ReconciliationOutcome::skipped(OutcomeReason::FamilyDisabled);
        }

        let mine = self.resolve_own(family).await;
        match mine.resolution {
            Resolution::Found(address) => self.push(account, family, &address).await,
            Resolution::Unavailable(why) => {
                warn!(domain = %account.domain, %family, reason = %why, "Own address unavailable, skipping notify");
                ReconciliationOutcome::skipped(OutcomeReason::OwnAddressUnavailable(why))
            }
        }
    }

    /// Push only if the published address differs from the current one
    ///
    /// If either lookup is unavailable nothing is written: drift cannot be
    /// concluded from incomplete data. Comparison is exact string equality.
    pub async fn check_and_reconcile(
        &self,
        account: &Account,
        family: AddressFamily,
    ) -> ReconciliationOutcome {
        if !account.is_enabled(family) {
            return ReconciliationOutcome::skipped(OutcomeReason::FamilyDisabled);
        }

        let mine = match self.resolve_own(family).await.resolution {
            Resolution::Found(address) => address,
            Resolution::Unavailable(why) => {
                warn!(domain = %account.domain, %family, reason = %why, "Own address unavailable, skipping check");
                return ReconciliationOutcome::skipped(OutcomeReason::OwnAddressUnavailable(why));
            }
        };

        let published = match self.resolve_domain(&account.domain, family).await.resolution {
            Resolution::Found(address) => address,
            Resolution::Unavailable(why) => {
                warn!(domain = %account.domain, %family, reason = %why, "Published address unavailable, skipping check");
                return ReconciliationOutcome::skipped(OutcomeReason::DomainAddressUnavailable(
                    why,
                ));
            }
        };

        if mine == published {
            debug!(domain = %account.domain, %family, address = %mine, "In sync");
            return ReconciliationOutcome::in_sync();
        }

        info!(
            domain = %account.domain,
            %family,
            published = %published,
            current = %mine,
            "Drift detected"
        );
        self.push(account, family, &mine).await
    }

    async fn push(
        &self,
        account: &Account,
        family: AddressFamily,
        address: &str,
    ) -> ReconciliationOutcome {
        let client = match self.providers.client_for(account) {
            Ok(client) => client,
            Err(e) => {
                warn!(domain = %account.domain, error = %e, "No client for provider");
                return ReconciliationOutcome::skipped(OutcomeReason::PushFailed(e.to_string()));
            }
        };

        let result = match tokio::time::timeout(
            self.network_timeout,
            client.push(account, family, address),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "{} push exceeded {:?}",
                client.provider_name(),
                self.network_timeout
            ))),
        };

        match result {
            Ok(ack) => {
                info!(
                    domain = %account.domain,
                    %family,
                    %address,
                    provider = client.provider_name(),
                    "Address pushed"
                );
                ReconciliationOutcome::pushed(ack)
            }
            Err(e) => {
                warn!(
                    domain = %account.domain,
                    %family,
                    provider = client.provider_name(),
                    error = %e,
                    "Push failed; will retry next cycle"
                );
                ReconciliationOutcome::push_failed(&e)
            }
        }
    }

    async fn resolve_own(&self, family: AddressFamily) -> AddressSnapshot {
        tokio::time::timeout(self.network_timeout, self.resolver.my_public_address(family))
            .await
            .unwrap_or_else(|_| {
                AddressSnapshot::unavailable(family, "own address lookup timed out")
            })
    }

    async fn resolve_domain(&self, domain: &str, family: AddressFamily) -> AddressSnapshot {
        tokio::time::timeout(
            self.network_timeout,
            self.resolver.domain_address(domain, family),
        )
        .await
        .unwrap_or_else(|_| AddressSnapshot::unavailable(family, "domain lookup timed out"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_constructors() {
        let pushed = ReconciliationOutcome::pushed(PushAck::Accepted);
        assert!(pushed.attempted && pushed.succeeded);

        let failed = ReconciliationOutcome::push_failed(&Error::http("refused"));
        assert!(failed.attempted);
        assert!(!failed.succeeded);

        let in_sync = ReconciliationOutcome::in_sync();
        assert!(!in_sync.attempted);
        assert!(in_sync.succeeded);
    }

    #[test]
    fn reasons_render_for_logs() {
        assert_eq!(OutcomeReason::InSync.to_string(), "in sync");
        assert_eq!(
            OutcomeReason::PushFailed("status 500".to_string()).to_string(),
            "push failed: status 500"
        );
    }
}
