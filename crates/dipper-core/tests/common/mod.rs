//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that record what the engine and
//! scheduler do without touching the network.

#![allow(dead_code)]

use dipper_core::error::{Error, Result};
use dipper_core::timer::{TickStream, Timer};
use dipper_core::traits::{AddressFamily, AddressResolver, AddressSnapshot, ProviderClient, PushAck};
use dipper_core::{
    Account, AccountRegistry, Credentials, ProviderConfig, ProviderRegistry, ReconciliationEngine,
    ScheduleConfig, Scheduler, SchedulerEvent,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Intervals used by scheduler tests
pub const NOTIFY_EVERY: Duration = Duration::from_secs(3600);
pub const CHECK_EVERY: Duration = Duration::from_secs(300);

/// A resolver whose answers are scripted by the test
///
/// Unscripted lookups return `Unavailable`.
#[derive(Default)]
pub struct ScriptedResolver {
    own: Mutex<HashMap<AddressFamily, AddressSnapshot>>,
    published: Mutex<HashMap<(String, AddressFamily), AddressSnapshot>>,
    own_calls: Mutex<Vec<AddressFamily>>,
    domain_calls: Mutex<Vec<(String, AddressFamily)>>,
    own_delay: Option<Duration>,
    domain_delay: Option<Duration>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A resolver that sleeps before answering (for timeout tests)
    pub fn slow(delay: Duration) -> Self {
        Self {
            own_delay: Some(delay),
            domain_delay: Some(delay),
            ..Self::default()
        }
    }

    /// A resolver that answers own-address lookups at once but sleeps before
    /// answering domain lookups
    pub fn slow_domain_lookups(delay: Duration) -> Self {
        Self {
            domain_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn set_own(&self, family: AddressFamily, address: &str) {
        self.own
            .lock()
            .unwrap()
            .insert(family, AddressSnapshot::found(family, address));
    }

    pub fn set_own_unavailable(&self, family: AddressFamily) {
        self.own
            .lock()
            .unwrap()
            .insert(family, AddressSnapshot::unavailable(family, "scripted failure"));
    }

    pub fn set_published(&self, domain: &str, family: AddressFamily, address: &str) {
        self.published.lock().unwrap().insert(
            (domain.to_string(), family),
            AddressSnapshot::found(family, address),
        );
    }

    pub fn own_calls(&self) -> Vec<AddressFamily> {
        self.own_calls.lock().unwrap().clone()
    }

    pub fn domain_calls(&self) -> Vec<(String, AddressFamily)> {
        self.domain_calls.lock().unwrap().clone()
    }

    async fn maybe_wait(delay: Option<Duration>) {
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl AddressResolver for ScriptedResolver {
    async fn my_public_address(&self, family: AddressFamily) -> AddressSnapshot {
        self.own_calls.lock().unwrap().push(family);
        Self::maybe_wait(self.own_delay).await;
        self.own
            .lock()
            .unwrap()
            .get(&family)
            .cloned()
            .unwrap_or_else(|| AddressSnapshot::unavailable(family, "not scripted"))
    }

    async fn domain_address(&self, domain: &str, family: AddressFamily) -> AddressSnapshot {
        self.domain_calls
            .lock()
            .unwrap()
            .push((domain.to_string(), family));
        Self::maybe_wait(self.domain_delay).await;
        self.published
            .lock()
            .unwrap()
            .get(&(domain.to_string(), family))
            .cloned()
            .unwrap_or_else(|| AddressSnapshot::unavailable(family, "not scripted"))
    }
}

/// One recorded push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRecord {
    pub provider: &'static str,
    pub domain: String,
    pub family: AddressFamily,
    pub address: String,
}

/// Shared log of pushes across several recording clients
#[derive(Debug, Clone, Default)]
pub struct PushLog(Arc<Mutex<Vec<PushRecord>>>);

impl PushLog {
    pub fn records(&self) -> Vec<PushRecord> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn count_for(&self, family: AddressFamily) -> usize {
        self.records().iter().filter(|r| r.family == family).count()
    }
}

/// A provider client that records calls
pub struct RecordingClient {
    name: &'static str,
    log: PushLog,
    failing_domains: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    calls: AtomicUsize,
}

impl RecordingClient {
    pub fn new(name: &'static str, log: PushLog) -> Self {
        Self {
            name,
            log,
            failing_domains: Mutex::new(HashSet::new()),
            delay: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make every push for `domain` fail
    pub fn fail_for(&self, domain: &str) {
        self.failing_domains
            .lock()
            .unwrap()
            .insert(domain.to_string());
    }

    /// Sleep for `delay` before answering each push
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ProviderClient for RecordingClient {
    async fn push(&self, account: &Account, family: AddressFamily, address: &str) -> Result<PushAck> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.log.0.lock().unwrap().push(PushRecord {
            provider: self.name,
            domain: account.domain.clone(),
            family,
            address: address.to_string(),
        });

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_domains.lock().unwrap().contains(&account.domain) {
            return Err(Error::provider(self.name, "status 503"));
        }
        Ok(PushAck::Accepted)
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// A provider client that panics on every push
pub struct PanickingClient {
    name: &'static str,
}

impl PanickingClient {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait::async_trait]
impl ProviderClient for PanickingClient {
    async fn push(&self, account: &Account, _family: AddressFamily, _address: &str) -> Result<PushAck> {
        panic!("{} client bug while pushing {}", self.name, account.domain);
    }

    fn provider_name(&self) -> &'static str {
        self.name
    }
}

/// A timer driven by the test
///
/// Each period gets its own channel; `tick(period)` releases one tick to the
/// worker using that period. Ticks sent before the worker subscribes are
/// buffered.
#[derive(Default)]
pub struct ManualTimer {
    channels: Mutex<HashMap<Duration, ManualChannel>>,
}

#[derive(Default)]
struct ManualChannel {
    tx: Option<mpsc::UnboundedSender<()>>,
    rx: Option<mpsc::UnboundedReceiver<()>>,
}

impl ManualTimer {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_channel<R>(&self, period: Duration, f: impl FnOnce(&mut ManualChannel) -> R) -> R {
        let mut channels = self.channels.lock().unwrap();
        let channel = channels.entry(period).or_insert_with(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            ManualChannel {
                tx: Some(tx),
                rx: Some(rx),
            }
        });
        f(channel)
    }

    /// Release one tick for the worker using `period`
    pub fn tick(&self, period: Duration) {
        self.with_channel(period, |channel| {
            if let Some(tx) = &channel.tx {
                let _ = tx.send(());
            }
        });
    }

    /// End the tick stream for `period`
    pub fn close(&self, period: Duration) {
        self.with_channel(period, |channel| channel.tx = None);
    }
}

impl Timer for ManualTimer {
    fn ticks(&self, period: Duration) -> TickStream {
        let rx = self
            .with_channel(period, |channel| channel.rx.take())
            .expect("ticks() can only be called once per period");
        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

pub fn mydns_account(domain: &str) -> Account {
    Account::new(
        domain,
        Credentials::new("mydns-user", "mydns-pass"),
        ProviderConfig::MyDns {
            ipv4_url: Some("https://ipv4.mydns.jp/login.html".to_string()),
            ipv6_url: Some("https://ipv6.mydns.jp/login.html".to_string()),
        },
    )
}

pub fn google_account(domain: &str) -> Account {
    Account::new(
        domain,
        Credentials::new("google-user", "google-pass"),
        ProviderConfig::GoogleDomains {
            url: "https://domains.google.com/nic/update".to_string(),
        },
    )
}

/// Provider registry with recording clients for both built-in provider names
pub fn recording_providers(log: &PushLog) -> (Arc<ProviderRegistry>, Arc<RecordingClient>, Arc<RecordingClient>) {
    let providers = ProviderRegistry::new();
    let mydns = Arc::new(RecordingClient::new("mydns", log.clone()));
    let google = Arc::new(RecordingClient::new("google_domains", log.clone()));
    providers.register_provider("mydns", mydns.clone());
    providers.register_provider("google_domains", google.clone());
    (Arc::new(providers), mydns, google)
}

pub fn engine(resolver: Arc<ScriptedResolver>, providers: Arc<ProviderRegistry>) -> ReconciliationEngine {
    ReconciliationEngine::new(resolver, providers, Duration::from_secs(10))
}

/// Scheduler wired to a manual timer
pub fn manual_scheduler(
    resolver: Arc<ScriptedResolver>,
    providers: Arc<ProviderRegistry>,
    accounts: Arc<AccountRegistry>,
    timer: Arc<ManualTimer>,
) -> (Scheduler, mpsc::Receiver<SchedulerEvent>) {
    let engine = Arc::new(engine(resolver, providers));
    let schedule = ScheduleConfig::new(NOTIFY_EVERY.as_secs(), CHECK_EVERY.as_secs());
    Scheduler::new(engine, accounts, timer, &schedule).expect("scheduler construction succeeds")
}

/// Collect events until a tick of `cycle` completes
pub async fn events_until_tick_completed(
    rx: &mut mpsc::Receiver<SchedulerEvent>,
    cycle: dipper_core::CycleKind,
) -> Vec<SchedulerEvent> {
    let mut events = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("tick completes within 5 seconds")
            .expect("event channel open");
        let done = matches!(event, SchedulerEvent::TickCompleted { cycle: c, .. } if c == cycle);
        events.push(event);
        if done {
            return events;
        }
    }
}
