// # dipperd - dipper daemon
//
// Thin integration layer. All reconciliation logic lives in dipper-core.
//
// The daemon is responsible for:
// 1. Reading `DIPPER_CONFIG` and `DIPPER_LOG_LEVEL`
// 2. Loading and validating the configuration file
// 3. Registering provider clients and the DNS resolver
// 4. Running the scheduler until SIGTERM or SIGINT
//
// ## Example
//
// ```bash
// export DIPPER_CONFIG=/etc/dipper/config.toml
// export DIPPER_LOG_LEVEL=debug
//
// dipperd
// ```

mod settings;

use anyhow::Result;
use dipper_core::{
    AccountRegistry, ProviderRegistry, ReconciliationEngine, Scheduler, SchedulerEvent,
    TokioTimer,
};
use dipper_resolver_dns::DnsAddressResolver;
use settings::{EnvSettings, LoadedConfig};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Upper bound on waiting for in-flight ticks at shutdown
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DipperExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DipperExitCode> for ExitCode {
    fn from(code: DipperExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let env = EnvSettings::from_env();

    let log_level = match env.level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DipperExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DipperExitCode::ConfigError.into();
    }

    info!(config = %env.config_path.display(), "Starting dipperd");

    let config = match LoadedConfig::load(&env.config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {:#}", e);
            return DipperExitCode::ConfigError.into();
        }
    };

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DipperExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => DipperExitCode::CleanShutdown,
            Err(e) if is_startup_error(&e) => {
                error!("Startup error: {:#}", e);
                DipperExitCode::ConfigError
            }
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DipperExitCode::RuntimeError
            }
        }
    });

    result.into()
}

fn is_startup_error(e: &anyhow::Error) -> bool {
    e.downcast_ref::<dipper_core::Error>()
        .is_some_and(dipper_core::Error::is_fatal)
}

/// Register every provider client compiled into this binary
#[allow(unused_variables)]
fn register_providers(registry: &ProviderRegistry, http_timeout: Duration) -> Result<()> {
    #[cfg(feature = "mydns")]
    {
        debug!("Registering MyDNS provider");
        dipper_provider_mydns::register(registry, http_timeout)?;
    }

    #[cfg(feature = "google-domains")]
    {
        debug!("Registering Google Domains provider");
        dipper_provider_google_domains::register(registry, http_timeout)?;
    }

    Ok(())
}

/// Run the daemon
async fn run_daemon(config: LoadedConfig) -> Result<()> {
    let schedule = config.dipper.schedule.clone();

    let accounts = Arc::new(AccountRegistry::from_config(&config.dipper)?);
    if accounts.is_empty() {
        warn!("No accounts configured, the scheduler will idle");
    }

    let providers = Arc::new(ProviderRegistry::new());
    register_providers(&providers, schedule.network_timeout())?;
    info!(providers = ?providers.list_providers(), "Provider clients registered");
    providers.ensure_clients_for(&accounts)?;

    let resolver = Arc::new(DnsAddressResolver::new(&config.resolver)?);

    for domain in accounts.domains() {
        info!(%domain, "Managing domain");
    }

    let engine = Arc::new(ReconciliationEngine::new(
        resolver,
        providers,
        schedule.network_timeout(),
    ));

    let (scheduler, events) = Scheduler::new(engine, accounts, Arc::new(TokioTimer), &schedule)?;
    let reporter = tokio::spawn(report_events(events));
    let handle = scheduler.start();

    let signal = wait_for_shutdown().await?;
    info!("Received shutdown signal: {}", signal);

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, handle.stop()).await.is_err() {
        anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT);
    }

    // The channel closes once both workers have exited
    if let Err(e) = reporter.await {
        warn!("Event reporter failed: {}", e);
    }

    info!("Shutting down dipperd");
    Ok(())
}

/// Log scheduler events
///
/// Outcomes are already logged by the engine. This adds one summary line per
/// tick.
async fn report_events(mut events: mpsc::Receiver<SchedulerEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            SchedulerEvent::Started {
                cycle,
                accounts_count,
            } => {
                info!(%cycle, accounts = accounts_count, "Cycle started");
            }
            SchedulerEvent::Reconciled {
                cycle,
                domain,
                family,
                outcome,
            } => {
                debug!(%cycle, %domain, %family, outcome = %outcome.reason, "Reconciled");
            }
            SchedulerEvent::TickCompleted {
                cycle,
                tick,
                reconciled,
            } => {
                info!(%cycle, tick, reconciled, "Tick completed");
            }
            SchedulerEvent::Stopped { cycle } => {
                info!(%cycle, "Cycle stopped");
            }
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
