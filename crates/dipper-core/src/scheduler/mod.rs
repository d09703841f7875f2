//! Notify and check cycles
//!
//! The Scheduler runs two independent background workers:
//!
//! - **notify**: every `notification_interval`, call
//!   [`ReconciliationEngine::notify`] for each enabled family of each account
//! - **check**: every `check_interval`, call
//!   [`ReconciliationEngine::check_and_reconcile`] the same way
//!
//! Each worker is a single sequential loop. On every tick it takes a snapshot
//! of the account registry and processes accounts in registration order,
//! then waits for the next tick. The two workers never share mutable state
//! and may interleave freely.
//!
//! ## Lifecycle
//!
//! 1. Create with [`Scheduler::new()`]
//! 2. Start with [`Scheduler::start()`], which spawns both workers and returns
//!    a [`SchedulerHandle`]
//! 3. [`SchedulerHandle::stop()`] signals both workers and waits for them.
//!    A tick in progress is allowed to finish.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, warn};

use crate::config::ScheduleConfig;
use crate::engine::{ReconciliationEngine, ReconciliationOutcome};
use crate::registry::AccountRegistry;
use crate::timer::Timer;
use crate::account::Account;
use crate::traits::AddressFamily;

/// Which periodic cycle a worker runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleKind {
    /// Unconditional re-assertion
    Notify,
    /// Drift detection
    Check,
}

impl fmt::Display for CycleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleKind::Notify => f.write_str("notify"),
            CycleKind::Check => f.write_str("check"),
        }
    }
}

/// Events emitted by the Scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A worker started
    Started {
        cycle: CycleKind,
        accounts_count: usize,
    },

    /// One (account, family) pair was processed
    Reconciled {
        cycle: CycleKind,
        domain: String,
        family: AddressFamily,
        outcome: ReconciliationOutcome,
    },

    /// A tick finished processing every account
    TickCompleted {
        cycle: CycleKind,
        tick: u64,
        reconciled: usize,
    },

    /// A worker stopped
    Stopped { cycle: CycleKind },
}

/// Two-cycle scheduler
pub struct Scheduler {
    engine: Arc<ReconciliationEngine>,
    accounts: Arc<AccountRegistry>,
    timer: Arc<dyn Timer>,
    notification_interval: Duration,
    check_interval: Duration,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl Scheduler {
    /// Create a new scheduler
    ///
    /// # Parameters
    ///
    /// - `engine`: Engine shared by both workers
    /// - `accounts`: Registry enumerated on every tick
    /// - `timer`: Tick source (use [`crate::TokioTimer`] in production)
    /// - `schedule`: Intervals and event channel capacity
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields
    /// scheduler events
    pub fn new(
        engine: Arc<ReconciliationEngine>,
        accounts: Arc<AccountRegistry>,
        timer: Arc<dyn Timer>,
        schedule: &ScheduleConfig,
    ) -> crate::Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        schedule.validate()?;

        let (tx, rx) = mpsc::channel(schedule.event_channel_capacity);

        let scheduler = Self {
            engine,
            accounts,
            timer,
            notification_interval: schedule.notification_interval(),
            check_interval: schedule.check_interval(),
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// Spawn both workers on the current tokio runtime
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let notify = Worker {
            cycle: CycleKind::Notify,
            period: self.notification_interval,
            engine: Arc::clone(&self.engine),
            accounts: Arc::clone(&self.accounts),
            timer: Arc::clone(&self.timer),
            event_tx: self.event_tx.clone(),
        };

        let check = Worker {
            cycle: CycleKind::Check,
            period: self.check_interval,
            engine: self.engine,
            accounts: self.accounts,
            timer: self.timer,
            event_tx: self.event_tx,
        };

        info!(
            notification_interval = ?notify.period,
            check_interval = ?check.period,
            "Starting scheduler"
        );

        SchedulerHandle {
            shutdown_tx,
            notify: tokio::spawn(notify.run(shutdown_rx.clone())),
            check: tokio::spawn(check.run(shutdown_rx)),
        }
    }
}

/// Handle to the running workers
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    notify: JoinHandle<()>,
    check: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal both workers and wait for them to exit
    pub async fn stop(self) {
        info!("Stopping scheduler");
        // Both receivers may already be gone if the workers ended on their own
        let _ = self.shutdown_tx.send(true);

        for (cycle, handle) in [(CycleKind::Notify, self.notify), (CycleKind::Check, self.check)] {
            if let Err(e) = handle.await {
                error!(%cycle, error = %e, "Worker task failed");
            }
        }
    }

    /// Whether both workers have exited
    pub fn is_finished(&self) -> bool {
        self.notify.is_finished() && self.check.is_finished()
    }
}

struct Worker {
    cycle: CycleKind,
    period: Duration,
    engine: Arc<ReconciliationEngine>,
    accounts: Arc<AccountRegistry>,
    timer: Arc<dyn Timer>,
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl Worker {
    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        self.emit_event(SchedulerEvent::Started {
            cycle: self.cycle,
            accounts_count: self.accounts.len(),
        });

        let mut ticks = self.timer.ticks(self.period);
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!(cycle = %self.cycle, "Shutdown signal received");
                        break;
                    }
                }

                next = ticks.next() => {
                    if next.is_none() {
                        info!(cycle = %self.cycle, "Timer ended");
                        break;
                    }
                    tick += 1;
                    self.run_tick(tick).await;
                }
            }
        }

        self.emit_event(SchedulerEvent::Stopped { cycle: self.cycle });
    }

    async fn run_tick(&self, tick: u64) {
        let accounts = self.accounts.snapshot();
        debug!(cycle = %self.cycle, tick, accounts = accounts.len(), "Tick started");

        let mut reconciled = 0;
        for account in &accounts {
            for family in account.enabled_families() {
                let outcome = self.reconcile(account, family).await;

                debug!(
                    cycle = %self.cycle,
                    domain = %account.domain,
                    %family,
                    outcome = %outcome.reason,
                    "Reconciled"
                );

                reconciled += 1;
                self.emit_event(SchedulerEvent::Reconciled {
                    cycle: self.cycle,
                    domain: account.domain.clone(),
                    family,
                    outcome,
                });
            }
        }

        self.emit_event(SchedulerEvent::TickCompleted {
            cycle: self.cycle,
            tick,
            reconciled,
        });
    }

    /// Run one (account, family) pair, containing any panic to that pair
    async fn reconcile(&self, account: &Account, family: AddressFamily) -> ReconciliationOutcome {
        let run = async {
            match self.cycle {
                CycleKind::Notify => self.engine.notify(account, family).await,
                CycleKind::Check => self.engine.check_and_reconcile(account, family).await,
            }
        };

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    cycle = %self.cycle,
                    domain = %account.domain,
                    %family,
                    panic = %message,
                    "Reconciliation panicked, continuing with the next account"
                );
                ReconciliationOutcome::panicked(message)
            }
        }
    }

    fn emit_event(&self, event: SchedulerEvent) {
        // Never block a cycle on a slow observer
        if let Err(mpsc::error::TrySendError::Full(_)) = self.event_tx.try_send(event) {
            warn!(cycle = %self.cycle, "Event channel full, dropping event. Consider increasing event_channel_capacity.");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_messages_are_extracted() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(format!("status {}", 500));
        assert_eq!(panic_message(payload.as_ref()), "status 500");

        let payload: Box<dyn Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
