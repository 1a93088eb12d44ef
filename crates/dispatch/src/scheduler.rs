//! Polling scheduler that feeds pending messages to delivery units.
//!
//! A run cycle starts with [`Scheduler::start`] and ends with
//! [`Scheduler::stop`]. Each cycle owns a fresh [`CancellationToken`]; the
//! loop task runs one pass immediately, then one pass per `interval`. A pass
//! fetches up to `batch_size` pending messages, delivers them concurrently
//! and joins every delivery before the next fetch.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use herald_core::config::DeliveryConfig;
use herald_storage::MessageStore;

use crate::unit::{DeliveryUnit, UnitOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    pub interval: Duration,
    pub batch_size: u32,
}

impl From<&DeliveryConfig> for SchedulerSettings {
    fn from(config: &DeliveryConfig) -> Self {
        Self {
            interval: config.send_interval,
            batch_size: config.batch_size,
        }
    }
}

/// Counts of one processing pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub fetched: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub abandoned: usize,
}

impl PassSummary {
    fn record(&mut self, outcome: UnitOutcome) {
        match outcome {
            UnitOutcome::Sent => self.sent += 1,
            UnitOutcome::Failed => self.failed += 1,
            UnitOutcome::Skipped => self.skipped += 1,
            UnitOutcome::Abandoned => self.abandoned += 1,
        }
    }
}

#[derive(Default)]
struct RunState {
    running: bool,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl RunState {
    fn halt(&mut self) -> bool {
        if !self.running {
            info!("scheduler already stopped");
            return false;
        }

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.running = false;

        info!("scheduler stopped");
        true
    }
}

struct Inner {
    store: Arc<dyn MessageStore>,
    unit: Arc<DeliveryUnit>,
    settings: SchedulerSettings,
    state: Mutex<RunState>,
}

/// Cheaply cloneable handle to the delivery scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn MessageStore>, unit: DeliveryUnit, settings: SchedulerSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                unit: Arc::new(unit),
                settings,
                state: Mutex::new(RunState::default()),
            }),
        }
    }

    pub fn settings(&self) -> SchedulerSettings {
        self.inner.settings
    }

    /// Launch a run cycle. Returns `false` without side effects when one is
    /// already running. Must be called within a Tokio runtime.
    pub fn start(&self) -> bool {
        let mut state = self.inner.lock_state();
        if state.running {
            info!("scheduler already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let inner = self.inner.clone();
        let token = cancel.clone();
        state.handle = Some(tokio::spawn(async move { inner.run(token).await }));
        state.cancel = Some(cancel);
        state.running = true;

        info!(
            interval = ?self.inner.settings.interval,
            batch_size = self.inner.settings.batch_size,
            "scheduler started"
        );
        true
    }

    /// Cancel the current run cycle without waiting for in-flight
    /// deliveries. Returns `false` when nothing was running.
    pub fn stop(&self) -> bool {
        self.inner.lock_state().halt()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock_state().running
    }

    /// Stop and wait up to `timeout` for the stopped cycle's loop to unwind.
    /// Returns `true` if the loop finished in time (or none was running).
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        // One guard: the awaited handle is always the cycle cancelled here.
        let handle = {
            let mut state = self.inner.lock_state();
            state.halt();
            state.handle.take()
        };
        let Some(handle) = handle else {
            return true;
        };

        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                error!(error = %e, "scheduler loop task failed");
                true
            }
            Err(_) => {
                warn!(?timeout, "scheduler did not drain before shutdown timeout");
                false
            }
        }
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let period = self.settings.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            self.run_pass(&cancel).await;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
        }

        info!("scheduler loop exited");
    }

    async fn run_pass(&self, cancel: &CancellationToken) -> PassSummary {
        let messages = match self.store.fetch_pending(self.settings.batch_size).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "failed to fetch pending messages, skipping pass");
                return PassSummary::default();
            }
        };

        let mut summary = PassSummary {
            fetched: messages.len(),
            ..PassSummary::default()
        };
        info!(count = messages.len(), "fetched pending messages");
        if messages.is_empty() {
            return summary;
        }

        let mut tasks = JoinSet::new();
        for message in messages {
            let unit = self.unit.clone();
            let cancel = cancel.clone();
            tasks.spawn(async move { unit.deliver(message, cancel).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.record(outcome),
                Err(e) => error!(error = %e, "delivery task failed"),
            }
        }

        info!(
            fetched = summary.fetched,
            sent = summary.sent,
            failed = summary.failed,
            skipped = summary.skipped,
            abandoned = summary.abandoned,
            "delivery pass complete"
        );
        summary
    }
}
