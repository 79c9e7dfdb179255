//! Per-charger polling and refresh coordination
//!
//! A [`RefreshCoordinator`] owns the last known [`StatusSnapshot`] of one
//! charger. Refreshes come from the periodic timer or from callers; at most
//! one status request is on the wire at any time and concurrent requesters
//! share its outcome.
//!
//! The fetch itself runs on a spawned task and publishes its result through
//! a `watch` channel. Dropping a waiting requester (or stopping the timer)
//! therefore never discards a fetch that is already under way.

use crate::adapter::DeviceAdapter;
use crate::commands::ChargerCommand;
use crate::error::{GoeError, Result};
use crate::logging::{StructuredLogger, get_device_logger};
use crate::snapshot::StatusSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

type Outcome = Option<Result<()>>;

/// A fetch that has been started and not yet finished
struct InFlight {
    /// Write epoch observed when the fetch started
    epoch: u64,
    outcome: watch::Receiver<Outcome>,
}

struct Shared {
    name: String,
    adapter: Arc<DeviceAdapter>,
    snapshot_tx: watch::Sender<Arc<StatusSnapshot>>,
    in_flight: Mutex<Option<InFlight>>,
    write_epoch: AtomicU64,
    logger: StructuredLogger,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn wait_outcome(mut rx: watch::Receiver<Outcome>) -> Result<()> {
    match rx.wait_for(Option::is_some).await {
        Ok(outcome) => outcome
            .clone()
            .unwrap_or_else(|| Err(GoeError::generic("refresh finished without a result"))),
        Err(_) => Err(GoeError::generic("refresh task ended without a result")),
    }
}

impl Shared {
    async fn refresh(self: &Arc<Self>) -> Result<()> {
        loop {
            let epoch = self.write_epoch.load(Ordering::SeqCst);
            let (rx, current) = {
                let mut slot = lock(&self.in_flight);
                match slot.as_ref() {
                    Some(fetch) => (fetch.outcome.clone(), fetch.epoch >= epoch),
                    None => {
                        let rx = self.spawn_fetch(epoch);
                        *slot = Some(InFlight {
                            epoch,
                            outcome: rx.clone(),
                        });
                        (rx, true)
                    }
                }
            };

            let outcome = wait_outcome(rx.clone()).await;
            // A fetch that ended without publishing must not block later ones
            self.release(&rx);
            if current {
                return outcome;
            }
            // Started before the last write; its data may predate it
            self.logger
                .debug("Fetch predates the last write, fetching again");
        }
    }

    /// Clear the in-flight slot if it still belongs to `rx`'s fetch
    fn release(&self, rx: &watch::Receiver<Outcome>) {
        let mut slot = lock(&self.in_flight);
        if slot.as_ref().is_some_and(|f| f.outcome.same_channel(rx)) {
            *slot = None;
        }
    }

    fn spawn_fetch(self: &Arc<Self>, epoch: u64) -> watch::Receiver<Outcome> {
        let (tx, rx) = watch::channel(None);
        let shared = Arc::clone(self);
        let own = rx.clone();
        tokio::spawn(async move {
            // The transport runs on its own task so a panic in it still
            // yields an outcome here
            let fetch = {
                let shared = Arc::clone(&shared);
                tokio::spawn(async move { shared.fetch().await })
            };
            let result = fetch.await.unwrap_or_else(|e| {
                Err(GoeError::generic(format!("Status fetch aborted: {}", e)))
            });
            match &result {
                Err(e) if e.is_fetch_failure() => {
                    shared.logger.warn(&format!("Status update failed: {}", e));
                }
                Err(e) => shared.logger.error(&format!("Status update failed: {}", e)),
                Ok(()) => {}
            }
            shared.release(&own);
            tx.send_replace(Some(result));
            shared
                .logger
                .trace(&format!("Fetch for write epoch {} finished", epoch));
        });
        rx
    }

    async fn fetch(&self) -> Result<()> {
        let snapshot = self.adapter.fetch_status().await?;
        if snapshot.is_sentinel() {
            return Err(GoeError::invalid_payload(self.name.as_str()));
        }
        self.logger.trace(&format!(
            "Received {} fields, car_status={}",
            snapshot.len(),
            snapshot.car_status().unwrap_or_default()
        ));
        self.snapshot_tx.send_replace(Arc::new(snapshot));
        Ok(())
    }

    async fn poll_once(self: &Arc<Self>) {
        if self.refresh().await.is_err() {
            self.logger.debug("Keeping previous snapshot after failed poll");
        }
    }
}

/// Cache and refresh scheduling for one charger
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshCoordinator {
    pub fn new(name: &str, adapter: Arc<DeviceAdapter>) -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::new(StatusSnapshot::empty()));
        Self {
            shared: Arc::new(Shared {
                name: name.to_string(),
                adapter,
                snapshot_tx,
                in_flight: Mutex::new(None),
                write_epoch: AtomicU64::new(0),
                logger: get_device_logger("coordinator", name),
            }),
            timer: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn adapter(&self) -> &Arc<DeviceAdapter> {
        &self.shared.adapter
    }

    /// Refresh the cached snapshot now.
    ///
    /// Joins a fetch that is already running unless that fetch started
    /// before the most recent write. Transport failures and sentinel
    /// payloads are returned; the cache keeps its previous value.
    pub async fn request_refresh(&self) -> Result<()> {
        self.shared.refresh().await
    }

    /// Refresh as the timer does: failures are logged, never returned
    pub async fn poll_once(&self) {
        self.shared.poll_once().await;
    }

    /// Last successfully fetched snapshot (empty before the first success)
    pub fn current_snapshot(&self) -> Arc<StatusSnapshot> {
        self.shared.snapshot_tx.borrow().clone()
    }

    /// Receiver notified each time a new snapshot is cached
    pub fn subscribe(&self) -> watch::Receiver<Arc<StatusSnapshot>> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Start periodic polling, replacing any running timer.
    ///
    /// The first tick fires one full period from now. Must be called from
    /// within a Tokio runtime.
    pub fn start(&self, period: Duration) {
        let mut timer = lock(&self.timer);
        if let Some(handle) = timer.take() {
            handle.abort();
        }
        self.shared.logger.info(&format!(
            "Polling every {}s",
            period.as_secs_f64()
        ));
        let shared = Arc::clone(&self.shared);
        *timer = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                shared.poll_once().await;
            }
        }));
    }

    /// Stop periodic polling. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
            self.shared.logger.info("Polling stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        lock(&self.timer)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Dispatch a write, then refresh once so the cache reflects it.
    ///
    /// The refresh runs whether the write succeeded or failed, except for
    /// writes rejected before dispatch (unsupported operation or unusable
    /// value). A write error is returned in preference to a refresh error.
    pub async fn execute(&self, command: ChargerCommand) -> Result<ChargerCommand> {
        let written = match self.shared.adapter.apply(&command).await {
            // Rejected before anything reached the charger
            Err(
                e @ (GoeError::UnsupportedOnProtocol { .. }
                | GoeError::InvalidCommandInput { .. }),
            ) => {
                self.shared.logger.warn(&e.to_string());
                return Err(e);
            }
            other => other,
        };
        self.shared.write_epoch.fetch_add(1, Ordering::SeqCst);

        let refreshed = self.shared.refresh().await;
        match written {
            Ok(sent) => {
                self.shared.logger.info(&format!("Applied {}", sent));
                refreshed.map(|_| sent)
            }
            Err(e) => {
                self.shared
                    .logger
                    .error(&format!("Failed to apply {}: {}", command, e));
                Err(e)
            }
        }
    }
}

impl Drop for RefreshCoordinator {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.timer).take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("name", &self.shared.name)
            .field("adapter", &self.shared.adapter)
            .field("running", &self.is_running())
            .finish()
    }
}
