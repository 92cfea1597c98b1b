//! Background polling synchronizer.
//!
//! Fetches the full order list on start and then on every tick, handing each
//! response to the [`OrderStore`]. Every tick spawns its own fetch, so a slow
//! response never holds back the next poll; the store's fetch tickets decide
//! which response wins. Failures are logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::OrderService;
use crate::error::DashboardError;
use crate::store::{ApplyOutcome, OrderStore};

/// Default polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

pub struct Synchronizer<S> {
    service: Arc<S>,
    store: Arc<OrderStore>,
}

impl<S> Clone for Synchronizer<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: OrderService> Synchronizer<S> {
    pub fn new(service: Arc<S>, store: Arc<OrderStore>) -> Self {
        Self { service, store }
    }

    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    pub fn service(&self) -> &Arc<S> {
        &self.service
    }

    /// Fetch the order list once and offer it to the store.
    pub async fn sync_once(&self) -> Result<ApplyOutcome, DashboardError> {
        let ticket = self.store.begin_fetch();
        match self.service.list_orders().await {
            Ok(orders) => {
                let count = orders.len();
                let outcome = self.store.apply(ticket, orders);
                match outcome {
                    ApplyOutcome::Applied => {
                        debug!(seq = ticket.seq(), orders = count, "Order snapshot replaced")
                    }
                    ApplyOutcome::Stale => {
                        debug!(seq = ticket.seq(), "Discarded response from superseded fetch")
                    }
                }
                Ok(outcome)
            }
            Err(e) => {
                let failures = self.store.record_failure(ticket);
                warn!(
                    seq = ticket.seq(),
                    consecutive_failures = failures,
                    error = %e,
                    "Order fetch failed, keeping previous snapshot"
                );
                Err(DashboardError::TransientFetchFailure(e))
            }
        }
    }

    /// Start the background loop. The first fetch is issued immediately.
    pub fn start(&self, interval: Duration) -> SyncHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let sync = self.clone();

        let task = tokio::spawn(async move {
            info!("Sync loop started (interval: {}ms)", interval.as_millis());
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {
                        let sync = sync.clone();
                        tokio::spawn(async move {
                            let _ = sync.sync_once().await;
                        });
                    }
                }
            }
            info!("Sync loop stopped");
        });

        SyncHandle {
            token,
            task: Some(task),
        }
    }
}

/// Owner of a running sync loop. Stopping or dropping it ends the timer;
/// fetches already in flight are left to finish.
pub struct SyncHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn is_running(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Stop the timer and wait for the loop task to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Sync loop task ended abnormally: {e}");
            }
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
