use leadflow_core::LeadFilters;
use leadflow_store::{StoreError, StoreHandle};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Refetches the whole lead list on a fixed interval.
pub struct PollingSync {
    store: StoreHandle,
    interval: Duration,
    filters: LeadFilters,
}

impl PollingSync {
    pub fn new(store: StoreHandle, interval: Duration) -> Self {
        Self {
            store,
            interval,
            filters: LeadFilters::default(),
        }
    }

    pub fn with_filters(mut self, filters: LeadFilters) -> Self {
        self.filters = filters;
        self
    }

    /// The first fetch happens immediately. Failures are left to the store's
    /// error field; the next tick simply tries again.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => return,
            }
            if *shutdown.borrow() {
                return;
            }
            match self.store.fetch_all(self.filters.clone()).await {
                Ok(count) => debug!(event = "poll_fetched", count),
                Err(StoreError::Closed) => return,
                Err(err) => warn!(event = "poll_failed", error = %err),
            }
        }
    }
}
