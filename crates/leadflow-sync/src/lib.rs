//! Remote change feeds for the lead store: WebSocket push or interval polling.

pub mod polling;
pub mod push;

pub use polling::PollingSync;
pub use push::PushSubscriber;

use leadflow_client::{ApiClient, SyncMode, SyncSettings};
use leadflow_core::LeadFilters;
use leadflow_store::StoreHandle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;
use url::Url;

/// Start the feed selected by `settings`. `SyncMode::Off` starts nothing.
pub fn spawn_sync(
    settings: &SyncSettings,
    ws_url: &Url,
    client: ApiClient,
    store: StoreHandle,
    filters: LeadFilters,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    info!(event = "sync_start", mode = settings.mode.as_str());
    match settings.mode {
        SyncMode::Off => None,
        SyncMode::Polling => {
            let poller = PollingSync::new(store, settings.poll_interval).with_filters(filters);
            Some(tokio::spawn(poller.run(shutdown)))
        }
        SyncMode::Push => {
            let subscriber =
                PushSubscriber::new(ws_url.clone(), client, store).with_resync_filters(filters);
            Some(tokio::spawn(subscriber.run(shutdown)))
        }
    }
}
