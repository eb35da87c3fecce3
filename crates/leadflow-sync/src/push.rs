use futures_util::StreamExt;
use leadflow_client::ApiClient;
use leadflow_core::{decode_push_event, LeadFilters};
use leadflow_store::{StoreError, StoreHandle};
use std::time::Duration;
use tokio::sync::watch;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Listens on the backend's WebSocket and folds each lead event into the store.
pub struct PushSubscriber {
    ws_url: Url,
    client: ApiClient,
    store: StoreHandle,
    resync_filters: LeadFilters,
    initial_backoff: Duration,
}

enum Disconnect {
    /// Connection dropped; try again.
    Lost,
    /// Shutdown requested or the store is gone.
    Stop,
}

impl PushSubscriber {
    pub fn new(ws_url: Url, client: ApiClient, store: StoreHandle) -> Self {
        Self {
            ws_url,
            client,
            store,
            resync_filters: LeadFilters::default(),
            initial_backoff: Duration::from_secs(1),
        }
    }

    /// Filters used for the full refetch after a reconnect.
    pub fn with_resync_filters(mut self, filters: LeadFilters) -> Self {
        self.resync_filters = filters;
        self
    }

    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Run until `shutdown` flips to true. Reconnects forever with doubling
    /// backoff; after a reconnect the lead list is refetched to cover events
    /// missed while offline.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = self.initial_backoff;
        let mut connected_before = false;
        loop {
            if *shutdown.borrow() {
                return;
            }
            let url = self.connect_url().await;
            let connect = tokio::select! {
                result = connect_async(url) => result,
                _ = shutdown.changed() => return,
            };
            let (mut ws, _) = match connect {
                Ok(value) => value,
                Err(err) => {
                    warn!(event = "push_connect_error", error = %err, backoff_ms = backoff.as_millis() as u64);
                    if sleep_or_shutdown(backoff, &mut shutdown).await {
                        return;
                    }
                    backoff = next_backoff(backoff);
                    continue;
                }
            };
            backoff = self.initial_backoff;
            info!(event = "push_connected", url = %self.ws_url);

            if connected_before {
                if let Err(StoreError::Closed) =
                    self.store.dispatch_fetch_all(self.resync_filters.clone())
                {
                    return;
                }
            }
            connected_before = true;

            let outcome = loop {
                tokio::select! {
                    frame = ws.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                if !self.handle_frame(&text).await {
                                    break Disconnect::Stop;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => break Disconnect::Lost,
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                warn!(event = "push_read_error", error = %err);
                                break Disconnect::Lost;
                            }
                        }
                    }
                    _ = shutdown.changed() => break Disconnect::Stop,
                }
            };
            let _ = ws.close(None).await;

            match outcome {
                Disconnect::Stop => return,
                Disconnect::Lost => {
                    info!(event = "push_disconnected");
                    if sleep_or_shutdown(backoff, &mut shutdown).await {
                        return;
                    }
                    backoff = next_backoff(backoff);
                }
            }
        }
    }

    /// Returns false once the store has shut down.
    async fn handle_frame(&self, text: &str) -> bool {
        match decode_push_event(text) {
            Ok(Some(event)) => {
                let kind = event.kind();
                let lead_id = event.lead_id();
                match self.store.merge_remote_event(event).await {
                    Ok(changed) => {
                        debug!(event = "push_event", kind, lead_id, changed);
                        true
                    }
                    Err(StoreError::Closed) => false,
                    Err(err) => {
                        warn!(event = "push_merge_error", kind, error = %err);
                        true
                    }
                }
            }
            Ok(None) => {
                debug!(event = "push_event_ignored");
                true
            }
            Err(err) => {
                warn!(event = "push_frame_invalid", error = %err);
                true
            }
        }
    }

    async fn connect_url(&self) -> Url {
        let mut url = self.ws_url.clone();
        if let Some(token) = self.client.bearer_token().await {
            url.query_pairs_mut().append_pair("token", &token);
        }
        url
    }
}

/// Returns true when shutdown was requested during the wait.
async fn sleep_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    let slept = tokio::select! {
        _ = tokio::time::sleep(delay) => true,
        _ = shutdown.changed() => false,
    };
    !slept || *shutdown.borrow()
}

pub(crate) fn next_backoff(current: Duration) -> Duration {
    let next = current + current;
    if next > MAX_BACKOFF {
        MAX_BACKOFF
    } else {
        next
    }
}
