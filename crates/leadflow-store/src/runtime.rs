//! Single-writer runtime around [`LeadState`].
//!
//! One task owns the state and drains a mailbox of commands. Network calls run
//! on their own tasks and post a `Settle` command back when they finish, so
//! every mutation, including completions, happens on the owning task.
//! Snapshots are published through a `watch` channel after each change.

use crate::api::LeadApi;
use crate::state::{dedupe_by_id, Action, LeadSnapshot, LeadState};
use chrono::Utc;
use leadflow_client::ApiError;
use leadflow_core::{
    Lead, LeadDraft, LeadFilters, LeadId, LeadPatch, LeadStatus, PipelineStats, PushEvent,
};
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("lead {0} is not in the store")]
    UnknownLead(LeadId),
    #[error("lead store is closed")]
    Closed,
}

impl StoreError {
    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Api(err) if err.is_validation())
    }
}

type Reply<T> = oneshot::Sender<StoreResult<T>>;

enum Command {
    FetchAll {
        filters: LeadFilters,
        reply: Option<Reply<usize>>,
    },
    FetchOne {
        id: LeadId,
        reply: Reply<Lead>,
    },
    ChangeStatus {
        id: LeadId,
        status: LeadStatus,
        reply: Option<Reply<()>>,
    },
    Create {
        draft: LeadDraft,
        reply: Reply<Lead>,
    },
    Update {
        id: LeadId,
        patch: LeadPatch,
        reply: Reply<Lead>,
    },
    Delete {
        id: LeadId,
        reply: Reply<()>,
    },
    Requalify {
        id: LeadId,
        reply: Reply<Lead>,
    },
    Merge {
        event: PushEvent,
        reply: Reply<bool>,
    },
    RefreshStats {
        reply: Option<Reply<PipelineStats>>,
    },
    ClearError {
        reply: Option<Reply<()>>,
    },
    Settle(Completion),
    Shutdown {
        ack: oneshot::Sender<()>,
    },
}

enum Completion {
    Fetched {
        result: Result<Vec<Lead>, ApiError>,
        reply: Option<Reply<usize>>,
    },
    FetchedOne {
        id: LeadId,
        result: Result<Lead, ApiError>,
        reply: Reply<Lead>,
    },
    StatusConfirmed {
        id: LeadId,
        status: LeadStatus,
        rollback: Vec<Lead>,
        result: Result<(), ApiError>,
        reply: Option<Reply<()>>,
    },
    Saved {
        op: SaveOp,
        result: Result<Lead, ApiError>,
        reply: Reply<Lead>,
    },
    Deleted {
        id: LeadId,
        result: Result<(), ApiError>,
        reply: Reply<()>,
    },
    Stats {
        result: Result<PipelineStats, ApiError>,
        reply: Option<Reply<PipelineStats>>,
    },
}

#[derive(Debug, Clone, Copy)]
enum SaveOp {
    Create,
    Update,
    Requalify,
}

impl SaveOp {
    fn as_str(&self) -> &'static str {
        match self {
            SaveOp::Create => "create",
            SaveOp::Update => "update",
            SaveOp::Requalify => "requalify",
        }
    }
}

/// Cloneable front door to the store task.
#[derive(Clone)]
pub struct StoreHandle {
    mailbox: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<LeadSnapshot>,
}

pub fn spawn_store(api: Arc<dyn LeadApi>) -> StoreHandle {
    spawn_store_with(api, LeadState::new())
}

/// Start the store task on the current tokio runtime with a seeded state.
pub fn spawn_store_with(api: Arc<dyn LeadApi>, state: LeadState) -> StoreHandle {
    let (mailbox, inbox) = mpsc::unbounded_channel();
    let (publisher, snapshots) = watch::channel(state.snapshot().clone());
    let runtime = StoreRuntime {
        state,
        api,
        mailbox: mailbox.downgrade(),
        publisher,
    };
    tokio::spawn(runtime.run(inbox));
    StoreHandle {
        mailbox,
        snapshots,
    }
}

impl StoreHandle {
    /// Replace the whole lead list with the server's. Returns the number of
    /// leads kept after de-duplication.
    pub async fn fetch_all(&self, filters: LeadFilters) -> StoreResult<usize> {
        self.request(|reply| Command::FetchAll {
            filters,
            reply: Some(reply),
        })
        .await
    }

    pub fn dispatch_fetch_all(&self, filters: LeadFilters) -> StoreResult<()> {
        self.post(Command::FetchAll {
            filters,
            reply: None,
        })
    }

    pub async fn fetch_one(&self, id: LeadId) -> StoreResult<Lead> {
        self.request(|reply| Command::FetchOne { id, reply }).await
    }

    /// Optimistic move. The new status is visible in the snapshot before the
    /// server is asked; a rejected call restores the prior lead list.
    pub async fn change_status(&self, id: LeadId, status: LeadStatus) -> StoreResult<()> {
        self.request(|reply| Command::ChangeStatus {
            id,
            status,
            reply: Some(reply),
        })
        .await
    }

    /// Same as [`change_status`](Self::change_status) without waiting for the
    /// server. The outcome shows up in the snapshot.
    pub fn dispatch_change_status(&self, id: LeadId, status: LeadStatus) -> StoreResult<()> {
        self.post(Command::ChangeStatus {
            id,
            status,
            reply: None,
        })
    }

    pub async fn create(&self, draft: LeadDraft) -> StoreResult<Lead> {
        self.request(|reply| Command::Create { draft, reply }).await
    }

    pub async fn update(&self, id: LeadId, patch: LeadPatch) -> StoreResult<Lead> {
        self.request(|reply| Command::Update { id, patch, reply })
            .await
    }

    pub async fn delete(&self, id: LeadId) -> StoreResult<()> {
        self.request(|reply| Command::Delete { id, reply }).await
    }

    pub async fn requalify(&self, id: LeadId) -> StoreResult<Lead> {
        self.request(|reply| Command::Requalify { id, reply }).await
    }

    /// Fold a server-pushed change into the store. Returns whether it changed
    /// anything.
    pub async fn merge_remote_event(&self, event: PushEvent) -> StoreResult<bool> {
        self.request(|reply| Command::Merge { event, reply }).await
    }

    pub async fn refresh_stats(&self) -> StoreResult<PipelineStats> {
        self.request(|reply| Command::RefreshStats { reply: Some(reply) })
            .await
    }

    pub async fn clear_error(&self) -> StoreResult<()> {
        self.request(|reply| Command::ClearError { reply: Some(reply) })
            .await
    }

    pub fn dispatch_clear_error(&self) -> StoreResult<()> {
        self.post(Command::ClearError { reply: None })
    }

    pub fn snapshot(&self) -> LeadSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LeadSnapshot> {
        self.snapshots.clone()
    }

    /// Stop the store task. Calls still in flight are abandoned and their
    /// callers see [`StoreError::Closed`].
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.mailbox.send(Command::Shutdown { ack }).is_ok() {
            let _ = done.await;
        }
    }

    fn post(&self, command: Command) -> StoreResult<()> {
        self.mailbox.send(command).map_err(|_| StoreError::Closed)
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> StoreResult<T> {
        let (reply, response) = oneshot::channel();
        self.post(build(reply))?;
        response.await.map_err(|_| StoreError::Closed)?
    }
}

struct StoreRuntime {
    state: LeadState,
    api: Arc<dyn LeadApi>,
    mailbox: mpsc::WeakUnboundedSender<Command>,
    publisher: watch::Sender<LeadSnapshot>,
}

impl StoreRuntime {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        info!(event = "store_started", leads = self.state.leads().len());
        while let Some(command) = inbox.recv().await {
            if let Command::Shutdown { ack } = command {
                // Later posts fail with Closed as soon as the caller is acked.
                inbox.close();
                let _ = ack.send(());
                break;
            }
            self.handle(command);
        }
        info!(event = "store_stopped");
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::FetchAll { filters, reply } => {
                self.commit([Action::FetchStarted]);
                self.spawn_call(move |api| async move {
                    let result = api.list_leads(&filters).await;
                    Completion::Fetched { result, reply }
                });
            }
            Command::FetchOne { id, reply } => {
                self.spawn_call(move |api| async move {
                    let result = api.get_lead(id).await;
                    Completion::FetchedOne { id, result, reply }
                });
            }
            Command::ChangeStatus { id, status, reply } => self.change_status(id, status, reply),
            Command::Create { draft, reply } => {
                self.spawn_call(move |api| async move {
                    let result = api.create_lead(&draft).await;
                    Completion::Saved {
                        op: SaveOp::Create,
                        result,
                        reply,
                    }
                });
            }
            Command::Update { id, patch, reply } => {
                self.spawn_call(move |api| async move {
                    let result = api.update_lead(id, &patch).await;
                    Completion::Saved {
                        op: SaveOp::Update,
                        result,
                        reply,
                    }
                });
            }
            Command::Delete { id, reply } => {
                self.spawn_call(move |api| async move {
                    let result = api.delete_lead(id).await;
                    Completion::Deleted { id, result, reply }
                });
            }
            Command::Requalify { id, reply } => {
                self.spawn_call(move |api| async move {
                    let result = api.requalify_lead(id).await;
                    Completion::Saved {
                        op: SaveOp::Requalify,
                        result,
                        reply,
                    }
                });
            }
            Command::Merge { event, reply } => {
                let kind = event.kind();
                let lead_id = event.lead_id();
                let changed = self.commit([Action::Remote(event)]);
                debug!(event = "remote_merge", kind, lead_id, changed);
                let _ = reply.send(Ok(changed));
            }
            Command::RefreshStats { reply } => self.spawn_stats(reply),
            Command::ClearError { reply } => {
                self.commit([Action::ClearError]);
                respond(reply, Ok(()));
            }
            Command::Settle(completion) => self.settle(completion),
            // handled in run
            Command::Shutdown { .. } => {}
        }
    }

    fn change_status(&mut self, id: LeadId, status: LeadStatus, reply: Option<Reply<()>>) {
        let Some(current) = self.state.lead(id).map(|lead| lead.status) else {
            warn!(event = "status_change_unknown_lead", lead_id = id);
            respond(reply, Err(StoreError::UnknownLead(id)));
            return;
        };
        if current == status {
            respond(reply, Ok(()));
            return;
        }

        let rollback = self.state.leads().to_vec();
        self.commit([Action::WriteStatus {
            id,
            status,
            at: Utc::now(),
        }]);
        info!(
            event = "status_change_applied",
            lead_id = id,
            from = %current,
            to = %status
        );

        self.spawn_call(move |api| async move {
            let result = api.update_lead_status(id, status).await;
            Completion::StatusConfirmed {
                id,
                status,
                rollback,
                result,
                reply,
            }
        });
    }

    fn settle(&mut self, completion: Completion) {
        match completion {
            Completion::Fetched { result, reply } => match result {
                Ok(leads) => {
                    let (leads, duplicates) = dedupe_by_id(leads);
                    if !duplicates.is_empty() {
                        warn!(event = "fetch_duplicate_ids", ids = ?duplicates);
                    }
                    let count = leads.len();
                    self.commit([Action::FetchSucceeded(leads)]);
                    info!(event = "leads_fetched", count);
                    respond(reply, Ok(count));
                    self.spawn_stats(None);
                }
                Err(err) => {
                    warn!(event = "leads_fetch_failed", error = %err);
                    self.commit([Action::FetchFailed(format!("Failed to load leads: {err}"))]);
                    respond(reply, Err(err.into()));
                }
            },
            Completion::FetchedOne { id, result, reply } => match result {
                Ok(lead) => {
                    self.commit([Action::Upsert(lead.clone())]);
                    let _ = reply.send(Ok(lead));
                }
                Err(err) => {
                    warn!(event = "lead_fetch_failed", lead_id = id, error = %err);
                    self.record_failure(&err, format!("Failed to load lead {id}: {err}"));
                    let _ = reply.send(Err(err.into()));
                }
            },
            Completion::StatusConfirmed {
                id,
                status,
                rollback,
                result,
                reply,
            } => match result {
                Ok(()) => {
                    info!(event = "status_change_confirmed", lead_id = id, status = %status);
                    respond(reply, Ok(()));
                    self.spawn_stats(None);
                }
                Err(err) => {
                    warn!(
                        event = "status_change_rolled_back",
                        lead_id = id,
                        status = %status,
                        error = %err
                    );
                    self.commit([
                        Action::Restore(rollback),
                        Action::SetError(format!(
                            "Failed to move lead {id} to {}: {err}",
                            status.label()
                        )),
                    ]);
                    respond(reply, Err(err.into()));
                }
            },
            Completion::Saved { op, result, reply } => match result {
                Ok(lead) => {
                    info!(event = "lead_saved", op = op.as_str(), lead_id = lead.id);
                    self.commit([Action::Upsert(lead.clone())]);
                    let _ = reply.send(Ok(lead));
                    if matches!(op, SaveOp::Create) {
                        self.spawn_stats(None);
                    }
                }
                Err(err) => {
                    warn!(event = "lead_save_failed", op = op.as_str(), error = %err);
                    self.record_failure(&err, format!("Failed to {} lead: {err}", op.as_str()));
                    let _ = reply.send(Err(err.into()));
                }
            },
            Completion::Deleted { id, result, reply } => match result {
                Ok(()) => {
                    info!(event = "lead_deleted", lead_id = id);
                    self.commit([Action::Remove(id)]);
                    let _ = reply.send(Ok(()));
                    self.spawn_stats(None);
                }
                Err(err) => {
                    warn!(event = "lead_delete_failed", lead_id = id, error = %err);
                    self.record_failure(&err, format!("Failed to delete lead {id}: {err}"));
                    let _ = reply.send(Err(err.into()));
                }
            },
            Completion::Stats { result, reply } => {
                match result {
                    Ok(stats) => {
                        self.commit([Action::StatsLoaded(stats)]);
                    }
                    Err(err) => {
                        debug!(event = "stats_fallback", error = %err);
                        self.commit([Action::StatsFromLeads]);
                    }
                }
                respond(reply, Ok(self.state.snapshot().stats.clone()));
            }
        }
    }

    /// Form validation errors belong to the caller; anything else also goes
    /// to the shared error banner.
    fn record_failure(&mut self, err: &ApiError, message: String) {
        if err.is_validation() {
            return;
        }
        self.commit([Action::SetError(message)]);
    }

    fn spawn_stats(&self, reply: Option<Reply<PipelineStats>>) {
        self.spawn_call(move |api| async move {
            let result = api.lead_stats().await;
            Completion::Stats { result, reply }
        });
    }

    fn spawn_call<F, Fut>(&self, call: F)
    where
        F: FnOnce(Arc<dyn LeadApi>) -> Fut,
        Fut: Future<Output = Completion> + Send + 'static,
    {
        // Every handle is gone; nobody is left to observe the result.
        let Some(mailbox) = self.mailbox.upgrade() else {
            return;
        };
        let pending = call(Arc::clone(&self.api));
        tokio::spawn(async move {
            let completion = pending.await;
            let _ = mailbox.send(Command::Settle(completion));
        });
    }

    /// Apply a batch of actions and publish once if any of them changed state.
    fn commit<const N: usize>(&mut self, actions: [Action; N]) -> bool {
        let mut changed = false;
        for action in actions {
            changed |= self.state.apply(action);
        }
        if changed {
            self.publisher.send_replace(self.state.snapshot().clone());
        }
        changed
    }
}

fn respond<T>(reply: Option<Reply<T>>, result: StoreResult<T>) {
    if let Some(reply) = reply {
        let _ = reply.send(result);
    }
}
