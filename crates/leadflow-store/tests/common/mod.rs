#![allow(dead_code)]

use async_trait::async_trait;
use leadflow_client::{ApiError, ApiResult};
use leadflow_core::{
    Lead, LeadDraft, LeadFilters, LeadId, LeadPatch, LeadStatus, PipelineStats, Qualification,
};
use leadflow_store::{LeadSnapshot, LeadState, StoreHandle};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

/// A call held open until the test releases it.
#[derive(Clone)]
pub struct Gate(Arc<Semaphore>);

impl Gate {
    pub fn new() -> Self {
        Gate(Arc::new(Semaphore::new(0)))
    }

    pub fn open(&self) {
        self.0.add_permits(1);
    }

    async fn pass(&self) {
        if let Ok(permit) = self.0.acquire().await {
            permit.forget();
        }
    }
}

pub struct Scripted {
    pub gate: Option<Gate>,
    pub result: ApiResult<()>,
}

/// In-memory backend. Status calls are scripted per target status so
/// concurrent moves can be answered in any order.
#[derive(Default)]
pub struct FakeApi {
    pub leads: Mutex<Vec<Lead>>,
    pub list_error: Mutex<Option<ApiError>>,
    pub status_script: Mutex<HashMap<LeadStatus, Scripted>>,
    pub status_calls: AtomicUsize,
    pub create_gate: Mutex<Option<Gate>>,
    pub create_error: Mutex<Option<ApiError>>,
    pub create_calls: AtomicUsize,
    pub stats: Mutex<Option<PipelineStats>>,
    pub stats_calls: AtomicUsize,
    pub next_id: AtomicI64,
}

impl FakeApi {
    pub fn with_leads(leads: Vec<Lead>) -> Arc<Self> {
        let api = FakeApi {
            next_id: AtomicI64::new(100),
            ..FakeApi::default()
        };
        *api.leads.lock().expect("lock") = leads;
        Arc::new(api)
    }

    pub fn script_status(&self, target: LeadStatus, gate: Option<Gate>, result: ApiResult<()>) {
        self.status_script
            .lock()
            .expect("lock")
            .insert(target, Scripted { gate, result });
    }

    fn find(&self, id: LeadId) -> ApiResult<Lead> {
        self.leads
            .lock()
            .expect("lock")
            .iter()
            .find(|lead| lead.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("lead {id}")))
    }
}

#[async_trait]
impl leadflow_store::LeadApi for FakeApi {
    async fn list_leads(&self, _filters: &LeadFilters) -> ApiResult<Vec<Lead>> {
        if let Some(err) = self.list_error.lock().expect("lock").clone() {
            return Err(err);
        }
        Ok(self.leads.lock().expect("lock").clone())
    }

    async fn get_lead(&self, id: LeadId) -> ApiResult<Lead> {
        self.find(id)
    }

    async fn create_lead(&self, draft: &LeadDraft) -> ApiResult<Lead> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.create_gate.lock().expect("lock").clone();
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if let Some(err) = self.create_error.lock().expect("lock").take() {
            return Err(err);
        }
        let mut lead = Lead::new(self.next_id.fetch_add(1, Ordering::SeqCst), &draft.name);
        lead.status = draft.status.unwrap_or_default();
        lead.estimated_value = draft.estimated_value.unwrap_or_default();
        self.leads.lock().expect("lock").push(lead.clone());
        Ok(lead)
    }

    async fn update_lead(&self, id: LeadId, patch: &LeadPatch) -> ApiResult<Lead> {
        let mut lead = self.find(id)?;
        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(ApiError::Validation {
                    status: 422,
                    message: "nome obrigatório".to_string(),
                });
            }
            lead.name = name.clone();
        }
        if let Some(temperature) = patch.temperature {
            lead.temperature = temperature;
        }
        Ok(lead)
    }

    async fn update_lead_status(&self, _id: LeadId, status: LeadStatus) -> ApiResult<()> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.status_script.lock().expect("lock").remove(&status);
        let Some(Scripted { gate, result }) = scripted else {
            return Ok(());
        };
        if let Some(gate) = gate {
            gate.pass().await;
        }
        result
    }

    async fn delete_lead(&self, id: LeadId) -> ApiResult<()> {
        let mut leads = self.leads.lock().expect("lock");
        let before = leads.len();
        leads.retain(|lead| lead.id != id);
        if leads.len() == before {
            return Err(ApiError::NotFound(format!("lead {id}")));
        }
        Ok(())
    }

    async fn lead_stats(&self) -> ApiResult<PipelineStats> {
        self.stats_calls.fetch_add(1, Ordering::SeqCst);
        self.stats
            .lock()
            .expect("lock")
            .clone()
            .ok_or_else(|| ApiError::Server {
                status: 503,
                message: "stats unavailable".to_string(),
            })
    }

    async fn requalify_lead(&self, id: LeadId) -> ApiResult<Lead> {
        let mut lead = self.find(id)?;
        lead.qualification = Some(Qualification {
            score: Some(82.0),
            ..Qualification::default()
        });
        Ok(lead)
    }
}

pub fn lead(id: LeadId, status: LeadStatus) -> Lead {
    let mut lead = Lead::new(id, format!("Lead {id}"));
    lead.status = status;
    lead
}

pub fn start(api: &Arc<FakeApi>, seed: Vec<Lead>) -> StoreHandle {
    leadflow_store::runtime::spawn_store_with(api.clone(), LeadState::with_leads(seed))
}

pub fn server_error() -> ApiError {
    ApiError::Server {
        status: 500,
        message: "internal error".to_string(),
    }
}

pub async fn wait_until(
    handle: &StoreHandle,
    predicate: impl FnMut(&LeadSnapshot) -> bool,
) -> LeadSnapshot {
    let mut snapshots = handle.subscribe();
    let guard = tokio::time::timeout(Duration::from_secs(5), snapshots.wait_for(predicate))
        .await
        .expect("timed out waiting for snapshot")
        .expect("store closed");
    (*guard).clone()
}

pub async fn wait_for_count(counter: &AtomicUsize, expected: usize) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while counter.load(Ordering::SeqCst) < expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for call");
}

pub fn status_of(snapshot: &LeadSnapshot, id: LeadId) -> Option<LeadStatus> {
    snapshot.lead(id).map(|lead| lead.status)
}
