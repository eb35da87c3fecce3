use chrono::{DateTime, Utc};
use leadflow_core::{Lead, LeadId, LeadStatus, PipelineStats, PushEvent, StatusChange};
use serde::Serialize;
use std::collections::HashSet;

/// What observers see. Published after every change, never mutated in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LeadSnapshot {
    pub leads: Vec<Lead>,
    pub loading: bool,
    pub error: Option<String>,
    pub stats: PipelineStats,
    pub revision: u64,
}

impl LeadSnapshot {
    pub fn lead(&self, id: LeadId) -> Option<&Lead> {
        self.leads.iter().find(|lead| lead.id == id)
    }

    pub fn by_status(&self, status: LeadStatus) -> impl Iterator<Item = &Lead> {
        self.leads.iter().filter(move |lead| lead.status == status)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    FetchStarted,
    FetchSucceeded(Vec<Lead>),
    FetchFailed(String),
    /// Replace by id, append when absent. Used for server-confirmed records.
    Upsert(Lead),
    Remove(LeadId),
    /// Provisional status write ahead of server confirmation.
    WriteStatus {
        id: LeadId,
        status: LeadStatus,
        at: DateTime<Utc>,
    },
    /// Put back a lead list captured before a provisional write.
    Restore(Vec<Lead>),
    Remote(PushEvent),
    StatsLoaded(PipelineStats),
    /// Server stats unavailable; derive them from the current leads.
    StatsFromLeads,
    SetError(String),
    ClearError,
}

#[derive(Debug, Clone, Default)]
pub struct LeadState {
    snapshot: LeadSnapshot,
}

impl LeadState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_leads(leads: Vec<Lead>) -> Self {
        let (leads, _) = dedupe_by_id(leads);
        Self {
            snapshot: LeadSnapshot {
                leads,
                ..LeadSnapshot::default()
            },
        }
    }

    pub fn snapshot(&self) -> &LeadSnapshot {
        &self.snapshot
    }

    pub fn leads(&self) -> &[Lead] {
        &self.snapshot.leads
    }

    pub fn lead(&self, id: LeadId) -> Option<&Lead> {
        self.snapshot.lead(id)
    }

    /// Apply one action. Returns whether anything observable changed; the
    /// revision is bumped only in that case.
    pub fn apply(&mut self, action: Action) -> bool {
        let changed = self.reduce(action);
        if changed {
            self.snapshot.revision += 1;
        }
        changed
    }

    fn reduce(&mut self, action: Action) -> bool {
        let snap = &mut self.snapshot;
        match action {
            Action::FetchStarted => replace(&mut snap.loading, true),
            Action::FetchSucceeded(leads) => {
                let (leads, _) = dedupe_by_id(leads);
                let mut changed = replace(&mut snap.loading, false);
                changed |= replace(&mut snap.error, None);
                changed |= replace(&mut snap.leads, leads);
                changed
            }
            Action::FetchFailed(message) => {
                let mut changed = replace(&mut snap.loading, false);
                changed |= replace(&mut snap.error, Some(message));
                changed
            }
            Action::Upsert(lead) => match position(&snap.leads, lead.id) {
                Some(idx) => replace(&mut snap.leads[idx], lead),
                None => {
                    snap.leads.push(lead);
                    true
                }
            },
            Action::Remove(id) => remove(&mut snap.leads, id),
            Action::WriteStatus { id, status, at } => match position(&snap.leads, id) {
                Some(idx) => {
                    let lead = &mut snap.leads[idx];
                    lead.status = status;
                    lead.updated_at = Some(at);
                    true
                }
                None => false,
            },
            Action::Restore(leads) => replace(&mut snap.leads, leads),
            Action::Remote(event) => merge_remote(&mut snap.leads, event),
            Action::StatsLoaded(stats) => replace(&mut snap.stats, stats),
            Action::StatsFromLeads => {
                let stats = PipelineStats::from_leads(&snap.leads);
                replace(&mut snap.stats, stats)
            }
            Action::SetError(message) => replace(&mut snap.error, Some(message)),
            Action::ClearError => replace(&mut snap.error, None),
        }
    }
}

/// Creation of a known id, or any other event for an unknown id, is a no-op.
fn merge_remote(leads: &mut Vec<Lead>, event: PushEvent) -> bool {
    match event {
        PushEvent::LeadCreated(lead) => {
            if position(leads, lead.id).is_some() {
                return false;
            }
            leads.push(lead);
            true
        }
        PushEvent::LeadUpdated(lead) => match position(leads, lead.id) {
            Some(idx) => replace(&mut leads[idx], lead),
            None => false,
        },
        PushEvent::LeadDeleted { id } => remove(leads, id),
        PushEvent::LeadStatusChanged(StatusChange {
            id,
            status,
            updated_at,
        }) => match position(leads, id) {
            Some(idx) => {
                let lead = &mut leads[idx];
                let mut changed = replace(&mut lead.status, status);
                if updated_at.is_some() {
                    changed |= replace(&mut lead.updated_at, updated_at);
                }
                changed
            }
            None => false,
        },
    }
}

/// Keep the first record per id. Returns the surviving list and the ids that
/// appeared more than once.
pub fn dedupe_by_id(leads: Vec<Lead>) -> (Vec<Lead>, Vec<LeadId>) {
    let mut seen = HashSet::with_capacity(leads.len());
    let mut duplicates = Vec::new();
    let mut kept = Vec::with_capacity(leads.len());
    for lead in leads {
        if seen.insert(lead.id) {
            kept.push(lead);
        } else if !duplicates.contains(&lead.id) {
            duplicates.push(lead.id);
        }
    }
    (kept, duplicates)
}

fn position(leads: &[Lead], id: LeadId) -> Option<usize> {
    leads.iter().position(|lead| lead.id == id)
}

fn remove(leads: &mut Vec<Lead>, id: LeadId) -> bool {
    match position(leads, id) {
        Some(idx) => {
            leads.remove(idx);
            true
        }
        None => false,
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
