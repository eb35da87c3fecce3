use crate::{deserialize_id_value, Lead, LeadId, LeadStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const LEAD_CREATED: &str = "lead_created";
pub const LEAD_UPDATED: &str = "lead_updated";
pub const LEAD_DELETED: &str = "lead_deleted";
pub const LEAD_STATUS_CHANGED: &str = "lead_status_changed";

/// Raw `{type, data}` frame as sent on the push channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushEnvelope {
    #[serde(rename = "type")]
    pub r#type: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
    LeadCreated(Lead),
    LeadUpdated(Lead),
    LeadDeleted { id: LeadId },
    LeadStatusChanged(StatusChange),
}

impl PushEvent {
    pub fn lead_id(&self) -> LeadId {
        match self {
            PushEvent::LeadCreated(lead) | PushEvent::LeadUpdated(lead) => lead.id,
            PushEvent::LeadDeleted { id } => *id,
            PushEvent::LeadStatusChanged(change) => change.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PushEvent::LeadCreated(_) => LEAD_CREATED,
            PushEvent::LeadUpdated(_) => LEAD_UPDATED,
            PushEvent::LeadDeleted { .. } => LEAD_DELETED,
            PushEvent::LeadStatusChanged(_) => LEAD_STATUS_CHANGED,
        }
    }

    pub fn to_envelope(&self) -> PushEnvelope {
        let data = match self {
            PushEvent::LeadCreated(lead) | PushEvent::LeadUpdated(lead) => {
                serde_json::to_value(lead).unwrap_or(Value::Null)
            }
            PushEvent::LeadDeleted { id } => serde_json::json!({ "id": id }),
            PushEvent::LeadStatusChanged(change) => {
                serde_json::to_value(change).unwrap_or(Value::Null)
            }
        };
        PushEnvelope {
            r#type: self.kind().to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    #[serde(deserialize_with = "deserialize_id_value")]
    pub id: LeadId,
    pub status: LeadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct LeadRef {
    #[serde(deserialize_with = "deserialize_id_value")]
    id: LeadId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PushDecodeError {
    #[error("push frame is not a valid envelope: {0}")]
    Envelope(String),
    #[error("invalid {kind} payload: {message}")]
    Payload { kind: String, message: String },
}

/// Decode one text frame. `Ok(None)` means a well-formed envelope of a type this
/// client does not track (pings, other entities).
pub fn decode_push_event(text: &str) -> Result<Option<PushEvent>, PushDecodeError> {
    let envelope: PushEnvelope = serde_json::from_str(text.trim())
        .map_err(|err| PushDecodeError::Envelope(err.to_string()))?;
    parse_envelope(envelope)
}

pub fn parse_envelope(envelope: PushEnvelope) -> Result<Option<PushEvent>, PushDecodeError> {
    let kind = envelope.r#type.as_str();
    let event = match kind {
        LEAD_CREATED => PushEvent::LeadCreated(parse_payload(kind, envelope.data)?),
        LEAD_UPDATED => PushEvent::LeadUpdated(parse_payload(kind, envelope.data)?),
        LEAD_DELETED => {
            let lead_ref: LeadRef = parse_payload(kind, envelope.data)?;
            PushEvent::LeadDeleted { id: lead_ref.id }
        }
        LEAD_STATUS_CHANGED => PushEvent::LeadStatusChanged(parse_payload(kind, envelope.data)?),
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    data: Value,
) -> Result<T, PushDecodeError> {
    serde_json::from_value(data).map_err(|err| PushDecodeError::Payload {
        kind: kind.to_string(),
        message: err.to_string(),
    })
}
