pub mod portal;
pub mod push;
pub mod stats;

pub use push::{decode_push_event, PushDecodeError, PushEvent, StatusChange};
pub use stats::{format_brl, PipelineStats};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub type LeadId = i64;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lead {
    #[serde(deserialize_with = "deserialize_lead_id")]
    pub id: LeadId,
    #[serde(default, rename = "nome", deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "telefone")]
    pub phone: Option<String>,
    #[serde(default, rename = "empresa")]
    pub company: Option<String>,
    #[serde(default, rename = "cargo")]
    pub role: Option<String>,
    #[serde(default, rename = "origem")]
    pub source: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: LeadStatus,
    #[serde(default, rename = "temperatura", deserialize_with = "null_as_default")]
    pub temperature: Temperature,
    #[serde(default, rename = "valor_estimado", deserialize_with = "null_as_default")]
    pub estimated_value: f64,
    #[serde(default, rename = "qualificacao")]
    pub qualification: Option<Qualification>,
    #[serde(default)]
    pub roi: Option<RoiAnalysis>,
    #[serde(default, rename = "historico_conversa", deserialize_with = "null_as_default")]
    pub conversation: Vec<ConversationMessage>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Lead {
    /// Minimal record, mostly useful for fixtures and pushes that only carry an id.
    pub fn new(id: LeadId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            email: None,
            phone: None,
            company: None,
            role: None,
            source: None,
            status: LeadStatus::default(),
            temperature: Temperature::default(),
            estimated_value: 0.0,
            qualification: None,
            roi: None,
            conversation: Vec::new(),
            created_at: None,
            updated_at: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.status.is_closed()
    }
}

/// BANT-style qualification produced by the backend sales agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Qualification {
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default, rename = "orcamento")]
    pub budget: Option<String>,
    #[serde(default, rename = "autoridade")]
    pub authority: Option<String>,
    #[serde(default, rename = "necessidade")]
    pub need: Option<String>,
    #[serde(default, rename = "prazo")]
    pub timeline: Option<String>,
    #[serde(default, rename = "observacoes")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoiAnalysis {
    #[serde(default, rename = "investimento")]
    pub investment: Option<f64>,
    #[serde(default, rename = "retorno_estimado")]
    pub expected_return: Option<f64>,
    #[serde(default, rename = "payback_meses")]
    pub payback_months: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationMessage {
    pub role: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LeadStatus {
    #[serde(rename = "novo")]
    New,
    #[serde(rename = "contato_inicial")]
    InitialContact,
    #[serde(rename = "qualificando")]
    Qualifying,
    #[serde(rename = "qualificado")]
    Qualified,
    #[serde(rename = "agendamento_marcado")]
    MeetingScheduled,
    #[serde(rename = "ganho")]
    Won,
    #[serde(rename = "perdido")]
    Lost,
}

impl Default for LeadStatus {
    fn default() -> Self {
        Self::New
    }
}

impl LeadStatus {
    /// Pipeline order, which is also the kanban column order.
    pub const ALL: [LeadStatus; 7] = [
        LeadStatus::New,
        LeadStatus::InitialContact,
        LeadStatus::Qualifying,
        LeadStatus::Qualified,
        LeadStatus::MeetingScheduled,
        LeadStatus::Won,
        LeadStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "novo",
            LeadStatus::InitialContact => "contato_inicial",
            LeadStatus::Qualifying => "qualificando",
            LeadStatus::Qualified => "qualificado",
            LeadStatus::MeetingScheduled => "agendamento_marcado",
            LeadStatus::Won => "ganho",
            LeadStatus::Lost => "perdido",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LeadStatus::New => "Novo",
            LeadStatus::InitialContact => "Contato inicial",
            LeadStatus::Qualifying => "Qualificando",
            LeadStatus::Qualified => "Qualificado",
            LeadStatus::MeetingScheduled => "Agendamento",
            LeadStatus::Won => "Ganho",
            LeadStatus::Lost => "Perdido",
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, LeadStatus::Won | LeadStatus::Lost)
    }

    pub fn column(&self) -> usize {
        Self::ALL
            .iter()
            .position(|status| status == self)
            .unwrap_or(0)
    }

    pub fn from_column(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "novo" | "new" => Ok(LeadStatus::New),
            "contato_inicial" | "contato" => Ok(LeadStatus::InitialContact),
            "qualificando" => Ok(LeadStatus::Qualifying),
            "qualificado" => Ok(LeadStatus::Qualified),
            "agendamento_marcado" | "agendamento" | "agendado" => {
                Ok(LeadStatus::MeetingScheduled)
            }
            "ganho" | "won" => Ok(LeadStatus::Won),
            "perdido" | "lost" => Ok(LeadStatus::Lost),
            other => Err(format!("Unknown status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Temperature {
    #[serde(rename = "quente")]
    Hot,
    #[serde(rename = "morno")]
    Warm,
    #[serde(rename = "frio")]
    Cold,
}

impl Default for Temperature {
    fn default() -> Self {
        Self::Cold
    }
}

impl Temperature {
    pub fn as_str(&self) -> &'static str {
        match self {
            Temperature::Hot => "quente",
            Temperature::Warm => "morno",
            Temperature::Cold => "frio",
        }
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Temperature {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.as_str() {
            "quente" | "hot" => Ok(Temperature::Hot),
            "morno" | "warm" => Ok(Temperature::Warm),
            "frio" | "cold" => Ok(Temperature::Cold),
            other => Err(format!("Unknown temperature: {other}")),
        }
    }
}

/// Fields accepted by `POST /leads`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LeadDraft {
    #[serde(rename = "nome")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "telefone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "empresa", skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(rename = "cargo", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "origem", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LeadStatus>,
    #[serde(rename = "temperatura", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Temperature>,
    #[serde(rename = "valor_estimado", skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
}

/// Partial update for `PUT /leads/{id}`; absent fields are left untouched server-side.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LeadPatch {
    #[serde(rename = "nome", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "telefone", skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "empresa", skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(rename = "cargo", skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(rename = "origem", skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "temperatura", skip_serializing_if = "Option::is_none")]
    pub temperature: Option<Temperature>,
    #[serde(rename = "valor_estimado", skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
}

impl LeadPatch {
    pub fn is_empty(&self) -> bool {
        self == &LeadPatch::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadFilters {
    pub status: Option<LeadStatus>,
    pub temperature: Option<Temperature>,
    pub search: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl LeadFilters {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(temperature) = self.temperature {
            pairs.push(("temperatura", temperature.as_str().to_string()));
        }
        if let Some(search) = self.search.as_deref() {
            let trimmed = search.trim();
            if !trimmed.is_empty() {
                pairs.push(("busca", trimmed.to_string()));
            }
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

/// `null` decodes like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept ids sent as numbers or numeric strings.
fn deserialize_lead_id<'de, D>(deserializer: D) -> Result<LeadId, D::Error>
where
    D: Deserializer<'de>,
{
    let val: Value = Value::deserialize(deserializer)?;
    match val {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom("lead id out of range")),
        Value::String(s) => s.trim().parse::<LeadId>().map_err(serde::de::Error::custom),
        _ => Err(serde::de::Error::custom("expected string or number for id")),
    }
}

pub(crate) fn deserialize_id_value<'de, D>(deserializer: D) -> Result<LeadId, D::Error>
where
    D: Deserializer<'de>,
{
    deserialize_lead_id(deserializer)
}
