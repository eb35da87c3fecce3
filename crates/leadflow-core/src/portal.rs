//! Portal records that sit next to the lead pipeline: projects, their timeline
//! and invoices, the signed-in user, and the sales-agent chat test.

use crate::{Lead, LeadId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: i64,
    #[serde(default, rename = "nome")]
    pub name: String,
    #[serde(default, rename = "cliente")]
    pub client: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "progresso")]
    pub progress: Option<f64>,
    #[serde(default, rename = "valor")]
    pub value: Option<f64>,
    #[serde(default, rename = "prazo")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimelineEvent {
    pub id: i64,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default, rename = "tipo")]
    pub kind: String,
    #[serde(default, rename = "descricao")]
    pub description: String,
    #[serde(default, rename = "data")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invoice {
    pub id: i64,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default, rename = "numero")]
    pub number: Option<String>,
    #[serde(default, rename = "valor")]
    pub amount: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default, rename = "vencimento")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, rename = "comprovante_url")]
    pub proof_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub id: i64,
    #[serde(default, rename = "nome")]
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Registration {
    #[serde(rename = "nome")]
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "empresa", skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

/// Token pair issued by login, register and refresh. Refresh may omit a new
/// refresh token, in which case the old one stays valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<UserProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    #[serde(rename = "mensagem")]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<LeadId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatReply {
    #[serde(rename = "resposta")]
    pub reply: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub lead: Option<Lead>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn project_tolerates_sparse_payloads() {
        let project: Project = serde_json::from_str(
            r#"{"id": 4, "nome": "Site institucional", "status": "em_andamento", "prazo": "2026-05-30", "fase": "design"}"#,
        )
        .expect("parse project");
        assert_eq!(project.name, "Site institucional");
        assert_eq!(
            project.due_date,
            NaiveDate::from_ymd_opt(2026, 5, 30)
        );
        assert!(project.extra.contains_key("fase"));
    }

    #[test]
    fn refresh_response_may_omit_refresh_token() {
        let tokens: AuthTokens =
            serde_json::from_str(r#"{"access_token": "abc"}"#).expect("parse tokens");
        assert_eq!(tokens.access_token, "abc");
        assert!(tokens.refresh_token.is_none());
        assert!(tokens.user.is_none());
    }

    #[test]
    fn chat_request_omits_empty_context() {
        let request = ChatRequest {
            message: "Qual o preço?".to_string(),
            lead_id: None,
            session_id: None,
        };
        assert_eq!(
            serde_json::to_value(&request).expect("serialize"),
            serde_json::json!({"mensagem": "Qual o preço?"})
        );
    }
}
