//! HTTP client for the portal backend.
//!
//! Every authenticated call reads the bearer token from the current session.
//! A 401/403 answer triggers one token refresh and one retry of the original
//! request; nothing else is retried.

use crate::config::ClientConfig;
use crate::error::{ApiError, ApiResult};
use crate::session::{Session, SessionFile};
use leadflow_core::portal::{
    AuthTokens, ChatReply, ChatRequest, Credentials, Invoice, Project, Registration,
    TimelineEvent, UserProfile,
};
use leadflow_core::{Lead, LeadDraft, LeadFilters, LeadId, LeadPatch, LeadStatus, PipelineStats};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: Arc<str>,
    session: Arc<RwLock<Session>>,
    session_file: Option<SessionFile>,
    refresh_lock: Arc<Mutex<()>>,
}

/// Accept both bare arrays and `{items|leads|data: [...]}` wrappers.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListPayload<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "leads", alias = "data", alias = "results")]
        items: Vec<T>,
    },
}

impl<T> ListPayload<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            ListPayload::Bare(items) | ListPayload::Wrapped { items } => items,
        }
    }
}

#[derive(Serialize)]
struct StatusBody {
    status: LeadStatus,
}

#[derive(Serialize)]
struct RefreshBody<'a> {
    refresh_token: &'a str,
}

impl ApiClient {
    pub fn new(base_url: &Url, timeout: Duration) -> ApiResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ApiError::Network(err.to_string()))?;
        Ok(Self {
            http,
            base: Arc::from(base_url.as_str().trim_end_matches('/')),
            session: Arc::new(RwLock::new(Session::default())),
            session_file: None,
            refresh_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        let client = Self::new(&config.api_url, config.request_timeout)?;
        Ok(client.with_session_file(SessionFile::new(config.session_path.clone())))
    }

    /// Load the persisted session and keep writing changes back to it.
    pub fn with_session_file(mut self, file: SessionFile) -> Self {
        let loaded = file.load();
        self.session = Arc::new(RwLock::new(loaded));
        self.session_file = Some(file);
        self
    }

    pub fn with_session(self, session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            ..self
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    pub async fn session(&self) -> Session {
        self.session.read().await.clone()
    }

    pub async fn bearer_token(&self) -> Option<String> {
        self.session.read().await.access_token.clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    // --- auth -------------------------------------------------------------

    pub async fn login(&self, credentials: &Credentials) -> ApiResult<UserProfile> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(credentials)
            .send()
            .await?;
        let tokens: AuthTokens = decode(check(response).await?).await?;
        self.establish_session(tokens).await
    }

    pub async fn register(&self, registration: &Registration) -> ApiResult<UserProfile> {
        let response = self
            .http
            .post(self.url("/auth/register"))
            .json(registration)
            .send()
            .await?;
        let tokens: AuthTokens = decode(check(response).await?).await?;
        self.establish_session(tokens).await
    }

    pub async fn me(&self) -> ApiResult<UserProfile> {
        let user: UserProfile = self.get_json("/auth/me", &[]).await?;
        {
            let mut session = self.session.write().await;
            session.user = Some(user.clone());
        }
        self.persist_session().await?;
        Ok(user)
    }

    pub async fn logout(&self) -> ApiResult<()> {
        *self.session.write().await = Session::default();
        if let Some(file) = &self.session_file {
            file.clear()?;
        }
        info!(event = "session_cleared", reason = "logout");
        Ok(())
    }

    /// Exchange the stored refresh token for a new access token.
    pub async fn refresh(&self) -> ApiResult<()> {
        let refresh_token = self
            .session
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or(ApiError::NotAuthenticated)?;

        let response = self
            .http
            .post(self.url("/auth/refresh"))
            .json(&RefreshBody {
                refresh_token: &refresh_token,
            })
            .send()
            .await?;
        let tokens: AuthTokens = decode(check(response).await?).await?;
        self.session.write().await.apply_tokens(tokens);
        self.persist_session().await?;
        debug!(event = "token_refreshed");
        Ok(())
    }

    async fn establish_session(&self, tokens: AuthTokens) -> ApiResult<UserProfile> {
        let has_user = tokens.user.is_some();
        self.session.write().await.apply_tokens(tokens);
        self.persist_session().await?;
        let user = if has_user {
            self.session.read().await.user.clone()
        } else {
            None
        };
        match user {
            Some(user) => {
                info!(event = "signed_in", user_id = user.id);
                Ok(user)
            }
            None => self.me().await,
        }
    }

    async fn persist_session(&self) -> ApiResult<()> {
        let Some(file) = &self.session_file else {
            return Ok(());
        };
        let snapshot = self.session.read().await.clone();
        file.save(&snapshot)
    }

    // --- leads ------------------------------------------------------------

    pub async fn list_leads(&self, filters: &LeadFilters) -> ApiResult<Vec<Lead>> {
        let payload: ListPayload<Lead> = self.get_json("/leads", &filters.query_pairs()).await?;
        Ok(payload.into_vec())
    }

    pub async fn get_lead(&self, id: LeadId) -> ApiResult<Lead> {
        self.get_json(&format!("/leads/{id}"), &[]).await
    }

    pub async fn create_lead(&self, draft: &LeadDraft) -> ApiResult<Lead> {
        self.send_json(Method::POST, "/leads", draft).await
    }

    pub async fn update_lead(&self, id: LeadId, patch: &LeadPatch) -> ApiResult<Lead> {
        self.send_json(Method::PUT, &format!("/leads/{id}"), patch)
            .await
    }

    /// The response body is ignored; the caller already holds the new status.
    pub async fn update_lead_status(&self, id: LeadId, status: LeadStatus) -> ApiResult<()> {
        let url = self.url(&format!("/leads/{id}/status"));
        let body = StatusBody { status };
        self.send_authed(|http| Ok(http.patch(&url).json(&body)))
            .await?;
        Ok(())
    }

    pub async fn delete_lead(&self, id: LeadId) -> ApiResult<()> {
        let url = self.url(&format!("/leads/{id}"));
        self.send_authed(|http| Ok(http.delete(&url))).await?;
        Ok(())
    }

    pub async fn lead_stats(&self) -> ApiResult<PipelineStats> {
        self.get_json("/leads/stats", &[]).await
    }

    /// Ask the sales agent to re-run qualification; returns the updated lead.
    pub async fn requalify_lead(&self, id: LeadId) -> ApiResult<Lead> {
        let url = self.url(&format!("/leads/{id}/requalificar"));
        let response = self.send_authed(|http| Ok(http.post(&url))).await?;
        decode(response).await
    }

    // --- projects & invoices ----------------------------------------------

    pub async fn list_projects(&self) -> ApiResult<Vec<Project>> {
        let payload: ListPayload<Project> = self.get_json("/projects", &[]).await?;
        Ok(payload.into_vec())
    }

    pub async fn get_project(&self, id: i64) -> ApiResult<Project> {
        self.get_json(&format!("/projects/{id}"), &[]).await
    }

    pub async fn project_timeline(&self, id: i64) -> ApiResult<Vec<TimelineEvent>> {
        let payload: ListPayload<TimelineEvent> = self
            .get_json(&format!("/projects/{id}/timeline"), &[])
            .await?;
        Ok(payload.into_vec())
    }

    pub async fn project_invoices(&self, id: i64) -> ApiResult<Vec<Invoice>> {
        let payload: ListPayload<Invoice> = self
            .get_json(&format!("/projects/{id}/invoices"), &[])
            .await?;
        Ok(payload.into_vec())
    }

    pub async fn upload_invoice_proof(
        &self,
        invoice_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ApiResult<Invoice> {
        let url = self.url(&format!("/invoices/{invoice_id}/comprovante"));
        let mime = guess_mime(file_name);
        let name = file_name.to_string();
        let response = self
            .send_authed(|http| {
                let part = Part::bytes(bytes.clone())
                    .file_name(name.clone())
                    .mime_str(mime)
                    .map_err(|err| ApiError::Unexpected {
                        status: 0,
                        message: format!("invalid mime type {mime}: {err}"),
                    })?;
                Ok(http.post(&url).multipart(Form::new().part("file", part)))
            })
            .await?;
        decode(response).await
    }

    // --- agent chat -------------------------------------------------------

    pub async fn agent_chat(&self, request: &ChatRequest) -> ApiResult<ChatReply> {
        self.send_json(Method::POST, "/agent/chat", request).await
    }

    // --- plumbing ---------------------------------------------------------

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> ApiResult<T> {
        let url = self.url(path);
        let response = self
            .send_authed(|http| Ok(http.get(&url).query(query)))
            .await?;
        decode(response).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self
            .send_authed(|http| Ok(http.request(method.clone(), &url).json(body)))
            .await?;
        decode(response).await
    }

    /// `build` is invoked again for the retry, so bodies are rebuilt rather than cloned.
    async fn send_authed<F>(&self, build: F) -> ApiResult<Response>
    where
        F: Fn(&Client) -> ApiResult<RequestBuilder>,
    {
        let token = self
            .bearer_token()
            .await
            .ok_or(ApiError::NotAuthenticated)?;
        let response = build(&self.http)?.bearer_auth(&token).send().await?;

        let status = response.status();
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
            return check(response).await;
        }

        debug!(event = "auth_rejected", status = %status);
        let fresh = self.refresh_after_rejection(&token).await?;
        let retry = build(&self.http)?.bearer_auth(&fresh).send().await?;
        check(retry).await
    }

    /// Refresh once per stale token: concurrent rejections of the same token
    /// share a single refresh call.
    async fn refresh_after_rejection(&self, stale: &str) -> ApiResult<String> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.bearer_token().await {
            if current != stale {
                return Ok(current);
            }
        }

        match self.refresh().await {
            Ok(()) => self
                .bearer_token()
                .await
                .ok_or(ApiError::NotAuthenticated),
            // The server never answered; the tokens may still be good.
            Err(err @ (ApiError::Network(_) | ApiError::Server { .. })) => {
                warn!(event = "token_refresh_unreachable", error = %err);
                Err(err)
            }
            Err(err) => {
                warn!(event = "token_refresh_failed", error = %err);
                *self.session.write().await = Session::default();
                if let Some(file) = &self.session_file {
                    if let Err(clear_err) = file.clear() {
                        warn!(event = "session_clear_failed", error = %clear_err);
                    }
                }
                Err(ApiError::Unauthorized(err.to_string()))
            }
        }
    }
}

async fn check(response: Response) -> ApiResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::from_status(status, &body))
}

async fn decode<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
}

fn guess_mime(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
