use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use leadflow_client::{ApiClient, ApiError, Session, SessionFile};
use leadflow_core::portal::Credentials;
use leadflow_core::{LeadDraft, LeadFilters, LeadStatus};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

#[derive(Default)]
struct Backend {
    refresh_calls: AtomicUsize,
    lead_calls: AtomicUsize,
    refresh_fails: bool,
    refresh_delay: Option<Duration>,
    last_query: Mutex<HashMap<String, String>>,
    last_status_body: Mutex<Option<Value>>,
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn authorized(headers: &HeaderMap) -> bool {
    bearer(headers).as_deref() == Some("fresh")
}

async fn login(Json(body): Json<Value>) -> Response {
    if body["password"] != "secret" {
        return (StatusCode::UNAUTHORIZED, Json(json!({"detail": "credenciais inválidas"})))
            .into_response();
    }
    Json(json!({
        "access_token": "fresh",
        "refresh_token": "r1",
        "user": {"id": 7, "nome": "Carla", "email": "carla@example.com"}
    }))
    .into_response()
}

async fn refresh(State(backend): State<Arc<Backend>>, Json(body): Json<Value>) -> Response {
    backend.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if let Some(delay) = backend.refresh_delay {
        tokio::time::sleep(delay).await;
    }
    if backend.refresh_fails || body["refresh_token"] != "r1" {
        return (StatusCode::UNAUTHORIZED, "expired").into_response();
    }
    Json(json!({"access_token": "fresh"})).into_response()
}

async fn list_leads(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    backend.lead_calls.fetch_add(1, Ordering::SeqCst);
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if let Ok(mut last) = backend.last_query.lock() {
        *last = query;
    }
    Json(json!({
        "items": [
            {"id": 1, "nome": "Acme", "status": "novo", "temperatura": "quente"},
            {"id": "2", "nome": "Globex", "status": "ganho", "valor_estimado": 1500.0}
        ],
        "total": 2
    }))
    .into_response()
}

async fn create_lead(headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["email"] == "dup@example.com" {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "email já cadastrado"})),
        )
            .into_response();
    }
    let mut lead = body.clone();
    lead["id"] = json!(99);
    (StatusCode::CREATED, Json(lead)).into_response()
}

async fn change_status(
    State(backend): State<Arc<Backend>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::FORBIDDEN.into_response();
    }
    if id == 404 {
        return (StatusCode::NOT_FOUND, Json(json!({"detail": "lead não encontrado"})))
            .into_response();
    }
    if let Ok(mut last) = backend.last_status_body.lock() {
        *last = Some(body);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn upload_proof(
    headers: HeaderMap,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> Response {
    if !authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        let size = field.bytes().await.map(|b| b.len()).unwrap_or(0);
        return Json(json!({
            "id": id,
            "valor": 1200.0,
            "status": "em_analise",
            "comprovante_url": format!("/uploads/{file_name}?type={content_type}&size={size}")
        }))
        .into_response();
    }
    (StatusCode::BAD_REQUEST, "missing file").into_response()
}

async fn spawn_backend(backend: Arc<Backend>) -> Url {
    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/refresh", post(refresh))
        .route("/api/leads", get(list_leads).post(create_lead))
        .route("/api/leads/:id/status", patch(change_status))
        .route("/api/invoices/:id/comprovante", post(upload_proof))
        .with_state(backend);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Url::parse(&format!("http://{addr}/api")).expect("url")
}

fn stale_session() -> Session {
    Session {
        access_token: Some("stale".to_string()),
        refresh_token: Some("r1".to_string()),
        user: None,
        last_refresh: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn rejected_token_is_refreshed_once_and_request_retried() {
    let backend = Arc::new(Backend::default());
    let base = spawn_backend(backend.clone()).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let file = SessionFile::new(dir.path().join("session.json"));
    file.save(&stale_session()).expect("seed session");

    let client = ApiClient::new(&base, Duration::from_secs(5))
        .expect("client")
        .with_session_file(file.clone());

    let filters = LeadFilters {
        status: Some(LeadStatus::New),
        search: Some(" acme ".to_string()),
        ..LeadFilters::default()
    };
    let leads = client.list_leads(&filters).await.expect("list leads");

    assert_eq!(leads.len(), 2);
    assert_eq!(leads[1].id, 2);
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.lead_calls.load(Ordering::SeqCst), 2);
    assert_eq!(file.load().bearer_token(), Some("fresh"));
    assert_eq!(file.load().refresh_token.as_deref(), Some("r1"));

    let query = backend.last_query.lock().expect("lock").clone();
    assert_eq!(query.get("status").map(String::as_str), Some("novo"));
    assert_eq!(query.get("busca").map(String::as_str), Some("acme"));

    // the fresh token is reused without another refresh
    client.list_leads(&LeadFilters::default()).await.expect("list again");
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_refresh_clears_the_session() {
    let backend = Arc::new(Backend {
        refresh_fails: true,
        ..Backend::default()
    });
    let base = spawn_backend(backend.clone()).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let file = SessionFile::new(dir.path().join("session.json"));
    file.save(&stale_session()).expect("seed session");

    let client = ApiClient::new(&base, Duration::from_secs(5))
        .expect("client")
        .with_session_file(file.clone());

    let err = client
        .list_leads(&LeadFilters::default())
        .await
        .expect_err("refresh should fail");
    assert!(matches!(err, ApiError::Unauthorized(_)));
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(backend.lead_calls.load(Ordering::SeqCst), 1);
    assert!(!client.session().await.is_authenticated());
    assert!(!file.path().exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unreachable_refresh_keeps_the_session() {
    let backend = Arc::new(Backend {
        refresh_delay: Some(Duration::from_secs(5)),
        ..Backend::default()
    });
    let base = spawn_backend(backend.clone()).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let file = SessionFile::new(dir.path().join("session.json"));
    file.save(&stale_session()).expect("seed session");

    let client = ApiClient::new(&base, Duration::from_millis(500))
        .expect("client")
        .with_session_file(file.clone());

    let err = client
        .list_leads(&LeadFilters::default())
        .await
        .expect_err("refresh should time out");
    assert!(matches!(err, ApiError::Network(_)), "got {err:?}");
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 1);

    let session = client.session().await;
    assert_eq!(session.bearer_token(), Some("stale"));
    assert_eq!(session.refresh_token.as_deref(), Some("r1"));
    assert!(file.path().exists());
    assert_eq!(file.load().refresh_token.as_deref(), Some("r1"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn login_stores_tokens_and_profile() {
    let backend = Arc::new(Backend::default());
    let base = spawn_backend(backend).await;
    let dir = tempfile::tempdir().expect("tempdir");
    let file = SessionFile::new(dir.path().join("session.json"));
    let client = ApiClient::new(&base, Duration::from_secs(5))
        .expect("client")
        .with_session_file(file.clone());

    let bad = client
        .login(&Credentials {
            email: "carla@example.com".to_string(),
            password: "wrong".to_string(),
        })
        .await;
    assert_eq!(
        bad.unwrap_err(),
        ApiError::Unauthorized("credenciais inválidas".to_string())
    );

    let user = client
        .login(&Credentials {
            email: "carla@example.com".to_string(),
            password: "secret".to_string(),
        })
        .await
        .expect("login");
    assert_eq!(user.id, 7);
    let saved = file.load();
    assert_eq!(saved.bearer_token(), Some("fresh"));
    assert_eq!(saved.user.map(|u| u.name), Some("Carla".to_string()));

    client.logout().await.expect("logout");
    assert!(!file.path().exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn validation_and_not_found_are_mapped() {
    let backend = Arc::new(Backend::default());
    let base = spawn_backend(backend.clone()).await;
    let client = ApiClient::new(&base, Duration::from_secs(5))
        .expect("client")
        .with_session(Session {
            access_token: Some("fresh".to_string()),
            ..Session::default()
        });

    let draft = LeadDraft {
        name: "Initech".to_string(),
        email: Some("dup@example.com".to_string()),
        ..LeadDraft::default()
    };
    let err = client.create_lead(&draft).await.expect_err("duplicate");
    assert!(err.is_validation());
    assert_eq!(err.to_string(), "email já cadastrado");

    let created = client
        .create_lead(&LeadDraft {
            name: "Initech".to_string(),
            ..LeadDraft::default()
        })
        .await
        .expect("create");
    assert_eq!(created.id, 99);
    assert_eq!(created.name, "Initech");

    client
        .update_lead_status(5, LeadStatus::MeetingScheduled)
        .await
        .expect("status");
    let body = backend.last_status_body.lock().expect("lock").clone();
    assert_eq!(body, Some(json!({"status": "agendamento_marcado"})));

    let missing = client.update_lead_status(404, LeadStatus::Won).await;
    assert_eq!(
        missing.unwrap_err(),
        ApiError::NotFound("lead não encontrado".to_string())
    );
    assert_eq!(backend.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn invoice_proof_is_sent_as_multipart_file() {
    let backend = Arc::new(Backend::default());
    let base = spawn_backend(backend).await;
    let client = ApiClient::new(&base, Duration::from_secs(5))
        .expect("client")
        .with_session(Session {
            access_token: Some("fresh".to_string()),
            ..Session::default()
        });

    let invoice = client
        .upload_invoice_proof(12, "comprovante.pdf", b"%PDF-1.4".to_vec())
        .await
        .expect("upload");
    assert_eq!(invoice.id, 12);
    assert_eq!(
        invoice.proof_url.as_deref(),
        Some("/uploads/comprovante.pdf?type=application/pdf&size=8")
    );
}
