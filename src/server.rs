//! HTTP chat server.
//!
//! Serves the chat page and a small JSON API. Each browser tab creates its
//! own session; sessions share nothing but the controller and config.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/` | Chat page |
//! | `GET`    | `/health` | Health check (returns version) |
//! | `POST`   | `/api/sessions` | Start a session |
//! | `GET`    | `/api/sessions/{id}` | Gate state and transcript |
//! | `DELETE` | `/api/sessions/{id}` | End a session |
//! | `POST`   | `/api/sessions/{id}/unlock` | Try the shared password |
//! | `POST`   | `/api/sessions/{id}/messages` | Ask a question |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "upstream_error", "message": "retrieval service error 401: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `locked` (403), `not_found` (404),
//! `turn_in_progress` (409), `upstream_error` (502).

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::{Config, Secrets};
use crate::controller::ChatController;
use crate::gate::AccessGate;
use crate::models::{RetrievedNode, Turn};
use crate::page;
use crate::session::{ChatSession, SessionStore, SharedSession};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    controller: ChatController,
    sessions: Arc<SessionStore>,
    /// Shared password for the visibility gate. `None` means sessions start unlocked.
    password: Option<Arc<str>>,
}

impl AppState {
    /// The gate only applies to variants whose page carries it.
    pub fn new(controller: ChatController, password: Option<String>) -> Self {
        let password: Option<Arc<str>> = password
            .filter(|_| controller.variant().supports_gate())
            .map(Arc::from);
        Self {
            controller,
            sessions: Arc::new(SessionStore::new()),
            password,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    fn new_gate(&self) -> AccessGate {
        match self.password {
            Some(_) => AccessGate::locked(),
            None => AccessGate::open(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/health", get(handle_health))
        .route("/api/sessions", post(handle_create_session))
        .route(
            "/api/sessions/{id}",
            get(handle_get_session).delete(handle_end_session),
        )
        .route("/api/sessions/{id}/unlock", post(handle_unlock))
        .route("/api/sessions/{id}/messages", post(handle_message))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the chat server and the idle-session reaper.
///
/// Binds to `[server].bind` and runs until the process is terminated.
pub async fn run_server(config: &Config, secrets: &Secrets) -> anyhow::Result<()> {
    let controller = ChatController::from_config(config, secrets)?;

    if secrets.app_password.is_some() && !config.chat.variant.supports_gate() {
        tracing::warn!(
            variant = config.chat.variant.as_str(),
            "APP_PASSWORD is set but this variant has no password gate; ignoring it"
        );
    }

    let state = AppState::new(controller, secrets.app_password.clone());
    spawn_reaper(
        state.sessions().clone(),
        Duration::from_secs(config.server.reap_interval_secs),
        max_idle_duration(config.server.session_idle_secs)?,
    );

    let app = create_router(state);

    tracing::info!(
        bind = %config.server.bind,
        variant = config.chat.variant.as_str(),
        model = %config.completion.model,
        "chat server listening"
    );
    println!("Chat server listening on http://{}", config.server.bind);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn max_idle_duration(secs: u64) -> anyhow::Result<chrono::Duration> {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| anyhow::anyhow!("server.session_idle_secs out of range: {}", secs))
}

fn spawn_reaper(sessions: Arc<SessionStore>, every: Duration, max_idle: chrono::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let removed = sessions.reap_idle(max_idle).await;
            if removed > 0 {
                tracing::info!(removed, "ended idle sessions");
            }
        }
    });
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn invalid_body(rejection: JsonRejection) -> AppError {
    bad_request(rejection.body_text())
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

fn locked() -> AppError {
    AppError {
        status: StatusCode::FORBIDDEN,
        code: "locked",
        message: "enter the password to start chatting".to_string(),
    }
}

fn turn_in_progress() -> AppError {
    AppError {
        status: StatusCode::CONFLICT,
        code: "turn_in_progress",
        message: "wait for the current answer before sending another message".to_string(),
    }
}

fn upstream_error(err: anyhow::Error) -> AppError {
    AppError {
        status: StatusCode::BAD_GATEWAY,
        code: "upstream_error",
        message: format!("{:#}", err),
    }
}

async fn lookup(state: &AppState, id: &str) -> Result<SharedSession, AppError> {
    let id = Uuid::parse_str(id).map_err(|_| bad_request(format!("invalid session id: {}", id)))?;
    state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| not_found(format!("session not found: {}", id)))
}

// ============ GET / and /health ============

async fn handle_index(State(state): State<AppState>) -> Html<String> {
    Html(page::render(state.controller.variant()))
}

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Sessions ============

#[derive(Serialize)]
struct CreatedSession {
    id: Uuid,
    locked: bool,
    variant: &'static str,
}

async fn handle_create_session(State(state): State<AppState>) -> (StatusCode, Json<CreatedSession>) {
    let session = ChatSession::new(state.new_gate());
    let locked = !session.gate.is_unlocked();
    let id = state.sessions.insert(session).await;
    tracing::info!(session = %id, locked, "session started");

    (
        StatusCode::CREATED,
        Json(CreatedSession {
            id,
            locked,
            variant: state.controller.variant().as_str(),
        }),
    )
}

#[derive(Serialize)]
struct SessionView {
    id: Uuid,
    locked: bool,
    error: Option<&'static str>,
    turns: Vec<Turn>,
}

/// Gate state and transcript. The transcript is withheld while locked.
async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = lookup(&state, &id).await?;
    let session = session.lock().await;
    let locked = !session.gate.is_unlocked();
    let turns = if locked {
        Vec::new()
    } else {
        session.transcript.turns().to_vec()
    };

    Ok(Json(SessionView {
        id: session.id,
        locked,
        error: session.gate.error(),
        turns,
    }))
}

async fn handle_end_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let session = lookup(&state, &id).await?;
    let id = session.lock().await.id;
    state.sessions.remove(&id).await;
    tracing::info!(session = %id, "session ended");
    Ok(StatusCode::NO_CONTENT)
}

// ============ POST /api/sessions/{id}/unlock ============

#[derive(Deserialize)]
struct UnlockRequest {
    password: String,
}

#[derive(Serialize)]
struct UnlockResponse {
    unlocked: bool,
    error: Option<&'static str>,
}

async fn handle_unlock(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<UnlockRequest>, JsonRejection>,
) -> Result<Json<UnlockResponse>, AppError> {
    let Json(body) = body.map_err(invalid_body)?;
    let session = lookup(&state, &id).await?;
    let mut session = session.lock().await;

    let unlocked = match state.password.as_deref() {
        Some(shared) => session.gate.attempt(&body.password, shared),
        None => true,
    };
    session.touch();
    if !unlocked {
        tracing::info!(session = %session.id, "gate attempt rejected");
    }

    Ok(Json(UnlockResponse {
        unlocked,
        error: session.gate.error(),
    }))
}

// ============ POST /api/sessions/{id}/messages ============

#[derive(Deserialize)]
struct MessageRequest {
    content: String,
}

#[derive(Serialize)]
struct MessageResponse {
    /// The assistant turn, or `null` when the input was blank.
    turn: Option<Turn>,
    answer: Option<String>,
    sources: Vec<RetrievedNode>,
}

/// One chat turn. A second message for the same session while a turn is
/// running is refused rather than queued.
async fn handle_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(body) = body.map_err(invalid_body)?;
    let session = lookup(&state, &id).await?;
    let mut session = session.try_lock().map_err(|_| turn_in_progress())?;

    if !session.gate.is_unlocked() {
        return Err(locked());
    }

    let outcome = state
        .controller
        .submit(&mut session, &body.content)
        .await
        .map_err(upstream_error)?;

    Ok(Json(match outcome {
        Some(outcome) => MessageResponse {
            turn: session.transcript.last().cloned(),
            answer: Some(outcome.answer),
            sources: outcome.sources,
        },
        None => MessageResponse {
            turn: None,
            answer: None,
            sources: Vec::new(),
        },
    }))
}
