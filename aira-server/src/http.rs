//! AIRA HTTP JSON API
//!
//! Axum-based HTTP server for key storage, prompt dispatch, and winner
//! selection. Each endpoint has a thin axum handler that delegates to a pure
//! inner function returning `(StatusCode, json)`; the inner functions are
//! directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - `POST /api/models/provider`: model catalog for a provider
//! - `POST /api/keys/save`: encrypt and store a key, (re)issue session cookie
//! - `POST /api/keys/get`: stored ciphertext for the session's provider key
//! - `POST /api/process`: send a prompt to a provider
//! - `POST /api/select-winner`: record the preferred response
//! - `GET /api/history`: the session's recent exchanges
//! - `GET /api/winners`: the session's picked responses
//! - `GET /api/keys`: providers the session has a stored key for
//! - `GET /health`: health check with store status
//! - `GET /version`: server version info

use std::sync::Arc;
use std::time::Instant;

use aira_core::models::{NewChatExchange, NewWinnerRecord};
use aira_core::{
    list_models, resolve_model_identifier, AiraConfig, AiraError, Dispatcher, Provider,
    SecretCodec, Store,
};
use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

use crate::session::{self, SessionGrant};

/// Shared state for all HTTP handlers. Immutable after startup.
pub struct HttpState {
    pub store: Arc<dyn Store>,
    pub dispatcher: Dispatcher,
    pub codec: SecretCodec,
    pub config: AiraConfig,
}

impl HttpState {
    pub fn new(config: AiraConfig, store: Arc<dyn Store>) -> Result<Self, AiraError> {
        let dispatcher = Dispatcher::from_config(&config.providers)?;
        let codec = SecretCodec::new(config.encryption.key.clone());
        Ok(Self {
            store,
            dispatcher,
            codec,
            config,
        })
    }
}

/// Build the Axum router with all endpoints.
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/api/models/provider", post(models_handler))
        .route("/api/keys/save", post(save_key_handler))
        .route("/api/keys/get", post(get_key_handler))
        .route("/api/process", post(process_handler))
        .route("/api/select-winner", post(select_winner_handler))
        .route("/api/history", get(history_handler))
        .route("/api/winners", get(winners_handler))
        .route("/api/keys", get(list_keys_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .layer(cors_layer())
        .with_state(state)
}

/// Any origin, cookies allowed. Credentials rule out `*`, so origins and
/// request headers are mirrored back instead.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("AIRA HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ProviderRequest {
    pub provider: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SaveKeyRequest {
    pub provider: Option<String>,
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    pub model_identifier: Option<String>,
    pub prompt: Option<String>,
    pub encrypted_api_key: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct WinnerRequest {
    pub model_identifier: Option<String>,
    pub prompt: Option<String>,
    pub response: Option<String>,
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Inner models lookup: pure, no IO.
pub fn models_inner(req: ProviderRequest) -> (StatusCode, Value) {
    match req.provider {
        Some(provider) => (StatusCode::OK, json!({ "models": list_models(&provider) })),
        None => (
            StatusCode::BAD_REQUEST,
            json!({ "error": "Provider is required" }),
        ),
    }
}

/// Inner key save: encrypts and upserts under `session_id`.
pub async fn save_key_inner(
    store: &dyn Store,
    codec: &SecretCodec,
    session_id: &str,
    req: SaveKeyRequest,
) -> (StatusCode, Value) {
    let (provider, api_key) = match (req.provider, req.api_key) {
        (Some(p), Some(k)) => (p, k),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                json!({ "error": "Provider and API key are required" }),
            );
        }
    };

    let encrypted = codec.encrypt(&api_key);

    match store.upsert_key(session_id, &provider, &encrypted).await {
        Ok(_) => {
            tracing::info!(provider = %provider, "Stored API key");
            (
                StatusCode::OK,
                json!({ "success": true, "message": "API key saved successfully" }),
            )
        }
        Err(e) => {
            tracing::error!(error = %e, provider = %provider, "Failed to save API key");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to save API key" }),
            )
        }
    }
}

/// Inner key lookup. Without a session the store is never consulted.
pub async fn get_key_inner(
    store: &dyn Store,
    session_id: Option<&str>,
    req: ProviderRequest,
) -> (StatusCode, Value) {
    let (session_id, provider) = match (session_id, req.provider) {
        (Some(s), Some(p)) => (s, p),
        _ => return (StatusCode::OK, json!({ "apiKey": null })),
    };

    match store.get_key(session_id, &provider).await {
        Ok(Some(key)) => (StatusCode::OK, json!({ "apiKey": key.encrypted_key })),
        Ok(None) => (StatusCode::OK, json!({ "apiKey": null })),
        Err(e) => {
            tracing::error!(error = %e, provider = %provider, "Failed to retrieve API key");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to retrieve API key" }),
            )
        }
    }
}

/// Inner process: validate, decrypt, call the provider, log the exchange.
pub async fn process_inner(
    state: &HttpState,
    session_id: Option<&str>,
    req: ProcessRequest,
) -> (StatusCode, Value) {
    let start = Instant::now();

    let encrypted_api_key = match req.encrypted_api_key {
        Some(k) if !k.trim().is_empty() => k,
        _ => {
            return process_error(AiraError::validation(
                "API key not found. Please add it using the + button.",
            ));
        }
    };

    let prompt = match req.prompt {
        Some(p) if !p.trim().is_empty() => p,
        _ => return process_error(AiraError::validation("Prompt is required")),
    };

    let model_identifier = match req.model_identifier {
        Some(m) if !m.trim().is_empty() => m,
        _ => return process_error(AiraError::validation("Model identifier is required")),
    };

    let (provider, model) = resolve_model_identifier(&model_identifier);

    let api_key = match state.codec.decrypt(&encrypted_api_key) {
        Ok(k) => k,
        Err(e) => return process_error(e),
    };

    let reply = match state
        .dispatcher
        .invoke(&provider, &model, &prompt, &api_key)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(provider = %provider, model = %model, error = %e, "Provider call failed");
            return process_error(e);
        }
    };

    if let Some(session_id) = session_id {
        let exchange = NewChatExchange {
            session_id: session_id.to_string(),
            model_identifier,
            prompt,
            response: reply.clone(),
            response_time_ms: elapsed_ms(start),
        };
        if let Err(e) = state.store.append_chat_exchange(exchange).await {
            tracing::error!(error = %e, "Failed to save chat history");
            return process_error(e);
        }
    }

    (StatusCode::OK, json!({ "reply": reply, "success": true }))
}

/// Inner winner selection. Anonymous callers are recorded with no session.
pub async fn select_winner_inner(
    store: &dyn Store,
    session_id: Option<&str>,
    req: WinnerRequest,
) -> (StatusCode, Value) {
    let (model_identifier, prompt, response) = match (req.model_identifier, req.prompt, req.response)
    {
        (Some(m), Some(p), Some(r)) => (m, p, r),
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                json!({ "error": "modelIdentifier, prompt and response are required" }),
            );
        }
    };

    let winner = NewWinnerRecord {
        session_id: session_id.map(str::to_string),
        model_identifier,
        prompt,
        response,
    };

    match store.append_winner_record(winner).await {
        Ok(_) => (
            StatusCode::OK,
            json!({ "success": true, "message": "Winner recorded successfully" }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to record winner");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to record winner" }),
            )
        }
    }
}

/// Inner history: newest first, empty without a session.
pub async fn history_inner(
    store: &dyn Store,
    session_id: Option<&str>,
    limit: u32,
) -> (StatusCode, Value) {
    let Some(session_id) = session_id else {
        return (StatusCode::OK, json!({ "history": [] }));
    };

    match store.chat_history(session_id, limit).await {
        Ok(rows) => (StatusCode::OK, json!({ "history": rows })),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load chat history");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to load chat history" }),
            )
        }
    }
}

/// Inner winners listing: newest first, empty without a session.
pub async fn winners_inner(store: &dyn Store, session_id: Option<&str>) -> (StatusCode, Value) {
    let Some(session_id) = session_id else {
        return (StatusCode::OK, json!({ "winners": [] }));
    };

    match store.winners(session_id).await {
        Ok(rows) => (StatusCode::OK, json!({ "winners": rows })),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load winners");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to load winners" }),
            )
        }
    }
}

/// Inner key listing. Only provider names leave the server, never ciphertext.
pub async fn list_keys_inner(store: &dyn Store, session_id: Option<&str>) -> (StatusCode, Value) {
    let Some(session_id) = session_id else {
        return (StatusCode::OK, json!({ "providers": [] }));
    };

    match store.list_keys(session_id).await {
        Ok(keys) => {
            let providers: Vec<String> = keys.into_iter().map(|k| k.provider).collect();
            (StatusCode::OK, json!({ "providers": providers }))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to list API keys");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Failed to list API keys" }),
            )
        }
    }
}

/// Inner health check: pings the store.
pub async fn health_inner(store: &dyn Store) -> (StatusCode, Value) {
    match store.health().await {
        Ok(detail) => (
            StatusCode::OK,
            json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "store": store.name(),
                "detail": detail,
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, store = store.name(), "Store health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "status": "unhealthy",
                    "error": "store unavailable",
                }),
            )
        }
    }
}

/// Inner version: pure, no IO.
pub fn version_inner() -> Value {
    let providers: Vec<&str> = Provider::ALL.iter().map(|p| p.name()).collect();
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "providers": providers,
    })
}

// ============================================================================
// Axum handler wrappers (thin: delegate to inner functions)
// ============================================================================

pub async fn models_handler(
    payload: Result<Json<ProviderRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => models_inner(req),
        Err(rejection) => bad_json(rejection),
    };
    (status, Json(body))
}

pub async fn save_key_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    payload: Result<Json<SaveKeyRequest>, JsonRejection>,
) -> Response {
    let req = match payload {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let (status, body) = bad_json(rejection);
            return (status, Json(body)).into_response();
        }
    };

    let grant = session::get_or_create_session_id(&headers);
    if grant.created {
        tracing::debug!("Minted new session for key save");
    }
    let (status, body) =
        save_key_inner(state.store.as_ref(), &state.codec, &grant.id, req).await;

    // Refresh the cookie's 30-day window on every successful save.
    let mut response = (status, Json(body)).into_response();
    if status == StatusCode::OK {
        set_session_cookie(&mut response, &grant);
    }
    response
}

pub async fn get_key_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    payload: Result<Json<ProviderRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => {
            let session_id = session::session_id(&headers);
            get_key_inner(state.store.as_ref(), session_id.as_deref(), req).await
        }
        Err(rejection) => bad_json(rejection),
    };
    (status, Json(body))
}

pub async fn process_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => {
            let session_id = session::session_id(&headers);
            process_inner(&state, session_id.as_deref(), req).await
        }
        Err(rejection) => {
            let (status, mut body) = bad_json(rejection);
            body["success"] = json!(false);
            (status, body)
        }
    };
    (status, Json(body))
}

pub async fn select_winner_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    payload: Result<Json<WinnerRequest>, JsonRejection>,
) -> impl IntoResponse {
    let (status, body) = match payload {
        Ok(Json(req)) => {
            let session_id = session::session_id(&headers);
            select_winner_inner(state.store.as_ref(), session_id.as_deref(), req).await
        }
        Err(rejection) => bad_json(rejection),
    };
    (status, Json(body))
}

pub async fn history_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let session_id = session::session_id(&headers);
    let (status, body) = history_inner(
        state.store.as_ref(),
        session_id.as_deref(),
        state.config.http.history_limit,
    )
    .await;
    (status, Json(body))
}

pub async fn winners_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let session_id = session::session_id(&headers);
    let (status, body) = winners_inner(state.store.as_ref(), session_id.as_deref()).await;
    (status, Json(body))
}

pub async fn list_keys_handler(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let session_id = session::session_id(&headers);
    let (status, body) = list_keys_inner(state.store.as_ref(), session_id.as_deref()).await;
    (status, Json(body))
}

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(state.store.as_ref()).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

// ============================================================================
// Helpers
// ============================================================================

/// HTTP status for an error surfaced by `/api/process`.
pub fn error_status(error: &AiraError) -> StatusCode {
    match error {
        AiraError::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn process_error(error: AiraError) -> (StatusCode, Value) {
    let message = if error.is_persistence() {
        "Failed to save chat history".to_string()
    } else {
        error.to_string()
    };
    (
        error_status(&error),
        json!({ "error": message, "success": false }),
    )
}

fn bad_json(rejection: JsonRejection) -> (StatusCode, Value) {
    (
        StatusCode::BAD_REQUEST,
        json!({ "error": rejection.body_text() }),
    )
}

fn set_session_cookie(response: &mut Response, grant: &SessionGrant) {
    match HeaderValue::from_str(&grant.cookie()) {
        Ok(value) => {
            response.headers_mut().append(SET_COOKIE, value);
        }
        Err(e) => tracing::error!(error = %e, "Session cookie is not a valid header value"),
    }
}

fn elapsed_ms(start: Instant) -> i32 {
    i32::try_from(start.elapsed().as_millis()).unwrap_or(i32::MAX)
}

// ============================================================================
// Unit Tests: call inner functions directly
// ============================================================================
