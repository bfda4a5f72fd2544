//! HTTP integration tests for the AIRA API
//!
//! Router-level tests through `oneshot`, backed by the in-memory store and
//! wiremock upstreams, so no database or network access is needed.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use aira_core::error::Result as AiraResult;
use aira_core::models::{ChatExchange, NewChatExchange, NewWinnerRecord, StoredKey, WinnerRecord};
use aira_core::{AiraConfig, AiraError, MemoryStore, SecretCodec, Store};
use aira_server::http::{build_router, HttpState};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Memory store that counts every gateway call.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for CountingStore {
    async fn upsert_key(&self, s: &str, p: &str, k: &str) -> AiraResult<StoredKey> {
        self.hit();
        self.inner.upsert_key(s, p, k).await
    }

    async fn get_key(&self, s: &str, p: &str) -> AiraResult<Option<StoredKey>> {
        self.hit();
        self.inner.get_key(s, p).await
    }

    async fn list_keys(&self, s: &str) -> AiraResult<Vec<StoredKey>> {
        self.hit();
        self.inner.list_keys(s).await
    }

    async fn append_chat_exchange(&self, e: NewChatExchange) -> AiraResult<ChatExchange> {
        self.hit();
        self.inner.append_chat_exchange(e).await
    }

    async fn chat_history(&self, s: &str, limit: u32) -> AiraResult<Vec<ChatExchange>> {
        self.hit();
        self.inner.chat_history(s, limit).await
    }

    async fn append_winner_record(&self, w: NewWinnerRecord) -> AiraResult<WinnerRecord> {
        self.hit();
        self.inner.append_winner_record(w).await
    }

    async fn winners(&self, s: &str) -> AiraResult<Vec<WinnerRecord>> {
        self.hit();
        self.inner.winners(s).await
    }

    async fn health(&self) -> AiraResult<String> {
        self.inner.health().await
    }

    fn name(&self) -> &str {
        "counting"
    }
}

const STORE_DETAIL: &str = "relation api_keys is locked by pid 4242";

/// Store whose every call fails the way a broken database would.
struct FailingStore;

fn store_down() -> AiraError {
    AiraError::Database(sqlx::Error::Protocol(STORE_DETAIL.to_string()))
}

#[async_trait]
impl Store for FailingStore {
    async fn upsert_key(&self, _: &str, _: &str, _: &str) -> AiraResult<StoredKey> {
        Err(store_down())
    }

    async fn get_key(&self, _: &str, _: &str) -> AiraResult<Option<StoredKey>> {
        Err(store_down())
    }

    async fn list_keys(&self, _: &str) -> AiraResult<Vec<StoredKey>> {
        Err(store_down())
    }

    async fn append_chat_exchange(&self, _: NewChatExchange) -> AiraResult<ChatExchange> {
        Err(store_down())
    }

    async fn chat_history(&self, _: &str, _: u32) -> AiraResult<Vec<ChatExchange>> {
        Err(store_down())
    }

    async fn append_winner_record(&self, _: NewWinnerRecord) -> AiraResult<WinnerRecord> {
        Err(store_down())
    }

    async fn winners(&self, _: &str) -> AiraResult<Vec<WinnerRecord>> {
        Err(store_down())
    }

    async fn health(&self) -> AiraResult<String> {
        Err(store_down())
    }

    fn name(&self) -> &str {
        "failing"
    }
}

fn get_with_cookie(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::empty()).unwrap()
}

fn make_state(store: Arc<dyn Store>, openai_base: Option<String>) -> Arc<HttpState> {
    let mut config = AiraConfig::default();
    if let Some(base) = openai_base {
        config.providers.base_urls.insert("openai".to_string(), base);
    }
    Arc::new(HttpState::new(config, store).expect("state"))
}

fn post_json(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(c) = cookie {
        builder = builder.header(header::COOKIE, c);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn openai_reply(text: &str) -> Value {
    json!({ "choices": [{ "message": { "role": "assistant", "content": text } }] })
}

// ===========================================================================
// TEST 1: POST /api/models/provider: case-insensitive catalog
// ===========================================================================
#[tokio::test]
async fn test_models_endpoint() {
    let app = build_router(make_state(Arc::new(MemoryStore::new()), None));

    let resp = app
        .clone()
        .oneshot(post_json("/api/models/provider", json!({ "provider": "Gemini" }), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["models"][0], "gemini-2.0-flash-exp");

    let resp = app
        .oneshot(post_json("/api/models/provider", json!({ "provider": "unknown" }), None))
        .await
        .unwrap();
    assert_eq!(json_body(resp).await, json!({ "models": [] }));
}

// ===========================================================================
// TEST 2: saving twice for the same session overwrites the single row
// ===========================================================================
#[tokio::test]
async fn test_save_key_twice_keeps_one_row() {
    let store = Arc::new(MemoryStore::new());
    let app = build_router(make_state(store.clone(), None));

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/keys/save",
            json!({ "provider": "openai", "apiKey": "sk-first" }),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let set_cookie = resp
        .headers()
        .get(header::SET_COOKIE)
        .expect("session cookie should be issued")
        .to_str()
        .unwrap()
        .to_string();
    assert!(set_cookie.starts_with("sessionId="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Max-Age=2592000"));
    assert!(set_cookie.contains("Path=/"));

    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let session_id = cookie.trim_start_matches("sessionId=").to_string();

    let body = json_body(resp).await;
    assert_eq!(body["success"], true);

    let resp = app
        .oneshot(post_json(
            "/api/keys/save",
            json!({ "provider": "openai", "apiKey": "sk-second" }),
            Some(&cookie),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    assert_eq!(store.key_count().await, 1, "Second save must overwrite");
    let stored = store.get_key(&session_id, "openai").await.unwrap().unwrap();
    let codec = SecretCodec::new(AiraConfig::default().encryption.key);
    assert_eq!(codec.decrypt(&stored.encrypted_key).unwrap(), "sk-second");
}

// ===========================================================================
// TEST 3: save without required fields is 400 and issues no cookie
// ===========================================================================
#[tokio::test]
async fn test_save_key_missing_fields() {
    let store = Arc::new(MemoryStore::new());
    let app = build_router(make_state(store.clone(), None));

    let resp = app
        .oneshot(post_json("/api/keys/save", json!({ "provider": "openai" }), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(
        json_body(resp).await["error"],
        "Provider and API key are required"
    );
    assert_eq!(store.key_count().await, 0);
}

// ===========================================================================
// TEST 4: get-key without a cookie never touches the store
// ===========================================================================
#[tokio::test]
async fn test_get_key_without_cookie_skips_store() {
    let store = Arc::new(CountingStore::default());
    let app = build_router(make_state(store.clone(), None));

    let resp = app
        .oneshot(post_json("/api/keys/get", json!({ "provider": "openai" }), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "apiKey": null }));
    assert_eq!(store.calls(), 0);
}

// ===========================================================================
// TEST 5: get-key with a cookie returns the stored ciphertext
// ===========================================================================
#[tokio::test]
async fn test_get_key_returns_ciphertext() {
    let store = Arc::new(MemoryStore::new());
    let codec = SecretCodec::new(AiraConfig::default().encryption.key);
    store
        .upsert_key("sess-1", "claude", &codec.encrypt("sk-ant-123"))
        .await
        .unwrap();
    let app = build_router(make_state(store, None));

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/keys/get",
            json!({ "provider": "claude" }),
            Some("sessionId=sess-1"),
        ))
        .await
        .unwrap();
    let body = json_body(resp).await;
    let ciphertext = body["apiKey"].as_str().expect("apiKey should be present");
    assert_ne!(ciphertext, "sk-ant-123");
    assert_eq!(codec.decrypt(ciphertext).unwrap(), "sk-ant-123");

    let resp = app
        .oneshot(post_json(
            "/api/keys/get",
            json!({ "provider": "gemini" }),
            Some("sessionId=sess-1"),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(resp).await, json!({ "apiKey": null }));
}

// ===========================================================================
// TEST 6: empty prompt: 400, no provider call, no history write
// ===========================================================================
#[tokio::test]
async fn test_process_empty_prompt_is_rejected() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("never")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let state = make_state(store.clone(), Some(mock_server.uri()));
    let encrypted = state.codec.encrypt("sk-test");
    let app = build_router(state);

    for prompt in ["", "   "] {
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/process",
                json!({
                    "modelIdentifier": "openai-gpt-4o-1700000000",
                    "prompt": prompt,
                    "encryptedApiKey": encrypted,
                }),
                Some("sessionId=sess-empty"),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "prompt {:?}", prompt);
        let body = json_body(resp).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Prompt is required");
    }
    assert_eq!(store.exchange_count().await, 0);
}

// ===========================================================================
// TEST 7: upstream 500: ProviderCall error, nothing logged
// ===========================================================================
#[tokio::test]
async fn test_process_upstream_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let state = make_state(store.clone(), Some(mock_server.uri()));
    let encrypted = state.codec.encrypt("sk-test");
    let app = build_router(state);

    let resp = app
        .oneshot(post_json(
            "/api/process",
            json!({
                "modelIdentifier": "openai-gpt-4o-1700000000",
                "prompt": "hello",
                "encryptedApiKey": encrypted,
            }),
            Some("sessionId=sess-fail"),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "OpenAI API error: upstream exploded");
    assert_eq!(store.exchange_count().await, 0);
}

// ===========================================================================
// TEST 8: successful process logs one exchange visible in history
// ===========================================================================
#[tokio::test]
async fn test_process_success_logs_exchange() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("Paris")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let state = make_state(store.clone(), Some(mock_server.uri()));
    let encrypted = state.codec.encrypt("sk-test");
    let app = build_router(state);

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/process",
            json!({
                "modelIdentifier": "openai-gpt-4o-mini-1700000000",
                "prompt": "Capital of France?",
                "encryptedApiKey": encrypted,
            }),
            Some("sessionId=sess-ok"),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({ "reply": "Paris", "success": true })
    );
    assert_eq!(store.exchange_count().await, 1);

    let req = Request::builder()
        .method("GET")
        .uri("/api/history")
        .header(header::COOKIE, "sessionId=sess-ok")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let history = body["history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["modelIdentifier"], "openai-gpt-4o-mini-1700000000");
    assert_eq!(history[0]["prompt"], "Capital of France?");
    assert_eq!(history[0]["response"], "Paris");
    assert!(history[0]["responseTimeMs"].is_number());
}

// ===========================================================================
// TEST 9: anonymous process succeeds but writes no history
// ===========================================================================
#[tokio::test]
async fn test_process_without_session_writes_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("ok")))
        .mount(&mock_server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let state = make_state(store.clone(), Some(mock_server.uri()));
    let encrypted = state.codec.encrypt("sk-test");
    let app = build_router(state);

    let resp = app
        .oneshot(post_json(
            "/api/process",
            json!({
                "modelIdentifier": "openai-gpt-4-1",
                "prompt": "hi",
                "encryptedApiKey": encrypted,
            }),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(store.exchange_count().await, 0);
}

// ===========================================================================
// TEST 10: select-winner records the pick for the session
// ===========================================================================
#[tokio::test]
async fn test_select_winner() {
    let store = Arc::new(MemoryStore::new());
    let app = build_router(make_state(store.clone(), None));

    let resp = app
        .oneshot(post_json(
            "/api/select-winner",
            json!({
                "modelIdentifier": "claude-claude-3-haiku-20240307-1",
                "prompt": "p",
                "response": "r",
            }),
            Some("sessionId=sess-w"),
        ))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["success"], true);
    let winners = store.winners("sess-w").await.unwrap();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0].model_identifier, "claude-claude-3-haiku-20240307-1");
}

// ===========================================================================
// TEST 11: malformed JSON still gets a JSON error body
// ===========================================================================
#[tokio::test]
async fn test_malformed_json_is_400_json() {
    let app = build_router(make_state(Arc::new(MemoryStore::new()), None));

    let req = Request::builder()
        .method("POST")
        .uri("/api/process")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert!(body["error"].is_string());
    assert_eq!(body["success"], false);
}

// ===========================================================================
// TEST 12: CORS preflight mirrors the origin and allows credentials
// ===========================================================================
#[tokio::test]
async fn test_cors_preflight_allows_credentials() {
    let app = build_router(make_state(Arc::new(MemoryStore::new()), None));

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/keys/save")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );
    assert_eq!(
        resp.headers()[header::ACCESS_CONTROL_ALLOW_CREDENTIALS],
        "true"
    );
}

// ===========================================================================
// TEST 13: GET /health and /version
// ===========================================================================
#[tokio::test]
async fn test_health_and_version_endpoints() {
    let app = build_router(make_state(Arc::new(MemoryStore::new()), None));

    let req = Request::builder()
        .method("GET")
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "healthy");

    let req = Request::builder()
        .method("GET")
        .uri("/version")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert!(body["version"].is_string());
    assert!(body["providers"]
        .as_array()
        .unwrap()
        .contains(&json!("qwen")));
}

// ===========================================================================
// TEST 14: store failures on write paths are 500 with a generic message
// ===========================================================================
#[tokio::test]
async fn test_store_failures_return_generic_errors() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("fine")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let state = make_state(Arc::new(FailingStore), Some(mock_server.uri()));
    let encrypted = state.codec.encrypt("sk-test");
    let app = build_router(state);

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/keys/save",
            json!({ "provider": "openai", "apiKey": "sk-test" }),
            Some("sessionId=sess-down"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(resp.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(
        json_body(resp).await,
        json!({ "error": "Failed to save API key" })
    );

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/process",
            json!({
                "modelIdentifier": "openai-gpt-4o-1700000000",
                "prompt": "hello",
                "encryptedApiKey": encrypted,
            }),
            Some("sessionId=sess-down"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = json_body(resp).await;
    assert_eq!(
        body,
        json!({ "error": "Failed to save chat history", "success": false })
    );
    assert!(!body.to_string().contains(STORE_DETAIL));

    let resp = app
        .oneshot(post_json(
            "/api/select-winner",
            json!({
                "modelIdentifier": "openai-gpt-4o-1700000000",
                "prompt": "hello",
                "response": "fine",
            }),
            Some("sessionId=sess-down"),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(resp).await,
        json!({ "error": "Failed to record winner" })
    );
}

// ===========================================================================
// TEST 15: store failures on read paths never echo the store's detail
// ===========================================================================
#[tokio::test]
async fn test_store_failures_on_reads_hide_detail() {
    let app = build_router(make_state(Arc::new(FailingStore), None));

    let resp = app
        .clone()
        .oneshot(get_with_cookie("/health", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(resp).await;
    assert_eq!(
        body,
        json!({ "status": "unhealthy", "error": "store unavailable" })
    );

    let cookie = Some("sessionId=sess-down");
    for uri in ["/api/history", "/api/winners", "/api/keys"] {
        let resp = app
            .clone()
            .oneshot(get_with_cookie(uri, cookie))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
        let body = json_body(resp).await;
        assert!(body["error"].is_string(), "{}", uri);
        assert!(!body.to_string().contains(STORE_DETAIL), "{}", uri);
    }

    let resp = app
        .oneshot(post_json(
            "/api/keys/get",
            json!({ "provider": "openai" }),
            cookie,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        json_body(resp).await,
        json!({ "error": "Failed to retrieve API key" })
    );
}

// ===========================================================================
// TEST 16: GET /api/winners and /api/keys are scoped to the session
// ===========================================================================
#[tokio::test]
async fn test_winners_and_key_listing_endpoints() {
    let store = Arc::new(MemoryStore::new());
    let app = build_router(make_state(store.clone(), None));
    let cookie = Some("sessionId=sess-list");

    for provider in ["openai", "claude"] {
        let resp = app
            .clone()
            .oneshot(post_json(
                "/api/keys/save",
                json!({ "provider": provider, "apiKey": "sk-list" }),
                cookie,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    store.upsert_key("someone-else", "gemini", "c").await.unwrap();

    let resp = app
        .clone()
        .oneshot(post_json(
            "/api/select-winner",
            json!({
                "modelIdentifier": "claude-claude-3-haiku-20240307-1",
                "prompt": "p",
                "response": "r",
            }),
            cookie,
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app
        .clone()
        .oneshot(get_with_cookie("/api/keys", cookie))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({ "providers": ["claude", "openai"] })
    );

    let resp = app
        .clone()
        .oneshot(get_with_cookie("/api/winners", cookie))
        .await
        .unwrap();
    let body = json_body(resp).await;
    let winners = body["winners"].as_array().unwrap();
    assert_eq!(winners.len(), 1);
    assert_eq!(winners[0]["modelIdentifier"], "claude-claude-3-haiku-20240307-1");

    let resp = app
        .oneshot(get_with_cookie("/api/winners", None))
        .await
        .unwrap();
    assert_eq!(json_body(resp).await, json!({ "winners": [] }));
}
