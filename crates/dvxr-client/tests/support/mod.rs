//! In-process stand-in for the streaming service and the token exchange
//! backend, served on an ephemeral port.

#![allow(dead_code)]

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dvxr_common::config::AppConfig;
use serde_json::{Value, json};

#[derive(Default)]
struct Recorded {
    connects: Vec<Value>,
    exchanges: Vec<String>,
}

/// A service endpoint made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    /// The directory answers 503.
    Directory,
    /// The connect endpoint answers 403.
    Connect,
}

#[derive(Clone)]
struct ServiceState {
    code: String,
    token: Value,
    computers: Value,
    fault: Option<Fault>,
    recorded: Arc<Mutex<Recorded>>,
}

/// Handle to a running fake service.
pub struct FakeService {
    pub base_url: String,
    recorded: Arc<Mutex<Recorded>>,
}

impl FakeService {
    /// Serve a service that accepts `code`, issues `token`, and lists `computers`.
    pub async fn start(code: &str, token: Value, computers: Value) -> Self {
        Self::serve(code, token, computers, None).await
    }

    /// Like [`FakeService::start`], with one endpoint failing.
    pub async fn start_faulty(code: &str, token: Value, computers: Value, fault: Fault) -> Self {
        Self::serve(code, token, computers, Some(fault)).await
    }

    async fn serve(code: &str, token: Value, computers: Value, fault: Option<Fault>) -> Self {
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let state = ServiceState {
            code: code.to_owned(),
            token,
            computers,
            fault,
            recorded: recorded.clone(),
        };

        let router = Router::new()
            .route("/desktop-vision-auth", get(exchange))
            .route("/api/users/{uid}/computers", get(computers_for))
            .route("/api/connect", post(connect))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            recorded,
        }
    }

    /// Client config pointing both the service and the backend here.
    pub fn config(&self) -> AppConfig {
        let mut config = AppConfig::default();
        config.service.base_url = self.base_url.clone();
        config.service.auth_backend_url = self.base_url.clone();
        config.connection.http_timeout_secs = 5;
        config.connection.stream_timeout_secs = 5;
        config
    }

    /// Bodies posted to the connect endpoint, in order.
    pub fn connects(&self) -> Vec<Value> {
        self.recorded.lock().unwrap().connects.clone()
    }

    pub fn exchanges(&self) -> Vec<String> {
        self.recorded.lock().unwrap().exchanges.clone()
    }
}

fn unauthorized(message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
}

fn token_matches(state: &ServiceState, query: &HashMap<String, String>) -> bool {
    let expected = state.token.get("access_token").and_then(Value::as_str);
    query.get("access_token").map(String::as_str) == expected
}

async fn exchange(
    State(state): State<ServiceState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let code = query.get("code").cloned().unwrap_or_default();
    state.recorded.lock().unwrap().exchanges.push(code.clone());
    if code != state.code {
        return unauthorized("invalid_grant");
    }
    Json(json!({ "token": state.token })).into_response()
}

async fn computers_for(
    State(state): State<ServiceState>,
    Path(uid): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let owner = state.token.get("uid").and_then(Value::as_str);
    if owner != Some(uid.as_str()) || !token_matches(&state, &query) {
        return unauthorized("token rejected");
    }
    if state.fault == Some(Fault::Directory) {
        return (StatusCode::SERVICE_UNAVAILABLE, "directory down").into_response();
    }
    Json(state.computers.clone()).into_response()
}

async fn connect(
    State(state): State<ServiceState>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Response {
    if !token_matches(&state, &query) {
        return unauthorized("token rejected");
    }
    let room = body.get("channel_name").cloned().unwrap_or(Value::Null);
    state.recorded.lock().unwrap().connects.push(body);
    if state.fault == Some(Fault::Connect) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "computer offline" }))).into_response();
    }
    Json(json!({ "roomOptions": { "room": room } })).into_response()
}

/// Poll `done` until it holds, failing the test after five seconds.
pub async fn eventually(what: &str, mut done: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !done() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Run `fut` with a five second cap.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out")
}
