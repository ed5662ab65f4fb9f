#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tabrun_core::redact::Credentials;
use tabrun_core::retry::RetryPolicy;
use tabrun_core::scripting::executor::{StageError, StageExecutor};
use tabrun_core::scripting::tabular_editor::TabularEditorConfig;
use tabrun_core::stage::{Stage, StageRequest, StageResult};
use tabrun_events::EventBus;
use tabrun_pipeline::Orchestrator;
use tokio::sync::{Notify, Semaphore};
use tower::ServiceExt;

use tabrun_api::config::ServerConfig;
use tabrun_api::router::build_app_router;
use tabrun_api::state::AppState;

pub const CLIENT_SECRET: &str = "hunter2";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        executor: TabularEditorConfig {
            executable: PathBuf::from("/nonexistent/TabularEditor.exe"),
            scripts_dir: PathBuf::from("/nonexistent/Scripts"),
            timeout: None,
        },
        retry: RetryPolicy::new(2, Duration::ZERO),
    }
}

/// Stage executor for HTTP tests.
///
/// Each call signals `entered`, waits for a gate permit, then succeeds with
/// output that leaks the client secret unless the stage is listed in
/// `failing`.
pub struct TestExecutor {
    gate: Arc<Semaphore>,
    entered: Arc<Notify>,
    failing: Vec<Stage>,
}

impl TestExecutor {
    /// Executor whose calls complete immediately.
    pub fn open() -> Self {
        Self {
            gate: Arc::new(Semaphore::new(Semaphore::MAX_PERMITS)),
            entered: Arc::new(Notify::new()),
            failing: Vec::new(),
        }
    }

    /// Executor whose calls block until permits are added to `gate`.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate,
            entered: Arc::new(Notify::new()),
            failing: Vec::new(),
        }
    }

    /// Notified each time a stage call starts. The stage has already been
    /// recorded on the instance by then.
    pub fn entered(&self) -> Arc<Notify> {
        Arc::clone(&self.entered)
    }

    pub fn failing(mut self, stage: Stage) -> Self {
        self.failing.push(stage);
        self
    }
}

#[async_trait]
impl StageExecutor for TestExecutor {
    async fn execute(&self, request: &StageRequest) -> Result<StageResult, StageError> {
        self.entered.notify_one();
        let _permit = self.gate.acquire().await.expect("gate closed");
        let output = format!("{} ran with Password={CLIENT_SECRET}", request.stage);
        if self.failing.contains(&request.stage) {
            Ok(StageResult::failed(request.stage, output, 1))
        } else {
            Ok(StageResult::succeeded(request.stage, output))
        }
    }
}

/// Build the full application router around an orchestrator using
/// `executor`. The orchestrator is returned so tests can await instances.
pub fn build_test_app(executor: TestExecutor) -> (Router, Arc<Orchestrator>) {
    let config = test_config();
    let redactor = Credentials::new("client-abc", "tenant-xyz", CLIENT_SECRET).redactor();
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(executor),
        redactor,
        config.retry,
        Arc::new(EventBus::default()),
    ));

    let state = AppState {
        config: Arc::new(config.clone()),
        orchestrator: Arc::clone(&orchestrator),
    };

    (build_app_router(state, &config), orchestrator)
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    post_raw(app, uri, body.to_string()).await
}

pub async fn post_raw(app: Router, uri: &str, body: String) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn descriptor_json() -> serde_json::Value {
    serde_json::json!({
        "BaseURL": "asazure://x",
        "Server": "srv1",
        "Model": "m1",
        "BatchName": "b1",
    })
}
