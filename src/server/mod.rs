// SPDX-License-Identifier: MIT

//! HTTP API for running workflows
//!
//! Workflows are YAML files in a directory; runs execute in-process and can
//! stream their progress as server-sent events.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::graph::checkpoint::{CheckpointStore, FileCheckpointStore};
use crate::graph::config::RunConfig;
use crate::graph::error::GraphError;
use crate::graph::event::RunEvent;
use crate::graph::executor::Executor;
use crate::graph::state::Update;
use crate::workflow::{Workflow, WorkflowBuilder, WorkflowDefinition, WorkflowLoader};

type ApiError = (StatusCode, Json<Value>);
type ApiResult = Result<Json<Value>, ApiError>;

/// Shared server configuration
#[derive(Clone)]
pub struct AppState {
    workflows_dir: PathBuf,
    checkpoint_dir: Option<PathBuf>,
    builder: Arc<WorkflowBuilder>,
}

impl AppState {
    pub fn new(workflows_dir: impl Into<PathBuf>, checkpoint_dir: Option<PathBuf>) -> Self {
        Self {
            workflows_dir: workflows_dir.into(),
            checkpoint_dir,
            builder: Arc::new(WorkflowBuilder::new()),
        }
    }

    async fn workflow_path(&self, id: &str) -> Result<PathBuf, ApiError> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(error(StatusCode::BAD_REQUEST, format!("invalid workflow id '{}'", id)));
        }
        for ext in ["yaml", "yml"] {
            let path = self.workflows_dir.join(format!("{}.{}", id, ext));
            if fs::try_exists(&path).await.unwrap_or(false) {
                return Ok(path);
            }
        }
        Err(error(StatusCode::NOT_FOUND, format!("workflow '{}' not found", id)))
    }

    async fn load_workflow(&self, id: &str) -> Result<Workflow, ApiError> {
        let path = self.workflow_path(id).await?;
        read_definition(&path)
            .await
            .and_then(|def| self.builder.build(&def))
            .map_err(|e| error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))
    }

    /// Executor for a run, persisting checkpoints when a directory is configured
    fn executor(&self, workflow: &Workflow, config: &mut RunConfig) -> Executor {
        let executor = workflow.executor();
        match &self.checkpoint_dir {
            Some(dir) => {
                config.checkpoint_enabled = true;
                executor.with_checkpointer(Arc::new(FileCheckpointStore::new(dir.clone())))
            }
            None => executor,
        }
    }
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/workflows", get(list_workflows))
        .route("/api/workflows/{id}", get(get_workflow))
        .route("/api/runs", post(create_run))
        .route("/api/runs/stream", post(stream_run))
        .route("/api/runs/{run_id}/checkpoint", get(get_checkpoint))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(
    port: u16,
    workflows_dir: PathBuf,
    checkpoint_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = router(AppState::new(workflows_dir, checkpoint_dir));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    log::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn read_definition(path: &std::path::Path) -> Result<WorkflowDefinition, GraphError> {
    let content = fs::read_to_string(path).await?;
    WorkflowLoader::parse_yaml(&content)
}

fn error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn list_workflows(State(app): State<AppState>) -> Json<Value> {
    let mut workflows = Vec::new();
    if let Ok(mut entries) = fs::read_dir(&app.workflows_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if !path
                .extension()
                .is_some_and(|ext| ext == "yaml" || ext == "yml")
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let summary = match read_definition(&path).await {
                Ok(def) => json!({
                    "id": stem,
                    "name": def.name,
                    "description": def.description,
                    "nodes": def.nodes.len(),
                }),
                Err(e) => json!({ "id": stem, "error": e.to_string() }),
            };
            workflows.push(summary);
        }
    }
    workflows.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));
    Json(json!(workflows))
}

async fn get_workflow(State(app): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let path = app.workflow_path(&id).await?;
    let def = read_definition(&path)
        .await
        .map_err(|e| error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
    serde_json::to_value(def)
        .map(Json)
        .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[derive(Deserialize)]
struct RunRequest {
    workflow_id: String,
    #[serde(default)]
    input: Value,
    run_id: Option<String>,
    max_steps: Option<usize>,
}

impl RunRequest {
    fn input(&self) -> Result<Update, ApiError> {
        match &self.input {
            Value::Null => Ok(Update::new()),
            other => Update::from_json(other.clone())
                .ok_or_else(|| error(StatusCode::BAD_REQUEST, "input must be a JSON object")),
        }
    }

    fn config(&self, workflow: &Workflow) -> RunConfig {
        let mut config = workflow.config.clone();
        if let Some(run_id) = &self.run_id {
            config.run_id = Some(run_id.clone());
        }
        if let Some(max_steps) = self.max_steps {
            config.max_steps = max_steps;
        }
        config
    }
}

async fn create_run(State(app): State<AppState>, Json(request): Json<RunRequest>) -> ApiResult {
    let workflow = app.load_workflow(&request.workflow_id).await?;
    let input = request.input()?;
    let mut config = request.config(&workflow);
    let executor = app.executor(&workflow, &mut config);

    log::info!("Running workflow '{}'", workflow.name);
    match executor.run(input, &config).await {
        Ok(output) => serde_json::to_value(output)
            .map(Json)
            .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        Err(failure) => Err((StatusCode::UNPROCESSABLE_ENTITY, Json(failure.to_json()))),
    }
}

async fn stream_run(
    State(app): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let workflow = app.load_workflow(&request.workflow_id).await?;
    let input = request.input()?;
    let mut config = request.config(&workflow);
    let (tx, rx) = mpsc::channel::<RunEvent>(100);
    let executor = app.executor(&workflow, &mut config).with_events(tx);

    tokio::spawn(async move {
        log::info!("Starting streaming run of workflow '{}'", workflow.name);
        // Failures are reported through the RunFailed event
        let _ = executor.run(input, &config).await;
        log::info!("Streaming run of workflow '{}' finished", workflow.name);
    });

    let stream = ReceiverStream::new(rx).map(|event| {
        Ok(Event::default()
            .json_data(&event)
            .unwrap_or_else(|e| Event::default().event("error").data(e.to_string())))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(1))))
}

async fn get_checkpoint(State(app): State<AppState>, Path(run_id): Path<String>) -> ApiResult {
    let dir = app
        .checkpoint_dir
        .as_ref()
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "checkpointing is not configured"))?;

    match FileCheckpointStore::new(dir.clone()).load(&run_id).await {
        Ok(Some(checkpoint)) => serde_json::to_value(checkpoint)
            .map(Json)
            .map_err(|e| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
        Ok(None) => Err(error(
            StatusCode::NOT_FOUND,
            format!("no checkpoint for run '{}'", run_id),
        )),
        Err(e @ GraphError::Checkpoint(_)) => Err(error(StatusCode::BAD_REQUEST, e.to_string())),
        Err(e) => Err(error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COUNTER: &str = r#"
name: counter
description: counts to two
state:
  count: { type: number, reducer: add, default: 0 }
nodes:
  - id: one
    kind: update
    update: { count: 1 }
  - id: two
    kind: update
    update: { count: 1 }
sequence: [one, two]
"#;

    struct TestServer {
        base: String,
        root: PathBuf,
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    async fn start() -> TestServer {
        let root = std::env::temp_dir().join(format!("stategraph-server-{}", uuid::Uuid::new_v4()));
        let workflows = root.join("workflows");
        std::fs::create_dir_all(&workflows).unwrap();
        std::fs::write(workflows.join("counter.yaml"), COUNTER).unwrap();

        let app = router(AppState::new(workflows, Some(root.join("checkpoints"))));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        TestServer {
            base: format!("http://{}", addr),
            root,
        }
    }

    #[tokio::test]
    async fn test_health_and_listing() {
        let server = start().await;
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("{}/api/health", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let list: Value = client
            .get(format!("{}/api/workflows", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(list[0]["id"], "counter");
        assert_eq!(list[0]["nodes"], 2);

        let def: Value = client
            .get(format!("{}/api/workflows/counter", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(def["name"], "counter");

        let missing = client
            .get(format!("{}/api/workflows/nope", server.base))
            .send()
            .await
            .unwrap();
        assert_eq!(missing.status().as_u16(), 404);
    }

    #[tokio::test]
    async fn test_yml_files_and_broken_definitions() {
        let server = start().await;
        let workflows = server.root.join("workflows");
        std::fs::write(workflows.join("again.yml"), COUNTER.replace("name: counter", "name: again"))
            .unwrap();
        std::fs::write(workflows.join("broken.yaml"), "name: [unclosed").unwrap();
        let client = reqwest::Client::new();

        let list: Value = client
            .get(format!("{}/api/workflows", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let ids: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|w| w["id"].as_str())
            .collect();
        assert_eq!(ids, vec!["again", "broken", "counter"]);
        assert!(list[1]["error"].is_string());

        let output: Value = client
            .post(format!("{}/api/runs", server.base))
            .json(&json!({"workflow_id": "again"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(output["state"]["count"], 2);

        let broken = client
            .post(format!("{}/api/runs", server.base))
            .json(&json!({"workflow_id": "broken"}))
            .send()
            .await
            .unwrap();
        assert_eq!(broken.status().as_u16(), 422);
    }

    #[tokio::test]
    async fn test_run_then_fetch_checkpoint() {
        let server = start().await;
        let client = reqwest::Client::new();

        let output: Value = client
            .post(format!("{}/api/runs", server.base))
            .json(&json!({"workflow_id": "counter", "run_id": "http-run"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(output["status"], "completed");
        assert_eq!(output["state"]["count"], 2);
        assert_eq!(output["steps"], 2);

        let checkpoint: Value = client
            .get(format!("{}/api/runs/http-run/checkpoint", server.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(checkpoint["step"], 2);
        assert_eq!(checkpoint["frontier"], json!([]));
    }

    #[tokio::test]
    async fn test_failed_run_returns_diagnostics() {
        let server = start().await;
        let response = reqwest::Client::new()
            .post(format!("{}/api/runs", server.base))
            .json(&json!({"workflow_id": "counter", "max_steps": 1}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 422);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["kind"], "step_limit_exceeded");
        assert_eq!(body["last_checkpoint_step"], 1);
    }

    #[tokio::test]
    async fn test_stream_emits_events() {
        let server = start().await;
        let body = reqwest::Client::new()
            .post(format!("{}/api/runs/stream", server.base))
            .json(&json!({"workflow_id": "counter", "input": {"count": 10}}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        assert!(body.contains("\"type\":\"run_started\""));
        assert!(body.contains("\"type\":\"node_completed\""));
        assert!(body.contains("\"type\":\"run_finished\""));
    }
}
