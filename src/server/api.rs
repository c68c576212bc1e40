//! HTTP API for the chat page.
//!
//! - GET  /               chat page
//! - POST /api/inference  one-shot generation or sentiment
//! - GET  /api/tasks      supported task ids
//! - POST /api/chat       conversation with session memory
//! - GET  /health
//! - GET  /metrics

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::chain::ConversationChain;
use crate::config::Config;
use crate::error::PipelineError;
use crate::pipeline::registry::ModelRegistry;
use crate::pipeline::{GenerationParams, Sentiment, Task};
use crate::server::metrics::Metrics;

const INDEX_HTML: &str = include_str!("../../static/index.html");

/// Application state shared across handlers.
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub chat: ConversationChain,
    pub config: Arc<Config>,
    pub metrics: Metrics,
    pub start_time: Instant,
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/inference", post(inference))
        .route("/api/tasks", get(list_tasks))
        .route("/api/chat", post(chat))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InferenceRequest {
    #[serde(default)]
    pub prompt: String,
    #[serde(default = "default_task_type")]
    pub task_type: String,
    #[serde(default, deserialize_with = "deserialize_seed")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SeedValue {
    Number(u64),
    Text(String),
}

/// Seeds arrive as numbers or numeric strings.
fn deserialize_seed<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<SeedValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(SeedValue::Number(n)) => Ok(Some(n)),
        Some(SeedValue::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid seed: {s:?}"))),
    }
}

fn default_task_type() -> String {
    Task::TextGeneration.id().to_string()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub response: String,
    pub task_type: String,
    pub seed: Option<u64>,
    pub mock: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<TaskInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub turns: usize,
    pub mock: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub mock_mode: bool,
    pub cached_models: Vec<String>,
    pub sessions: usize,
}

/// Error body: `{"error": "..."}`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::UnsupportedTask(_) => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Turn a body the extractor could not decode into a JSON 400.
fn reject_body(endpoint: &str, rejection: JsonRejection) -> ApiError {
    error!(endpoint, error = %rejection.body_text(), "Malformed request body");
    ApiError::BadRequest(rejection.body_text())
}

fn outcome<T>(result: &Result<T, ApiError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(ApiError::BadRequest(_)) => "bad_request",
        Err(ApiError::Internal(_)) => "error",
    }
}

/// Display form used by the chat page for classifications.
pub fn format_sentiment(s: &Sentiment) -> String {
    format!("Sentiment: {} (Confidence: {:.4})", s.label, s.score)
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn inference(
    State(state): State<Arc<AppState>>,
    body: Result<Json<InferenceRequest>, JsonRejection>,
) -> Result<Json<InferenceResponse>, ApiError> {
    let result = match body {
        Ok(Json(req)) => run_inference(&state, req).await,
        Err(rejection) => Err(reject_body("inference", rejection)),
    };
    state.metrics.record_request("inference", outcome(&result));
    result.map(Json)
}

async fn run_inference(
    state: &AppState,
    req: InferenceRequest,
) -> Result<InferenceResponse, ApiError> {
    let request_id = Uuid::new_v4().to_string();

    if req.prompt.is_empty() {
        return Err(ApiError::BadRequest("No prompt provided".to_string()));
    }
    let task: Task = req.task_type.parse()?;

    info!(
        request_id,
        task = %task,
        seed = ?req.seed,
        max_tokens = ?req.max_tokens,
        "Inference request"
    );

    let pipeline = state.registry.get(task, None).await;
    let response = match task {
        Task::TextGeneration => {
            let params = GenerationParams {
                max_new_tokens: req
                    .max_tokens
                    .unwrap_or(state.config.server.default_max_tokens),
                seed: req.seed,
                return_full_text: true,
            };
            pipeline.generate(&req.prompt, &params).await
        }
        Task::SentimentAnalysis => pipeline
            .classify(&req.prompt)
            .await
            .map(|s| format_sentiment(&s)),
    }
    .map_err(|e| {
        error!(request_id, error = %e, "Error during inference");
        ApiError::from(e)
    })?;

    let mock = pipeline.is_mock();
    if mock {
        state.metrics.record_mock(task.id());
    }

    Ok(InferenceResponse {
        response,
        task_type: task.id().to_string(),
        seed: req.seed,
        mock,
    })
}

async fn list_tasks() -> Json<TaskList> {
    Json(TaskList {
        tasks: Task::ALL
            .iter()
            .map(|t| TaskInfo {
                id: t.id().to_string(),
                name: t.display_name().to_string(),
            })
            .collect(),
    })
}

async fn chat(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let result = match body {
        Ok(Json(req)) => run_chat(&state, req).await,
        Err(rejection) => Err(reject_body("chat", rejection)),
    };
    state.metrics.record_request("chat", outcome(&result));
    result.map(Json)
}

async fn run_chat(state: &AppState, req: ChatRequest) -> Result<ChatResponse, ApiError> {
    if req.session_id.is_empty() {
        return Err(ApiError::BadRequest("No session_id provided".to_string()));
    }
    if req.message.is_empty() {
        return Err(ApiError::BadRequest("No message provided".to_string()));
    }

    let request_id = Uuid::new_v4().to_string();
    info!(request_id, session_id = req.session_id, "Chat request");

    let pipeline = state.registry.get(Task::TextGeneration, None).await;
    let reply = state
        .chat
        .invoke(pipeline.as_ref(), &req.session_id, &req.message)
        .await
        .map_err(|e| {
            error!(request_id, error = %e, "Error during chat");
            ApiError::from(e)
        })?;

    let mock = pipeline.is_mock();
    if mock {
        state.metrics.record_mock(Task::TextGeneration.id());
    }

    Ok(ChatResponse {
        response: reply.text,
        session_id: req.session_id,
        turns: reply.turns,
        mock,
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        mock_mode: state.registry.is_mock_mode(),
        cached_models: state.registry.cached_keys().await,
        sessions: state.chat.store().session_count().await,
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_sentiment() {
        let s = Sentiment {
            label: "NEGATIVE".to_string(),
            score: 0.987654,
        };
        assert_eq!(format_sentiment(&s), "Sentiment: NEGATIVE (Confidence: 0.9877)");
    }

    #[test]
    fn test_seed_accepts_numeric_string() {
        let req: InferenceRequest =
            serde_json::from_str(r#"{"prompt": "hi", "seed": "42"}"#).unwrap();
        assert_eq!(req.seed, Some(42));

        let req: InferenceRequest = serde_json::from_str(r#"{"prompt": "hi", "seed": 7}"#).unwrap();
        assert_eq!(req.seed, Some(7));

        let req: InferenceRequest = serde_json::from_str(r#"{"prompt": "hi"}"#).unwrap();
        assert_eq!(req.seed, None);

        let req: InferenceRequest =
            serde_json::from_str(r#"{"prompt": "hi", "seed": null}"#).unwrap();
        assert_eq!(req.seed, None);

        let bad = serde_json::from_str::<InferenceRequest>(r#"{"prompt": "hi", "seed": "x"}"#);
        assert!(bad.is_err());
    }

    #[test]
    fn test_unsupported_task_is_bad_request() {
        let err = ApiError::from(PipelineError::UnsupportedTask("x".to_string()));
        assert!(matches!(err, ApiError::BadRequest(m) if m == "Unsupported task type: x"));
    }
}
