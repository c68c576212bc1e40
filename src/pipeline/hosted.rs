//! Pipelines backed by a hosted inference service.
//!
//! Requests follow the Hugging Face inference API shape:
//! `POST {base_url}/models/{model}` with `{"inputs", "parameters", "options"}`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::BackendConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::{wrong_task, GenerationParams, Pipeline, PipelineLoader, Sentiment, Task};

#[derive(Debug, Serialize)]
struct InferenceRequest<'a, P: Serialize> {
    inputs: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<P>,
    options: RequestOptions,
}

#[derive(Debug, Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
    max_new_tokens: usize,
    return_full_text: bool,
    num_return_sequences: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: String,
}

/// A pipeline bound to one hosted model.
#[derive(Debug, Clone)]
pub struct HostedPipeline {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
    task: Task,
    model: String,
}

impl HostedPipeline {
    pub fn new(client: reqwest::Client, config: &BackendConfig, task: Task, model: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/models/{}", config.base_url.trim_end_matches('/'), model),
            token: config.resolved_token(),
            task,
            model: model.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Check that the model endpoint answers.
    pub async fn probe(&self) -> Result<()> {
        let mut req = self.client.get(&self.endpoint);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| self.load_error(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(self.load_error(format!("probe returned {}", resp.status())));
        }
        Ok(())
    }

    fn load_error(&self, reason: String) -> PipelineError {
        PipelineError::ModelLoad {
            model: self.model.clone(),
            reason,
        }
    }

    async fn post<P>(&self, inputs: &str, parameters: Option<P>) -> Result<Value>
    where
        P: Serialize + Send + Sync,
    {
        let body = InferenceRequest {
            inputs,
            parameters,
            options: RequestOptions {
                wait_for_model: true,
            },
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(PipelineError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = resp.json().await?;
        debug!(model = self.model, "Inference response received");
        Ok(value)
    }
}

/// Pick the first generated sequence.
pub fn parse_generation(value: Value) -> Result<String> {
    let mut items: Vec<GeneratedText> = serde_json::from_value(value)
        .map_err(|e| PipelineError::InvalidResponse(e.to_string()))?;
    if items.is_empty() {
        return Err(PipelineError::InvalidResponse(
            "no generated sequences".to_string(),
        ));
    }
    Ok(items.swap_remove(0).generated_text)
}

/// Pick the highest-scoring label from either `[[{..}]]` or `[{..}]`.
pub fn parse_classification(value: Value) -> Result<Sentiment> {
    let labels: Vec<Sentiment> = match value {
        Value::Array(ref outer) if outer.first().is_some_and(Value::is_array) => {
            serde_json::from_value(outer[0].clone())
        }
        other => serde_json::from_value(other),
    }
    .map_err(|e| PipelineError::InvalidResponse(e.to_string()))?;

    labels
        .into_iter()
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .ok_or_else(|| PipelineError::InvalidResponse("no labels returned".to_string()))
}

#[async_trait]
impl Pipeline for HostedPipeline {
    fn task(&self) -> Task {
        self.task
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        if self.task != Task::TextGeneration {
            return Err(wrong_task(self.task, Task::TextGeneration));
        }
        let parameters = GenerationParameters {
            max_new_tokens: params.max_new_tokens,
            return_full_text: params.return_full_text,
            num_return_sequences: 1,
            seed: params.seed,
        };
        parse_generation(self.post(prompt, Some(parameters)).await?)
    }

    async fn classify(&self, text: &str) -> Result<Sentiment> {
        if self.task != Task::SentimentAnalysis {
            return Err(wrong_task(self.task, Task::SentimentAnalysis));
        }
        parse_classification(self.post::<()>(text, None).await?)
    }
}

/// Loads [`HostedPipeline`]s, probing each model unless disabled.
pub struct HostedLoader {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HostedLoader {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl PipelineLoader for HostedLoader {
    async fn load(&self, task: Task, model: &str) -> Result<Arc<dyn Pipeline>> {
        let pipeline = HostedPipeline::new(self.client.clone(), &self.config, task, model);
        if self.config.probe_on_load {
            pipeline.probe().await?;
        }
        info!(task = %task, model, endpoint = pipeline.endpoint(), "Hosted pipeline ready");
        Ok(Arc::new(pipeline))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::extract::{Path, State};
    use axum::http::header::AUTHORIZATION;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;
    use crate::pipeline::registry::ModelRegistry;

    /// Authorization header and JSON body of each inference POST.
    type Seen = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    async fn fake_infer(
        State(seen): State<Seen>,
        Path(model): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        seen.lock().unwrap().push((auth, body));

        match model.as_str() {
            "gpt2" => (StatusCode::OK, Json(json!([{"generated_text": " world"}]))),
            "sst2" => (
                StatusCode::OK,
                Json(json!([[
                    {"label": "NEGATIVE", "score": 0.2},
                    {"label": "POSITIVE", "score": 0.8}
                ]])),
            ),
            _ => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({"error": "model is loading"})),
            ),
        }
    }

    /// Serve a stand-in inference service on an ephemeral port.
    async fn spawn_backend() -> (BackendConfig, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new()
            .route("/models/{model}", get(|| async { "ok" }).post(fake_infer))
            .with_state(seen.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let config = BackendConfig {
            base_url: format!("http://{addr}"),
            api_token: Some("secret".to_string()),
            request_timeout_secs: 5,
            ..Default::default()
        };
        (config, seen)
    }

    #[tokio::test]
    async fn test_generation_request_shape() {
        let (config, seen) = spawn_backend().await;
        let loader = HostedLoader::new(config).unwrap();
        let pipeline = loader.load(Task::TextGeneration, "gpt2").await.unwrap();

        let params = GenerationParams {
            max_new_tokens: 20,
            seed: Some(42),
            return_full_text: false,
        };
        assert_eq!(pipeline.generate("Hello", &params).await.unwrap(), " world");

        let unseeded = GenerationParams {
            seed: None,
            ..params
        };
        pipeline.generate("Hello", &unseeded).await.unwrap();

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0.as_deref(), Some("Bearer secret"));
        assert_eq!(
            seen[0].1,
            json!({
                "inputs": "Hello",
                "parameters": {
                    "max_new_tokens": 20,
                    "return_full_text": false,
                    "num_return_sequences": 1,
                    "seed": 42
                },
                "options": {"wait_for_model": true}
            })
        );
        assert!(seen[1].1["parameters"].get("seed").is_none());
    }

    #[tokio::test]
    async fn test_classification_sends_no_parameters() {
        let (config, seen) = spawn_backend().await;
        let loader = HostedLoader::new(config).unwrap();
        let pipeline = loader.load(Task::SentimentAnalysis, "sst2").await.unwrap();

        let sentiment = pipeline.classify("I love it").await.unwrap();
        assert_eq!(sentiment.label, "POSITIVE");
        assert_eq!(sentiment.score, 0.8);

        let seen = seen.lock().unwrap().clone();
        assert_eq!(
            seen[0].1,
            json!({"inputs": "I love it", "options": {"wait_for_model": true}})
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_backend_error() {
        let (config, _seen) = spawn_backend().await;
        let loader = HostedLoader::new(config).unwrap();
        let pipeline = loader.load(Task::TextGeneration, "broken").await.unwrap();

        let err = pipeline
            .generate("Hello", &GenerationParams::default())
            .await
            .unwrap_err();
        match err {
            PipelineError::Backend { status, body } => {
                assert_eq!(status, 503);
                assert!(body.contains("model is loading"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_reachable_backend_pipeline_is_cached() {
        let (config, _seen) = spawn_backend().await;
        let loader = Arc::new(HostedLoader::new(config.clone()).unwrap());
        let registry = ModelRegistry::new(loader, &config);

        let first = registry.get(Task::TextGeneration, None).await;
        let second = registry.get(Task::TextGeneration, None).await;
        assert!(!first.is_mock());
        assert!(Arc::ptr_eq(&first, &second));
        assert!(!registry.is_mock_mode());
        assert_eq!(registry.cached_keys().await, vec!["text-generation:default"]);
    }

    #[test]
    fn test_parse_generation_takes_first() {
        let v = json!([{"generated_text": "one"}, {"generated_text": "two"}]);
        assert_eq!(parse_generation(v).unwrap(), "one");
    }

    #[test]
    fn test_parse_generation_empty() {
        assert!(matches!(
            parse_generation(json!([])),
            Err(PipelineError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_parse_classification_nested() {
        let v = json!([[{"label": "NEGATIVE", "score": 0.1}, {"label": "POSITIVE", "score": 0.9}]]);
        let s = parse_classification(v).unwrap();
        assert_eq!(s.label, "POSITIVE");
        assert_eq!(s.score, 0.9);
    }

    #[test]
    fn test_parse_classification_flat() {
        let v = json!([{"label": "neutral", "score": 0.7}, {"label": "negative", "score": 0.2}]);
        assert_eq!(parse_classification(v).unwrap().label, "neutral");
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = BackendConfig {
            base_url: "http://localhost:9000/".to_string(),
            ..Default::default()
        };
        let p = HostedPipeline::new(reqwest::Client::new(), &config, Task::TextGeneration, "gpt2");
        assert_eq!(p.endpoint(), "http://localhost:9000/models/gpt2");
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails_to_load() {
        let config = BackendConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            request_timeout_secs: 2,
            ..Default::default()
        };
        let loader = HostedLoader::new(config).unwrap();
        let err = loader.load(Task::TextGeneration, "gpt2").await.err().unwrap();
        assert!(matches!(err, PipelineError::ModelLoad { .. }));
    }
}
