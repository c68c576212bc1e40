//! Process-local model cache.
//!
//! Pipelines are loaded lazily and memoized under `"{task}:{model}"`. The
//! first load failure switches the whole process into mock mode; from then
//! on every lookup returns a [`MockPipeline`] and the backend is not retried.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::BackendConfig;
use crate::pipeline::mock::MockPipeline;
use crate::pipeline::{Pipeline, PipelineLoader, Task};

/// Build the cache key for a task and optional model name.
pub fn cache_key(task: Task, model: Option<&str>) -> String {
    format!("{}:{}", task, model.unwrap_or("default"))
}

pub struct ModelRegistry {
    loader: Arc<dyn PipelineLoader>,
    models: RwLock<HashMap<String, Arc<dyn Pipeline>>>,
    mock_mode: AtomicBool,
    generation_model: String,
    sentiment_model: String,
}

impl ModelRegistry {
    pub fn new(loader: Arc<dyn PipelineLoader>, backend: &BackendConfig) -> Self {
        Self {
            loader,
            models: RwLock::new(HashMap::new()),
            mock_mode: AtomicBool::new(false),
            generation_model: backend.generation_model.clone(),
            sentiment_model: backend.sentiment_model.clone(),
        }
    }

    /// Model used for `task` when the caller does not name one.
    pub fn default_model(&self, task: Task) -> &str {
        match task {
            Task::TextGeneration => &self.generation_model,
            Task::SentimentAnalysis => &self.sentiment_model,
        }
    }

    pub fn is_mock_mode(&self) -> bool {
        self.mock_mode.load(Ordering::Relaxed)
    }

    /// Switch to mock mode permanently.
    pub fn force_mock_mode(&self) {
        if !self.mock_mode.swap(true, Ordering::Relaxed) {
            warn!("Mock mode enabled; all pipelines now return canned responses");
        }
    }

    /// Cached keys, sorted.
    pub async fn cached_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.models.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Return the pipeline for `task`, loading it on first use.
    ///
    /// Never fails: a load error degrades the process to mock mode.
    pub async fn get(&self, task: Task, model: Option<&str>) -> Arc<dyn Pipeline> {
        let model_name = model.unwrap_or_else(|| self.default_model(task)).to_string();

        if self.is_mock_mode() {
            return Arc::new(MockPipeline::new(task, model_name));
        }

        let key = cache_key(task, model);
        if let Some(pipeline) = self.models.read().await.get(&key) {
            return pipeline.clone();
        }

        info!(key, model = model_name, "Loading model");
        match self.loader.load(task, &model_name).await {
            Ok(pipeline) => {
                info!(key, "Model loaded");
                self.models.write().await.insert(key, pipeline.clone());
                pipeline
            }
            Err(e) => {
                warn!(key, error = %e, "Model load failed, falling back to mock responses");
                self.force_mock_mode();
                Arc::new(MockPipeline::new(task, model_name))
            }
        }
    }
}
