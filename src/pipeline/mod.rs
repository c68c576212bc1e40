//! Inference pipelines.
//!
//! - [`hosted`]: pipelines backed by a hosted inference service
//! - [`mock`]: keyword and canned-text fallbacks
//! - [`registry`]: process-local model cache and mock-mode switch

pub mod hosted;
pub mod mock;
pub mod registry;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// The two supported inference tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Task {
    TextGeneration,
    SentimentAnalysis,
}

impl Task {
    pub const ALL: [Task; 2] = [Task::TextGeneration, Task::SentimentAnalysis];

    pub fn id(&self) -> &'static str {
        match self {
            Task::TextGeneration => "text-generation",
            Task::SentimentAnalysis => "sentiment-analysis",
        }
    }

    /// Human-readable name shown by the task listing.
    pub fn display_name(&self) -> &'static str {
        match self {
            Task::TextGeneration => "Text Generation (GPT-2)",
            Task::SentimentAnalysis => "Sentiment Analysis",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Task {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Task::ALL
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| PipelineError::UnsupportedTask(s.to_string()))
    }
}

/// Knobs for a text-generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationParams {
    /// Maximum number of new tokens to generate.
    pub max_new_tokens: usize,

    /// Sampling seed for reproducible output.
    pub seed: Option<u64>,

    /// Return prompt + continuation rather than the continuation alone.
    pub return_full_text: bool,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 50,
            seed: None,
            return_full_text: true,
        }
    }
}

/// A classification result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub label: String,
    pub score: f64,
}

/// Output of a single pipeline call.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    Generated { text: String },
    Classified(Sentiment),
}

/// A callable wrapping a pre-trained model.
#[async_trait]
pub trait Pipeline: Send + Sync {
    fn task(&self) -> Task;

    fn model(&self) -> &str;

    /// Whether this pipeline serves canned responses.
    fn is_mock(&self) -> bool {
        false
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    async fn classify(&self, text: &str) -> Result<Sentiment>;

    /// Run the pipeline's own task on `input`.
    async fn predict(&self, input: &str, params: &GenerationParams) -> Result<Prediction> {
        match self.task() {
            Task::TextGeneration => Ok(Prediction::Generated {
                text: self.generate(input, params).await?,
            }),
            Task::SentimentAnalysis => Ok(Prediction::Classified(self.classify(input).await?)),
        }
    }

    /// Classify each input in order.
    async fn classify_batch(&self, inputs: &[&str]) -> Result<Vec<Sentiment>> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            out.push(self.classify(input).await?);
        }
        Ok(out)
    }

    /// Generate for each prompt in order.
    async fn generate_batch(
        &self,
        prompts: &[&str],
        params: &GenerationParams,
    ) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            out.push(self.generate(prompt, params).await?);
        }
        Ok(out)
    }
}

/// Constructs pipelines for the model cache.
#[async_trait]
pub trait PipelineLoader: Send + Sync {
    async fn load(&self, task: Task, model: &str) -> Result<Arc<dyn Pipeline>>;
}

pub(crate) fn wrong_task(pipeline_task: Task, wanted: Task) -> PipelineError {
    PipelineError::UnsupportedTask(format!(
        "{wanted} is not available on a {pipeline_task} pipeline"
    ))
}
