//! Runtime configuration for inference-playground.
//!
//! Configuration is loaded from a JSON file or constructed programmatically.
//! Backend endpoints, default models, mock behaviour and chat settings live here.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "inference-playground",
    about = "Sentiment and text-generation demos with a small chat server"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP chat server.
    Serve {
        /// HTTP listen address (overrides the config file).
        #[arg(long)]
        listen: Option<String>,
    },

    /// Run one of the scripted demonstrations and print its output.
    Demo {
        #[arg(value_enum)]
        name: DemoName,
    },
}

/// Names accepted by `inference-playground demo`.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoName {
    /// Default sentiment model on two sentences, with timing.
    Sentiment,
    /// Financial sentiment with ProsusAI/finbert.
    Finbert,
    /// Seeded GPT-2 text generation.
    Generate,
    /// Prompt template piped into the generator.
    Chain,
    /// Prompt template, generator and string output parser.
    ChainParser,
    /// Two-turn conversation with session memory.
    History,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Hosted inference backend.
    pub backend: BackendConfig,

    /// Mock fallback settings.
    pub mock: MockConfig,

    /// Conversation chain settings.
    pub chat: ChatConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g. "0.0.0.0:5000").
    pub listen: String,

    /// Default `max_tokens` when a request omits it.
    pub default_max_tokens: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:5000".to_string(),
            default_max_tokens: 50,
        }
    }
}

/// Hosted inference service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL; pipelines call `{base_url}/models/{model}`.
    pub base_url: String,

    /// Bearer token. Falls back to the `HF_TOKEN` environment variable.
    pub api_token: Option<String>,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Probe the model endpoint when a pipeline is first loaded.
    pub probe_on_load: bool,

    /// Model used for text generation when none is requested.
    pub generation_model: String,

    /// Model used for sentiment analysis when none is requested.
    pub sentiment_model: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-inference.huggingface.co".to_string(),
            api_token: None,
            request_timeout_secs: 60,
            probe_on_load: true,
            generation_model: "gpt2".to_string(),
            sentiment_model: "distilbert-base-uncased-finetuned-sst-2-english".to_string(),
        }
    }
}

impl BackendConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Token from the config file, else from `HF_TOKEN`.
    pub fn resolved_token(&self) -> Option<String> {
        self.api_token
            .clone()
            .or_else(|| std::env::var("HF_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }
}

/// Mock fallback settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MockConfig {
    /// Start in mock mode without trying the backend.
    pub force: bool,
}

/// Conversation chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// System prompt placed before the session history.
    pub system_prompt: String,

    /// New tokens generated per chat turn.
    pub max_new_tokens: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_prompt: "You are a helpful AI assistant.".to_string(),
            max_new_tokens: 50,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}
