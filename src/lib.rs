//! inference-playground: small demonstrations around a hosted inference backend.
//!
//! Sentiment classification and text generation are served through lazily
//! loaded pipelines that fall back to canned responses when the backend is
//! unavailable. A template-chaining layer adds per-session conversational
//! memory, and a markdown prompt log records notes by date.

pub mod chain;
pub mod config;
pub mod demos;
pub mod error;
pub mod pipeline;
pub mod prompt_log;
pub mod server;

use std::sync::Arc;

use config::Config;
use pipeline::hosted::HostedLoader;
use pipeline::registry::ModelRegistry;

/// Build the model cache for `config`, honouring `mock.force`.
pub fn build_registry(config: &Config) -> anyhow::Result<Arc<ModelRegistry>> {
    let loader = HostedLoader::new(config.backend.clone())?;
    let registry = ModelRegistry::new(Arc::new(loader), &config.backend);
    if config.mock.force {
        registry.force_mock_mode();
    }
    Ok(Arc::new(registry))
}
