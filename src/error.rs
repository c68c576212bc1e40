//! Error types shared by pipelines, chains and the prompt log.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Unsupported task type: {0}")]
    UnsupportedTask(String),

    #[error("Failed to load model {model}: {reason}")]
    ModelLoad { model: String, reason: String },

    #[error("Inference backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("Unexpected response from inference backend: {0}")]
    InvalidResponse(String),

    #[error("Missing template variable: {0}")]
    MissingVariable(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum PromptLogError {
    #[error("Note must not be empty")]
    EmptyNote,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
