use crate::config::ConfigError;
use crate::db::StoreError;
use crate::doc_processor::ExtractError;
use crate::llm::LlmError;

/// Failure of one user-facing operation.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Remote model error: {0}")]
    Remote(#[from] LlmError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Could not read document: {0}")]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Unavailable(String),
}

