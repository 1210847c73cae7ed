use config::ConfigError;
use thiserror::Error;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("No retainable version of \"{0}\" in any format")]
    MissingVersion(String),
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),
    #[error("PDF error: {0}")]
    Pdf(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Processing error: {0}")]
    Processing(String),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
