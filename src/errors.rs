use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid filter rule '{rule}': {reason}")]
    InvalidFilterRule { rule: String, reason: String },

    #[error("Failed to create destination directory {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Catalog operation failed: {0}")]
    Catalog(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
