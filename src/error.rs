// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unreadable PDF: {0}")]
    UnreadablePdf(String),

    #[error("Empty content: {0}")]
    EmptyContent(String),

    #[error("Extraction service error: {0}")]
    ExtractionService(String),

    #[error("Extraction timed out after {0:.1}s")]
    ExtractionTimeout(f64),

    #[error("Chunk split failed: {0}")]
    ChunkSplit(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File operation failed for {path}: {source}")]
    FileOperation {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PipelineError {
    /// Errors that end a single chunk's analysis without touching its siblings.
    pub fn is_extraction_failure(&self) -> bool {
        matches!(
            self,
            Self::EmptyContent(_) | Self::ExtractionService(_) | Self::ExtractionTimeout(_)
        )
    }
}

impl From<sqlx::Error> for PipelineError {
    fn from(value: sqlx::Error) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extraction_failure_classification() {
        assert!(PipelineError::ExtractionTimeout(90.0).is_extraction_failure());
        assert!(PipelineError::EmptyContent("chunk 2".to_string()).is_extraction_failure());
        assert!(!PipelineError::Persistence("locked".to_string()).is_extraction_failure());
        assert!(!PipelineError::ChunkSplit("no pages".to_string()).is_extraction_failure());
    }

    #[test]
    fn test_timeout_message() {
        let err = PipelineError::ExtractionTimeout(90.0);
        assert_eq!(err.to_string(), "Extraction timed out after 90.0s");
    }
}
