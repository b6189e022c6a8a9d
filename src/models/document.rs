// file: src/models/document.rs
// description: uploaded document model with chunking state
// reference: internal data structures

use crate::error::PipelineError;
use crate::models::structured::StructuredData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Document-level progress of chunk based analysis.
///
/// Small documents stay `None` until the direct extraction finishes. Chunked
/// documents move `Chunked -> Analyzing -> Completed`, or straight to `Failed`
/// when the split could not be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkingStatus {
    None,
    Chunked,
    Analyzing,
    Completed,
    Failed,
}

impl ChunkingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Chunked => "chunked",
            Self::Analyzing => "analyzing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Terminal states only accept a repeated completion (a re-merge).
    pub fn can_finalize_to(&self, next: ChunkingStatus) -> bool {
        !self.is_terminal() || (*self == Self::Completed && next == Self::Completed)
    }
}

impl fmt::Display for ChunkingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkingStatus {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(Self::None),
            "chunked" => Ok(Self::Chunked),
            "analyzing" => Ok(Self::Analyzing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Serialization(format!(
                "unknown chunking status: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub original_name: String,
    pub content_hash: String,
    pub file_size: u64,
    pub page_count: u32,
    pub extracted_text: String,
    pub structured_data: Option<StructuredData>,
    pub is_chunked: bool,
    pub total_chunks: u32,
    pub chunking_status: ChunkingStatus,
    pub uploaded_at: DateTime<Utc>,
}

impl Document {
    pub fn new(
        original_name: impl Into<String>,
        extracted_text: String,
        page_count: u32,
        file_size: u64,
        pages_per_chunk: u32,
    ) -> Self {
        let content_hash = Self::compute_hash(&extracted_text);
        let is_chunked = pages_per_chunk > 0 && page_count > pages_per_chunk;
        let total_chunks = if is_chunked {
            page_count.div_ceil(pages_per_chunk)
        } else {
            0
        };

        Self {
            id: Uuid::new_v4(),
            original_name: original_name.into(),
            content_hash,
            file_size,
            page_count,
            extracted_text,
            structured_data: None,
            is_chunked,
            total_chunks,
            chunking_status: if is_chunked {
                ChunkingStatus::Chunked
            } else {
                ChunkingStatus::None
            },
            uploaded_at: Utc::now(),
        }
    }

    fn compute_hash(content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn items_extracted(&self) -> usize {
        self.structured_data
            .as_ref()
            .map(|data| data.items.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_document_is_not_chunked() {
        let doc = Document::new("stmt.pdf".to_string(), "text".to_string(), 10, 2048, 10);

        assert!(!doc.is_chunked);
        assert_eq!(doc.total_chunks, 0);
        assert_eq!(doc.chunking_status, ChunkingStatus::None);
        assert!(!doc.content_hash.is_empty());
    }

    #[test]
    fn test_large_document_is_chunked() {
        let doc = Document::new("stmt.pdf".to_string(), "text".to_string(), 25, 2048, 10);

        assert!(doc.is_chunked);
        assert_eq!(doc.total_chunks, 3);
        assert_eq!(doc.chunking_status, ChunkingStatus::Chunked);
    }

    #[test]
    fn test_hash_consistency() {
        let hash1 = Document::compute_hash("Test content");
        let hash2 = Document::compute_hash("Test content");
        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!("merged".parse::<ChunkingStatus>().is_err());
        assert!(ChunkingStatus::Failed.is_terminal());
        assert!(!ChunkingStatus::Analyzing.is_terminal());
    }

    #[test]
    fn test_finalize_transitions_are_forward_only() {
        assert!(ChunkingStatus::Analyzing.can_finalize_to(ChunkingStatus::Failed));
        assert!(ChunkingStatus::Completed.can_finalize_to(ChunkingStatus::Completed));
        assert!(!ChunkingStatus::Completed.can_finalize_to(ChunkingStatus::Failed));
        assert!(!ChunkingStatus::Failed.can_finalize_to(ChunkingStatus::Completed));
    }
}
