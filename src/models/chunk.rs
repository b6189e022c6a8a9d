// file: src/models/chunk.rs
// description: page-range chunk model and its forward-only analysis status
// reference: internal data structures

use crate::error::PipelineError;
use crate::models::structured::StructuredData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Statuses only move forward; re-applying the current status is a no-op.
    pub fn can_transition_to(&self, next: AnalysisStatus) -> bool {
        next.rank() > self.rank()
    }

    /// Statuses from which `self` may be entered.
    pub fn predecessors(&self) -> &'static [AnalysisStatus] {
        match self {
            Self::Pending => &[],
            Self::Processing => &[Self::Pending],
            Self::Completed | Self::Failed => &[Self::Pending, Self::Processing],
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = PipelineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(PipelineError::Serialization(format!(
                "unknown analysis status: {}",
                other
            ))),
        }
    }
}

/// A page range produced by the splitter, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub chunk_number: u32,
    pub start_page: u32,
    pub end_page: u32,
    pub page_count: u32,
    pub extracted_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub document_id: Uuid,
    pub chunk_number: u32,
    pub start_page: u32,
    pub end_page: u32,
    pub page_count: u32,
    pub extracted_text: String,
    pub structured_data: Option<StructuredData>,
    pub analysis_status: AnalysisStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl Chunk {
    pub fn from_descriptor(
        document_id: Uuid,
        descriptor: ChunkDescriptor,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            chunk_number: descriptor.chunk_number,
            start_page: descriptor.start_page,
            end_page: descriptor.end_page,
            page_count: descriptor.page_count,
            extracted_text: descriptor.extracted_text,
            structured_data: None,
            analysis_status: AnalysisStatus::Pending,
            created_at: now,
            updated_at: now,
            analyzed_at: None,
        }
    }

    /// Applies `update` if it moves the status forward. Returns whether the
    /// chunk changed.
    pub fn apply(&mut self, update: &ChunkUpdate, now: DateTime<Utc>) -> bool {
        if !self.analysis_status.can_transition_to(update.status) {
            return false;
        }

        self.analysis_status = update.status;
        if let Some(data) = &update.structured_data {
            self.structured_data = Some(data.clone());
        }
        if update.analyzed_at.is_some() {
            self.analyzed_at = update.analyzed_at;
        }
        self.updated_at = now;
        true
    }

    pub fn summary(&self) -> ChunkSummary {
        ChunkSummary {
            chunk_id: self.id,
            chunk_number: self.chunk_number,
            start_page: self.start_page,
            end_page: self.end_page,
            page_count: self.page_count,
            analysis_status: self.analysis_status,
            items_extracted: self
                .structured_data
                .as_ref()
                .map(|data| data.items.len())
                .unwrap_or(0),
            analyzed_at: self.analyzed_at,
        }
    }
}

/// A status transition, persisted in one store call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkUpdate {
    pub status: AnalysisStatus,
    pub structured_data: Option<StructuredData>,
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl ChunkUpdate {
    pub fn processing() -> Self {
        Self {
            status: AnalysisStatus::Processing,
            structured_data: None,
            analyzed_at: None,
        }
    }

    pub fn completed(data: StructuredData, analyzed_at: DateTime<Utc>) -> Self {
        Self {
            status: AnalysisStatus::Completed,
            structured_data: Some(data),
            analyzed_at: Some(analyzed_at),
        }
    }

    pub fn failed() -> Self {
        Self {
            status: AnalysisStatus::Failed,
            structured_data: None,
            analyzed_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSummary {
    pub chunk_id: Uuid,
    pub chunk_number: u32,
    pub start_page: u32,
    pub end_page: u32,
    pub page_count: u32,
    pub analysis_status: AnalysisStatus,
    pub items_extracted: usize,
    pub analyzed_at: Option<DateTime<Utc>>,
}
