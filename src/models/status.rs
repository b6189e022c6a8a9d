// file: src/models/status.rs
// description: aggregated per-document analysis progress
// reference: internal data structures

use crate::models::chunk::AnalysisStatus;
use crate::models::document::ChunkingStatus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisProgress {
    pub total: usize,
    pub completed: usize,
    pub processing: usize,
    pub pending: usize,
    pub failed: usize,
    pub percent_complete: u32,
    pub is_complete: bool,
}

impl AnalysisProgress {
    pub fn from_counts(pending: usize, processing: usize, completed: usize, failed: usize) -> Self {
        let total = pending + processing + completed + failed;
        let percent_complete = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };

        Self {
            total,
            completed,
            processing,
            pending,
            failed,
            percent_complete,
            is_complete: total > 0 && pending + processing == 0,
        }
    }

    pub fn from_statuses<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = AnalysisStatus>,
    {
        let (mut pending, mut processing, mut completed, mut failed) = (0, 0, 0, 0);
        for status in statuses {
            match status {
                AnalysisStatus::Pending => pending += 1,
                AnalysisStatus::Processing => processing += 1,
                AnalysisStatus::Completed => completed += 1,
                AnalysisStatus::Failed => failed += 1,
            }
        }
        Self::from_counts(pending, processing, completed, failed)
    }

    /// Progress of a document analysed in one piece, reported as a single unit.
    pub fn single(status: ChunkingStatus, has_data: bool) -> Self {
        match (status, has_data) {
            (_, true) => Self::from_counts(0, 0, 1, 0),
            (ChunkingStatus::Failed, false) => Self::from_counts(0, 0, 0, 1),
            _ => Self::from_counts(1, 0, 0, 0),
        }
    }

    pub fn resolved(&self) -> usize {
        self.completed + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counts() {
        let progress = AnalysisProgress::from_statuses([
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
            AnalysisStatus::Processing,
        ]);

        assert_eq!(progress.total, 3);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.failed, 1);
        assert_eq!(progress.percent_complete, 33);
        assert!(!progress.is_complete);
        assert_eq!(progress.resolved(), 2);
    }

    #[test]
    fn test_failed_chunks_still_complete_the_document() {
        let progress = AnalysisProgress::from_statuses([
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
            AnalysisStatus::Completed,
        ]);

        assert!(progress.is_complete);
        assert_eq!(progress.percent_complete, 67);
    }

    #[test]
    fn test_empty_progress() {
        let progress = AnalysisProgress::from_statuses(Vec::new());
        assert_eq!(progress.total, 0);
        assert_eq!(progress.percent_complete, 0);
        assert!(!progress.is_complete);
    }

    #[test]
    fn test_single_unit_progress() {
        assert!(AnalysisProgress::single(ChunkingStatus::Completed, true).is_complete);
        assert_eq!(AnalysisProgress::single(ChunkingStatus::Failed, false).failed, 1);
        assert_eq!(AnalysisProgress::single(ChunkingStatus::None, false).pending, 1);
    }
}
