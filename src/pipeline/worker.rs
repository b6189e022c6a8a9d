// file: src/pipeline/worker.rs
// description: analyzes a single chunk and records its terminal status
// reference: per-chunk extraction with timeout, normalization, status persistence

use crate::database::{AnalysisStore, ChunkStore};
use crate::error::{PipelineError, Result};
use crate::extractor::{NormalizedResponse, ParseOutcome, ResponseNormalizer, StructuredExtractor};
use crate::models::{AnalysisStatus, Chunk, ChunkUpdate};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerOutcome {
    Completed {
        items: usize,
        outcome: ParseOutcome,
    },
    /// Extraction failed and the chunk was marked `failed`.
    Failed(String),
    /// The chunk was already processing or finished, or was failed by the
    /// stale-chunk sweep before its result arrived.
    Skipped,
    /// The store could not record a status; the chunk stays non-terminal
    /// until the stale-chunk sweep fails it.
    Abandoned(String),
}

pub struct ChunkAnalysisWorker {
    store: Arc<dyn AnalysisStore>,
    extractor: Arc<dyn StructuredExtractor>,
    normalizer: ResponseNormalizer,
    timeout: Duration,
}

impl ChunkAnalysisWorker {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        extractor: Arc<dyn StructuredExtractor>,
        normalizer: ResponseNormalizer,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            extractor,
            normalizer,
            timeout,
        }
    }

    /// Extracts and normalizes `text`. Only extraction can fail; a response
    /// that cannot be parsed still yields well-formed data.
    pub async fn analyze(&self, text: &str) -> Result<NormalizedResponse> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyContent(
                "no text to analyze".to_string(),
            ));
        }

        let raw = tokio::time::timeout(self.timeout, self.extractor.extract_structured(text))
            .await
            .map_err(|_| PipelineError::ExtractionTimeout(self.timeout.as_secs_f64()))??;

        Ok(self.normalizer.normalize_response(&raw, text))
    }

    pub async fn run(&self, chunk: &Chunk) -> WorkerOutcome {
        match self
            .store
            .update_chunk_status(chunk.id, ChunkUpdate::processing())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    "Chunk {} of document {} already started, skipping",
                    chunk.chunk_number, chunk.document_id
                );
                return WorkerOutcome::Skipped;
            }
            Err(e) => {
                error!("Failed to mark chunk {} processing: {}", chunk.id, e);
                return WorkerOutcome::Abandoned(e.to_string());
            }
        }

        debug!(
            "Analyzing chunk {} (pages {}-{})",
            chunk.chunk_number, chunk.start_page, chunk.end_page
        );

        match self.analyze(&chunk.extracted_text).await {
            Ok(normalized) => {
                let items = normalized.data.items.len();
                let outcome = normalized.outcome;
                let update = ChunkUpdate::completed(normalized.data, Utc::now());

                match self.store.update_chunk_status(chunk.id, update).await {
                    Ok(true) => {
                        info!(
                            "Chunk {} (pages {}-{}) completed with {} items",
                            chunk.chunk_number, chunk.start_page, chunk.end_page, items
                        );
                        WorkerOutcome::Completed { items, outcome }
                    }
                    Ok(false) => {
                        warn!(
                            "Chunk {} of document {} was already finalized, dropping {} items",
                            chunk.chunk_number, chunk.document_id, items
                        );
                        WorkerOutcome::Skipped
                    }
                    Err(e) => {
                        error!("Failed to store result for chunk {}: {}", chunk.id, e);
                        self.mark_failed(chunk, e.to_string()).await
                    }
                }
            }
            Err(e) => {
                warn!(
                    "Chunk {} (pages {}-{}) failed: {}",
                    chunk.chunk_number, chunk.start_page, chunk.end_page, e
                );
                self.mark_failed(chunk, e.to_string()).await
            }
        }
    }

    async fn mark_failed(&self, chunk: &Chunk, reason: String) -> WorkerOutcome {
        match self
            .store
            .update_chunk_status(chunk.id, ChunkUpdate::failed())
            .await
        {
            Ok(_) => WorkerOutcome::Failed(reason),
            Err(e) => {
                error!("Failed to mark chunk {} failed: {}", chunk.id, e);
                WorkerOutcome::Abandoned(reason)
            }
        }
    }
}

impl WorkerOutcome {
    pub fn status(&self) -> Option<AnalysisStatus> {
        match self {
            Self::Completed { .. } => Some(AnalysisStatus::Completed),
            Self::Failed(_) => Some(AnalysisStatus::Failed),
            Self::Skipped | Self::Abandoned(_) => None,
        }
    }
}
