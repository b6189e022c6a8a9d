// file: src/pipeline/orchestrator.rs
// description: dispatches document analysis and drives the document state machine
// reference: fire-and-forget chunk tasks with completion re-check after each

use crate::config::Config;
use crate::database::{AnalysisStore, ChunkStore, DocumentStore};
use crate::error::{PipelineError, Result};
use crate::extractor::{ResponseNormalizer, StructuredExtractor};
use crate::models::{
    AnalysisProgress, AnalysisStatus, ChunkSummary, ChunkUpdate, ChunkingStatus, Document,
    StructuredData,
};
use crate::pipeline::merger::ResultMerger;
use crate::pipeline::splitter::ChunkSplitter;
use crate::pipeline::worker::ChunkAnalysisWorker;
use chrono::Utc;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub pages_per_chunk: u32,
    /// 0 spawns every chunk at once.
    pub max_concurrent_chunks: usize,
    pub extraction_timeout: Duration,
    pub currency: String,
}

impl OrchestratorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            pages_per_chunk: config.pipeline.pages_per_chunk,
            max_concurrent_chunks: config.pipeline.max_concurrent_chunks,
            extraction_timeout: config.extraction.timeout(),
            currency: config.merge.currency.clone(),
        }
    }
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self::from_config(&Config::default_config())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionState {
    /// The document has no chunks, so there is nothing to merge.
    NoChunks,
    InProgress { remaining: usize },
    Completed { items: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Direct,
    Chunked { chunks: usize },
}

/// Handles of the tasks started for one document. Dropping it leaves the
/// tasks running in the background.
pub struct Dispatch {
    pub document_id: Uuid,
    pub mode: DispatchMode,
    handles: Vec<JoinHandle<()>>,
}

impl Dispatch {
    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Waits for every task of this dispatch to finish.
    pub async fn wait(self) {
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                error!("Analysis task for {} panicked: {}", self.document_id, e);
            }
        }
    }
}

struct Inner {
    store: Arc<dyn AnalysisStore>,
    splitter: ChunkSplitter,
    worker: ChunkAnalysisWorker,
    merger: ResultMerger,
    limiter: Option<Arc<Semaphore>>,
    max_concurrent_chunks: usize,
}

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    inner: Arc<Inner>,
}

impl AnalysisOrchestrator {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        extractor: Arc<dyn StructuredExtractor>,
        options: OrchestratorOptions,
    ) -> Result<Self> {
        let splitter = ChunkSplitter::new(options.pages_per_chunk)?;
        let worker = ChunkAnalysisWorker::new(
            store.clone(),
            extractor,
            ResponseNormalizer::new(options.currency.clone()),
            options.extraction_timeout,
        );
        let merger = ResultMerger::new(store.clone(), options.currency);
        let max_concurrent_chunks = options.max_concurrent_chunks;
        let limiter = (max_concurrent_chunks > 0)
            .then(|| Arc::new(Semaphore::new(max_concurrent_chunks)));

        Ok(Self {
            inner: Arc::new(Inner {
                store,
                splitter,
                worker,
                merger,
                limiter,
                max_concurrent_chunks,
            }),
        })
    }

    pub fn pages_per_chunk(&self) -> u32 {
        self.inner.splitter.pages_per_chunk()
    }

    /// Starts analysis of a persisted document and returns without waiting
    /// for any extraction call. Documents already analysing or settled are
    /// rejected without touching the store.
    pub async fn start_analysis(&self, document: &Document) -> Result<Dispatch> {
        let document = &self.inner.require_document(document.id).await?;
        if !matches!(document.chunking_status, ChunkingStatus::None | ChunkingStatus::Chunked) {
            return Err(PipelineError::Validation(format!(
                "document {} is already {}",
                document.id, document.chunking_status
            )));
        }

        if !self.inner.splitter.should_chunk(document.page_count) {
            let inner = self.inner.clone();
            let document_id = document.id;
            let text = document.extracted_text.clone();
            let handle = tokio::spawn(async move {
                inner.run_direct(document_id, &text).await;
            });

            return Ok(Dispatch {
                document_id,
                mode: DispatchMode::Direct,
                handles: vec![handle],
            });
        }

        let chunks = match self.inner.prepare_chunks(document).await {
            Ok(chunks) => chunks,
            Err(e) => {
                error!("Failed to prepare chunks for {}: {}", document.id, e);
                if let Err(e) = self
                    .inner
                    .store
                    .finalize_document(document.id, None, ChunkingStatus::Failed)
                    .await
                {
                    error!("Failed to mark document {} failed: {}", document.id, e);
                }
                return Err(match e {
                    PipelineError::ChunkSplit(_) => e,
                    other => PipelineError::ChunkSplit(other.to_string()),
                });
            }
        };

        info!(
            "Dispatching {} chunks for document {} ({} pages)",
            chunks.len(),
            document.id,
            document.page_count
        );

        let handles = chunks
            .into_iter()
            .map(|chunk| {
                let inner = self.inner.clone();
                tokio::spawn(async move {
                    let permit = match &inner.limiter {
                        Some(limiter) => limiter.clone().acquire_owned().await.ok(),
                        None => None,
                    };
                    inner.worker.run(&chunk).await;
                    drop(permit);

                    if let Err(e) = inner.check_completion(chunk.document_id).await {
                        error!(
                            "Completion check for document {} failed: {}",
                            chunk.document_id, e
                        );
                    }
                })
            })
            .collect::<Vec<_>>();

        Ok(Dispatch {
            document_id: document.id,
            mode: DispatchMode::Chunked {
                chunks: handles.len(),
            },
            handles,
        })
    }

    pub async fn check_completion(&self, document_id: Uuid) -> Result<CompletionState> {
        self.inner.check_completion(document_id).await
    }

    pub async fn analysis_status(&self, document_id: Uuid) -> Result<AnalysisProgress> {
        let document = self.inner.require_document(document_id).await?;
        if !document.is_chunked {
            return Ok(AnalysisProgress::single(
                document.chunking_status,
                document.structured_data.is_some(),
            ));
        }
        self.inner.store.aggregate_status(document_id).await
    }

    pub async fn list_chunk_summaries(&self, document_id: Uuid) -> Result<Vec<ChunkSummary>> {
        self.inner.require_document(document_id).await?;
        let chunks = self.inner.store.list_chunks(document_id).await?;
        Ok(chunks.iter().map(|chunk| chunk.summary()).collect())
    }

    /// The best result available now: a partial merge while chunks are still
    /// being analysed, otherwise whatever the document holds.
    pub async fn current_result(&self, document_id: Uuid) -> Result<Option<StructuredData>> {
        let document = self.inner.require_document(document_id).await?;

        let in_flight = matches!(
            document.chunking_status,
            ChunkingStatus::Chunked | ChunkingStatus::Analyzing
        );
        if document.is_chunked && in_flight {
            let chunks = self.inner.store.list_chunks(document_id).await?;
            if !chunks.is_empty() {
                return Ok(Some(self.inner.merger.merge_chunks(&chunks)));
            }
        }

        Ok(document.structured_data)
    }

    /// Fails chunks that have not moved for `max_age` and settles their
    /// documents. Returns the number of chunks failed.
    ///
    /// With a concurrency cap, pending chunks may simply be queued behind a
    /// permit, so they get `max_age` once per round of the document's queue.
    pub async fn reconcile_stale_chunks(&self, max_age: Duration) -> Result<usize> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| PipelineError::Validation(format!("invalid stale window: {}", e)))?;
        let now = Utc::now();
        let stale = self.inner.store.stale_chunks(now - max_age).await?;

        let mut failed = 0;
        let mut documents = BTreeSet::new();
        let mut rounds: HashMap<Uuid, i32> = HashMap::new();
        for chunk in stale {
            if chunk.analysis_status == AnalysisStatus::Pending
                && self.inner.max_concurrent_chunks > 0
            {
                let queue_rounds = match rounds.get(&chunk.document_id) {
                    Some(queue_rounds) => *queue_rounds,
                    None => {
                        let total = self.inner.store.list_chunks(chunk.document_id).await?.len();
                        let queue_rounds = self.inner.queue_rounds(total);
                        rounds.insert(chunk.document_id, queue_rounds);
                        queue_rounds
                    }
                };
                let queued_cutoff = max_age
                    .checked_mul(queue_rounds)
                    .and_then(|window| now.checked_sub_signed(window));
                if queued_cutoff.is_none_or(|cutoff| chunk.updated_at > cutoff) {
                    debug!(
                        "Chunk {} of document {} may still be queued, leaving it pending",
                        chunk.chunk_number, chunk.document_id
                    );
                    continue;
                }
            }

            if self
                .inner
                .store
                .update_chunk_status(chunk.id, ChunkUpdate::failed())
                .await?
            {
                warn!(
                    "Failed stale chunk {} of document {} (last update {})",
                    chunk.chunk_number, chunk.document_id, chunk.updated_at
                );
                failed += 1;
            }
            documents.insert(chunk.document_id);
        }

        for document_id in documents {
            self.inner.check_completion(document_id).await?;
        }

        Ok(failed)
    }
}

impl Inner {
    async fn require_document(&self, document_id: Uuid) -> Result<Document> {
        self.store
            .get_document(document_id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("document {}", document_id)))
    }

    /// Rounds needed to drain `chunk_count` chunks through the permit pool.
    fn queue_rounds(&self, chunk_count: usize) -> i32 {
        if self.max_concurrent_chunks == 0 {
            return 1;
        }
        let rounds = chunk_count.div_ceil(self.max_concurrent_chunks).max(1);
        i32::try_from(rounds).unwrap_or(i32::MAX)
    }

    async fn prepare_chunks(&self, document: &Document) -> Result<Vec<crate::models::Chunk>> {
        let descriptors = self
            .splitter
            .split(&document.extracted_text, document.page_count)?;
        let chunks = self.store.create_chunks(document.id, &descriptors).await?;
        self.store
            .set_chunking_status(document.id, ChunkingStatus::Analyzing)
            .await?;
        Ok(chunks)
    }

    async fn run_direct(&self, document_id: Uuid, text: &str) {
        let (data, status) = match self.worker.analyze(text).await {
            Ok(normalized) => {
                info!(
                    "Document {} analysed with {} items",
                    document_id,
                    normalized.data.items.len()
                );
                (Some(normalized.data), ChunkingStatus::Completed)
            }
            Err(e) => {
                warn!("Analysis of document {} failed: {}", document_id, e);
                (None, ChunkingStatus::Failed)
            }
        };

        if let Err(e) = self.store.finalize_document(document_id, data, status).await {
            error!("Failed to store result for document {}: {}", document_id, e);
        }
    }

    /// Merges and completes the document once every chunk is terminal. Safe to
    /// call any number of times.
    async fn check_completion(&self, document_id: Uuid) -> Result<CompletionState> {
        let chunks = self.store.list_chunks(document_id).await?;
        if chunks.is_empty() {
            return Ok(CompletionState::NoChunks);
        }

        let remaining = chunks
            .iter()
            .filter(|chunk| !chunk.analysis_status.is_terminal())
            .count();
        if remaining > 0 {
            return Ok(CompletionState::InProgress { remaining });
        }

        let merged = self.merger.merge_chunks(&chunks);
        let items = merged.items.len();
        let stored = self
            .store
            .finalize_document(document_id, Some(merged), ChunkingStatus::Completed)
            .await?;
        if !stored {
            warn!(
                "Document {} already failed, merged result not stored",
                document_id
            );
        }

        info!(
            "All {} chunks of document {} finished, merged {} items",
            chunks.len(),
            document_id,
            items
        );
        Ok(CompletionState::Completed { items })
    }
}
