// file: src/database/store.rs
// description: persistence traits for documents and their analysis chunks
// reference: https://docs.rs/async-trait

use crate::error::Result;
use crate::models::{
    AnalysisProgress, Chunk, ChunkDescriptor, ChunkUpdate, ChunkingStatus, Document,
    StructuredData,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Persists every descriptor as a `pending` chunk, or none of them.
    async fn create_chunks(
        &self,
        document_id: Uuid,
        descriptors: &[ChunkDescriptor],
    ) -> Result<Vec<Chunk>>;

    async fn get_chunk(&self, chunk_id: Uuid) -> Result<Option<Chunk>>;

    /// Applies a forward status transition. Returns `false` when the chunk was
    /// already at or past the requested status.
    async fn update_chunk_status(&self, chunk_id: Uuid, update: ChunkUpdate) -> Result<bool>;

    /// Chunks of a document ordered by chunk number.
    async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>>;

    async fn aggregate_status(&self, document_id: Uuid) -> Result<AnalysisProgress> {
        let chunks = self.list_chunks(document_id).await?;
        Ok(AnalysisProgress::from_statuses(
            chunks.iter().map(|chunk| chunk.analysis_status),
        ))
    }

    /// Non-terminal chunks last touched before `cutoff`.
    async fn stale_chunks(&self, cutoff: DateTime<Utc>) -> Result<Vec<Chunk>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(&self, document: &Document) -> Result<()>;

    async fn get_document(&self, document_id: Uuid) -> Result<Option<Document>>;

    /// All documents, most recent upload first.
    async fn list_documents(&self) -> Result<Vec<Document>>;

    async fn set_chunking_status(&self, document_id: Uuid, status: ChunkingStatus) -> Result<()>;

    /// Writes the status and, when given, the structured data in one call.
    /// Returns `false` without writing when the document is already terminal,
    /// except that a completed document may be completed again.
    async fn finalize_document(
        &self,
        document_id: Uuid,
        structured_data: Option<StructuredData>,
        status: ChunkingStatus,
    ) -> Result<bool>;
}

/// Both halves of the persistence layer behind one object.
pub trait AnalysisStore: ChunkStore + DocumentStore {}

impl<T> AnalysisStore for T where T: ChunkStore + DocumentStore {}
