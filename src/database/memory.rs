// file: src/database/memory.rs
// description: in-process store backed by tokio RwLock maps
// reference: https://docs.rs/tokio/latest/tokio/sync/struct.RwLock.html

use crate::database::store::{ChunkStore, DocumentStore};
use crate::error::{PipelineError, Result};
use crate::models::{
    Chunk, ChunkDescriptor, ChunkUpdate, ChunkingStatus, Document, StructuredData,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    documents: HashMap<Uuid, Document>,
    chunks: HashMap<Uuid, Chunk>,
    by_document: HashMap<Uuid, Vec<Uuid>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn document_count(&self) -> usize {
        self.inner.read().await.documents.len()
    }

    #[cfg(test)]
    pub(crate) async fn backdate_chunk(&self, chunk_id: Uuid, updated_at: DateTime<Utc>) {
        if let Some(chunk) = self.inner.write().await.chunks.get_mut(&chunk_id) {
            chunk.updated_at = updated_at;
        }
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn create_chunks(
        &self,
        document_id: Uuid,
        descriptors: &[ChunkDescriptor],
    ) -> Result<Vec<Chunk>> {
        let mut inner = self.inner.write().await;

        if !inner.documents.contains_key(&document_id) {
            return Err(PipelineError::NotFound(format!("document {}", document_id)));
        }
        if inner.by_document.contains_key(&document_id) {
            return Err(PipelineError::Validation(format!(
                "chunks already exist for document {}",
                document_id
            )));
        }

        let now = Utc::now();
        let chunks: Vec<Chunk> = descriptors
            .iter()
            .cloned()
            .map(|descriptor| Chunk::from_descriptor(document_id, descriptor, now))
            .collect();

        inner
            .by_document
            .insert(document_id, chunks.iter().map(|chunk| chunk.id).collect());
        for chunk in &chunks {
            inner.chunks.insert(chunk.id, chunk.clone());
        }

        Ok(chunks)
    }

    async fn get_chunk(&self, chunk_id: Uuid) -> Result<Option<Chunk>> {
        Ok(self.inner.read().await.chunks.get(&chunk_id).cloned())
    }

    async fn update_chunk_status(&self, chunk_id: Uuid, update: ChunkUpdate) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let chunk = inner
            .chunks
            .get_mut(&chunk_id)
            .ok_or_else(|| PipelineError::NotFound(format!("chunk {}", chunk_id)))?;

        Ok(chunk.apply(&update, Utc::now()))
    }

    async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let inner = self.inner.read().await;
        let mut chunks: Vec<Chunk> = inner
            .by_document
            .get(&document_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.chunks.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();

        chunks.sort_by_key(|chunk| chunk.chunk_number);
        Ok(chunks)
    }

    async fn stale_chunks(&self, cutoff: DateTime<Utc>) -> Result<Vec<Chunk>> {
        let inner = self.inner.read().await;
        let mut stale: Vec<Chunk> = inner
            .chunks
            .values()
            .filter(|chunk| !chunk.analysis_status.is_terminal() && chunk.updated_at < cutoff)
            .cloned()
            .collect();

        stale.sort_by_key(|chunk| (chunk.document_id, chunk.chunk_number));
        Ok(stale)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn create_document(&self, document: &Document) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.documents.contains_key(&document.id) {
            return Err(PipelineError::Validation(format!(
                "document {} already exists",
                document.id
            )));
        }
        inner.documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Option<Document>> {
        Ok(self.inner.read().await.documents.get(&document_id).cloned())
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let inner = self.inner.read().await;
        let mut documents: Vec<Document> = inner.documents.values().cloned().collect();
        documents.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(documents)
    }

    async fn set_chunking_status(&self, document_id: Uuid, status: ChunkingStatus) -> Result<()> {
        let mut inner = self.inner.write().await;
        let document = inner
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| PipelineError::NotFound(format!("document {}", document_id)))?;
        document.chunking_status = status;
        Ok(())
    }

    async fn finalize_document(
        &self,
        document_id: Uuid,
        structured_data: Option<StructuredData>,
        status: ChunkingStatus,
    ) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let document = inner
            .documents
            .get_mut(&document_id)
            .ok_or_else(|| PipelineError::NotFound(format!("document {}", document_id)))?;

        if !document.chunking_status.can_finalize_to(status) {
            return Ok(false);
        }
        if let Some(data) = structured_data {
            document.structured_data = Some(data);
        }
        document.chunking_status = status;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnalysisStatus;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn descriptors(count: u32) -> Vec<ChunkDescriptor> {
        (1..=count)
            .map(|n| ChunkDescriptor {
                chunk_number: n,
                start_page: (n - 1) * 10 + 1,
                end_page: n * 10,
                page_count: 10,
                extracted_text: format!("chunk {}", n),
            })
            .collect()
    }

    async fn store_with_document() -> (MemoryStore, Document) {
        let store = MemoryStore::new();
        let document = Document::new("statement.pdf", "text".to_string(), 30, 1024, 10);
        store.create_document(&document).await.unwrap();
        (store, document)
    }

    #[tokio::test]
    async fn test_create_and_list_chunks_in_order() {
        let (store, document) = store_with_document().await;
        let mut input = descriptors(3);
        input.reverse();

        store.create_chunks(document.id, &input).await.unwrap();
        let chunks = store.list_chunks(document.id).await.unwrap();

        let numbers: Vec<u32> = chunks.iter().map(|c| c.chunk_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(chunks.iter().all(|c| c.analysis_status == AnalysisStatus::Pending));
    }

    #[tokio::test]
    async fn test_create_chunks_twice_is_rejected() {
        let (store, document) = store_with_document().await;
        store.create_chunks(document.id, &descriptors(2)).await.unwrap();

        let second = store.create_chunks(document.id, &descriptors(2)).await;
        assert!(matches!(second, Err(PipelineError::Validation(_))));
        assert_eq!(store.list_chunks(document.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_create_chunks_for_unknown_document() {
        let store = MemoryStore::new();
        let result = store.create_chunks(Uuid::new_v4(), &descriptors(1)).await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_is_forward_only() {
        let (store, document) = store_with_document().await;
        let chunks = store.create_chunks(document.id, &descriptors(1)).await.unwrap();
        let id = chunks[0].id;

        assert!(store.update_chunk_status(id, ChunkUpdate::failed()).await.unwrap());
        assert!(!store
            .update_chunk_status(id, ChunkUpdate::processing())
            .await
            .unwrap());

        let chunk = store.get_chunk(id).await.unwrap().unwrap();
        assert_eq!(chunk.analysis_status, AnalysisStatus::Failed);
    }

    #[tokio::test]
    async fn test_update_unknown_chunk_is_not_found() {
        let store = MemoryStore::new();
        let result = store
            .update_chunk_status(Uuid::new_v4(), ChunkUpdate::processing())
            .await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_aggregate_status() {
        let (store, document) = store_with_document().await;
        let chunks = store.create_chunks(document.id, &descriptors(3)).await.unwrap();
        store
            .update_chunk_status(
                chunks[0].id,
                ChunkUpdate::completed(StructuredData::empty(), Utc::now()),
            )
            .await
            .unwrap();
        store
            .update_chunk_status(chunks[1].id, ChunkUpdate::processing())
            .await
            .unwrap();

        let progress = store.aggregate_status(document.id).await.unwrap();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.processing, 1);
        assert_eq!(progress.pending, 1);
        assert!(!progress.is_complete);
    }

    #[tokio::test]
    async fn test_stale_chunks_skip_terminal_and_recent() {
        let (store, document) = store_with_document().await;
        let chunks = store.create_chunks(document.id, &descriptors(3)).await.unwrap();
        let old = Utc::now() - Duration::hours(1);

        store.backdate_chunk(chunks[0].id, old).await;
        store.backdate_chunk(chunks[1].id, old).await;
        store
            .update_chunk_status(chunks[1].id, ChunkUpdate::failed())
            .await
            .unwrap();
        store.backdate_chunk(chunks[1].id, old).await;

        let stale = store
            .stale_chunks(Utc::now() - Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, chunks[0].id);
    }

    #[tokio::test]
    async fn test_finalize_keeps_data_when_none_given() {
        let (store, document) = store_with_document().await;
        store
            .finalize_document(
                document.id,
                Some(StructuredData::empty()),
                ChunkingStatus::Completed,
            )
            .await
            .unwrap();
        let rewritten = store
            .finalize_document(document.id, None, ChunkingStatus::Completed)
            .await
            .unwrap();

        assert!(rewritten);
        let stored = store.get_document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.chunking_status, ChunkingStatus::Completed);
        assert!(stored.structured_data.is_some());
    }

    #[tokio::test]
    async fn test_completed_document_is_not_failed_later() {
        let (store, document) = store_with_document().await;
        store
            .finalize_document(
                document.id,
                Some(StructuredData::empty()),
                ChunkingStatus::Completed,
            )
            .await
            .unwrap();

        let written = store
            .finalize_document(document.id, None, ChunkingStatus::Failed)
            .await
            .unwrap();

        assert!(!written);
        let stored = store.get_document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.chunking_status, ChunkingStatus::Completed);
        assert!(stored.structured_data.is_some());
    }
}
