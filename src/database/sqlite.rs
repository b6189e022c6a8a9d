// file: src/database/sqlite.rs
// description: SQLite-backed document and chunk store
// reference: https://docs.rs/sqlx/latest/sqlx/sqlite

use crate::config::DatabaseConfig;
use crate::database::schema::SchemaManager;
use crate::database::store::{ChunkStore, DocumentStore};
use crate::error::{PipelineError, Result};
use crate::models::{
    AnalysisProgress, AnalysisStatus, Chunk, ChunkDescriptor, ChunkUpdate, ChunkingStatus,
    Document, StructuredData,
};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

const CHUNK_COLUMNS: &str = "id, document_id, chunk_number, start_page, end_page, page_count, \
     extracted_text, structured_data, analysis_status, created_at, updated_at, analyzed_at";

const DOCUMENT_COLUMNS: &str = "id, original_name, content_hash, file_size, page_count, \
     extracted_text, structured_data, is_chunked, total_chunks, chunking_status, uploaded_at";

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to SQLite at {}", config.url);

        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| PipelineError::Config(format!("Invalid database url: {}", e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        if let Some(parent) = options.get_filename().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::FileOperation {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        SchemaManager::new(&store).initialize().await?;
        Ok(store)
    }

    /// A private database living as long as the store. One connection, so
    /// every query sees the same in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        SchemaManager::new(&store).initialize().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn ping(&self) -> Result<bool> {
        debug!("Checking SQLite connection");
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(true)
    }

    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let row = sqlx::query("SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?")
            .bind(table_name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn document_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query("SELECT COUNT(*) AS total FROM documents")
            .fetch_one(&self.pool)
            .await?
            .try_get("total")?;
        Ok(count as u64)
    }

    async fn chunk_exists(&self, chunk_id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM chunks WHERE id = ?")
            .bind(chunk_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn document_exists(&self, document_id: Uuid) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM documents WHERE id = ?")
            .bind(document_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| PipelineError::Serialization(format!("invalid timestamp {}: {}", raw, e)))
}

fn parse_uuid(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|e| PipelineError::Serialization(format!("invalid id {}: {}", raw, e)))
}

fn encode_data(data: Option<&StructuredData>) -> Result<Option<String>> {
    data.map(serde_json::to_string).transpose().map_err(Into::into)
}

fn decode_data(raw: Option<String>) -> Result<Option<StructuredData>> {
    raw.map(|json| serde_json::from_str(&json))
        .transpose()
        .map_err(Into::into)
}

fn chunk_from_row(row: &SqliteRow) -> Result<Chunk> {
    let analyzed_at: Option<String> = row.try_get("analyzed_at")?;

    Ok(Chunk {
        id: parse_uuid(row.try_get("id")?)?,
        document_id: parse_uuid(row.try_get("document_id")?)?,
        chunk_number: row.try_get::<i64, _>("chunk_number")? as u32,
        start_page: row.try_get::<i64, _>("start_page")? as u32,
        end_page: row.try_get::<i64, _>("end_page")? as u32,
        page_count: row.try_get::<i64, _>("page_count")? as u32,
        extracted_text: row.try_get("extracted_text")?,
        structured_data: decode_data(row.try_get("structured_data")?)?,
        analysis_status: AnalysisStatus::from_str(row.try_get("analysis_status")?)?,
        created_at: parse_timestamp(row.try_get("created_at")?)?,
        updated_at: parse_timestamp(row.try_get("updated_at")?)?,
        analyzed_at: analyzed_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    Ok(Document {
        id: parse_uuid(row.try_get("id")?)?,
        original_name: row.try_get("original_name")?,
        content_hash: row.try_get("content_hash")?,
        file_size: row.try_get::<i64, _>("file_size")? as u64,
        page_count: row.try_get::<i64, _>("page_count")? as u32,
        extracted_text: row.try_get("extracted_text")?,
        structured_data: decode_data(row.try_get("structured_data")?)?,
        is_chunked: row.try_get::<i64, _>("is_chunked")? != 0,
        total_chunks: row.try_get::<i64, _>("total_chunks")? as u32,
        chunking_status: ChunkingStatus::from_str(row.try_get("chunking_status")?)?,
        uploaded_at: parse_timestamp(row.try_get("uploaded_at")?)?,
    })
}

#[async_trait]
impl ChunkStore for SqliteStore {
    async fn create_chunks(
        &self,
        document_id: Uuid,
        descriptors: &[ChunkDescriptor],
    ) -> Result<Vec<Chunk>> {
        let mut tx = self.pool.begin().await?;

        let parent = sqlx::query("SELECT 1 FROM documents WHERE id = ?")
            .bind(document_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        if parent.is_none() {
            return Err(PipelineError::NotFound(format!("document {}", document_id)));
        }

        let existing: i64 =
            sqlx::query("SELECT COUNT(*) AS total FROM chunks WHERE document_id = ?")
                .bind(document_id.to_string())
                .fetch_one(&mut *tx)
                .await?
                .try_get("total")?;
        if existing > 0 {
            return Err(PipelineError::Validation(format!(
                "chunks already exist for document {}",
                document_id
            )));
        }

        let now = Utc::now();
        let mut chunks = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors.iter().cloned() {
            let chunk = Chunk::from_descriptor(document_id, descriptor, now);
            sqlx::query(&format!(
                "INSERT INTO chunks ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                CHUNK_COLUMNS
            ))
            .bind(chunk.id.to_string())
            .bind(document_id.to_string())
            .bind(chunk.chunk_number as i64)
            .bind(chunk.start_page as i64)
            .bind(chunk.end_page as i64)
            .bind(chunk.page_count as i64)
            .bind(&chunk.extracted_text)
            .bind(Option::<String>::None)
            .bind(chunk.analysis_status.as_str())
            .bind(timestamp(chunk.created_at))
            .bind(timestamp(chunk.updated_at))
            .bind(Option::<String>::None)
            .execute(&mut *tx)
            .await?;
            chunks.push(chunk);
        }

        tx.commit().await?;
        debug!("Persisted {} chunks for document {}", chunks.len(), document_id);
        Ok(chunks)
    }

    async fn get_chunk(&self, chunk_id: Uuid) -> Result<Option<Chunk>> {
        let row = sqlx::query(&format!("SELECT {} FROM chunks WHERE id = ?", CHUNK_COLUMNS))
            .bind(chunk_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(chunk_from_row).transpose()
    }

    async fn update_chunk_status(&self, chunk_id: Uuid, update: ChunkUpdate) -> Result<bool> {
        let predecessors = update.status.predecessors();
        if predecessors.is_empty() {
            return if self.chunk_exists(chunk_id).await? {
                Ok(false)
            } else {
                Err(PipelineError::NotFound(format!("chunk {}", chunk_id)))
            };
        }

        let placeholders = vec!["?"; predecessors.len()].join(", ");
        let sql = format!(
            "UPDATE chunks SET analysis_status = ?, \
             structured_data = COALESCE(?, structured_data), \
             analyzed_at = COALESCE(?, analyzed_at), \
             updated_at = ? \
             WHERE id = ? AND analysis_status IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(update.status.as_str())
            .bind(encode_data(update.structured_data.as_ref())?)
            .bind(update.analyzed_at.map(timestamp))
            .bind(timestamp(Utc::now()))
            .bind(chunk_id.to_string());
        for status in predecessors {
            query = query.bind(status.as_str());
        }

        let affected = query.execute(&self.pool).await?.rows_affected();
        if affected > 0 {
            return Ok(true);
        }

        if self.chunk_exists(chunk_id).await? {
            Ok(false)
        } else {
            Err(PipelineError::NotFound(format!("chunk {}", chunk_id)))
        }
    }

    async fn list_chunks(&self, document_id: Uuid) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chunks WHERE document_id = ? ORDER BY chunk_number",
            CHUNK_COLUMNS
        ))
        .bind(document_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chunk_from_row).collect()
    }

    async fn aggregate_status(&self, document_id: Uuid) -> Result<AnalysisProgress> {
        let rows = sqlx::query(
            "SELECT analysis_status, COUNT(*) AS total FROM chunks \
             WHERE document_id = ? GROUP BY analysis_status",
        )
        .bind(document_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        let (mut pending, mut processing, mut completed, mut failed) = (0, 0, 0, 0);
        for row in &rows {
            let count = row.try_get::<i64, _>("total")? as usize;
            match AnalysisStatus::from_str(row.try_get("analysis_status")?)? {
                AnalysisStatus::Pending => pending = count,
                AnalysisStatus::Processing => processing = count,
                AnalysisStatus::Completed => completed = count,
                AnalysisStatus::Failed => failed = count,
            }
        }

        Ok(AnalysisProgress::from_counts(
            pending, processing, completed, failed,
        ))
    }

    async fn stale_chunks(&self, cutoff: DateTime<Utc>) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM chunks \
             WHERE analysis_status IN ('pending', 'processing') AND updated_at < ? \
             ORDER BY document_id, chunk_number",
            CHUNK_COLUMNS
        ))
        .bind(timestamp(cutoff))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(chunk_from_row).collect()
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn create_document(&self, document: &Document) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO documents ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            DOCUMENT_COLUMNS
        ))
        .bind(document.id.to_string())
        .bind(&document.original_name)
        .bind(&document.content_hash)
        .bind(document.file_size as i64)
        .bind(document.page_count as i64)
        .bind(&document.extracted_text)
        .bind(encode_data(document.structured_data.as_ref())?)
        .bind(document.is_chunked as i64)
        .bind(document.total_chunks as i64)
        .bind(document.chunking_status.as_str())
        .bind(timestamp(document.uploaded_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, document_id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE id = ?",
            DOCUMENT_COLUMNS
        ))
        .bind(document_id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(document_from_row).transpose()
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents ORDER BY uploaded_at DESC",
            DOCUMENT_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn set_chunking_status(&self, document_id: Uuid, status: ChunkingStatus) -> Result<()> {
        let affected = sqlx::query("UPDATE documents SET chunking_status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(document_id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(PipelineError::NotFound(format!("document {}", document_id)));
        }
        Ok(())
    }

    async fn finalize_document(
        &self,
        document_id: Uuid,
        structured_data: Option<StructuredData>,
        status: ChunkingStatus,
    ) -> Result<bool> {
        let affected = sqlx::query(
            "UPDATE documents SET structured_data = COALESCE(?, structured_data), \
             chunking_status = ? WHERE id = ? \
             AND (chunking_status NOT IN ('completed', 'failed') \
             OR (chunking_status = 'completed' AND ? = 'completed'))",
        )
        .bind(encode_data(structured_data.as_ref())?)
        .bind(status.as_str())
        .bind(document_id.to_string())
        .bind(status.as_str())
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            if !self.document_exists(document_id).await? {
                return Err(PipelineError::NotFound(format!("document {}", document_id)));
            }
            return Ok(false);
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractedItem;
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn descriptors(count: u32) -> Vec<ChunkDescriptor> {
        (1..=count)
            .map(|n| ChunkDescriptor {
                chunk_number: n,
                start_page: (n - 1) * 10 + 1,
                end_page: n * 10,
                page_count: 10,
                extracted_text: format!("chunk {} text", n),
            })
            .collect()
    }

    fn sample_data() -> StructuredData {
        let mut data = StructuredData::empty();
        data.items.push(ExtractedItem {
            date: "2025-01-02".to_string(),
            description: "Salary".to_string(),
            amount: 5000.0,
            category: "Income".to_string(),
            item_type: "Income".to_string(),
        });
        data
    }

    async fn store_with_document() -> (SqliteStore, Document) {
        let store = SqliteStore::in_memory().await.unwrap();
        let document = Document::new("statement.pdf", "full text".to_string(), 25, 4096, 10);
        store.create_document(&document).await.unwrap();
        (store, document)
    }

    #[tokio::test]
    async fn test_document_persists_all_fields() {
        let (store, document) = store_with_document().await;
        let stored = store.get_document(document.id).await.unwrap().unwrap();

        assert_eq!(stored.original_name, "statement.pdf");
        assert_eq!(stored.content_hash, document.content_hash);
        assert_eq!(stored.page_count, 25);
        assert_eq!(stored.total_chunks, 3);
        assert!(stored.is_chunked);
        assert_eq!(stored.chunking_status, ChunkingStatus::Chunked);
        assert_eq!(
            timestamp(stored.uploaded_at),
            timestamp(document.uploaded_at)
        );
    }

    #[tokio::test]
    async fn test_chunks_roundtrip_and_order() {
        let (store, document) = store_with_document().await;
        let created = store.create_chunks(document.id, &descriptors(3)).await.unwrap();

        let listed = store.list_chunks(document.id).await.unwrap();
        assert_eq!(listed.len(), 3);
        assert_eq!(listed[1].id, created[1].id);
        assert_eq!(listed[2].start_page, 21);
        assert_eq!(listed[0].extracted_text, "chunk 1 text");
        assert_eq!(listed[0].analysis_status, AnalysisStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_chunk_creation_rolls_back() {
        let (store, document) = store_with_document().await;
        store.create_chunks(document.id, &descriptors(2)).await.unwrap();

        let again = store.create_chunks(document.id, &descriptors(3)).await;
        assert!(matches!(again, Err(PipelineError::Validation(_))));
        assert_eq!(store.list_chunks(document.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_completed_update_stores_data_once() {
        let (store, document) = store_with_document().await;
        let chunks = store.create_chunks(document.id, &descriptors(1)).await.unwrap();
        let id = chunks[0].id;

        assert!(store
            .update_chunk_status(id, ChunkUpdate::processing())
            .await
            .unwrap());
        assert!(store
            .update_chunk_status(id, ChunkUpdate::completed(sample_data(), Utc::now()))
            .await
            .unwrap());
        assert!(!store.update_chunk_status(id, ChunkUpdate::failed()).await.unwrap());
        assert!(!store
            .update_chunk_status(id, ChunkUpdate::processing())
            .await
            .unwrap());

        let chunk = store.get_chunk(id).await.unwrap().unwrap();
        assert_eq!(chunk.analysis_status, AnalysisStatus::Completed);
        assert_eq!(chunk.structured_data.unwrap().items.len(), 1);
        assert!(chunk.analyzed_at.is_some());
    }

    #[tokio::test]
    async fn test_unknown_chunk_update_is_not_found() {
        let store = SqliteStore::in_memory().await.unwrap();
        let result = store
            .update_chunk_status(Uuid::new_v4(), ChunkUpdate::failed())
            .await;
        assert!(matches!(result, Err(PipelineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_aggregate_status_counts() {
        let (store, document) = store_with_document().await;
        let chunks = store.create_chunks(document.id, &descriptors(3)).await.unwrap();
        store
            .update_chunk_status(chunks[0].id, ChunkUpdate::failed())
            .await
            .unwrap();
        store
            .update_chunk_status(
                chunks[1].id,
                ChunkUpdate::completed(sample_data(), Utc::now()),
            )
            .await
            .unwrap();

        let progress = store.aggregate_status(document.id).await.unwrap();
        assert_eq!(
            progress,
            AnalysisProgress::from_counts(1, 0, 1, 1)
        );
    }

    #[tokio::test]
    async fn test_stale_chunks_by_cutoff() {
        let (store, document) = store_with_document().await;
        let chunks = store.create_chunks(document.id, &descriptors(2)).await.unwrap();
        store
            .update_chunk_status(chunks[0].id, ChunkUpdate::failed())
            .await
            .unwrap();

        let future_cutoff = Utc::now() + Duration::minutes(1);
        let stale = store.stale_chunks(future_cutoff).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, chunks[1].id);

        let past_cutoff = Utc::now() - Duration::minutes(1);
        assert!(store.stale_chunks(past_cutoff).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_finalize_document() {
        let (store, document) = store_with_document().await;
        store
            .finalize_document(document.id, Some(sample_data()), ChunkingStatus::Completed)
            .await
            .unwrap();

        let stored = store.get_document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.chunking_status, ChunkingStatus::Completed);
        assert_eq!(stored.items_extracted(), 1);

        let missing = store
            .finalize_document(Uuid::new_v4(), None, ChunkingStatus::Failed)
            .await;
        assert!(matches!(missing, Err(PipelineError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_finalize_never_leaves_a_terminal_state() {
        let (store, document) = store_with_document().await;
        store
            .finalize_document(document.id, Some(sample_data()), ChunkingStatus::Completed)
            .await
            .unwrap();

        let failed = store
            .finalize_document(document.id, None, ChunkingStatus::Failed)
            .await
            .unwrap();
        assert!(!failed);
        let stored = store.get_document(document.id).await.unwrap().unwrap();
        assert_eq!(stored.chunking_status, ChunkingStatus::Completed);
        assert_eq!(stored.items_extracted(), 1);

        let remerged = store
            .finalize_document(document.id, None, ChunkingStatus::Completed)
            .await
            .unwrap();
        assert!(remerged);
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("ledger.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", path.display()),
            max_connections: 2,
        };

        let store = SqliteStore::connect(&config).await.unwrap();
        assert!(store.ping().await.unwrap());
        assert!(path.exists());
        assert_eq!(store.document_count().await.unwrap(), 0);
    }
}
