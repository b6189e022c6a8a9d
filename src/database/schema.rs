// file: src/database/schema.rs
// description: SQLite schema management for documents and chunks
// reference: https://www.sqlite.org/foreignkeys.html

use crate::database::sqlite::SqliteStore;
use crate::error::Result;
use tracing::{info, warn};

pub const DOCUMENTS_TABLE: &str = "documents";
pub const CHUNKS_TABLE: &str = "chunks";

const CREATE_DOCUMENTS: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY NOT NULL,
    original_name TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    file_size INTEGER NOT NULL,
    page_count INTEGER NOT NULL,
    extracted_text TEXT NOT NULL,
    structured_data TEXT,
    is_chunked INTEGER NOT NULL DEFAULT 0,
    total_chunks INTEGER NOT NULL DEFAULT 0,
    chunking_status TEXT NOT NULL DEFAULT 'none',
    uploaded_at TEXT NOT NULL
)
"#;

const CREATE_CHUNKS: &str = r#"
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY NOT NULL,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    chunk_number INTEGER NOT NULL,
    start_page INTEGER NOT NULL,
    end_page INTEGER NOT NULL,
    page_count INTEGER NOT NULL,
    extracted_text TEXT NOT NULL,
    structured_data TEXT,
    analysis_status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    analyzed_at TEXT,
    UNIQUE (document_id, chunk_number)
)
"#;

const CREATE_INDEXES: [&str; 2] = [
    "CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks (document_id, chunk_number)",
    "CREATE INDEX IF NOT EXISTS idx_chunks_status ON chunks (analysis_status, updated_at)",
];

pub struct SchemaManager<'a> {
    store: &'a SqliteStore,
}

impl<'a> SchemaManager<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    pub async fn initialize(&self) -> Result<()> {
        info!("Initializing SQLite schema");

        sqlx::query(CREATE_DOCUMENTS)
            .execute(self.store.pool())
            .await?;
        sqlx::query(CREATE_CHUNKS).execute(self.store.pool()).await?;
        for statement in CREATE_INDEXES {
            sqlx::query(statement).execute(self.store.pool()).await?;
        }

        info!("SQLite schema initialized successfully");
        Ok(())
    }

    pub async fn verify_schema(&self) -> Result<bool> {
        for table in [DOCUMENTS_TABLE, CHUNKS_TABLE] {
            if !self.store.table_exists(table).await? {
                warn!("Table '{}' does not exist", table);
                return Ok(false);
            }
            info!("Table '{}' exists", table);
        }
        Ok(true)
    }

    pub async fn drop_all_tables(&self) -> Result<()> {
        warn!("Dropping all tables");

        // chunks first; it references documents
        for table in [CHUNKS_TABLE, DOCUMENTS_TABLE] {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
                .execute(self.store.pool())
                .await?;
            info!("Dropped table: {}", table);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_verify_and_drop() {
        let store = SqliteStore::in_memory().await.unwrap();
        let schema = SchemaManager::new(&store);

        assert!(schema.verify_schema().await.unwrap());
        schema.initialize().await.unwrap();

        schema.drop_all_tables().await.unwrap();
        assert!(!schema.verify_schema().await.unwrap());

        schema.initialize().await.unwrap();
        assert!(schema.verify_schema().await.unwrap());
    }
}
