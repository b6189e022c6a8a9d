// file: src/database/mod.rs
// description: persistence module exports
// reference: internal module structure

pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod store;

pub use memory::MemoryStore;
pub use schema::SchemaManager;
pub use sqlite::SqliteStore;
pub use store::{AnalysisStore, ChunkStore, DocumentStore};
