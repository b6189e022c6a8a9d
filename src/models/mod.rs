// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod chunk;
pub mod document;
pub mod status;
pub mod structured;

pub use chunk::{AnalysisStatus, Chunk, ChunkDescriptor, ChunkSummary, ChunkUpdate};
pub use document::{ChunkingStatus, Document};
pub use status::AnalysisProgress;
pub use structured::{DEFAULT_HEADERS, ExtractedItem, StructuredData, summary_keys};
