// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod database;
pub mod error;
pub mod exporter;
pub mod extractor;
pub mod models;
pub mod pipeline;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{Config, DatabaseConfig, ExtractionConfig, MergeConfig, PipelineConfig};
pub use database::{
    AnalysisStore, ChunkStore, DocumentStore, MemoryStore, SchemaManager, SqliteStore,
};
pub use error::{PipelineError, Result};
pub use exporter::{ExportManifest, JsonExporter, JsonWorkbookRenderer, SpreadsheetRenderer};
pub use extractor::{
    GeminiExtractor, PdfTextExtractor, ResponseNormalizer, StructuredExtractor, TextExtractor,
};
pub use models::{
    AnalysisProgress, AnalysisStatus, Chunk, ChunkSummary, ChunkingStatus, Document,
    StructuredData,
};
pub use pipeline::{
    AnalysisOrchestrator, ChunkSplitter, DocumentIntake, OrchestratorOptions, PdfScanner,
    ProgressTracker, ResultMerger,
};
pub use utils::{HealthCheck, HealthReport, HealthStatus, OperationTimer, Validator};
