// file: src/pipeline/intake.rs
// description: upload workflow from raw PDF bytes to a dispatched analysis
// reference: validate, extract text, persist document, start analysis

use crate::database::{AnalysisStore, DocumentStore};
use crate::error::{PipelineError, Result};
use crate::extractor::TextExtractor;
use crate::models::Document;
use crate::pipeline::orchestrator::{AnalysisOrchestrator, Dispatch};
use crate::utils::Validator;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// What the caller gets back immediately after an upload.
pub struct IntakeReceipt {
    pub document: Document,
    pub dispatch: Dispatch,
    pub message: String,
}

pub struct DocumentIntake {
    store: Arc<dyn AnalysisStore>,
    text_extractor: Arc<dyn TextExtractor>,
    orchestrator: AnalysisOrchestrator,
    max_file_size: u64,
}

impl DocumentIntake {
    pub fn new(
        store: Arc<dyn AnalysisStore>,
        text_extractor: Arc<dyn TextExtractor>,
        orchestrator: AnalysisOrchestrator,
        max_file_size: u64,
    ) -> Self {
        Self {
            store,
            text_extractor,
            orchestrator,
            max_file_size,
        }
    }

    pub fn orchestrator(&self) -> &AnalysisOrchestrator {
        &self.orchestrator
    }

    pub async fn ingest_file(&self, path: &Path) -> Result<IntakeReceipt> {
        Validator::validate_file_path(path)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PipelineError::FileOperation {
                path: path.to_path_buf(),
                source: e,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.ingest_bytes(&name, bytes).await
    }

    pub async fn ingest_bytes(&self, original_name: &str, bytes: Vec<u8>) -> Result<IntakeReceipt> {
        let original_name = Validator::sanitize_file_name(original_name);
        Validator::validate_pdf_extension(&original_name)?;
        let file_size = bytes.len() as u64;
        Validator::validate_file_size(file_size, self.max_file_size)?;
        Validator::validate_pdf_header(&bytes)?;

        let extracted = self.text_extractor.extract(bytes).await?;
        Validator::validate_content_not_empty(&extracted.text)?;

        let document = Document::new(
            original_name,
            extracted.text,
            extracted.page_count,
            file_size,
            self.orchestrator.pages_per_chunk(),
        );
        self.store.create_document(&document).await?;
        info!(
            "Stored document {} ({}, {} pages, {} chars)",
            document.id,
            document.original_name,
            document.page_count,
            document.extracted_text.len()
        );

        let dispatch = self.orchestrator.start_analysis(&document).await?;
        let message = if document.is_chunked {
            format!(
                "File uploaded successfully. Split into {} chunks for analysis...",
                document.total_chunks
            )
        } else {
            "File uploaded successfully. AI analysis in progress...".to_string()
        };

        Ok(IntakeReceipt {
            document,
            dispatch,
            message,
        })
    }
}
