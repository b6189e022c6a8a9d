// file: src/extractor/pdf.rs
// description: PDF text and page-count extraction
// reference: https://docs.rs/pdf-extract, https://docs.rs/lopdf

use crate::error::{PipelineError, Result};
use crate::extractor::{ExtractedText, TextExtractor};
use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }

    fn extract_blocking(bytes: &[u8]) -> Result<ExtractedText> {
        let document = lopdf::Document::load_mem(bytes)
            .map_err(|e| PipelineError::UnreadablePdf(format!("Failed to parse PDF: {}", e)))?;
        let page_count = document.get_pages().len() as u32;

        let text = pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
            PipelineError::UnreadablePdf(format!("Failed to extract PDF text: {}", e))
        })?;

        Ok(ExtractedText { text, page_count })
    }
}

#[async_trait]
impl TextExtractor for PdfTextExtractor {
    async fn extract(&self, bytes: Vec<u8>) -> Result<ExtractedText> {
        let extracted = tokio::task::spawn_blocking(move || Self::extract_blocking(&bytes))
            .await
            .map_err(|e| {
                PipelineError::UnreadablePdf(format!("PDF extraction task failed: {}", e))
            })??;

        debug!(
            "Extracted {} chars across {} pages",
            extracted.text.len(),
            extracted.page_count
        );

        if extracted.page_count == 0 {
            return Err(PipelineError::UnreadablePdf(
                "PDF contains no pages".to_string(),
            ));
        }

        Ok(extracted)
    }
}
