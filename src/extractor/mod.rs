// file: src/extractor/mod.rs
// description: text and structured-data extraction module exports
// reference: internal module structure

pub mod gemini;
pub mod normalizer;
pub mod patterns;
pub mod pdf;

pub use gemini::GeminiExtractor;
pub use normalizer::{NormalizedResponse, ParseOutcome, ResponseNormalizer};
pub use pdf::PdfTextExtractor;

use crate::error::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: u32,
}

/// Pulls plain text and the page count out of an uploaded file.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: Vec<u8>) -> Result<ExtractedText>;
}

/// Turns document text into a raw, model-formatted JSON response.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    async fn extract_structured(&self, text: &str) -> Result<String>;
}
