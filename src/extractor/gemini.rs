// file: src/extractor/gemini.rs
// description: Gemini generateContent integration for financial data extraction
// reference: https://ai.google.dev/api/generate-content

use crate::config::ExtractionConfig;
use crate::error::{PipelineError, Result};
use crate::extractor::StructuredExtractor;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const EXTRACTION_PROMPT: &str = r#"You are an expert financial data extraction specialist. Analyze the following document text and extract ALL financial transactions and data.

DOCUMENT TEXT:
{text}

IMPORTANT INSTRUCTIONS:
1. Extract ALL financial transactions, amounts, dates, descriptions
2. Return as JSON with this exact structure:
{
  "headers": ["Date", "Description", "Amount", "Category", "Type"],
  "items": [
    {"Date": "YYYY-MM-DD", "Description": "text", "Amount": number, "Category": "text", "Type": "Income/Expense"}
  ],
  "summary": {
    "Document Type": "Financial Report/Statement",
    "Total Transactions": number,
    "Total Income": number,
    "Total Expenses": number,
    "Net Amount": number,
    "Currency": "INR/USD/etc",
    "Status": "Extraction completed"
  }
}
3. Keep descriptions concise but meaningful
4. For amounts: extract numeric values only
5. For dates: use YYYY-MM-DD format
6. Return COMPLETE JSON without truncation

Return ONLY valid JSON, no other text."#;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

pub struct GeminiExtractor {
    client: Client,
    api_key: Option<String>,
    endpoint: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiExtractor {
    pub fn new(config: &ExtractionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| {
                PipelineError::ExtractionService(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            api_key: config.gemini_api_key.clone().filter(|key| !key.is_empty()),
            endpoint: format!(
                "{}/{}:generateContent",
                config.api_base.trim_end_matches('/'),
                config.model
            ),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        })
    }

    fn build_request(&self, text: &str) -> GenerateRequest {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(EXTRACTION_PROMPT.replace("{text}", text)),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_k: 10,
                top_p: 0.8,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }
}

fn first_candidate_text(response: GenerateResponse) -> Result<String> {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .and_then(|content| content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or_else(|| {
            PipelineError::ExtractionService("Invalid API response structure".to_string())
        })
}

#[async_trait]
impl StructuredExtractor for GeminiExtractor {
    async fn extract_structured(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(PipelineError::EmptyContent(
                "Document text is empty".to_string(),
            ));
        }

        let api_key = self.api_key.as_deref().ok_or_else(|| {
            PipelineError::ExtractionService("GEMINI_API_KEY is not configured".to_string())
        })?;

        debug!("Requesting structured extraction for {} chars", text.len());

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", api_key)])
            .json(&self.build_request(text))
            .send()
            .await
            .map_err(|e| {
                PipelineError::ExtractionService(format!("Failed to send Gemini request: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(PipelineError::ExtractionService(format!(
                "Gemini request failed with status {}: {}",
                status, error_text
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            PipelineError::ExtractionService(format!("Failed to parse Gemini response: {}", e))
        })?;

        let generated = first_candidate_text(body)?;
        debug!("Received {} chars of model output", generated.len());
        Ok(generated)
    }
}
