// file: src/test_support.rs
// description: scripted extractors and fixtures shared by unit tests
// reference: in-crate test helpers

use crate::error::{PipelineError, Result};
use crate::extractor::{ExtractedText, StructuredExtractor, TextExtractor};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// `n` pages of fixed width text, each starting with its marker ("P01", "P02", ...).
pub fn paged_text(pages: u32) -> String {
    (1..=pages)
        .map(|n| format!("{:<20}", format!("P{:02}", n)))
        .collect()
}

/// A well-formed model response with `count` expense items.
pub fn items_response(count: usize, income: f64, expenses: f64) -> String {
    let items: Vec<_> = (0..count)
        .map(|i| {
            json!({
                "Date": format!("{:02}/01/2025", i % 28 + 1),
                "Description": format!("Item {}", i + 1),
                "Amount": 10.0 * (i + 1) as f64,
                "Category": "Utilities",
                "Type": "Expense"
            })
        })
        .collect();

    json!({
        "headers": ["Date", "Description", "Amount", "Category", "Type"],
        "items": items,
        "summary": {
            "Total Income": income,
            "Total Expenses": expenses
        }
    })
    .to_string()
}

#[derive(Debug, Clone)]
pub enum Script {
    Respond(String),
    Fail(String),
    Hang,
    /// Waits for a permit, then responds.
    Gate(Arc<Semaphore>, String),
}

/// Structured extractor whose answer depends on which marker the text contains.
pub struct ScriptedExtractor {
    rules: Vec<(String, Script)>,
    fallback: Script,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl ScriptedExtractor {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fallback: Script::Respond(items_response(1, 0.0, 0.0)),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn on(mut self, key: &str, script: Script) -> Self {
        self.rules.push((key.to_string(), script));
        self
    }

    pub fn otherwise(mut self, script: Script) -> Self {
        self.fallback = script;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn peak(&self) -> Arc<AtomicUsize> {
        self.peak.clone()
    }

    fn script_for(&self, text: &str) -> Script {
        self.rules
            .iter()
            .find(|(key, _)| text.contains(key.as_str()))
            .map(|(_, script)| script.clone())
            .unwrap_or_else(|| self.fallback.clone())
    }

    async fn play(&self, script: Script) -> Result<String> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match script {
            Script::Respond(body) => Ok(body),
            Script::Fail(reason) => Err(PipelineError::ExtractionService(reason)),
            Script::Hang => std::future::pending().await,
            Script::Gate(gate, body) => {
                let _permit = gate
                    .acquire()
                    .await
                    .map_err(|e| PipelineError::ExtractionService(e.to_string()))?;
                Ok(body)
            }
        }
    }
}

#[async_trait]
impl StructuredExtractor for ScriptedExtractor {
    async fn extract_structured(&self, text: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let result = self.play(self.script_for(text)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Text extractor that ignores its input.
pub struct FixedTextExtractor {
    text: String,
    pages: u32,
}

impl FixedTextExtractor {
    pub fn new(text: String, pages: u32) -> Self {
        Self { text, pages }
    }
}

#[async_trait]
impl TextExtractor for FixedTextExtractor {
    async fn extract(&self, _bytes: Vec<u8>) -> Result<ExtractedText> {
        Ok(ExtractedText {
            text: self.text.clone(),
            page_count: self.pages,
        })
    }
}
