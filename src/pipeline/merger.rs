// file: src/pipeline/merger.rs
// description: consolidates per-chunk extraction results into one dataset
// reference: ordered concatenation with aggregated summary totals

use crate::database::{AnalysisStore, ChunkStore};
use crate::error::Result;
use crate::models::structured::default_headers;
use crate::models::{AnalysisStatus, Chunk, StructuredData, summary_keys};
use serde_json::{Map, json};
use std::sync::Arc;
use uuid::Uuid;

pub struct ResultMerger {
    store: Arc<dyn AnalysisStore>,
    currency: String,
}

impl ResultMerger {
    pub fn new(store: Arc<dyn AnalysisStore>, currency: impl Into<String>) -> Self {
        Self {
            store,
            currency: currency.into(),
        }
    }

    /// Re-reads the document's chunks and merges whatever has completed so far.
    pub async fn merge(&self, document_id: Uuid) -> Result<StructuredData> {
        let chunks = self.store.list_chunks(document_id).await?;
        Ok(self.merge_chunks(&chunks))
    }

    pub fn merge_chunks(&self, chunks: &[Chunk]) -> StructuredData {
        let mut ordered: Vec<&Chunk> = chunks.iter().collect();
        ordered.sort_by_key(|chunk| chunk.chunk_number);

        let total_chunks = ordered.len();
        let completed: Vec<&StructuredData> = ordered
            .iter()
            .filter(|chunk| chunk.analysis_status == AnalysisStatus::Completed)
            .filter_map(|chunk| chunk.structured_data.as_ref())
            .collect();

        if completed.is_empty() {
            let mut summary = Map::new();
            summary.insert(summary_keys::DOCUMENT_TYPE.into(), json!("Financial Report"));
            summary.insert(summary_keys::TOTAL_TRANSACTIONS.into(), json!(0));
            summary.insert(summary_keys::TOTAL_CHUNKS.into(), json!(total_chunks));
            summary.insert(summary_keys::COMPLETED_CHUNKS.into(), json!(0));
            summary.insert(summary_keys::STATUS.into(), json!("No data extracted yet"));

            return StructuredData {
                summary,
                ..StructuredData::empty()
            };
        }

        let mut headers = default_headers();
        let mut items = Vec::new();
        let mut total_income = 0.0;
        let mut total_expenses = 0.0;

        for data in &completed {
            for header in &data.headers {
                if !headers.contains(header) {
                    headers.push(header.clone());
                }
            }
            items.extend(data.items.iter().cloned());
            total_income += data.summary_number(summary_keys::TOTAL_INCOME);
            total_expenses += data.summary_number(summary_keys::TOTAL_EXPENSES);
        }

        let status = if completed.len() == total_chunks {
            "All chunks analyzed".to_string()
        } else {
            format!("{}/{} chunks completed", completed.len(), total_chunks)
        };

        let mut summary = Map::new();
        summary.insert(summary_keys::DOCUMENT_TYPE.into(), json!("Financial Report"));
        summary.insert(summary_keys::TOTAL_TRANSACTIONS.into(), json!(items.len()));
        summary.insert(summary_keys::TOTAL_CHUNKS.into(), json!(total_chunks));
        summary.insert(summary_keys::COMPLETED_CHUNKS.into(), json!(completed.len()));
        summary.insert(summary_keys::TOTAL_INCOME.into(), json!(total_income));
        summary.insert(summary_keys::TOTAL_EXPENSES.into(), json!(total_expenses));
        summary.insert(
            summary_keys::NET_AMOUNT.into(),
            json!(total_income - total_expenses),
        );
        summary.insert(summary_keys::CURRENCY.into(), json!(self.currency));
        summary.insert(summary_keys::STATUS.into(), json!(status));

        StructuredData {
            headers,
            items,
            summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{ChunkStore, DocumentStore, MemoryStore};
    use crate::models::{ChunkDescriptor, ChunkUpdate, Document, ExtractedItem};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn item(description: &str, amount: f64) -> ExtractedItem {
        ExtractedItem {
            date: "2025-01-01".to_string(),
            description: description.to_string(),
            amount,
            category: "Other".to_string(),
            item_type: "Expense".to_string(),
        }
    }

    fn chunk(number: u32, status: AnalysisStatus, data: Option<StructuredData>) -> Chunk {
        let mut chunk = Chunk::from_descriptor(
            Uuid::nil(),
            ChunkDescriptor {
                chunk_number: number,
                start_page: (number - 1) * 10 + 1,
                end_page: number * 10,
                page_count: 10,
                extracted_text: String::new(),
            },
            Utc::now(),
        );
        chunk.analysis_status = status;
        chunk.structured_data = data;
        chunk
    }

    fn data(
        prefix: &str,
        count: usize,
        income: serde_json::Value,
        expenses: f64,
    ) -> StructuredData {
        let mut data = StructuredData::empty();
        data.items = (0..count)
            .map(|i| item(&format!("{}{}", prefix, i), 10.0))
            .collect();
        data.summary.insert(summary_keys::TOTAL_INCOME.into(), income);
        data.summary.insert(summary_keys::TOTAL_EXPENSES.into(), json!(expenses));
        data
    }

    fn merger() -> ResultMerger {
        ResultMerger::new(Arc::new(MemoryStore::new()), "INR")
    }

    #[test]
    fn test_partial_merge_skips_failed_chunk() {
        let chunks = vec![
            chunk(3, AnalysisStatus::Completed, Some(data("c", 3, json!("200"), 50.0))),
            chunk(1, AnalysisStatus::Completed, Some(data("a", 5, json!(1000), 300.0))),
            chunk(2, AnalysisStatus::Failed, None),
        ];

        let merged = merger().merge_chunks(&chunks);

        assert_eq!(merged.items.len(), 8);
        assert_eq!(merged.items[0].description, "a0");
        assert_eq!(merged.items[5].description, "c0");
        assert_eq!(merged.summary[summary_keys::TOTAL_TRANSACTIONS], json!(8));
        assert_eq!(merged.summary[summary_keys::TOTAL_INCOME], json!(1200.0));
        assert_eq!(merged.summary[summary_keys::TOTAL_EXPENSES], json!(350.0));
        assert_eq!(merged.summary[summary_keys::NET_AMOUNT], json!(850.0));
        assert_eq!(merged.summary[summary_keys::COMPLETED_CHUNKS], json!(2));
        assert_eq!(merged.summary[summary_keys::STATUS], json!("2/3 chunks completed"));
    }

    #[test]
    fn test_all_chunks_analyzed_status_and_header_union() {
        let mut first = data("a", 1, json!(0), 0.0);
        first.headers.push("Balance".to_string());
        let mut second = data("b", 1, json!("not a number"), 0.0);
        second.headers = vec!["Reference".to_string(), "Date".to_string(), "Balance".to_string()];

        let merged = merger().merge_chunks(&[
            chunk(1, AnalysisStatus::Completed, Some(first)),
            chunk(2, AnalysisStatus::Completed, Some(second)),
        ]);

        assert_eq!(
            merged.headers,
            vec!["Date", "Description", "Amount", "Category", "Type", "Balance", "Reference"]
        );
        assert_eq!(merged.summary[summary_keys::TOTAL_INCOME], json!(0.0));
        assert_eq!(merged.summary[summary_keys::STATUS], json!("All chunks analyzed"));
        assert_eq!(merged.summary[summary_keys::CURRENCY], json!("INR"));
    }

    #[test]
    fn test_nothing_completed_is_well_formed() {
        let merged = merger().merge_chunks(&[
            chunk(1, AnalysisStatus::Processing, None),
            chunk(2, AnalysisStatus::Failed, None),
        ]);

        assert!(merged.items.is_empty());
        assert_eq!(merged.headers.len(), 5);
        assert_eq!(merged.summary[summary_keys::TOTAL_CHUNKS], json!(2));
        assert_eq!(merged.summary[summary_keys::COMPLETED_CHUNKS], json!(0));
        assert_eq!(merged.summary[summary_keys::STATUS], json!("No data extracted yet"));
    }

    #[tokio::test]
    async fn test_merge_from_store_is_repeatable() {
        let store = Arc::new(MemoryStore::new());
        let document = Document::new("big.pdf", String::new(), 20, 1, 10);
        store.create_document(&document).await.unwrap();
        let descriptors: Vec<ChunkDescriptor> = (1..=2)
            .map(|n| ChunkDescriptor {
                chunk_number: n,
                start_page: (n - 1) * 10 + 1,
                end_page: n * 10,
                page_count: 10,
                extracted_text: String::new(),
            })
            .collect();
        let chunks = store.create_chunks(document.id, &descriptors).await.unwrap();
        store
            .update_chunk_status(
                chunks[0].id,
                ChunkUpdate::completed(data("x", 2, json!(10), 5.0), Utc::now()),
            )
            .await
            .unwrap();

        let merger = ResultMerger::new(store.clone(), "USD");
        let first = merger.merge(document.id).await.unwrap();
        let second = merger.merge(document.id).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.summary[summary_keys::STATUS], json!("1/2 chunks completed"));
        assert_eq!(first.summary[summary_keys::CURRENCY], json!("USD"));
    }
}
