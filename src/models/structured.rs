// file: src/models/structured.rs
// description: normalized financial extraction result shared by documents and chunks
// reference: internal data structures

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_HEADERS: [&str; 5] = ["Date", "Description", "Amount", "Category", "Type"];

/// Well-known keys of the summary map.
pub mod summary_keys {
    pub const DOCUMENT_TYPE: &str = "Document Type";
    pub const TOTAL_TRANSACTIONS: &str = "Total Transactions";
    pub const TOTAL_INCOME: &str = "Total Income";
    pub const TOTAL_EXPENSES: &str = "Total Expenses";
    pub const NET_AMOUNT: &str = "Net Amount";
    pub const CURRENCY: &str = "Currency";
    pub const STATUS: &str = "Status";
    pub const TOTAL_CHUNKS: &str = "Total Chunks";
    pub const COMPLETED_CHUNKS: &str = "Completed Chunks";
    pub const NOTE: &str = "Note";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Amount")]
    pub amount: f64,
    #[serde(rename = "Category")]
    pub category: String,
    #[serde(rename = "Type")]
    pub item_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredData {
    pub headers: Vec<String>,
    pub items: Vec<ExtractedItem>,
    pub summary: Map<String, Value>,
}

impl StructuredData {
    pub fn empty() -> Self {
        Self {
            headers: default_headers(),
            items: Vec::new(),
            summary: Map::new(),
        }
    }

    pub fn transaction_count(&self) -> usize {
        self.items.len()
    }

    /// Reads a numeric summary entry. Numeric strings are accepted; anything
    /// else counts as zero.
    pub fn summary_number(&self, key: &str) -> f64 {
        match self.summary.get(key) {
            Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0),
            Some(Value::String(s)) => s
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn summary_text(&self, key: &str) -> Option<&str> {
        self.summary.get(key).and_then(Value::as_str)
    }
}

impl Default for StructuredData {
    fn default() -> Self {
        Self::empty()
    }
}

pub fn default_headers() -> Vec<String> {
    DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_serializes_with_display_keys() {
        let item = ExtractedItem {
            date: "2025-01-03".to_string(),
            description: "Salary".to_string(),
            amount: 5000.0,
            category: "Income".to_string(),
            item_type: "Income".to_string(),
        };

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["Type"], "Income");
        assert_eq!(value["Amount"], 5000.0);
    }

    #[test]
    fn test_summary_number_accepts_numeric_strings() {
        let mut data = StructuredData::empty();
        data.summary
            .insert(summary_keys::TOTAL_INCOME.to_string(), json!("1200.5"));
        data.summary
            .insert(summary_keys::TOTAL_EXPENSES.to_string(), json!(300));
        data.summary
            .insert(summary_keys::NET_AMOUNT.to_string(), json!("n/a"));

        assert_eq!(data.summary_number(summary_keys::TOTAL_INCOME), 1200.5);
        assert_eq!(data.summary_number(summary_keys::TOTAL_EXPENSES), 300.0);
        assert_eq!(data.summary_number(summary_keys::NET_AMOUNT), 0.0);
        assert_eq!(data.summary_number("missing"), 0.0);
    }

    #[test]
    fn test_empty_has_default_headers() {
        let data = StructuredData::empty();
        assert_eq!(data.headers, DEFAULT_HEADERS.to_vec());
        assert_eq!(data.transaction_count(), 0);
    }
}
