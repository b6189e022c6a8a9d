// file: src/exporter/workbook.rs
// description: renders a document's extraction as a three-sheet workbook
// reference: sheet layout mirrors a typical statement spreadsheet export

use crate::error::Result;
use crate::exporter::SpreadsheetRenderer;
use crate::models::{DEFAULT_HEADERS, ExtractedItem, StructuredData};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet};

pub const OVERVIEW_SHEET: &str = "Financial Overview";
pub const TRANSACTIONS_SHEET: &str = "Detailed Transactions";
pub const TEXT_SHEET: &str = "Document Text";

const TEXT_SECTION_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Sheet {
    fn new(name: &str, columns: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            columns,
            rows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub summary: Map<String, Value>,
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }
}

/// Writes the workbook as JSON. The overview and transaction sheets are only
/// present when there are items; the text sheet only when there is text.
#[derive(Debug, Clone, Default)]
pub struct JsonWorkbookRenderer {
    pretty: bool,
}

impl JsonWorkbookRenderer {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn build(&self, document_text: &str, structured: &StructuredData) -> Workbook {
        let mut sheets = Vec::new();
        if !structured.items.is_empty() {
            sheets.push(overview_sheet(&structured.items));
            sheets.push(transactions_sheet(structured));
        }
        if !document_text.trim().is_empty() {
            sheets.push(text_sheet(document_text));
        }

        Workbook {
            summary: structured.summary.clone(),
            sheets,
        }
    }
}

impl SpreadsheetRenderer for JsonWorkbookRenderer {
    fn render(&self, document_text: &str, structured: &StructuredData) -> Result<Vec<u8>> {
        let workbook = self.build(document_text, structured);
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&workbook)?
        } else {
            serde_json::to_vec(&workbook)?
        };
        Ok(bytes)
    }
}

/// Date by category pivot with a trailing TOTAL row.
fn overview_sheet(items: &[ExtractedItem]) -> Sheet {
    let mut pivot: BTreeMap<&str, BTreeMap<&str, f64>> = BTreeMap::new();
    let mut categories = BTreeSet::new();

    for item in items {
        let category = if item.category.is_empty() {
            "Other"
        } else {
            item.category.as_str()
        };
        categories.insert(category);
        *pivot
            .entry(item.date.as_str())
            .or_default()
            .entry(category)
            .or_insert(0.0) += item.amount;
    }

    let mut columns = vec!["Date".to_string()];
    columns.extend(categories.iter().map(|c| c.to_string()));
    let mut sheet = Sheet::new(OVERVIEW_SHEET, columns);

    let mut totals = vec![0.0; categories.len()];
    for (date, by_category) in &pivot {
        let mut row = vec![json!(date)];
        for (i, category) in categories.iter().enumerate() {
            match by_category.get(category) {
                Some(amount) => {
                    totals[i] += amount;
                    row.push(json!(round2(*amount)));
                }
                None => row.push(json!("")),
            }
        }
        sheet.rows.push(row);
    }

    let mut total_row = vec![json!("TOTAL")];
    total_row.extend(totals.into_iter().map(|t| json!(round2(t))));
    sheet.rows.push(total_row);
    sheet
}

fn transactions_sheet(structured: &StructuredData) -> Sheet {
    let headers: Vec<String> = if structured.headers.is_empty() {
        DEFAULT_HEADERS.iter().map(|h| h.to_string()).collect()
    } else {
        structured.headers.clone()
    };
    let mut sheet = Sheet::new(
        TRANSACTIONS_SHEET,
        headers.iter().map(|h| h.to_uppercase()).collect(),
    );

    for item in &structured.items {
        let row = headers
            .iter()
            .map(|header| match header.to_lowercase().as_str() {
                "date" => json!(item.date),
                "description" => json!(item.description),
                "amount" => json!(item.amount),
                "category" => json!(item.category),
                "type" => json!(item.item_type),
                _ => json!(""),
            })
            .collect();
        sheet.rows.push(row);
    }
    sheet
}

fn text_sheet(text: &str) -> Sheet {
    let mut sheet = Sheet::new(TEXT_SHEET, vec!["Section".to_string(), "Content".to_string()]);
    let chars: Vec<char> = text.chars().collect();

    for (i, section) in chars.chunks(TEXT_SECTION_CHARS).enumerate() {
        let content: String = section.iter().collect();
        sheet.rows.push(vec![
            json!(format!("Section {}", i + 1)),
            json!(content.trim()),
        ]);
    }
    sheet
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(date: &str, amount: f64, category: &str) -> ExtractedItem {
        ExtractedItem {
            date: date.to_string(),
            description: "row".to_string(),
            amount,
            category: category.to_string(),
            item_type: "Expense".to_string(),
        }
    }

    fn data(items: Vec<ExtractedItem>) -> StructuredData {
        StructuredData {
            items,
            ..StructuredData::empty()
        }
    }

    #[test]
    fn test_overview_pivots_by_date_and_category() {
        let structured = data(vec![
            item("01/01/2025", 100.0, "Food"),
            item("01/01/2025", 50.5, "Food"),
            item("02/01/2025", 20.0, "Rent"),
        ]);
        let workbook = JsonWorkbookRenderer::default().build("", &structured);
        let overview = workbook.sheet(OVERVIEW_SHEET).unwrap();

        assert_eq!(overview.columns, vec!["Date", "Food", "Rent"]);
        assert_eq!(overview.rows[0], vec![json!("01/01/2025"), json!(150.5), json!("")]);
        assert_eq!(overview.rows[1], vec![json!("02/01/2025"), json!(""), json!(20.0)]);
        assert_eq!(overview.rows[2], vec![json!("TOTAL"), json!(150.5), json!(20.0)]);
    }

    #[test]
    fn test_no_items_means_text_sheet_only() {
        let workbook =
            JsonWorkbookRenderer::default().build("statement body", &StructuredData::empty());

        let names: Vec<&str> = workbook.sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec![TEXT_SHEET]);
    }

    #[test]
    fn test_text_sheet_splits_into_sections() {
        let text = "a".repeat(4500);
        let workbook = JsonWorkbookRenderer::default().build(&text, &StructuredData::empty());
        let sheet = workbook.sheet(TEXT_SHEET).unwrap();

        assert_eq!(sheet.rows.len(), 3);
        assert_eq!(sheet.rows[2][0], json!("Section 3"));
        assert_eq!(sheet.rows[2][1].as_str().unwrap().len(), 500);
    }

    #[test]
    fn test_render_produces_parseable_json() {
        let structured = data(vec![item("N/A", 12.0, "")]);
        let bytes = JsonWorkbookRenderer::new(true).render("text", &structured).unwrap();
        let workbook: Workbook = serde_json::from_slice(&bytes).unwrap();

        let transactions = workbook.sheet(TRANSACTIONS_SHEET).unwrap();
        assert_eq!(transactions.columns[0], "DATE");
        assert_eq!(transactions.rows[0][2], json!(12.0));
        assert_eq!(workbook.sheet(OVERVIEW_SHEET).unwrap().columns[1], "Other");
    }
}
