// file: src/exporter/mod.rs
// description: spreadsheet rendering and export of analysed documents
// reference: internal module structure

pub mod json;
pub mod workbook;

pub use json::{ExportManifest, JsonExporter};
pub use workbook::{
    JsonWorkbookRenderer, OVERVIEW_SHEET, Sheet, TEXT_SHEET, TRANSACTIONS_SHEET, Workbook,
};

use crate::error::Result;
use crate::models::StructuredData;

/// Turns a document's text and structured data into spreadsheet bytes.
pub trait SpreadsheetRenderer: Send + Sync {
    fn render(&self, document_text: &str, structured: &StructuredData) -> Result<Vec<u8>>;
}
