// file: src/exporter/json.rs
// description: writes rendered workbooks for analysed documents to disk

use crate::error::{PipelineError, Result};
use crate::exporter::SpreadsheetRenderer;
use crate::models::{Document, StructuredData};
use chrono::Utc;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

pub struct JsonExporter {
    output_dir: PathBuf,
    renderer: Box<dyn SpreadsheetRenderer>,
}

#[derive(Debug, Serialize)]
pub struct ExportManifest {
    pub exported_at: String,
    pub total_documents: usize,
    pub skipped: Vec<Uuid>,
    pub files: Vec<String>,
}

impl JsonExporter {
    pub fn new(
        output_dir: impl Into<PathBuf>,
        renderer: Box<dyn SpreadsheetRenderer>,
    ) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir).map_err(|e| PipelineError::FileOperation {
            path: output_dir.clone(),
            source: e,
        })?;
        Ok(Self {
            output_dir,
            renderer,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes `<stem>_extracted_<timestamp>.json`. Documents still without
    /// structured data are exported with an empty dataset.
    pub fn export_document(&self, document: &Document) -> Result<PathBuf> {
        let empty = StructuredData::empty();
        let structured = document.structured_data.as_ref().unwrap_or(&empty);
        let bytes = self.renderer.render(&document.extracted_text, structured)?;

        let path = self.output_dir.join(export_file_name(&document.original_name));
        fs::write(&path, bytes).map_err(|e| PipelineError::FileOperation {
            path: path.clone(),
            source: e,
        })?;

        info!("Exported {} to {}", document.original_name, path.display());
        Ok(path)
    }

    pub fn export_all(&self, documents: &[Document]) -> Result<ExportManifest> {
        info!("Starting export of {} documents to {:?}", documents.len(), self.output_dir);

        let mut files = Vec::new();
        let mut skipped = Vec::new();
        for document in documents {
            if document.structured_data.is_none() {
                warn!("Skipping {}: no structured data yet", document.id);
                skipped.push(document.id);
                continue;
            }
            let path = self.export_document(document)?;
            files.push(path.display().to_string());
        }

        let manifest = ExportManifest {
            exported_at: Utc::now().to_rfc3339(),
            total_documents: files.len(),
            skipped,
            files,
        };

        let manifest_path = self.output_dir.join("manifest.json");
        fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?).map_err(|e| {
            PipelineError::FileOperation {
                path: manifest_path.clone(),
                source: e,
            }
        })?;

        info!("Export complete: {} documents exported", manifest.total_documents);
        Ok(manifest)
    }
}

fn export_file_name(original_name: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "document".to_string());
    format!("{}_extracted_{}.json", stem, Utc::now().format("%Y%m%d%H%M%S%3f"))
}
