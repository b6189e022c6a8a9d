// file: src/pipeline/scanner.rs
// description: discovers PDF files for batch intake
// reference: https://docs.rs/walkdir

use crate::error::Result;
use crate::models::Document;
use crate::utils::Validator;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
}

pub struct PdfScanner {
    max_file_size: u64,
}

impl PdfScanner {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// PDFs under `root`, sorted by path. Hidden entries and files over the
    /// size limit are skipped.
    pub fn scan_directory(&self, root: &Path) -> Result<Vec<ScannedFile>> {
        Validator::validate_directory(root)?;
        info!("Scanning for PDFs in {}", root.display());

        let mut files = Vec::new();
        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let file_name = Validator::sanitize_file_name(&entry.file_name().to_string_lossy());
            if Validator::validate_pdf_extension(&file_name).is_err() {
                continue;
            }

            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            let size = metadata.len();
            if Validator::validate_file_size(size, self.max_file_size).is_err() {
                debug!("Skipping {} ({} bytes)", path.display(), size);
                continue;
            }

            files.push(ScannedFile {
                path: path.to_path_buf(),
                file_name,
                size,
            });
        }

        info!("Found {} PDF files", files.len());
        Ok(files)
    }

    /// Drops files whose name and size match a document already ingested.
    pub fn filter_new(&self, files: Vec<ScannedFile>, existing: &[Document]) -> Vec<ScannedFile> {
        files
            .into_iter()
            .filter(|file| {
                let seen = existing
                    .iter()
                    .any(|doc| doc.original_name == file.file_name && doc.file_size == file.size);
                if seen {
                    debug!("Skipping already ingested {}", file.path.display());
                }
                !seen
            })
            .collect()
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}
