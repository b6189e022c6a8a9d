// file: src/utils/validation.rs
// description: upload and input validation helpers
// reference: input validation patterns

use crate::error::{PipelineError, Result};
use std::path::Path;

const PDF_MAGIC: &[u8] = b"%PDF-";

pub struct Validator;

impl Validator {
    pub fn validate_file_path(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PipelineError::Validation(format!(
                "File does not exist: {}",
                path.display()
            )));
        }

        if !path.is_file() {
            return Err(PipelineError::Validation(format!(
                "Path is not a file: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_directory(path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(PipelineError::Validation(format!(
                "Directory does not exist: {}",
                path.display()
            )));
        }

        if !path.is_dir() {
            return Err(PipelineError::Validation(format!(
                "Path is not a directory: {}",
                path.display()
            )));
        }

        Ok(())
    }

    pub fn validate_pdf_extension(name: &str) -> Result<()> {
        let is_pdf = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if !is_pdf {
            return Err(PipelineError::Validation(format!(
                "File must be a PDF: {}",
                name
            )));
        }
        Ok(())
    }

    pub fn validate_file_size(size: u64, max_bytes: u64) -> Result<()> {
        if size == 0 {
            return Err(PipelineError::Validation("File is empty".to_string()));
        }

        if size > max_bytes {
            return Err(PipelineError::Validation(format!(
                "File size must be less than {}MB",
                max_bytes / 1_048_576
            )));
        }
        Ok(())
    }

    pub fn validate_pdf_header(bytes: &[u8]) -> Result<()> {
        if !bytes.starts_with(PDF_MAGIC) {
            return Err(PipelineError::UnreadablePdf(
                "missing %PDF- header".to_string(),
            ));
        }
        Ok(())
    }

    pub fn validate_content_not_empty(content: &str) -> Result<()> {
        if content.trim().is_empty() {
            return Err(PipelineError::EmptyContent(
                "no text could be extracted from the PDF".to_string(),
            ));
        }
        Ok(())
    }

    /// Keeps only the final path component and replaces characters that are
    /// awkward in file names.
    pub fn sanitize_file_name(name: &str) -> String {
        let base = name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(name)
            .trim();

        base.chars()
            .map(|c| match c {
                ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect()
    }

    pub fn truncate_text(text: &str, max_chars: usize) -> String {
        match text.char_indices().nth(max_chars) {
            Some((offset, _)) => format!("{}...", &text[..offset]),
            None => text.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_validate_file_path() {
        let temp = TempDir::new().unwrap();
        let file_path = temp.path().join("statement.pdf");
        fs::write(&file_path, "%PDF-1.4").unwrap();

        assert!(Validator::validate_file_path(&file_path).is_ok());
        assert!(Validator::validate_file_path(temp.path()).is_err());
        assert!(Validator::validate_file_path(Path::new("/nonexistent/file.pdf")).is_err());
    }

    #[test]
    fn test_validate_directory() {
        let temp = TempDir::new().unwrap();
        assert!(Validator::validate_directory(temp.path()).is_ok());
        assert!(Validator::validate_directory(Path::new("/nonexistent")).is_err());
    }

    #[test]
    fn test_validate_pdf_extension() {
        assert!(Validator::validate_pdf_extension("statement.pdf").is_ok());
        assert!(Validator::validate_pdf_extension("STATEMENT.PDF").is_ok());
        assert!(Validator::validate_pdf_extension("statement.docx").is_err());
        assert!(Validator::validate_pdf_extension("pdf").is_err());
    }

    #[test]
    fn test_validate_file_size() {
        let limit = 10 * 1_048_576;
        assert!(Validator::validate_file_size(2048, limit).is_ok());
        assert!(Validator::validate_file_size(0, limit).is_err());
        assert!(Validator::validate_file_size(limit + 1, limit).is_err());
    }

    #[test]
    fn test_validate_pdf_header() {
        assert!(Validator::validate_pdf_header(b"%PDF-1.7\n...").is_ok());
        assert!(matches!(
            Validator::validate_pdf_header(b"PK\x03\x04"),
            Err(PipelineError::UnreadablePdf(_))
        ));
    }

    #[test]
    fn test_validate_content_not_empty() {
        assert!(Validator::validate_content_not_empty("Salary 5000").is_ok());
        assert!(matches!(
            Validator::validate_content_not_empty(" \n "),
            Err(PipelineError::EmptyContent(_))
        ));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(
            Validator::sanitize_file_name("C:\\Users\\me\\bank.pdf"),
            "bank.pdf"
        );
        assert_eq!(Validator::sanitize_file_name("/tmp/a:b?.pdf"), "a_b_.pdf");
        assert_eq!(Validator::sanitize_file_name("  plain.pdf "), "plain.pdf");
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(Validator::truncate_text("short", 10), "short");
        assert_eq!(
            Validator::truncate_text("this is a very long text", 10),
            "this is a ..."
        );
        assert_eq!(Validator::truncate_text("₹₹₹₹", 2), "₹₹...");
    }
}
