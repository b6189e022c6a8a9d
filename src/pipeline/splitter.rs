// file: src/pipeline/splitter.rs
// description: divides extracted document text into fixed-size page-range chunks
// reference: uniform character density page approximation

use crate::error::{PipelineError, Result};
use crate::models::ChunkDescriptor;

pub const DEFAULT_PAGES_PER_CHUNK: u32 = 10;

/// Splits documents into chunks of `pages_per_chunk` pages.
///
/// Extracted text carries no reliable page markers, so each chunk's text is
/// estimated by assuming characters are spread evenly across pages. Page
/// ranges are exact; text boundaries are an approximation and may cut a
/// transaction that straddles two chunks.
#[derive(Debug, Clone, Copy)]
pub struct ChunkSplitter {
    pages_per_chunk: u32,
}

impl ChunkSplitter {
    pub fn new(pages_per_chunk: u32) -> Result<Self> {
        if pages_per_chunk == 0 {
            return Err(PipelineError::Validation(
                "pages_per_chunk must be greater than 0".to_string(),
            ));
        }
        Ok(Self { pages_per_chunk })
    }

    pub fn pages_per_chunk(&self) -> u32 {
        self.pages_per_chunk
    }

    pub fn should_chunk(&self, total_pages: u32) -> bool {
        total_pages > self.pages_per_chunk
    }

    pub fn chunk_count(&self, total_pages: u32) -> u32 {
        total_pages.div_ceil(self.pages_per_chunk)
    }

    pub fn split(&self, text: &str, total_pages: u32) -> Result<Vec<ChunkDescriptor>> {
        if total_pages == 0 {
            return Err(PipelineError::ChunkSplit(
                "document reports zero pages".to_string(),
            ));
        }

        // byte offset of every char boundary, plus the end of the text
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_len = boundaries.len() - 1;
        let chars_per_page = char_len.div_ceil(total_pages as usize);
        let k = self.pages_per_chunk;

        let descriptors = (0..self.chunk_count(total_pages))
            .map(|index| {
                let start_page = index * k + 1;
                let end_page = ((index + 1) * k).min(total_pages);
                let page_count = end_page - start_page + 1;

                let char_start = (index as usize * k as usize * chars_per_page).min(char_len);
                let char_end = (char_start + page_count as usize * chars_per_page).min(char_len);

                ChunkDescriptor {
                    chunk_number: index + 1,
                    start_page,
                    end_page,
                    page_count,
                    extracted_text: text[boundaries[char_start]..boundaries[char_end]].to_string(),
                }
            })
            .collect();

        Ok(descriptors)
    }
}

impl Default for ChunkSplitter {
    fn default() -> Self {
        Self {
            pages_per_chunk: DEFAULT_PAGES_PER_CHUNK,
        }
    }
}
