// file: src/pipeline/progress.rs
// description: terminal progress for document intake and chunk analysis
// reference: uses indicatif for progress bars and tracks analysis counters

use crate::models::{AnalysisProgress, ChunkingStatus, Document};
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct AnalysisStats {
    pub documents_completed: usize,
    pub documents_failed: usize,
    pub items_extracted: usize,
    pub total_bytes_processed: u64,
    pub duration_secs: u64,
}

impl AnalysisStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success_rate(&self) -> f64 {
        let total = self.documents_completed + self.documents_failed;
        if total == 0 {
            return 0.0;
        }
        (self.documents_completed as f64 / total as f64) * 100.0
    }

    pub fn documents_per_minute(&self) -> f64 {
        if self.duration_secs == 0 {
            return 0.0;
        }
        (self.documents_completed + self.documents_failed) as f64 * 60.0
            / self.duration_secs as f64
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} completed, {} failed, {} items extracted ({:.1}% success)",
            self.documents_completed.to_string().green(),
            self.documents_failed.to_string().red(),
            self.items_extracted,
            self.success_rate()
        )
    }
}

pub struct ProgressTracker {
    documents_bar: ProgressBar,
    chunks_bar: ProgressBar,
    documents_completed: AtomicUsize,
    documents_failed: AtomicUsize,
    items_extracted: AtomicUsize,
    bytes_processed: AtomicU64,
    start_time: Instant,
}

impl ProgressTracker {
    pub fn new(total_documents: usize) -> Self {
        Self::with_color(total_documents, true)
    }

    pub fn with_color(total_documents: usize, colored: bool) -> Self {
        let multi_progress = MultiProgress::new();

        Self {
            documents_bar: create_documents_bar(&multi_progress, total_documents as u64, colored),
            chunks_bar: create_chunks_bar(&multi_progress, colored),
            documents_completed: AtomicUsize::new(0),
            documents_failed: AtomicUsize::new(0),
            items_extracted: AtomicUsize::new(0),
            bytes_processed: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Counts a document whose analysis has settled.
    pub fn record_document(&self, document: &Document) {
        if document.chunking_status == ChunkingStatus::Failed {
            self.documents_failed.fetch_add(1, Ordering::SeqCst);
        } else {
            self.documents_completed.fetch_add(1, Ordering::SeqCst);
        }
        self.items_extracted
            .fetch_add(document.items_extracted(), Ordering::SeqCst);
        self.bytes_processed
            .fetch_add(document.file_size, Ordering::SeqCst);
        self.documents_bar.inc(1);
    }

    /// Counts a file rejected before a document could be created.
    pub fn record_rejected(&self) {
        self.documents_failed.fetch_add(1, Ordering::SeqCst);
        self.documents_bar.inc(1);
    }

    pub fn update_chunks(&self, progress: &AnalysisProgress) {
        self.chunks_bar.set_length(progress.total as u64);
        self.chunks_bar.set_position(progress.resolved() as u64);
        self.chunks_bar.set_message(format!(
            "processing: {} | failed: {}",
            progress.processing, progress.failed
        ));
    }

    pub fn set_message(&self, message: String) {
        self.documents_bar.set_message(message);
    }

    pub fn finish(&self) {
        self.documents_bar.finish_with_message("Analysis complete");
        self.chunks_bar.finish_and_clear();
    }

    pub fn get_stats(&self) -> AnalysisStats {
        AnalysisStats {
            documents_completed: self.documents_completed.load(Ordering::SeqCst),
            documents_failed: self.documents_failed.load(Ordering::SeqCst),
            items_extracted: self.items_extracted.load(Ordering::SeqCst),
            total_bytes_processed: self.bytes_processed.load(Ordering::SeqCst),
            duration_secs: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Drop for ProgressTracker {
    fn drop(&mut self) {
        if !self.documents_bar.is_finished() {
            self.finish();
        }
    }
}

fn bar_style(template: &str, chars: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars)
}

fn create_documents_bar(multi_progress: &MultiProgress, total: u64, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(total));
    bar.set_style(if colored {
        bar_style(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} documents {msg}",
            "█▓▒░",
        )
    } else {
        bar_style(
            "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} documents {msg}",
            "=>-",
        )
    });
    bar
}

fn create_chunks_bar(multi_progress: &MultiProgress, colored: bool) -> ProgressBar {
    let bar = multi_progress.add(ProgressBar::new(0));
    bar.set_style(if colored {
        bar_style("  chunks [{bar:30.green/white}] {pos}/{len} {msg}", "█▓▒░")
    } else {
        bar_style("  chunks [{bar:30}] {pos}/{len} {msg}", "=>-")
    });
    bar
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_rates() {
        let stats = AnalysisStats {
            documents_completed: 9,
            documents_failed: 1,
            duration_secs: 120,
            ..AnalysisStats::new()
        };

        assert!((stats.success_rate() - 90.0).abs() < 1e-9);
        assert!((stats.documents_per_minute() - 5.0).abs() < 1e-9);
        assert_eq!(AnalysisStats::new().documents_per_minute(), 0.0);
    }

    #[test]
    fn test_tracker_records_documents() {
        let tracker = ProgressTracker::with_color(3, false);

        let mut done = Document::new("a.pdf", "text".to_string(), 1, 100, 10);
        done.chunking_status = ChunkingStatus::Completed;
        let mut failed = Document::new("b.pdf", "text".to_string(), 1, 50, 10);
        failed.chunking_status = ChunkingStatus::Failed;

        tracker.record_document(&done);
        tracker.record_document(&failed);
        tracker.record_rejected();
        tracker.update_chunks(&AnalysisProgress::from_counts(0, 1, 2, 0));

        let stats = tracker.get_stats();
        assert_eq!(stats.documents_completed, 1);
        assert_eq!(stats.documents_failed, 2);
        assert_eq!(stats.total_bytes_processed, 150);
    }
}
