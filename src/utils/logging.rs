// file: src/utils/logging.rs
// description: tracing subscriber setup and colored CLI status lines
// reference: https://docs.rs/tracing-subscriber

use crate::models::{AnalysisStatus, ChunkingStatus};
use colored::*;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Installs the global subscriber. `RUST_LOG` wins over the verbosity flag.
pub fn init_logger(colored_output: bool, verbose: bool) {
    let default_directives = if verbose {
        "debug,sqlx=warn,hyper=info,reqwest=info"
    } else {
        "info,sqlx=warn"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(verbose)
        .with_line_number(verbose)
        .compact()
        .with_ansi(colored_output);

    // a second call (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

pub fn format_success(msg: &str) -> String {
    format!("{} {}", "✓".green().bold(), msg.green())
}

pub fn format_error(msg: &str) -> String {
    format!("{} {}", "✗".red().bold(), msg.red())
}

pub fn format_warning(msg: &str) -> String {
    format!("{} {}", "⚠".yellow().bold(), msg.yellow())
}

pub fn format_info(msg: &str) -> String {
    format!("{} {}", "ℹ".blue().bold(), msg)
}

pub fn format_chunk_status(status: AnalysisStatus) -> ColoredString {
    match status {
        AnalysisStatus::Pending => status.as_str().dimmed(),
        AnalysisStatus::Processing => status.as_str().cyan(),
        AnalysisStatus::Completed => status.as_str().green(),
        AnalysisStatus::Failed => status.as_str().red(),
    }
}

pub fn format_document_status(status: ChunkingStatus) -> ColoredString {
    match status {
        ChunkingStatus::None | ChunkingStatus::Chunked => status.as_str().dimmed(),
        ChunkingStatus::Analyzing => status.as_str().cyan(),
        ChunkingStatus::Completed => status.as_str().green(),
        ChunkingStatus::Failed => status.as_str().red(),
    }
}

pub fn format_amount(amount: f64, currency: &str) -> String {
    format!("{} {:.2}", currency, amount)
}
