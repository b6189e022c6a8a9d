// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures::stream::{self, StreamExt};
use ledger_lens::models::summary_keys;
use ledger_lens::pipeline::ScannedFile;
use ledger_lens::utils::logging::{
    format_amount, format_chunk_status, format_document_status, format_error, format_info,
    format_success, format_warning,
};
use ledger_lens::{
    AnalysisOrchestrator, AnalysisStore, Config, Document, DocumentIntake, DocumentStore,
    GeminiExtractor, HealthCheck, HealthReport, JsonExporter, JsonWorkbookRenderer,
    OperationTimer, OrchestratorOptions, PdfScanner, PdfTextExtractor, ProgressTracker,
    SchemaManager, SqliteStore, Validator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "ledger_lens")]
#[command(author = "cipher")]
#[command(version = "0.1.0")]
#[command(about = "Chunked financial data extraction for PDF statements", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one PDF and wait for its analysis
    Analyze { file: PathBuf },

    /// Analyse every new PDF under a directory
    Scan {
        dir: PathBuf,

        #[arg(long, value_name = "NUM")]
        limit: Option<usize>,
    },

    /// Chunk progress of a document
    Status { document_id: Uuid },

    /// Per-chunk summaries of a document
    Chunks { document_id: Uuid },

    /// Write a document's workbook to disk
    Export {
        document_id: Option<Uuid>,

        #[arg(short, long, default_value = "./exports")]
        output: PathBuf,

        #[arg(short, long)]
        pretty: bool,
    },

    /// List stored documents
    Documents,

    /// Fail chunks stuck in pending or processing
    Reconcile {
        #[arg(long, value_name = "SECS")]
        older_than: Option<u64>,
    },

    Verify {
        #[arg(long)]
        create_schema: bool,
    },

    Reset {
        #[arg(long)]
        confirm: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    ledger_lens::utils::logging::init_logger(cli.color, cli.verbose);
    colored::control::set_override(cli.color);

    info!("Ledger Lens financial extraction pipeline");
    info!("Loading configuration from: {}", cli.config.display());

    let config = if cli.config.exists() {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
        Config::load(None).unwrap_or_else(|e| {
            warn!("Falling back to built-in defaults: {}", e);
            let mut config = Config::default_config();
            config.extraction.gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
            config
        })
    };

    match cli.command {
        Commands::Analyze { file } => {
            cmd_analyze(&config, &file, cli.color).await?;
        }
        Commands::Scan { dir, limit } => {
            cmd_scan(&config, &dir, limit, cli.color).await?;
        }
        Commands::Status { document_id } => {
            cmd_status(&config, document_id).await?;
        }
        Commands::Chunks { document_id } => {
            cmd_chunks(&config, document_id).await?;
        }
        Commands::Export {
            document_id,
            output,
            pretty,
        } => {
            cmd_export(&config, document_id, output, pretty).await?;
        }
        Commands::Documents => {
            cmd_documents(&config).await?;
        }
        Commands::Reconcile { older_than } => {
            cmd_reconcile(&config, older_than).await?;
        }
        Commands::Verify { create_schema } => {
            cmd_verify(&config, create_schema).await?;
        }
        Commands::Reset { confirm } => {
            cmd_reset(&config, confirm).await?;
        }
    }

    Ok(())
}

async fn open_store(config: &Config) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::connect(&config.database)
        .await
        .context("Failed to open SQLite database")?;

    if !store.ping().await? {
        error!("Cannot connect to SQLite");
        return Err(anyhow::anyhow!("Database connection failed"));
    }

    Ok(Arc::new(store))
}

fn build_orchestrator(config: &Config, store: Arc<SqliteStore>) -> Result<AnalysisOrchestrator> {
    if config.extraction.gemini_api_key.is_none() {
        warn!("No Gemini API key configured; every analysis will fail");
    }

    let extractor =
        GeminiExtractor::new(&config.extraction).context("Failed to build Gemini client")?;
    let options = OrchestratorOptions::from_config(config);
    let orchestrator = AnalysisOrchestrator::new(store, Arc::new(extractor), options)
        .context("Failed to build orchestrator")?;
    Ok(orchestrator)
}

fn build_intake(config: &Config, store: Arc<SqliteStore>) -> Result<DocumentIntake> {
    let orchestrator = build_orchestrator(config, store.clone())?;
    Ok(DocumentIntake::new(
        store,
        Arc::new(PdfTextExtractor::new()),
        orchestrator,
        config.pipeline.max_file_size_bytes(),
    ))
}

async fn cmd_analyze(config: &Config, file: &Path, color: bool) -> Result<()> {
    Validator::validate_file_path(file)?;
    let store = open_store(config).await?;
    let intake = build_intake(config, store.clone())?;

    let timer = OperationTimer::new("analyze");
    let receipt = intake
        .ingest_file(file)
        .await
        .with_context(|| format!("Failed to ingest {}", file.display()))?;

    println!("{}", format_success(&receipt.message));
    println!("  document id: {}", receipt.document.id);

    info!("Dispatched {} analysis task(s)", receipt.dispatch.task_count());

    let tracker = ProgressTracker::with_color(1, color);
    tracker.set_message(receipt.document.original_name.clone());

    let document_id = receipt.document.id;
    let mut waiting = tokio::spawn(receipt.dispatch.wait());
    loop {
        let progress = intake.orchestrator().analysis_status(document_id).await?;
        tracker.update_chunks(&progress);

        tokio::select! {
            _ = &mut waiting => break,
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }
    }

    let document = store
        .get_document(document_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Document {} disappeared", document_id))?;
    tracker.record_document(&document);
    tracker.finish();

    timer.finish_with_items(document.items_extracted());
    print_document_result(&document, &config.merge.currency);
    Ok(())
}

async fn cmd_scan(config: &Config, dir: &Path, limit: Option<usize>, color: bool) -> Result<()> {
    info!("Scanning {} for statements", dir.display());
    let start_time = Instant::now();

    let store = open_store(config).await?;
    let scanner = PdfScanner::new(config.pipeline.max_file_size_bytes());
    let files = scanner
        .scan_directory(dir)
        .context("Failed to scan directory")?;

    let existing = store.list_documents().await?;
    let mut files = scanner.filter_new(files, &existing);
    if let Some(limit) = limit {
        files.truncate(limit);
    }

    if files.is_empty() {
        println!("{}", format_info("No new PDFs to analyse"));
        return Ok(());
    }
    info!("Found {} new files to analyse", files.len());

    let intake = Arc::new(build_intake(config, store.clone())?);
    let tracker = Arc::new(ProgressTracker::with_color(files.len(), color));
    let parallel_intake = config.pipeline.parallel_intake.max(1);

    let results = stream::iter(files.into_iter().map(|file| {
        let intake = Arc::clone(&intake);
        let store = store.clone();
        let tracker = Arc::clone(&tracker);

        async move {
            let result = analyze_scanned(&intake, store.as_ref(), &file).await;
            match &result {
                Ok(document) => tracker.record_document(document),
                Err(_) => tracker.record_rejected(),
            }
            (file, result)
        }
    }))
    .buffer_unordered(parallel_intake)
    .collect::<Vec<_>>()
    .await;

    tracker.finish();

    for (file, result) in results {
        match result {
            Ok(document) => info!(
                "Analysed: {} ({} items, {})",
                file.file_name,
                document.items_extracted(),
                document.chunking_status
            ),
            Err(e) => error!("Failed to analyse {}: {}", file.file_name, e),
        }
    }

    let stats = tracker.get_stats();
    println!("{}", stats.summary_line());
    info!("Scan complete in {:.2}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

async fn analyze_scanned(
    intake: &DocumentIntake,
    store: &dyn AnalysisStore,
    file: &ScannedFile,
) -> Result<Document> {
    let receipt = intake.ingest_file(&file.path).await?;
    let document_id = receipt.document.id;
    receipt.dispatch.wait().await;

    store
        .get_document(document_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Document {} disappeared", document_id))
}

async fn cmd_status(config: &Config, document_id: Uuid) -> Result<()> {
    let store = open_store(config).await?;
    let document = store
        .get_document(document_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Document {} not found", document_id))?;
    let orchestrator = build_orchestrator(config, store)?;
    let progress = orchestrator.analysis_status(document_id).await?;

    println!("{} ({})", document.original_name, format_document_status(document.chunking_status));
    println!(
        "  chunks: {} total, {} completed, {} processing, {} pending, {} failed",
        progress.total, progress.completed, progress.processing, progress.pending, progress.failed
    );
    println!("  progress: {}%", progress.percent_complete);

    if progress.is_complete {
        println!("{}", format_success("Analysis complete"));
    } else if let Some(partial) = orchestrator.current_result(document_id).await? {
        println!(
            "{}",
            format_info(&format!("{} items extracted so far", partial.items.len()))
        );
    }

    println!("{}", serde_json::to_string_pretty(&progress)?);
    Ok(())
}

async fn cmd_chunks(config: &Config, document_id: Uuid) -> Result<()> {
    let store = open_store(config).await?;
    let orchestrator = build_orchestrator(config, store)?;
    let summaries = orchestrator.list_chunk_summaries(document_id).await?;

    if summaries.is_empty() {
        println!("{}", format_info("Document was analysed without chunking"));
        return Ok(());
    }

    for summary in summaries {
        println!(
            "#{:<3} pages {:>4}-{:<4} {:<10} {:>4} items {}",
            summary.chunk_number,
            summary.start_page,
            summary.end_page,
            format_chunk_status(summary.analysis_status),
            summary.items_extracted,
            summary
                .analyzed_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn cmd_export(
    config: &Config,
    document_id: Option<Uuid>,
    output: PathBuf,
    pretty: bool,
) -> Result<()> {
    info!("Initializing workbook export");
    let store = open_store(config).await?;
    let exporter = JsonExporter::new(output, Box::new(JsonWorkbookRenderer::new(pretty)))?;

    if let Some(document_id) = document_id {
        let orchestrator = build_orchestrator(config, store.clone())?;
        let mut document = store
            .get_document(document_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Document {} not found", document_id))?;
        if let Some(current) = orchestrator.current_result(document_id).await? {
            document.structured_data = Some(current);
        }

        let path = exporter.export_document(&document)?;
        println!("{}", format_success(&format!("Exported to {}", path.display())));
    } else {
        let documents = store.list_documents().await?;
        let manifest = exporter.export_all(&documents)?;
        info!("Export complete: {} files generated", manifest.files.len());
        if !manifest.skipped.is_empty() {
            println!(
                "{}",
                format_warning(&format!("{} documents had no data yet", manifest.skipped.len()))
            );
        }
    }

    Ok(())
}

async fn cmd_documents(config: &Config) -> Result<()> {
    let store = open_store(config).await?;
    let documents = store.list_documents().await?;

    if documents.is_empty() {
        println!("{}", format_info("No documents stored"));
        return Ok(());
    }

    for document in documents {
        println!(
            "{} {:<40} {:>4} pages {:>3} chunks {:<10} {:>5} items",
            document.id,
            Validator::truncate_text(&document.original_name, 40),
            document.page_count,
            document.total_chunks,
            format_document_status(document.chunking_status),
            document.items_extracted()
        );
    }
    Ok(())
}

async fn cmd_reconcile(config: &Config, older_than: Option<u64>) -> Result<()> {
    let store = open_store(config).await?;
    let orchestrator = build_orchestrator(config, store)?;

    let max_age = older_than
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.pipeline.stale_after());
    if max_age <= config.extraction.timeout() {
        warn!(
            "Stale window {}s is not longer than the extraction timeout; \
             in-flight chunks may be failed",
            max_age.as_secs()
        );
    }
    if config.pipeline.max_concurrent_chunks > 0 {
        warn!(
            "Chunk concurrency is capped at {}; pending chunks get {}s per queue round \
             before they count as stuck",
            config.pipeline.max_concurrent_chunks,
            max_age.as_secs()
        );
    }

    let failed = orchestrator.reconcile_stale_chunks(max_age).await?;
    if failed == 0 {
        println!("{}", format_success("No stuck chunks"));
    } else {
        println!("{}", format_warning(&format!("Marked {} stuck chunks as failed", failed)));
    }
    Ok(())
}

async fn cmd_verify(config: &Config, create_schema: bool) -> Result<()> {
    info!("Verifying database schema");

    let timer = OperationTimer::new("verify");
    let store = open_store(config).await?;
    let schema_manager = SchemaManager::new(&store);

    let mut checks = Vec::new();
    if schema_manager.verify_schema().await? {
        checks.push(HealthCheck::healthy("schema", timer.elapsed()));
    } else if create_schema {
        info!("Creating schema");
        schema_manager
            .initialize()
            .await
            .context("Failed to create schema")?;
        checks.push(HealthCheck::healthy("schema", timer.elapsed()));
    } else {
        checks.push(HealthCheck::unhealthy(
            "schema",
            "tables missing, use --create-schema".to_string(),
            timer.elapsed(),
        ));
    }

    checks.push(match config.extraction.gemini_api_key {
        Some(_) => HealthCheck::healthy("gemini_api_key", timer.elapsed()),
        None => HealthCheck::degraded(
            "gemini_api_key",
            "not configured".to_string(),
            timer.elapsed(),
        ),
    });

    let report = HealthReport::new(checks, env!("CARGO_PKG_VERSION"));
    println!("{}", report.format());
    timer.finish();

    if !report.is_healthy() {
        println!("{}", format_error("Verification found problems"));
    }
    Ok(())
}

async fn cmd_reset(config: &Config, confirm: bool) -> Result<()> {
    if !confirm {
        error!("This will delete all documents and chunks. Use --confirm to proceed");
        return Ok(());
    }

    warn!("Resetting database - all data will be lost");

    let store = open_store(config).await?;
    let schema_manager = SchemaManager::new(&store);
    schema_manager
        .drop_all_tables()
        .await
        .context("Failed to drop tables")?;

    info!("All tables dropped");

    schema_manager
        .initialize()
        .await
        .context("Failed to recreate schema")?;

    info!("Schema recreated - database reset complete");
    Ok(())
}

fn print_document_result(document: &Document, currency: &str) {
    let Some(data) = &document.structured_data else {
        println!("{}", format_error("No data could be extracted"));
        return;
    };

    println!(
        "{} {}",
        document.original_name,
        format_document_status(document.chunking_status)
    );
    if let Some(status) = data.summary_text(summary_keys::STATUS) {
        println!("  status: {}", status);
    }
    println!("  items: {}", data.items.len());
    println!(
        "  income: {}",
        format_amount(data.summary_number(summary_keys::TOTAL_INCOME), currency)
    );
    println!(
        "  expenses: {}",
        format_amount(data.summary_number(summary_keys::TOTAL_EXPENSES), currency)
    );
}
