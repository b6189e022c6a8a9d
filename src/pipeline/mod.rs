// file: src/pipeline/mod.rs
// description: chunking and incremental analysis pipeline exports
// reference: pipeline orchestration

pub mod intake;
pub mod merger;
pub mod orchestrator;
pub mod progress;
pub mod scanner;
pub mod splitter;
pub mod worker;

pub use intake::{DocumentIntake, IntakeReceipt};
pub use merger::ResultMerger;
pub use orchestrator::{
    AnalysisOrchestrator, CompletionState, Dispatch, DispatchMode, OrchestratorOptions,
};
pub use progress::{AnalysisStats, ProgressTracker};
pub use scanner::{PdfScanner, ScannedFile};
pub use splitter::ChunkSplitter;
pub use worker::{ChunkAnalysisWorker, WorkerOutcome};
