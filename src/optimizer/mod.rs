//! # Optimizer Module
//!
//! Separa le responsabilità del batch in sottomoduli:
//! - `batch_runner`: Orchestratore principale (discovery, workbook, report)
//! - `file_processor`: Worker per singoli workbook
//! - `progress_tracker`: Sink di progresso per la command line

pub mod batch_runner;
pub mod file_processor;
pub mod progress_tracker;

pub use batch_runner::BatchRunner;
pub use file_processor::FileProcessor;
pub use progress_tracker::ProgressTracker;
