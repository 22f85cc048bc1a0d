//! # Progress Tracking Module
//!
//! Unifica progress bar e statistiche in un singolo sink thread-safe.
//! Gestisce sia output JSON che progress bar tradizionale.

use crate::{
    config::Config,
    json_output::JsonMessage,
    outcome::FileResult,
    progress::{BatchStats, ProgressManager, ProgressSink},
};
use std::sync::Mutex;

/// Progress sink used by the command line
pub struct ProgressTracker {
    json_output: bool,
    stats: Mutex<BatchStats>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    pub fn new(total_files: usize, config: &Config) -> Self {
        let progress_manager = if config.json_output {
            ProgressManager::hidden(total_files as u64)
        } else {
            ProgressManager::new(total_files as u64)
        };

        Self {
            json_output: config.json_output,
            stats: Mutex::new(BatchStats::new()),
            progress_manager,
        }
    }

    /// Snapshot of the statistics gathered so far
    pub fn stats(&self) -> BatchStats {
        match self.stats.lock() {
            Ok(stats) => stats.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Finalizza progress bar
    pub fn finish(&self) {
        self.progress_manager.finish(&self.stats().format_summary());
    }
}

impl ProgressSink for ProgressTracker {
    fn on_file_complete(&self, result: &FileResult) {
        match self.stats.lock() {
            Ok(mut stats) => stats.add(result),
            Err(poisoned) => poisoned.into_inner().add(result),
        }

        if self.json_output {
            JsonMessage::file_complete(result).emit();
        }

        let message = match &result.error {
            None => format!("[OK] {}: {} images", result.file_name(), result.images_updated),
            Some(_) => format!("[ERROR] {}: failed", result.file_name()),
        };
        self.progress_manager.set_message(&message);
    }

    fn on_progress(&self, done: usize, total: usize) {
        self.progress_manager.set_position(done as u64);

        if self.json_output {
            let stats = self.stats();
            JsonMessage::progress(done, total, &stats).emit();
        }
    }
}
