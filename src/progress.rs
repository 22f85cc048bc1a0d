//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce il progress tracking e le statistiche del batch.
//!
//! ## Responsabilità:
//! - Trait `ProgressSink` che riceve `(done, total)` dopo ogni workbook
//! - Progress bar visuale con `indicatif` per feedback real-time
//! - Statistiche aggregate (file elaborati, falliti, KB risparmiati, immagini)
//!
//! ## Componenti principali:
//! - `ProgressSink`: Interfaccia del runner verso l'esterno (closure incluse)
//! - `ProgressManager`: Gestisce la progress bar principale
//! - `BatchStats`: Traccia statistiche cumulative
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:00:12] [========================>---------------] 6/10 (60%) [OK] q1.xlsx: 3 images
//! ```
//!
//! ## Esempio:
//! ```rust,ignore
//! let progress = ProgressManager::new(total_files);
//! let mut stats = BatchStats::new();
//!
//! // Per ogni workbook:
//! stats.add(&result);
//! progress.set_position(done);
//! progress.set_message("q1.xlsx");
//!
//! // Alla fine:
//! progress.finish(&stats.format_summary());
//! ```

use crate::outcome::FileResult;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Receives batch progress after every attempted workbook
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, done: usize, total: usize);

    /// Called with the finished result, right before `on_progress`
    fn on_file_complete(&self, _result: &FileResult) {}
}

impl<F> ProgressSink for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, done: usize, total: usize) {
        self(done, total)
    }
}

/// Sink that discards every notification
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _done: usize, _total: usize) {}
}

/// Manages the terminal progress bar
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// Progress manager that draws nothing (JSON mode, tests)
    pub fn hidden(total_files: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total_files);
        Self { bar }
    }

    /// Move the bar to `done` without touching the message
    pub fn set_position(&self, done: u64) {
        self.bar.set_position(done);
    }

    /// Set a custom message without incrementing
    pub fn set_message(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Create a spinner for indeterminate progress
    pub fn spinner(message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();

        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }

        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));

        spinner
    }
}

/// Statistics tracker for a batch
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BatchStats {
    pub files_processed: usize,
    pub files_modified: usize,
    pub files_unchanged: usize,
    pub errors: usize,
    pub images_updated: usize,
    pub total_original_kb: f64,
    pub total_new_kb: f64,
}

impl BatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_results(results: &[FileResult]) -> Self {
        let mut stats = Self::new();
        for result in results {
            stats.add(result);
        }
        stats
    }

    pub fn add(&mut self, result: &FileResult) {
        self.files_processed += 1;
        self.images_updated += result.images_updated;
        self.total_original_kb += result.original_size_kb;
        self.total_new_kb += result.new_size_kb;

        if !result.is_success() {
            self.errors += 1;
        } else if result.new_size_kb != result.original_size_kb {
            self.files_modified += 1;
        } else {
            self.files_unchanged += 1;
        }
    }

    pub fn kb_saved(&self) -> f64 {
        self.total_original_kb - self.total_new_kb
    }

    pub fn overall_reduction_percent(&self) -> f64 {
        crate::file_manager::FileManager::calculate_reduction(
            self.total_original_kb,
            self.total_new_kb,
        )
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Modified: {} | Unchanged: {} | Errors: {} | Images: {} | Saved: {} ({:.2}%)",
            self.files_processed,
            self.files_modified,
            self.files_unchanged,
            self.errors,
            self.images_updated,
            crate::file_manager::FileManager::format_size((self.kb_saved().max(0.0) * 1024.0) as u64),
            self.overall_reduction_percent()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_closure_is_a_sink() {
        let calls = AtomicUsize::new(0);
        let sink = |done: usize, total: usize| {
            assert!(done <= total);
            calls.fetch_add(1, Ordering::SeqCst);
        };
        sink.on_progress(1, 2);
        sink.on_progress(2, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stats_aggregate() {
        let results = vec![
            FileResult::success(PathBuf::from("a.xlsx"), 100.0, 40.0, 3, 10.0),
            FileResult::success(PathBuf::from("b.xlsm"), 20.0, 20.0, 0, 1.0),
            FileResult::failure(PathBuf::from("c.xlsx"), 30.0, 1, 2.0, "bad image".into()),
        ];
        let stats = BatchStats::from_results(&results);

        assert_eq!(stats.files_processed, 3);
        assert_eq!(stats.files_modified, 1);
        assert_eq!(stats.files_unchanged, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.images_updated, 4);
        assert_eq!(stats.kb_saved(), 60.0);
        assert_eq!(stats.overall_reduction_percent(), 40.0);
        assert!(stats.format_summary().contains("Errors: 1"));
    }

    #[test]
    fn test_hidden_manager_tracks_position() {
        let progress = ProgressManager::hidden(3);
        progress.set_position(2);
        progress.set_message("b.xlsx");
        assert_eq!(progress.position(), 2);
        progress.set_position(3);
        assert_eq!(progress.position(), 3);
        progress.finish("done");
    }
}
