//! # Outcome Module
//!
//! Risultati prodotti dalla pipeline.
//!
//! ## Strutture dati:
//! - `FileResult`: esito di un singolo workbook (dimensioni, immagini, tempo, errore)
//! - `BatchOutcome`: esito di un'intera esecuzione (file elaborati, path del report)
//!
//! ## Invarianti:
//! - Un file fallito riporta `new_size_kb == original_size_kb`
//! - `images_updated` conta solo le immagini ri-codificate prima dell'errore

use crate::file_manager::FileManager;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Information about one processed workbook
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub path: PathBuf,
    pub original_size_kb: f64,
    pub new_size_kb: f64,
    pub images_updated: usize,
    pub elapsed_ms: f64,
    pub error: Option<String>,
    pub processed_at: DateTime<Local>,
}

impl FileResult {
    pub fn success(
        path: PathBuf,
        original_size_kb: f64,
        new_size_kb: f64,
        images_updated: usize,
        elapsed_ms: f64,
    ) -> Self {
        Self {
            path,
            original_size_kb,
            new_size_kb,
            images_updated,
            elapsed_ms,
            error: None,
            processed_at: Local::now(),
        }
    }

    /// A failed file is reported unchanged
    pub fn failure(
        path: PathBuf,
        original_size_kb: f64,
        images_updated: usize,
        elapsed_ms: f64,
        error: String,
    ) -> Self {
        Self {
            path,
            original_size_kb,
            new_size_kb: original_size_kb,
            images_updated,
            elapsed_ms,
            error: Some(error),
            processed_at: Local::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn status(&self) -> &'static str {
        if self.is_success() {
            "Success"
        } else {
            "Failed"
        }
    }

    pub fn reduction_percent(&self) -> f64 {
        FileManager::calculate_reduction(self.original_size_kb, self.new_size_kb)
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Path relative to `root`, or `.` when the file sits directly in it
    pub fn display_path(&self, root: &Path) -> String {
        match self.path.strip_prefix(root) {
            Ok(relative) if relative.parent().map_or(true, |p| p.as_os_str().is_empty()) => {
                ".".to_string()
            }
            Ok(relative) => relative.to_string_lossy().replace('\\', "/"),
            Err(_) => self.path.to_string_lossy().into_owned(),
        }
    }
}

/// Terminal value of a batch run
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub files_processed: usize,
    pub report_path: PathBuf,
    pub results: Vec<FileResult>,
}

impl BatchOutcome {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}
