//! # JSON Output Module
//!
//! Questo modulo gestisce l'output strutturato in JSON per l'uso da altri programmi.
//!
//! ## Responsabilità:
//! - Emette un oggetto JSON per riga su stdout per ogni evento del batch
//! - Riusa `FileResult` e `BatchStats` senza strutture parallele
//! - Fornisce interfaccia standardizzata per comunicazione inter-processo
//!
//! ## Tipi di messaggi:
//! - `start`: Inizio del batch
//! - `progress`: Progresso corrente (file elaborati, stats)
//! - `file_complete`: Fine elaborazione di un workbook
//! - `complete`: Fine del batch con statistiche e path del report
//! - `error`: Errore fatale

use crate::config::Config;
use crate::outcome::{BatchOutcome, FileResult};
use crate::progress::BatchStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Tipo di messaggio JSON
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JsonMessage {
    /// Inizio del batch
    #[serde(rename = "start")]
    Start {
        input_dir: PathBuf,
        total_files: usize,
        config: JsonConfig,
    },

    /// Progresso corrente
    #[serde(rename = "progress")]
    Progress {
        current: usize,
        total: usize,
        percentage: f64,
        errors: usize,
        images_updated: usize,
        kb_saved: f64,
    },

    /// Fine elaborazione di un workbook
    #[serde(rename = "file_complete")]
    FileComplete {
        path: PathBuf,
        original_size_kb: f64,
        new_size_kb: f64,
        images_updated: usize,
        elapsed_ms: f64,
        reduction_percent: f64,
        error: Option<String>,
    },

    /// Batch completato
    #[serde(rename = "complete")]
    Complete {
        files_processed: usize,
        errors: usize,
        images_updated: usize,
        kb_saved: f64,
        average_reduction: f64,
        duration_seconds: f64,
        report_path: PathBuf,
    },

    /// Errore fatale
    #[serde(rename = "error")]
    Error {
        message: String,
        details: Option<String>,
    },
}

/// Configurazione per output JSON
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonConfig {
    pub jpeg_quality: u8,
    pub target_dpi: u32,
    pub max_dimension: Option<u32>,
    pub workers: usize,
    pub dry_run: bool,
}

impl JsonMessage {
    /// Emette il messaggio JSON su stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    pub fn start(input_dir: PathBuf, total_files: usize, config: &Config) -> Self {
        Self::Start {
            input_dir,
            total_files,
            config: JsonConfig::from(config),
        }
    }

    pub fn progress(current: usize, total: usize, stats: &BatchStats) -> Self {
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            0.0
        };

        Self::Progress {
            current,
            total,
            percentage,
            errors: stats.errors,
            images_updated: stats.images_updated,
            kb_saved: stats.kb_saved(),
        }
    }

    pub fn file_complete(result: &FileResult) -> Self {
        Self::FileComplete {
            path: result.path.clone(),
            original_size_kb: result.original_size_kb,
            new_size_kb: result.new_size_kb,
            images_updated: result.images_updated,
            elapsed_ms: result.elapsed_ms,
            reduction_percent: result.reduction_percent(),
            error: result.error.clone(),
        }
    }

    pub fn complete(outcome: &BatchOutcome, duration_seconds: f64) -> Self {
        let stats = BatchStats::from_results(&outcome.results);
        Self::Complete {
            files_processed: outcome.files_processed,
            errors: stats.errors,
            images_updated: stats.images_updated,
            kb_saved: stats.kb_saved(),
            average_reduction: stats.overall_reduction_percent(),
            duration_seconds,
            report_path: outcome.report_path.clone(),
        }
    }

    pub fn error(message: String, details: Option<String>) -> Self {
        Self::Error { message, details }
    }
}

impl From<&Config> for JsonConfig {
    fn from(config: &Config) -> Self {
        Self {
            jpeg_quality: config.jpeg_quality,
            target_dpi: config.target_dpi,
            max_dimension: config.max_dimension,
            workers: config.workers,
            dry_run: config.dry_run,
        }
    }
}
