//! # Workbook Image Compressor Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per i test di integrazione
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom, fatali e per file
//! - `file_manager`: Discovery dei workbook e utilità sui file
//! - `image_processor`: Ri-codifica delle immagini (JPEG/PNG, DPI)
//! - `workbook`: Pacchetto OOXML, relationships e media incorporati
//! - `optimizer`: Orchestratore del batch e worker per file
//! - `outcome`: Risultati per file e per batch
//! - `report`: Workbook di riepilogo
//! - `progress`: Progress tracking e statistiche
//! - `json_output`: Eventi JSON su stdout
//!
//! ## Utilizzo:
//! ```rust,ignore
//! use workbook_image_compressor::{BatchRunner, Config, NoProgress};
//!
//! let runner = BatchRunner::new(Config::default())?;
//! let outcome = runner.run(&path, &NoProgress).await?;
//! println!("{} files, report at {}", outcome.files_processed, outcome.report_path.display());
//! ```

pub mod config;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod json_output;
pub mod optimizer;
pub mod outcome;
pub mod progress;
pub mod report;
pub mod workbook;

#[cfg(test)]
mod test_support;

pub use config::{Config, PngCompression};
pub use error::CompressError;
pub use file_manager::FileManager;
pub use optimizer::{BatchRunner, FileProcessor, ProgressTracker};
pub use outcome::{BatchOutcome, FileResult};
pub use progress::{NoProgress, ProgressSink};
pub use report::ReportWriter;
pub use workbook::WorkbookPackage;
