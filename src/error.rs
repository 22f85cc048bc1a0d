//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `CompressError` enum per categorizzare tutti gli errori possibili
//! - Distingue errori fatali (directory, report) da errori isolati per file
//! - Integra con `thiserror` per automatic error conversion
//!
//! ## Categorie di errori:
//! - `Filesystem`: Directory radice mancante o non leggibile (fatale)
//! - `ImageDecode`: Bytes di un'immagine non decodificabili (per file)
//! - `ImageEncode`: Errore del codec in scrittura (per file)
//! - `Workbook`: Struttura del pacchetto OOXML non valida (per file)
//! - `Zip` / `Xml` / `Io`: Errori delle librerie sottostanti (per file)
//! - `ReportWrite`: Impossibile creare il report (fatale, dopo il batch)
//! - `Validation`: Parametri di configurazione non validi
//! - `Task`: Worker bloccante terminato in modo anomalo
//!
//! ## Esempio:
//! ```rust,ignore
//! if !root.is_dir() {
//!     return Err(CompressError::filesystem(root, io::ErrorKind::NotFound.into()));
//! }
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Custom error types for workbook image compression
#[derive(thiserror::Error, Debug)]
pub enum CompressError {
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Image decode error: {0}")]
    ImageDecode(#[source] image::ImageError),

    #[error("Image encode error: {0}")]
    ImageEncode(String),

    #[error("Invalid workbook: {0}")]
    Workbook(String),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Report write error: {0}")]
    ReportWrite(String),

    #[error("Configuration error: {0}")]
    Validation(String),

    #[error("Worker task failed: {0}")]
    Task(String),
}

impl CompressError {
    pub fn filesystem(path: &Path, source: io::Error) -> Self {
        Self::Filesystem {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Fatal errors abort the whole run; everything else is recorded per file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Filesystem { .. } | Self::ReportWrite(_) | Self::Validation(_) | Self::Task(_)
        )
    }
}

impl From<quick_xml::events::attributes::AttrError> for CompressError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        Self::Xml(err.into())
    }
}

impl From<png::EncodingError> for CompressError {
    fn from(err: png::EncodingError) -> Self {
        Self::ImageEncode(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for CompressError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::ReportWrite(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let fs = CompressError::filesystem(Path::new("/missing"), io::ErrorKind::NotFound.into());
        assert!(fs.is_fatal());
        assert!(fs.to_string().contains("/missing"));

        assert!(CompressError::ReportWrite("denied".into()).is_fatal());
        assert!(!CompressError::Workbook("no sheets".into()).is_fatal());
        assert!(!CompressError::ImageEncode("boom".into()).is_fatal());
    }
}
