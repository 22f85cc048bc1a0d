//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei workbook e le utilità sui file.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva dei workbook Excel in una directory
//! - Esclusione dei lock file creati da Excel (`~$nome.xlsx`)
//! - Ordine stabile dei risultati (ordinamento per nome in ogni directory)
//! - Path assoluti anche quando la radice è relativa
//! - I link simbolici a workbook non vengono seguiti
//! - Utilità per dimensioni file, KB e percentuali
//!
//! ## Formati supportati:
//! - **Workbook**: XLSX, XLSM (estensione case-insensitive)
//!
//! ## Gestione errori:
//! - Directory radice mancante o illeggibile: `CompressError::Filesystem` (fatale)
//! - Entry illeggibili nelle sottodirectory: warning e skip
//!
//! ## Esempio:
//! ```rust,ignore
//! let files = FileManager::find_workbooks(Path::new("/path/to/reports"))?;
//! for file in files {
//!     let size = FileManager::file_size(&file)?;
//! }
//! ```

use crate::error::{CompressError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extensions recognised as workbooks
pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm"];

/// Prefix of the transient files spreadsheet editors keep next to open documents
pub const LOCK_FILE_PREFIX: &str = "~$";

/// Manages file operations and discovery
pub struct FileManager;

impl FileManager {
    /// Find all workbooks below `root`, in a stable order
    pub fn find_workbooks(root: &Path) -> Result<Vec<PathBuf>> {
        let metadata = std::fs::metadata(root).map_err(|e| CompressError::filesystem(root, e))?;
        if !metadata.is_dir() {
            return Err(CompressError::filesystem(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }
        // Surface permission problems on the root itself instead of returning an empty list.
        std::fs::read_dir(root).map_err(|e| CompressError::filesystem(root, e))?;
        let root = Self::absolute(root)?;
        let root = root.as_path();

        let mut files = Vec::new();

        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    if e.depth() == 0 {
                        let source = e
                            .into_io_error()
                            .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                        return Err(CompressError::filesystem(root, source));
                    }
                    warn!("Skipping unreadable entry below {}: {}", root.display(), e);
                    continue;
                }
            };

            if !Self::is_workbook(entry.path()) {
                continue;
            }
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            } else if entry.path_is_symlink() {
                debug!("Skipping symlinked workbook {}", entry.path().display());
            }
        }

        debug!("Discovered {} workbooks under {}", files.len(), root.display());
        Ok(files)
    }

    /// `root` as an absolute path, without resolving symlinks
    pub fn absolute(root: &Path) -> Result<PathBuf> {
        std::path::absolute(root).map_err(|e| CompressError::filesystem(root, e))
    }

    /// Check if a path names a workbook that should be processed
    pub fn is_workbook(path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if name.starts_with(LOCK_FILE_PREFIX) {
            return false;
        }

        match path.extension() {
            Some(ext) => {
                let ext = ext.to_string_lossy();
                WORKBOOK_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known))
            }
            None => false,
        }
    }

    /// Size of a file in bytes
    pub fn file_size(path: &Path) -> Result<u64> {
        Ok(std::fs::metadata(path)?.len())
    }

    /// Convert bytes to kilobytes
    pub fn size_in_kb(bytes: u64) -> f64 {
        bytes as f64 / 1024.0
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }

    /// Calculate percentage reduction
    pub fn calculate_reduction(original_size: f64, new_size: f64) -> f64 {
        if original_size <= 0.0 {
            0.0
        } else {
            ((original_size - new_size) / original_size) * 100.0
        }
    }
}
