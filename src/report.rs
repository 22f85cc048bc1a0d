//! # Report Module
//!
//! Questo modulo scrive il workbook di riepilogo alla fine del batch.
//!
//! ## Responsabilità:
//! - Una riga per ogni `FileResult`, nell'ordine di discovery
//! - Riga dei totali opzionale con rapporto di compressione
//! - Nome file con timestamp, mai sovrascritto
//!
//! ## Layout:
//! ```text
//! Date | Orig Size (KB) | New Size (KB) | Img Count | Path | File | Time (ms) | Status | Error Message
//! ```
//!
//! ## Gestione errori:
//! Ogni errore diventa `CompressError::ReportWrite`, fatale per il batch.

use crate::error::{CompressError, Result};
use crate::outcome::FileResult;
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const REPORT_SHEET: &str = "Report";

pub const HEADERS: [&str; 9] = [
    "Date",
    "Orig Size (KB)",
    "New Size (KB)",
    "Img Count",
    "Path",
    "File",
    "Time (ms)",
    "Status",
    "Error Message",
];

const COLUMN_WIDTHS: [f64; 9] = [20.0, 14.0, 14.0, 10.0, 30.0, 30.0, 12.0, 10.0, 50.0];

const COL_DATE: u16 = 0;
const COL_ORIG: u16 = 1;
const COL_NEW: u16 = 2;
const COL_IMAGES: u16 = 3;
const COL_PATH: u16 = 4;
const COL_FILE: u16 = 5;
const COL_TIME: u16 = 6;
const COL_STATUS: u16 = 7;
const COL_ERROR: u16 = 8;

/// Writes the summary workbook
pub struct ReportWriter;

impl ReportWriter {
    /// Write the report for `results` into `root` and return its path
    pub fn write(results: &[FileResult], root: &Path, include_totals: bool) -> Result<PathBuf> {
        Self::write_at(results, root, include_totals, Local::now())
    }

    pub(crate) fn write_at(
        results: &[FileResult],
        root: &Path,
        include_totals: bool,
        timestamp: DateTime<Local>,
    ) -> Result<PathBuf> {
        let bytes = Self::build(results, root, include_totals)?;
        let stem = timestamp.format("report_%Y%m%d_%H%M%S").to_string();
        let path = Self::create_unique(root, &stem, |file| {
            file.write_all(&bytes)?;
            file.sync_all()
        })?;
        info!("Report written to {}", path.display());
        Ok(path)
    }

    /// Render the report workbook in memory
    pub fn build(results: &[FileResult], root: &Path, include_totals: bool) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();
        let header = Format::new().set_bold();
        let decimal = Format::new().set_num_format("0.0");
        let percent = Format::new().set_num_format("0.0%");
        let total_label = Format::new().set_bold();

        let sheet = workbook.add_worksheet();
        sheet.set_name(REPORT_SHEET)?;

        for (col, title) in HEADERS.iter().enumerate() {
            sheet.write_string_with_format(0, col as u16, *title, &header)?;
            sheet.set_column_width(col as u16, COLUMN_WIDTHS[col])?;
        }

        let mut row: u32 = 1;
        for result in results {
            let date = result.processed_at.format("%Y-%m-%d %H:%M:%S").to_string();
            sheet.write_string(row, COL_DATE, date)?;
            sheet.write_number_with_format(row, COL_ORIG, result.original_size_kb, &decimal)?;
            sheet.write_number_with_format(row, COL_NEW, result.new_size_kb, &decimal)?;
            sheet.write_number_with_format(row, COL_IMAGES, result.images_updated as f64, &decimal)?;
            sheet.write_string(row, COL_PATH, result.display_path(root))?;
            sheet.write_string(row, COL_FILE, result.file_name())?;
            sheet.write_number_with_format(row, COL_TIME, result.elapsed_ms, &decimal)?;
            sheet.write_string(row, COL_STATUS, result.status())?;
            if let Some(error) = &result.error {
                sheet.write_string(row, COL_ERROR, error.as_str())?;
            }
            row += 1;
        }

        if include_totals {
            let totals = Totals::of(results);
            sheet.write_string_with_format(row, COL_DATE, "Total", &total_label)?;
            sheet.write_number_with_format(row, COL_ORIG, totals.original_kb, &decimal)?;
            sheet.write_number_with_format(row, COL_NEW, totals.new_kb, &decimal)?;
            sheet.write_number_with_format(row, COL_IMAGES, totals.images as f64, &decimal)?;
            sheet.write_number_with_format(row, COL_TIME, totals.elapsed_ms, &decimal)?;
            sheet.write_number_with_format(row, COL_STATUS, totals.ratio(), &percent)?;
        }

        debug!("Report rendered with {} data rows", results.len());
        Ok(workbook.save_to_buffer()?)
    }

    fn create_unique(
        root: &Path,
        stem: &str,
        fill: impl Fn(&mut File) -> std::io::Result<()>,
    ) -> Result<PathBuf> {
        let mut counter = 0;
        loop {
            let name = if counter == 0 {
                format!("{}.xlsx", stem)
            } else {
                format!("{}_{}.xlsx", stem, counter)
            };
            let path = root.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = fill(&mut file) {
                        drop(file);
                        // A truncated report would be picked up as a broken workbook next run.
                        if let Err(cleanup) = std::fs::remove_file(&path) {
                            warn!("Could not remove partial report {}: {}", path.display(), cleanup);
                        }
                        return Err(CompressError::ReportWrite(format!(
                            "{}: {}",
                            path.display(),
                            e
                        )));
                    }
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => counter += 1,
                Err(e) => {
                    return Err(CompressError::ReportWrite(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }
    }
}

/// Column sums for the totals row
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Totals {
    pub original_kb: f64,
    pub new_kb: f64,
    pub images: usize,
    pub elapsed_ms: f64,
}

impl Totals {
    pub fn of(results: &[FileResult]) -> Self {
        results.iter().fold(Self::default(), |mut acc, r| {
            acc.original_kb += r.original_size_kb;
            acc.new_kb += r.new_size_kb;
            acc.images += r.images_updated;
            acc.elapsed_ms += r.elapsed_ms;
            acc
        })
    }

    /// `new / original`, 0 when nothing was measured
    pub fn ratio(&self) -> f64 {
        if self.original_kb > 0.0 {
            self.new_kb / self.original_kb
        } else {
            0.0
        }
    }
}
