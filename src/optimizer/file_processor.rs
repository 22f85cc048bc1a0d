//! # File Processor Module
//!
//! Worker per l'elaborazione di un singolo workbook.
//! Separato dall'orchestratore per poter girare su un thread bloccante.
//!
//! ## Flusso:
//! 1. Dimensione originale
//! 2. Apertura del pacchetto
//! 3. Ri-codifica di ogni immagine, worksheet per worksheet
//! 4. Salvataggio solo se almeno un'immagine è stata aggiornata
//! 5. Nuova dimensione e tempo impiegato
//!
//! Il primo errore interrompe il file: nulla viene salvato e l'errore finisce
//! nel `FileResult`, mai oltre.

use crate::{
    config::Config,
    error::Result,
    file_manager::FileManager,
    image_processor::ImageProcessor,
    outcome::FileResult,
    workbook::{ImageRef, WorkbookPackage},
};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, warn};

/// Worker for a single workbook
#[derive(Clone)]
pub struct FileProcessor {
    config: Config,
    image_processor: ImageProcessor,
}

impl FileProcessor {
    pub fn new(config: Config) -> Self {
        let image_processor = ImageProcessor::new(config.clone());
        Self {
            config,
            image_processor,
        }
    }

    /// Process one workbook. Never fails: errors are recorded in the result.
    pub fn process(&self, path: &Path) -> FileResult {
        let start = Instant::now();

        let original_bytes = match FileManager::file_size(path) {
            Ok(size) => size,
            Err(e) => {
                warn!("Cannot stat {}: {}", path.display(), e);
                return FileResult::failure(path.to_path_buf(), 0.0, 0, elapsed_ms(start), e.to_string());
            }
        };
        let original_kb = FileManager::size_in_kb(original_bytes);

        let mut updated = 0;
        match self.reencode_workbook(path, &mut updated) {
            Ok(saved) => {
                let new_kb = if saved {
                    match FileManager::file_size(path) {
                        Ok(size) => FileManager::size_in_kb(size),
                        Err(e) => {
                            warn!("Cannot stat {} after saving: {}", path.display(), e);
                            original_kb
                        }
                    }
                } else {
                    original_kb
                };
                debug!(
                    "{}: {} images, {:.1} KB -> {:.1} KB",
                    path.display(),
                    updated,
                    original_kb,
                    new_kb
                );
                FileResult::success(path.to_path_buf(), original_kb, new_kb, updated, elapsed_ms(start))
            }
            Err(e) => {
                warn!("Failed to process {}: {}", path.display(), e);
                FileResult::failure(path.to_path_buf(), original_kb, updated, elapsed_ms(start), e.to_string())
            }
        }
    }

    /// Re-encode every image in place; returns whether the file was rewritten
    fn reencode_workbook(&self, path: &Path, updated: &mut usize) -> Result<bool> {
        let mut package = WorkbookPackage::open(path)?;
        let worksheets: Vec<_> = package.worksheets().to_vec();
        let mut replaced: HashMap<ImageRef, ImageRef> = HashMap::new();

        for worksheet in &worksheets {
            for image in &worksheet.images {
                if !replaced.contains_key(image) {
                    let data = package.image_data(image).ok_or_else(|| {
                        crate::error::CompressError::Workbook(format!(
                            "image part {} not found",
                            image.part
                        ))
                    })?;
                    let encoded = self.image_processor.reencode(data)?;
                    debug!(
                        "Sheet '{}': {} re-encoded as {}x{} {}",
                        worksheet.name,
                        image.part,
                        encoded.width,
                        encoded.height,
                        encoded.format.extension()
                    );
                    let stored = package.replace_image(image, &encoded)?;
                    replaced.insert(image.clone(), stored);
                }
                *updated += 1;
            }
        }

        if *updated == 0 {
            debug!("No images in {}, leaving it untouched", path.display());
            return Ok(false);
        }
        if self.config.dry_run {
            debug!("Dry run: not writing {}", path.display());
            return Ok(false);
        }

        package.save(path)?;
        Ok(true)
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{
        corrupt_media, corrupt_part, image_bytes, map_entries, workbook_bytes, write_workbook,
    };
    use image::ImageFormat;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_zero_images_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("plain.xlsx");
        write_workbook(&path, &[vec![], vec![]]);
        let before = fs::read(&path).unwrap();

        let result = FileProcessor::new(Config::default()).process(&path);

        assert!(result.is_success());
        assert_eq!(result.images_updated, 0);
        assert_eq!(result.new_size_kb, result.original_size_kb);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_images_are_counted_per_reference() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pics.xlsx");
        let png = image_bytes(ImageFormat::Png, 64, 48, 1);
        let jpg = image_bytes(ImageFormat::Jpeg, 40, 40, 2);
        write_workbook(&path, &[vec![png, jpg], vec![image_bytes(ImageFormat::Png, 10, 10, 3)]]);

        let result = FileProcessor::new(Config::default()).process(&path);

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.images_updated, 3);
        assert!(result.elapsed_ms >= 0.0);

        let package = WorkbookPackage::open(&path).unwrap();
        for worksheet in package.worksheets() {
            for image in &worksheet.images {
                let data = package.image_data(image).unwrap();
                assert_eq!(ImageProcessor::read_resolution(data), Some((96, 96)));
            }
        }
    }

    #[test]
    fn test_corrupt_image_fails_without_writing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.xlsx");
        let bytes = workbook_bytes(&[vec![image_bytes(ImageFormat::Png, 16, 16, 4)]]);
        fs::write(&path, corrupt_media(&bytes)).unwrap();
        let before = fs::read(&path).unwrap();

        let result = FileProcessor::new(Config::default()).process(&path);

        assert!(!result.is_success());
        assert!(!result.error.as_deref().unwrap_or_default().is_empty());
        assert_eq!(result.new_size_kb, result.original_size_kb);
        assert_eq!(result.images_updated, 0);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_corrupt_second_sheet_keeps_first_count_and_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("half.xlsx");
        let bytes = workbook_bytes(&[
            vec![image_bytes(ImageFormat::Png, 16, 16, 6)],
            vec![image_bytes(ImageFormat::Png, 16, 16, 7)],
        ]);
        fs::write(&path, corrupt_part(&bytes, "xl/media/image2.png")).unwrap();
        let before = fs::read(&path).unwrap();

        let result = FileProcessor::new(Config::default()).process(&path);

        assert!(!result.is_success());
        assert_eq!(result.images_updated, 1);
        assert_eq!(result.new_size_kb, result.original_size_kb);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_converted_image_follows_upper_case_reference() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shouty.xlsx");
        let bytes = workbook_bytes(&[vec![image_bytes(ImageFormat::Bmp, 20, 20, 8)]]);
        let bytes = map_entries(&bytes, |name, data| {
            if name == "xl/drawings/_rels/drawing1.xml.rels" {
                String::from_utf8(data)
                    .unwrap()
                    .replace("../media/image1.bmp", "../media/IMAGE1.BMP")
                    .into_bytes()
            } else {
                data
            }
        });
        fs::write(&path, bytes).unwrap();

        let result = FileProcessor::new(Config::default()).process(&path);
        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.images_updated, 1);

        let package = WorkbookPackage::open(&path).unwrap();
        assert_eq!(package.image_count(), 1);
        let image = &package.worksheets()[0].images[0];
        assert_eq!(image.part, "xl/media/image1.png");
        assert!(package.image_data(image).is_some());
        assert!(!package.part_names().any(|name| name.ends_with(".bmp")));
    }

    #[test]
    fn test_not_a_workbook_is_a_file_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fake.xlsx");
        fs::write(&path, b"definitely not a zip").unwrap();

        let result = FileProcessor::new(Config::default()).process(&path);

        assert_eq!(result.status(), "Failed");
        assert_eq!(result.new_size_kb, result.original_size_kb);
    }

    #[test]
    fn test_dry_run_does_not_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dry.xlsx");
        write_workbook(&path, &[vec![image_bytes(ImageFormat::Png, 32, 32, 5)]]);
        let before = fs::read(&path).unwrap();

        let config = Config {
            dry_run: true,
            ..Config::default()
        };
        let result = FileProcessor::new(config).process(&path);

        assert!(result.is_success());
        assert_eq!(result.images_updated, 1);
        assert_eq!(result.new_size_kb, result.original_size_kb);
        assert_eq!(fs::read(&path).unwrap(), before);
    }
}
