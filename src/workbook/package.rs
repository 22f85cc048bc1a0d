//! # Workbook Package Module
//!
//! Un workbook `.xlsx`/`.xlsm` è un archivio zip di parti XML e media.
//! Questo modulo carica tutte le parti in memoria, risolve quali immagini
//! appartengono a quale worksheet e riscrive il pacchetto.
//!
//! ## Catena di risoluzione:
//! ```text
//! _rels/.rels ──officeDocument──▶ xl/workbook.xml ──<sheet r:id>──▶ xl/worksheets/sheetN.xml
//!     ──drawing──▶ xl/drawings/drawingN.xml ──image──▶ xl/media/imageN.png
//! ```
//!
//! ## Garanzie:
//! - Le parti non toccate vengono riscritte byte per byte (inclusi VBA e firme)
//! - Ordine delle entry e metodo di compressione preservati
//! - Salvataggio atomico: file temporaneo nella stessa directory + rename

use super::relationships::{
    self, parse_relationships, parse_sheets, rels_part_for, resolve_target, Relationship,
    CONTENT_TYPES_PART, ROOT_RELS_PART,
};
use crate::error::{CompressError, Result};
use crate::image_processor::EncodedImage;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Maximum inflated size of a single part
pub const MAX_PART_BYTES: u64 = 256 * 1024 * 1024;

/// Maximum inflated size of the whole package
pub const MAX_PACKAGE_BYTES: u64 = 1024 * 1024 * 1024;

const DEFAULT_WORKBOOK_PART: &str = "xl/workbook.xml";

/// Media that are not raster images and are never re-encoded
const VECTOR_EXTENSIONS: &[&str] = &["emf", "wmf", "emz", "wmz", "svg"];

/// Handle on one embedded image part
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub part: String,
}

impl ImageRef {
    pub fn extension(&self) -> &str {
        part_extension(&self.part)
    }
}

/// A worksheet (or chartsheet) and the images drawn on it, in relationship order
#[derive(Debug, Clone)]
pub struct Worksheet {
    pub name: String,
    pub part: String,
    pub images: Vec<ImageRef>,
}

#[derive(Debug, Clone)]
struct PackagePart {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
}

/// In-memory OOXML workbook package
#[derive(Debug, Clone)]
pub struct WorkbookPackage {
    parts: Vec<PackagePart>,
    worksheets: Vec<Worksheet>,
}

fn part_extension(part: &str) -> &str {
    let file = part.rsplit('/').next().unwrap_or(part);
    match file.rsplit_once('.') {
        Some((_, ext)) => ext,
        None => "",
    }
}

fn is_raster(part: &str) -> bool {
    let ext = part_extension(part);
    !VECTOR_EXTENSIONS
        .iter()
        .any(|vector| ext.eq_ignore_ascii_case(vector))
}

impl WorkbookPackage {
    /// Read a workbook from disk
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Parse a workbook held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());
        let mut total: u64 = 0;

        for index in 0..archive.len() {
            let file = archive.by_index(index)?;
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            let compression = match file.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };

            let mut data = Vec::with_capacity(file.size().min(MAX_PART_BYTES) as usize);
            file.take(MAX_PART_BYTES + 1).read_to_end(&mut data)?;
            if data.len() as u64 > MAX_PART_BYTES {
                return Err(CompressError::Workbook(format!(
                    "part {} exceeds {} bytes",
                    name, MAX_PART_BYTES
                )));
            }
            total += data.len() as u64;
            if total > MAX_PACKAGE_BYTES {
                return Err(CompressError::Workbook(format!(
                    "package exceeds {} bytes once inflated",
                    MAX_PACKAGE_BYTES
                )));
            }

            parts.push(PackagePart {
                name,
                data,
                compression,
            });
        }

        let mut package = Self {
            parts,
            worksheets: Vec::new(),
        };
        package.worksheets = package.discover_worksheets()?;
        Ok(package)
    }

    pub fn worksheets(&self) -> &[Worksheet] {
        &self.worksheets
    }

    /// Number of image references across all worksheets
    pub fn image_count(&self) -> usize {
        self.worksheets.iter().map(|ws| ws.images.len()).sum()
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        let name = name.strip_prefix('/').unwrap_or(name);
        self.parts
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.parts.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
            .map(|p| p.data.as_slice())
    }

    /// Name under which `name` is actually stored (producers disagree on case)
    fn stored_name(&self, name: &str) -> Option<String> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .or_else(|| self.parts.iter().find(|p| p.name.eq_ignore_ascii_case(name)))
            .map(|p| p.name.clone())
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    fn part_mut(&mut self, name: &str) -> Option<&mut PackagePart> {
        self.parts.iter_mut().find(|p| p.name == name)
    }

    /// Raw bytes of an embedded image
    pub fn image_data(&self, image: &ImageRef) -> Option<&[u8]> {
        self.part(&image.part)
    }

    fn relationships_of(&self, part: &str) -> Result<Vec<Relationship>> {
        match self.part(&rels_part_for(part)) {
            Some(xml) => parse_relationships(xml),
            None => Ok(Vec::new()),
        }
    }

    fn main_workbook_part(&self) -> Result<String> {
        if self.part(ROOT_RELS_PART).is_some() {
            let office_document = self
                .relationships_of("")?
                .into_iter()
                .find(|rel| rel.is_type("officeDocument") && !rel.external);
            if let Some(rel) = office_document {
                return Ok(resolve_target("", &rel.target));
            }
        }
        Ok(DEFAULT_WORKBOOK_PART.to_string())
    }

    fn discover_worksheets(&self) -> Result<Vec<Worksheet>> {
        let workbook_part = self.main_workbook_part()?;
        let workbook_xml = self.part(&workbook_part).ok_or_else(|| {
            CompressError::Workbook(format!("missing workbook part {}", workbook_part))
        })?;

        let sheets = parse_sheets(workbook_xml)?;
        let workbook_rels = self.relationships_of(&workbook_part)?;
        let mut worksheets = Vec::with_capacity(sheets.len());

        for (name, rel_id) in sheets {
            let Some(rel) = workbook_rels.iter().find(|rel| rel.id == rel_id) else {
                warn!("Sheet '{}' references unknown relationship {}", name, rel_id);
                continue;
            };
            let part = resolve_target(&workbook_part, &rel.target);
            let images = self.images_of(&part)?;
            debug!("Sheet '{}' ({}) has {} images", name, part, images.len());
            worksheets.push(Worksheet { name, part, images });
        }

        Ok(worksheets)
    }

    fn images_of(&self, sheet_part: &str) -> Result<Vec<ImageRef>> {
        let mut images = Vec::new();

        for drawing_rel in self.relationships_of(sheet_part)? {
            if drawing_rel.external || !drawing_rel.is_type("drawing") {
                continue;
            }
            let drawing_part = resolve_target(sheet_part, &drawing_rel.target);

            for image_rel in self.relationships_of(&drawing_part)? {
                if image_rel.external || !image_rel.is_type("image") {
                    continue;
                }
                let target = resolve_target(&drawing_part, &image_rel.target);
                let Some(media) = self.stored_name(&target) else {
                    warn!("Drawing {} points at missing media {}", drawing_part, target);
                    continue;
                };
                if !is_raster(&media) {
                    debug!("Skipping vector media {}", media);
                    continue;
                }
                images.push(ImageRef { part: media });
            }
        }

        Ok(images)
    }

    /// Put a re-encoded image in place of `image`.
    ///
    /// When the encoded format does not match the part's extension the part
    /// is renamed and every reference to it (relationships, content types,
    /// worksheet handles) follows. Returns the handle of the stored image.
    pub fn replace_image(&mut self, image: &ImageRef, encoded: &EncodedImage) -> Result<ImageRef> {
        if self.part(&image.part).is_none() {
            return Err(CompressError::Workbook(format!(
                "image part {} not found",
                image.part
            )));
        }

        if encoded.format.matches_extension(image.extension()) {
            if let Some(part) = self.part_mut(&image.part) {
                part.data = encoded.bytes.clone();
            }
            return Ok(image.clone());
        }

        let new_name = self.free_part_name(&image.part, encoded.format.extension());
        debug!("Renaming {} -> {}", image.part, new_name);

        for part in self.parts.iter_mut() {
            if part.name == image.part {
                part.name = new_name.clone();
                part.data = encoded.bytes.clone();
            }
        }

        for index in 0..self.parts.len() {
            let Some(source) = relationships::source_part_for(&self.parts[index].name) else {
                continue;
            };
            if let Some(xml) = relationships::retarget_relationships(
                &self.parts[index].data,
                &source,
                &image.part,
                &new_name,
            )? {
                self.parts[index].data = xml;
            }
        }

        if let Some(content_types) = self.part_mut(CONTENT_TYPES_PART) {
            content_types.data = relationships::update_content_types(
                &content_types.data,
                &image.part,
                &new_name,
                encoded.format.extension(),
                encoded.format.content_type(),
            )?;
        }

        for worksheet in self.worksheets.iter_mut() {
            for handle in worksheet.images.iter_mut() {
                if handle.part == image.part {
                    handle.part = new_name.clone();
                }
            }
        }

        Ok(ImageRef { part: new_name })
    }

    fn free_part_name(&self, part: &str, extension: &str) -> String {
        let ext = part_extension(part);
        let stem = if ext.is_empty() {
            part
        } else {
            &part[..part.len() - ext.len() - 1]
        };

        let mut candidate = format!("{}.{}", stem, extension);
        let mut counter = 1;
        while self.part(&candidate).is_some() {
            candidate = format!("{}_{}.{}", stem, counter, extension);
            counter += 1;
        }
        candidate
    }

    /// Serialize the package back into zip bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

        for part in &self.parts {
            let options = SimpleFileOptions::default()
                .compression_method(part.compression)
                .large_file(part.data.len() as u64 >= u32::MAX as u64);
            zip.start_file(part.name.as_str(), options)?;
            zip.write_all(&part.data)?;
        }

        Ok(zip.finish()?.into_inner())
    }

    /// Overwrite `path` atomically with the current package
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        if let Ok(metadata) = std::fs::metadata(path) {
            std::fs::set_permissions(temp.path(), metadata.permissions())?;
        }
        temp.persist(path).map_err(|e| CompressError::Io(e.error))?;
        Ok(())
    }
}
