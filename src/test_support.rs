//! Fixture builders shared by the unit tests and the integration tests.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use rust_xlsxwriter::{Image, Workbook};
use std::io::{Cursor, Read, Write};
use std::path::Path;

/// Bytes that carry a PNG signature but no decodable image
pub const BROKEN_PNG: &[u8] = b"\x89PNG\r\n\x1a\ncorrupted beyond repair";

/// Encode a small gradient; `seed` keeps fixtures distinct so the writer does not share media
pub fn image_bytes(format: ImageFormat, width: u32, height: u32, seed: u8) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x as u8).wrapping_mul(9).wrapping_add(seed),
            (y as u8).wrapping_mul(5),
            seed.wrapping_mul(31),
        ])
    }));
    let mut out = Cursor::new(Vec::new());
    image.write_to(&mut out, format).unwrap();
    out.into_inner()
}

/// Build a workbook with one worksheet per entry, inserting the given images
pub fn workbook_bytes(sheets: &[Vec<Vec<u8>>]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for images in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "fixture").unwrap();
        for (row, data) in images.iter().enumerate() {
            let image = Image::new_from_buffer(data).unwrap();
            worksheet
                .insert_image(row as u32 * 20 + 1, 1, &image)
                .unwrap();
        }
    }
    workbook.save_to_buffer().unwrap()
}

/// Write a workbook fixture to `path`
pub fn write_workbook(path: &Path, sheets: &[Vec<Vec<u8>>]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, workbook_bytes(sheets)).unwrap();
}

/// Rebuild a zip package, passing every entry through `edit(name, data)`
pub fn map_entries(bytes: &[u8], edit: impl Fn(&str, Vec<u8>) -> Vec<u8>) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index).unwrap();
        let name = file.name().to_string();
        let mut data = Vec::new();
        file.read_to_end(&mut data).unwrap();
        let data = edit(&name, data);
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(&data).unwrap();
    }

    writer.finish().unwrap().into_inner()
}

/// Replace every media entry with bytes no decoder accepts
pub fn corrupt_media(bytes: &[u8]) -> Vec<u8> {
    map_entries(bytes, |name, data| {
        if name.starts_with("xl/media/") {
            BROKEN_PNG.to_vec()
        } else {
            data
        }
    })
}

/// Replace a single media entry with bytes no decoder accepts
pub fn corrupt_part(bytes: &[u8], part: &str) -> Vec<u8> {
    map_entries(bytes, |name, data| {
        if name == part {
            BROKEN_PNG.to_vec()
        } else {
            data
        }
    })
}

/// Read one entry of a zip package as text
pub fn zip_entry_text(bytes: &[u8], name: &str) -> String {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}
