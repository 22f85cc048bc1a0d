//! # Image Processing Module
//!
//! Questo modulo ri-codifica le immagini raster incorporate nei workbook,
//! interamente in memoria con le crate `image` e `png`.
//!
//! ## Formati Supportati
//!
//! | Formato | Decodifica | Output | Metadata DPI |
//! |---------|------------|--------|--------------|
//! | PNG     | ✅         | PNG    | chunk `pHYs` |
//! | JPEG    | ✅         | JPEG   | densità JFIF |
//! | GIF     | ✅         | PNG    | chunk `pHYs` |
//! | BMP     | ✅         | PNG    | chunk `pHYs` |
//! | TIFF    | ✅         | PNG    | chunk `pHYs` |
//! | WebP    | ✅         | PNG    | chunk `pHYs` |
//!
//! I formati che non possono trasportare la risoluzione attraverso l'encoder
//! vengono convertiti in PNG, il formato lossless di default.
//!
//! ## Strategia di compressione
//!
//! - **JPEG Quality**: 1-100 (default: 75)
//! - **PNG Compression**: fast / default / best (default: best)
//! - **Max dimension**: lato massimo opzionale, downscale con aspect ratio
//! - **DPI**: sempre riscritti al valore configurato (default: 96)
//!
//! Il processore è stateless: nessuna memoria tra una chiamata e l'altra.
//!
//! ## Esempio
//!
//! ```rust,ignore
//! let processor = ImageProcessor::new(Config::default());
//! let encoded = processor.reencode(&bytes)?;
//! assert_eq!(ImageProcessor::read_resolution(&encoded.bytes), Some((96, 96)));
//! ```

use crate::config::Config;
use crate::error::{CompressError, Result};
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use tracing::debug;

const INCHES_PER_METRE: f64 = 39.370_078_740_157_48;

/// Encoded representation chosen for a re-encoded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Extension used when a package part has to be renamed for this format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    /// Whether a part with extension `ext` can hold this format unchanged
    pub fn matches_extension(self, ext: &str) -> bool {
        match self {
            Self::Png => ext.eq_ignore_ascii_case("png"),
            Self::Jpeg => ["jpg", "jpeg", "jpe"]
                .iter()
                .any(|known| ext.eq_ignore_ascii_case(known)),
        }
    }
}

/// Re-encoded image, ready to be put back into a workbook package
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
}

/// Stateless image re-encoder driven by the compression settings of `Config`
#[derive(Debug, Clone)]
pub struct ImageProcessor {
    config: Config,
}

impl ImageProcessor {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Decode `data` and encode it again with the configured strategy.
    ///
    /// PNG and JPEG keep their format; every other decodable format is
    /// written as PNG. The output always carries `target_dpi` as resolution.
    ///
    /// # Errors
    /// - `CompressError::ImageDecode` if the bytes are not an image the decoder understands
    /// - `CompressError::ImageEncode` if the encoder fails
    pub fn reencode(&self, data: &[u8]) -> Result<EncodedImage> {
        let source_format = image::guess_format(data).map_err(CompressError::ImageDecode)?;
        let image = image::load_from_memory_with_format(data, source_format)
            .map_err(CompressError::ImageDecode)?;

        let image = self.limit_dimensions(image);
        let (width, height) = image.dimensions();

        let format = match source_format {
            ImageFormat::Jpeg => OutputFormat::Jpeg,
            _ => OutputFormat::Png,
        };

        let bytes = match format {
            OutputFormat::Jpeg => self.encode_jpeg(&image)?,
            OutputFormat::Png => self.encode_png(&image)?,
        };

        debug!(
            "Re-encoded {:?} {}x{} -> {:?} ({} -> {} bytes)",
            source_format,
            width,
            height,
            format,
            data.len(),
            bytes.len()
        );

        Ok(EncodedImage {
            bytes,
            format,
            width,
            height,
        })
    }

    fn limit_dimensions(&self, image: DynamicImage) -> DynamicImage {
        match self.config.max_dimension {
            Some(max) if image.width().max(image.height()) > max => {
                image.resize(max, max, FilterType::Lanczos3)
            }
            _ => image,
        }
    }

    fn encode_jpeg(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut out, self.config.jpeg_quality);
            encoder.set_pixel_density(PixelDensity::dpi(self.config.target_dpi as u16));

            // JPEG has no alpha channel
            let written = match image {
                DynamicImage::ImageLuma8(gray) => encoder.encode(
                    gray.as_raw(),
                    gray.width(),
                    gray.height(),
                    ColorType::L8,
                ),
                other => {
                    let rgb = other.to_rgb8();
                    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)
                }
            };
            written.map_err(|e| CompressError::ImageEncode(e.to_string()))?;
        }

        Ok(out)
    }

    fn encode_png(&self, image: &DynamicImage) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        let (color, data) = match image {
            DynamicImage::ImageLuma8(buf) => (png::ColorType::Grayscale, buf.as_raw().clone()),
            DynamicImage::ImageLumaA8(buf) => {
                (png::ColorType::GrayscaleAlpha, buf.as_raw().clone())
            }
            DynamicImage::ImageRgb8(buf) => (png::ColorType::Rgb, buf.as_raw().clone()),
            DynamicImage::ImageRgba8(buf) => (png::ColorType::Rgba, buf.as_raw().clone()),
            other if other.color().has_alpha() => {
                (png::ColorType::Rgba, other.to_rgba8().into_raw())
            }
            other => (png::ColorType::Rgb, other.to_rgb8().into_raw()),
        };

        let pixels_per_metre = (self.config.target_dpi as f64 * INCHES_PER_METRE).round() as u32;

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_compression(self.config.png_compression.to_png());
            encoder.set_pixel_dims(Some(png::PixelDimensions {
                xppu: pixels_per_metre,
                yppu: pixels_per_metre,
                unit: png::Unit::Meter,
            }));

            let mut writer = encoder.write_header()?;
            writer.write_image_data(&data)?;
            writer.finish()?;
        }

        Ok(out)
    }

    /// Read the resolution (x, y) in DPI recorded in PNG or JPEG bytes
    pub fn read_resolution(data: &[u8]) -> Option<(u32, u32)> {
        match image::guess_format(data).ok()? {
            ImageFormat::Png => Self::png_resolution(data),
            ImageFormat::Jpeg => Self::jfif_resolution(data),
            _ => None,
        }
    }

    fn png_resolution(data: &[u8]) -> Option<(u32, u32)> {
        let reader = png::Decoder::new(data).read_info().ok()?;
        let dims = reader.info().pixel_dims?;
        match dims.unit {
            png::Unit::Meter => Some((
                (dims.xppu as f64 / INCHES_PER_METRE).round() as u32,
                (dims.yppu as f64 / INCHES_PER_METRE).round() as u32,
            )),
            png::Unit::Unspecified => None,
        }
    }

    fn jfif_resolution(data: &[u8]) -> Option<(u32, u32)> {
        let mut pos = 2;
        while pos + 4 <= data.len() {
            if data[pos] != 0xFF {
                return None;
            }
            let marker = data[pos + 1];
            let length = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            let segment = data.get(pos + 4..pos + 2 + length)?;

            if marker == 0xE0 && segment.len() >= 12 && segment.starts_with(b"JFIF\0") {
                let units = segment[7];
                let x = u16::from_be_bytes([segment[8], segment[9]]) as f64;
                let y = u16::from_be_bytes([segment[10], segment[11]]) as f64;
                return match units {
                    1 => Some((x as u32, y as u32)),
                    2 => Some(((x * 2.54).round() as u32, (y * 2.54).round() as u32)),
                    _ => None,
                };
            }
            // Start of scan: no JFIF header before the image data
            if marker == 0xDA {
                return None;
            }
            pos += 2 + length;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;

    fn sample_rgb(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, 128])
        }))
    }

    fn encode_with(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_png_keeps_format_and_sets_dpi() {
        let processor = ImageProcessor::new(Config::default());
        let source = encode_with(&sample_rgb(40, 30), ImageFormat::Png);
        assert_eq!(ImageProcessor::read_resolution(&source), None);

        let encoded = processor.reencode(&source).unwrap();
        assert_eq!(encoded.format, OutputFormat::Png);
        assert_eq!((encoded.width, encoded.height), (40, 30));
        assert_eq!(ImageProcessor::read_resolution(&encoded.bytes), Some((96, 96)));
    }

    #[test]
    fn test_jpeg_keeps_format_and_sets_dpi() {
        let config = Config {
            target_dpi: 150,
            ..Default::default()
        };
        let processor = ImageProcessor::new(config);
        let source = encode_with(&sample_rgb(64, 48), ImageFormat::Jpeg);

        let encoded = processor.reencode(&source).unwrap();
        assert_eq!(encoded.format, OutputFormat::Jpeg);
        assert_eq!((encoded.width, encoded.height), (64, 48));
        assert_eq!(ImageProcessor::read_resolution(&encoded.bytes), Some((150, 150)));
    }

    #[test]
    fn test_other_formats_fall_back_to_png() {
        let processor = ImageProcessor::new(Config::default());
        let source = encode_with(&sample_rgb(16, 16), ImageFormat::Bmp);

        let encoded = processor.reencode(&source).unwrap();
        assert_eq!(encoded.format, OutputFormat::Png);
        assert_eq!(image::guess_format(&encoded.bytes).unwrap(), ImageFormat::Png);
    }

    #[test]
    fn test_alpha_survives_png_reencode() {
        let processor = ImageProcessor::new(Config::default());
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 40])));
        let encoded = processor.reencode(&encode_with(&rgba, ImageFormat::Png)).unwrap();

        let decoded = image::load_from_memory(&encoded.bytes).unwrap();
        assert!(decoded.color().has_alpha());
        assert_eq!(decoded.to_rgba8().get_pixel(3, 3), &Rgba([10, 20, 30, 40]));
    }

    #[test]
    fn test_max_dimension_downscales_preserving_aspect() {
        let config = Config {
            max_dimension: Some(50),
            ..Default::default()
        };
        let processor = ImageProcessor::new(config);
        let encoded = processor
            .reencode(&encode_with(&sample_rgb(200, 100), ImageFormat::Png))
            .unwrap();
        assert_eq!((encoded.width, encoded.height), (50, 25));

        // Small images are never upscaled.
        let small = processor
            .reencode(&encode_with(&sample_rgb(20, 10), ImageFormat::Png))
            .unwrap();
        assert_eq!((small.width, small.height), (20, 10));
    }

    #[test]
    fn test_reencode_is_stable_across_passes() {
        let processor = ImageProcessor::new(Config::default());
        let source = encode_with(&sample_rgb(33, 21), ImageFormat::Jpeg);

        let first = processor.reencode(&source).unwrap();
        let second = processor.reencode(&first.bytes).unwrap();
        let third = processor.reencode(&second.bytes).unwrap();

        for pass in [&first, &second, &third] {
            assert_eq!((pass.width, pass.height), (33, 21));
            assert_eq!(pass.format, OutputFormat::Jpeg);
            assert_eq!(ImageProcessor::read_resolution(&pass.bytes), Some((96, 96)));
        }

        // Same input, same output: no state is carried between calls.
        let again = processor.reencode(&source).unwrap();
        assert_eq!(again.bytes, first.bytes);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let processor = ImageProcessor::new(Config::default());
        let err = processor.reencode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, CompressError::ImageDecode(_)));

        // Valid PNG signature, truncated body.
        let mut truncated = encode_with(&sample_rgb(10, 10), ImageFormat::Png);
        truncated.truncate(20);
        let err = processor.reencode(&truncated).unwrap_err();
        assert!(matches!(err, CompressError::ImageDecode(_)));
    }

    #[test]
    fn test_output_format_extensions() {
        assert!(OutputFormat::Jpeg.matches_extension("JPG"));
        assert!(OutputFormat::Jpeg.matches_extension("jpeg"));
        assert!(!OutputFormat::Jpeg.matches_extension("png"));
        assert!(OutputFormat::Png.matches_extension("png"));
        assert!(!OutputFormat::Png.matches_extension("gif"));
        assert_eq!(OutputFormat::Png.content_type(), "image/png");
    }
}
