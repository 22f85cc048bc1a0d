//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con la strategia di compressione esplicita
//! - Fornisce validazione robusta dei parametri di input
//! - Supporta caricamento/salvataggio configurazione da/verso file JSON
//! - Fornisce valori di default sensati per tutti i parametri
//!
//! ## Parametri di configurazione:
//! - `jpeg_quality`: Qualità JPEG (1-100, default: 75)
//! - `target_dpi`: Risoluzione scritta nei metadata (default: 96)
//! - `max_dimension`: Lato massimo in pixel, `None` = nessun resize
//! - `png_compression`: Livello di compressione PNG (default: best)
//! - `workers`: Numero di file elaborati in parallelo (default: 1 = sequenziale)
//! - `dry_run`: Elabora senza sovrascrivere i workbook (default: false)
//! - `include_totals`: Aggiunge la riga dei totali al report (default: true)
//! - `json_output`: Progress ed eventi in JSON su stdout (default: false)
//!
//! ## Esempio:
//! ```rust,ignore
//! let config = Config {
//!     jpeg_quality: 60,
//!     max_dimension: Some(1600),
//!     ..Default::default()
//! };
//! config.validate()?;
//! ```

use crate::error::CompressError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Zlib effort used when writing PNG output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    Fast,
    Default,
    #[default]
    Best,
}

impl PngCompression {
    pub fn to_png(self) -> png::Compression {
        match self {
            Self::Fast => png::Compression::Fast,
            Self::Default => png::Compression::Default,
            Self::Best => png::Compression::Best,
        }
    }
}

impl std::str::FromStr for PngCompression {
    type Err = CompressError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(Self::Fast),
            "default" => Ok(Self::Default),
            "best" => Ok(Self::Best),
            other => Err(CompressError::Validation(format!(
                "unknown PNG compression level '{}' (expected fast, default or best)",
                other
            ))),
        }
    }
}

/// Configuration for a compression run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JPEG quality (1-100)
    pub jpeg_quality: u8,
    /// Resolution written into every re-encoded image
    pub target_dpi: u32,
    /// Longest edge in pixels; larger images are downscaled
    pub max_dimension: Option<u32>,
    /// PNG compression effort
    pub png_compression: PngCompression,
    /// Number of workbooks processed concurrently
    pub workers: usize,
    /// Dry run - don't actually overwrite workbooks
    pub dry_run: bool,
    /// Append a totals row to the report
    pub include_totals: bool,
    /// Output progress and status as JSON for programmatic use
    pub json_output: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jpeg_quality: 75,
            target_dpi: 96,
            max_dimension: None,
            png_compression: PngCompression::Best,
            workers: 1,
            dry_run: false,
            include_totals: true,
            json_output: false,
        }
    }
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> std::result::Result<(), CompressError> {
        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err(CompressError::Validation(
                "JPEG quality must be between 1 and 100".to_string(),
            ));
        }

        if self.target_dpi == 0 || self.target_dpi > 10_000 {
            return Err(CompressError::Validation(
                "Target DPI must be between 1 and 10000".to_string(),
            ));
        }

        if self.max_dimension == Some(0) {
            return Err(CompressError::Validation(
                "Max dimension must be greater than 0".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(CompressError::Validation(
                "Number of workers must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Default location of the configuration file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("xlsx-compressor").join("config.json"))
    }

    /// Load configuration from file
    pub async fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub async fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.jpeg_quality = 0;
        assert!(config.validate().is_err());

        config.jpeg_quality = 75;
        config.target_dpi = 0;
        assert!(config.validate().is_err());

        config.target_dpi = 96;
        config.max_dimension = Some(0);
        assert!(config.validate().is_err());

        config.max_dimension = Some(1024);
        config.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.jpeg_quality, 75);
        assert_eq!(config.target_dpi, 96);
        assert_eq!(config.max_dimension, None);
        assert_eq!(config.png_compression, PngCompression::Best);
        assert_eq!(config.workers, 1);
        assert!(!config.dry_run);
        assert!(config.include_totals);
    }

    #[test]
    fn test_png_compression_parse() {
        assert_eq!("FAST".parse::<PngCompression>().unwrap(), PngCompression::Fast);
        assert_eq!("best".parse::<PngCompression>().unwrap(), PngCompression::Best);
        assert!("ultra".parse::<PngCompression>().is_err());
    }

    #[tokio::test]
    async fn test_config_save_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let original_config = Config {
            jpeg_quality: 60,
            target_dpi: 72,
            max_dimension: Some(1600),
            png_compression: PngCompression::Fast,
            workers: 4,
            dry_run: true,
            ..Default::default()
        };

        original_config.save_to_file(&config_path).await.unwrap();
        let loaded_config = Config::from_file(&config_path).await.unwrap();

        assert_eq!(loaded_config.jpeg_quality, 60);
        assert_eq!(loaded_config.target_dpi, 72);
        assert_eq!(loaded_config.max_dimension, Some(1600));
        assert_eq!(loaded_config.png_compression, PngCompression::Fast);
        assert_eq!(loaded_config.workers, 4);
        assert!(loaded_config.dry_run);
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config::from_file(&temp_dir.path().join("absent.json"))
            .await
            .unwrap();
        assert_eq!(config.jpeg_quality, 75);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.json");
        tokio::fs::write(&path, r#"{ "jpeg_quality": 50 }"#).await.unwrap();

        let config = Config::from_file(&path).await.unwrap();
        assert_eq!(config.jpeg_quality, 50);
        assert_eq!(config.target_dpi, 96);
        assert!(config.include_totals);
    }
}
