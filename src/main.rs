//! # Workbook Image Compressor - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing` (su stderr)
//! - Caricamento della configurazione e override da CLI
//! - Avvio del batch e messaggio finale
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (cartella, quality, dpi, workers, etc.)
//! 2. Configura il logging (INFO o DEBUG a seconda del flag verbose)
//! 3. Carica il file di configurazione e applica gli override
//! 4. Discovery dei workbook, elaborazione e report
//! 5. Stampa numero di file elaborati e path del report
//!
//! ## Esempio di utilizzo:
//! ```bash
//! xlsx-compressor /path/to/reports --quality 70 --dpi 96 --workers 4 --verbose
//! ```

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

use workbook_image_compressor::{
    json_output::JsonMessage, progress::ProgressManager, BatchRunner, Config, FileManager,
    PngCompression, ProgressTracker,
};

#[derive(Parser)]
#[command(name = "xlsx-compressor")]
#[command(about = "Re-encode the images embedded in Excel workbooks and write a summary report")]
struct Args {
    /// Folder containing the workbooks (searched recursively)
    folder: PathBuf,

    /// JPEG quality (1-100)
    #[arg(short, long)]
    quality: Option<u8>,

    /// Resolution written into every re-encoded image
    #[arg(long)]
    dpi: Option<u32>,

    /// Downscale images whose longest edge exceeds this many pixels
    #[arg(long)]
    max_dimension: Option<u32>,

    /// PNG compression effort (fast, default, best)
    #[arg(long)]
    png_compression: Option<PngCompression>,

    /// Number of workbooks processed in parallel
    #[arg(short, long)]
    workers: Option<usize>,

    /// Dry run - don't actually overwrite workbooks
    #[arg(long)]
    dry_run: bool,

    /// Omit the totals row from the report
    #[arg(long)]
    no_totals: bool,

    /// Configuration file (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Store the effective settings in the configuration file
    #[arg(long)]
    save_config: bool,

    /// Output progress and status as JSON for programmatic use
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(quality) = self.quality {
            config.jpeg_quality = quality;
        }
        if let Some(dpi) = self.dpi {
            config.target_dpi = dpi;
        }
        if self.max_dimension.is_some() {
            config.max_dimension = self.max_dimension;
        }
        if let Some(level) = self.png_compression {
            config.png_compression = level;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if self.dry_run {
            config.dry_run = true;
        }
        if self.no_totals {
            config.include_totals = false;
        }
        if self.json {
            config.json_output = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for JSON events
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let json = args.json;
    if let Err(e) = run(args).await {
        error!("{:#}", e);
        if json {
            JsonMessage::error(e.to_string(), e.chain().nth(1).map(|s| s.to_string())).emit();
        }
        return Err(e);
    }

    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let start = Instant::now();

    let config_path = args.config.clone().or_else(Config::default_path);
    let mut config = match &config_path {
        Some(path) => Config::from_file(path).await?,
        None => Config::default(),
    };
    args.apply(&mut config);

    let runner = BatchRunner::new(config.clone())?;

    if args.save_config {
        if let Some(path) = &config_path {
            config.save_to_file(path).await?;
            info!("Configuration saved to {}", path.display());
        }
    }

    let folder = FileManager::absolute(&args.folder)?;
    let files = if config.json_output {
        runner.discover(&folder)?
    } else {
        let spinner = ProgressManager::spinner(&format!("Scanning {}", folder.display()));
        let files = runner.discover(&folder);
        spinner.finish_and_clear();
        files?
    };

    if config.json_output {
        JsonMessage::start(folder.clone(), files.len(), &config).emit();
    }

    let tracker = ProgressTracker::new(files.len(), &config);
    let outcome = runner.run_files(&folder, files, &tracker).await?;
    tracker.finish();

    if config.json_output {
        JsonMessage::complete(&outcome, start.elapsed().as_secs_f64()).emit();
    } else {
        println!(
            "Processed {} files ({} failed). Report saved to {}",
            outcome.files_processed,
            outcome.failed(),
            outcome.report_path.display()
        );
    }

    Ok(())
}
