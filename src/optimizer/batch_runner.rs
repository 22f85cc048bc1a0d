//! # Batch Runner
//!
//! Orchestratore principale: discovery, elaborazione dei workbook e report.
//!
//! ## Concorrenza:
//! - Ogni workbook gira su `tokio::task::spawn_blocking`
//! - Al massimo `config.workers` file in volo (1 = strettamente sequenziale)
//! - Il sink di progresso è chiamato solo dal task del runner
//! - I risultati tornano nell'ordine di discovery prima del report

use crate::{
    config::Config,
    error::{CompressError, Result},
    file_manager::FileManager,
    optimizer::file_processor::FileProcessor,
    outcome::{BatchOutcome, FileResult},
    progress::{BatchStats, ProgressSink},
    report::ReportWriter,
};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};

/// Runs one batch over a directory tree
pub struct BatchRunner {
    config: Config,
}

impl BatchRunner {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Discover the workbooks under `root` (fatal on a bad root)
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        FileManager::find_workbooks(root)
    }

    /// Discover, process every workbook and write the report
    pub async fn run(&self, root: &Path, sink: &dyn ProgressSink) -> Result<BatchOutcome> {
        let files = self.discover(root)?;
        self.run_files(root, files, sink).await
    }

    /// Process an already discovered list of workbooks and write the report
    pub async fn run_files(
        &self,
        root: &Path,
        files: Vec<PathBuf>,
        sink: &dyn ProgressSink,
    ) -> Result<BatchOutcome> {
        let root = FileManager::absolute(root)?;
        let root = root.as_path();
        let total = files.len();
        info!("Found {} workbooks under {}", total, root.display());
        if self.config.dry_run {
            info!("Dry run mode: no workbook will be modified");
        }

        let results = self.process_files(files, sink).await?;

        let stats = BatchStats::from_results(&results);
        info!("{}", stats.format_summary());

        let report_path = {
            let results = results.clone();
            let root = root.to_path_buf();
            let include_totals = self.config.include_totals;
            tokio::task::spawn_blocking(move || {
                ReportWriter::write(&results, &root, include_totals)
            })
            .await
            .map_err(|e| CompressError::Task(e.to_string()))?
        };
        let report_path = report_path.map_err(|e| {
            error!("Could not write the report: {}", e);
            e
        })?;

        Ok(BatchOutcome {
            files_processed: results.len(),
            report_path,
            results,
        })
    }

    async fn process_files(
        &self,
        files: Vec<PathBuf>,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<FileResult>> {
        let processor = FileProcessor::new(self.config.clone());
        self.process_with(files, sink, move |path: &Path| processor.process(path))
            .await
    }

    /// Run `worker` over `files` on blocking threads; a worker that panics
    /// is recorded as a failure of its own file.
    async fn process_with<W>(
        &self,
        files: Vec<PathBuf>,
        sink: &dyn ProgressSink,
        worker: W,
    ) -> Result<Vec<FileResult>>
    where
        W: Fn(&Path) -> FileResult + Clone + Send + 'static,
    {
        let total = files.len();

        let mut pending = stream::iter(files.into_iter().enumerate())
            .map(|(index, path)| {
                let worker = worker.clone();
                async move {
                    debug!("Processing [{}] {}", index, path.display());
                    let started = Instant::now();
                    let task_path = path.clone();
                    let joined = tokio::task::spawn_blocking(move || worker(&task_path)).await;
                    let result = joined.unwrap_or_else(|e| {
                        error!("Worker for {} crashed: {}", path.display(), e);
                        let original_kb = FileManager::file_size(&path)
                            .map(FileManager::size_in_kb)
                            .unwrap_or(0.0);
                        FileResult::failure(
                            path,
                            original_kb,
                            0,
                            started.elapsed().as_secs_f64() * 1000.0,
                            CompressError::Task(e.to_string()).to_string(),
                        )
                    });
                    (index, result)
                }
            })
            .buffer_unordered(self.config.workers.max(1));

        let mut slots: Vec<Option<FileResult>> = vec![None; total];
        let mut done = 0;

        while let Some((index, result)) = pending.next().await {
            done += 1;
            sink.on_file_complete(&result);
            sink.on_progress(done, total);
            slots[index] = Some(result);
        }

        Ok(slots.into_iter().flatten().collect())
    }
}
