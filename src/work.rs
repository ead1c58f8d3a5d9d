//! Work pipeline
//!
//! Processes one work id end to end: metadata, manifest, flattening,
//! selection, the batch itself, verification and history.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::cli::console::ConsoleInput;
use crate::cli::progress::spawn_renderer;
use crate::cli::prompt::{prompt_selection, render_listing, render_selected};
use crate::error::{CatalogErrorKind, DownloaderError, Result};
use crate::manifest::{work_root, FileKind, FileTask, ManifestFlattener, ManifestNode};
use crate::selection::{SelectionFilter, SelectionMode};
use crate::storage::scheduler::average_speed;
use crate::storage::{
    BatchReport, BatchSummary, ChannelProgress, DownloadScheduler, HistoryEntry, ManifestCache, PauseCommand,
    PauseController, SchedulerSettings, WorkHistory,
};

/// Settings shared by every work of a run
#[derive(Debug, Clone)]
pub struct WorkSettings {
    pub output_dir: PathBuf,
    /// `--select` value; prompts when absent and a console is attached
    pub selection: Option<String>,
    pub hq_audio_only: bool,
    /// Config order, used for display
    pub default_kinds: Vec<FileKind>,
    pub scheduler: SchedulerSettings,
    pub tag_audio: bool,
    pub quiet: bool,
}

/// What happened to one work
#[derive(Debug, Clone)]
pub struct WorkOutcome {
    pub work_id: String,
    pub title: Option<String>,
    pub summary: BatchSummary,
    /// Failed tasks, for the per-file report
    pub failed: Vec<FileTask>,
}

impl WorkOutcome {
    pub fn summary_lines(&self) -> Vec<String> {
        let s = &self.summary;
        let mut lines = vec![
            format!("=== Summary for RJ{} ===", self.work_id),
            format!("Files in manifest: {}", s.files_total),
            format!("Files verified on disk: {}/{}", s.files_verified, s.files_total),
            format!("Downloaded: {:.2} MB in {:.2} seconds", s.total_megabytes, s.elapsed_seconds),
            format!("Average speed: {:.2} MB/s", s.average_mbps),
        ];
        if !self.failed.is_empty() {
            lines.push(format!("Failed files ({}):", self.failed.len()));
            lines.extend(
                self.failed
                    .iter()
                    .map(|t| format!("- {} ({}, {})", t.display_name, t.kind, t.size_label())),
            );
        }
        lines
    }
}

/// Totals across every work of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub works: usize,
    pub works_failed: usize,
    pub files_verified: usize,
    pub total_megabytes: f64,
}

impl RunSummary {
    pub fn add(&mut self, outcome: &WorkOutcome) {
        self.works += 1;
        self.files_verified += outcome.summary.files_verified;
        self.total_megabytes += outcome.summary.total_megabytes;
    }

    pub fn add_failure(&mut self) {
        self.works += 1;
        self.works_failed += 1;
    }

    pub fn summary_lines(&self, elapsed: Duration) -> Vec<String> {
        let seconds = elapsed.as_secs_f64();
        vec![
            "=== Overall Summary ===".to_string(),
            format!("Works processed: {} ({} failed)", self.works, self.works_failed),
            format!("Total files verified: {}", self.files_verified),
            format!("Total downloaded: {:.2} MB", self.total_megabytes),
            format!("Total time: {:.2} seconds", seconds),
            format!("Average speed: {:.2} MB/s", average_speed(self.total_megabytes, seconds)),
        ]
    }
}

/// Drives works through the catalog, the scheduler and the filesystem
pub struct WorkPipeline {
    catalog: Arc<dyn Catalog>,
    client: Client,
    settings: WorkSettings,
    cache: ManifestCache,
    history: WorkHistory,
}

impl WorkPipeline {
    pub fn new(catalog: Arc<dyn Catalog>, client: Client, settings: WorkSettings) -> Self {
        let cache = ManifestCache::new(&settings.output_dir);
        let history = WorkHistory::new(&settings.output_dir);
        Self {
            catalog,
            client,
            settings,
            cache,
            history,
        }
    }

    pub fn settings(&self) -> &WorkSettings {
        &self.settings
    }

    fn say(&self, line: &str) {
        if !self.settings.quiet {
            println!("{}", line);
        }
    }

    /// Process one work. Errors are fatal for this work only.
    pub async fn process(&self, work_id: &str, mut console: Option<&mut ConsoleInput>) -> Result<WorkOutcome> {
        self.say(&format!("\n=== Processing RJ{} ===", work_id));
        info!("Processing RJ{}", work_id);

        let title = match self.catalog.fetch_metadata(work_id).await {
            Ok(metadata) => {
                if let Some(title) = &metadata.title {
                    self.say(&format!("Title: {}", title));
                    info!("Title: {}", title);
                }
                metadata.title
            }
            Err(e) => {
                warn!("Failed to fetch metadata for RJ{}: {}. Using RJ{} as folder name.", work_id, e, work_id);
                None
            }
        };

        let nodes = self.load_manifest(work_id).await?;
        let root = work_root(&self.settings.output_dir, work_id, title.as_deref());
        let mut tasks = ManifestFlattener::flatten(&nodes, &root)?;
        if tasks.is_empty() {
            info!("No tracks found for RJ{}", work_id);
            self.say(&format!("No tracks found for RJ{}. Skipping.", work_id));
        } else {
            info!("Found {} files for RJ{}", tasks.len(), work_id);
        }

        let integrity = self.settings.scheduler.integrity;
        let filter = SelectionFilter::new(integrity);
        let satisfied = filter.mark_satisfied(&mut tasks).await;

        let mode = if tasks.is_empty() {
            SelectionMode::All
        } else {
            for line in render_listing(work_id, &tasks, &satisfied) {
                self.say(&line);
            }
            self.choose_mode(&tasks, console.as_deref_mut()).await?
        };

        let selected = filter.apply(&mut tasks, &mode).await?;
        if selected.is_empty() {
            self.say(&format!("No files selected for RJ{}. Skipping.", work_id));
            info!("No files selected for RJ{}. Skipping.", work_id);
            let summary = BatchSummary::verify(&tasks, None, integrity).await;
            return Ok(self.finish(work_id, title, summary, Vec::new(), false).await);
        }
        for line in render_selected(&selected) {
            self.say(&line);
        }

        if self.settings.tag_audio {
            info!("Audio tagging for RJ{} is delegated to the external tagger", work_id);
        }

        let report = self.run_batch(selected, console).await;
        let failed: Vec<FileTask> = report.failed_tasks().cloned().collect();
        let summary = BatchSummary::verify(&tasks, Some(&report), integrity).await;
        Ok(self.finish(work_id, title, summary, failed, true).await)
    }

    async fn load_manifest(&self, work_id: &str) -> Result<Vec<ManifestNode>> {
        if let Some(nodes) = self.cache.load(work_id).await {
            self.say(&format!("Using cached tracks for RJ{}", work_id));
            return Ok(nodes);
        }

        let raw = self.catalog.fetch_manifest(work_id).await.map_err(|e| {
            let message = match e.catalog_kind() {
                Some(CatalogErrorKind::NotFound) => "Work not found in catalog",
                _ => "Failed to fetch track list",
            };
            DownloaderError::manifest_error_full(message, work_id, e.to_string())
        })?;

        if let Err(e) = self.cache.store(work_id, &raw).await {
            warn!("Failed to cache track list for RJ{}: {}", work_id, e);
        }

        ManifestNode::decode(raw).map_err(|e| DownloaderError::manifest_error_full("Malformed track list", work_id, e.to_string()))
    }

    async fn choose_mode(&self, tasks: &[FileTask], console: Option<&mut ConsoleInput>) -> Result<SelectionMode> {
        if let Some(spec) = &self.settings.selection {
            return SelectionMode::resolve(spec, &self.settings.default_kinds, tasks);
        }
        if self.settings.hq_audio_only {
            return Ok(SelectionMode::HighQualityAudioOnly);
        }
        let Some(console) = console else {
            return Ok(SelectionMode::All);
        };
        match prompt_selection(console, tasks, &self.settings.default_kinds, self.settings.quiet).await? {
            Some(mode) => Ok(mode),
            None => {
                info!("No console input available, selecting all files");
                Ok(SelectionMode::All)
            }
        }
    }

    /// Run the scheduler while console lines drive the pause controller
    async fn run_batch(&self, selected: Vec<FileTask>, console: Option<&mut ConsoleInput>) -> BatchReport {
        let (sink, rx) = ChannelProgress::new();
        let renderer = spawn_renderer(rx, self.settings.quiet);
        let controller = PauseController::new();
        let scheduler = DownloadScheduler::new(
            self.client.clone(),
            self.settings.scheduler,
            controller.flag(),
            Arc::new(sink),
        );

        let report = {
            let batch = scheduler.run(selected);
            tokio::pin!(batch);
            match console {
                Some(console) => loop {
                    tokio::select! {
                        report = &mut batch => break report,
                        line = console.next_line(), if !console.is_closed() => {
                            if let Some(command) = line.as_deref().and_then(PauseCommand::parse) {
                                controller.apply(command);
                                let message = match command {
                                    PauseCommand::Pause => "Downloads paused. Type 'r' to resume.",
                                    PauseCommand::Resume => "Downloads resumed.",
                                };
                                self.say(message);
                            }
                        }
                    }
                },
                None => batch.await,
            }
        };

        // Closes the progress channel so the renderer can finish
        drop(scheduler);
        if let Err(e) = renderer.await {
            warn!("Progress renderer stopped unexpectedly: {}", e);
        }
        report
    }

    async fn finish(
        &self,
        work_id: &str,
        title: Option<String>,
        summary: BatchSummary,
        failed: Vec<FileTask>,
        batch_ran: bool,
    ) -> WorkOutcome {
        let outcome = WorkOutcome {
            work_id: work_id.to_string(),
            title,
            summary,
            failed,
        };

        for line in outcome.summary_lines() {
            self.say(&line);
            info!("{}", line);
        }
        for task in &outcome.failed {
            error!("Failed to download {} ({}, {})", task.display_name, task.kind, task.size_label());
        }

        if batch_ran && outcome.failed.is_empty() {
            let entry = HistoryEntry::new(work_id, outcome.title.clone(), outcome.summary.files_verified);
            if let Err(e) = self.history.record(entry).await {
                warn!("Failed to update download history: {}", e);
            }
        }
        outcome
    }
}
