use anyhow::{anyhow, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{error, info, warn};
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};
use std::time::Instant;

use crate::app_config::Config;
use crate::document::{Merger, OutputWriter, Segment, Segmenter};
use crate::file_utils::FileManager;
use crate::glossary::{self, AggregatedTerminology, Glossary, TermMatcher};
use crate::language_utils;
use crate::translation::batch::{header_path_for, BatchScheduler};
use crate::translation::checkpoint::Checkpoint;
use crate::translation::step::execute_translation_step;
use crate::translation::{PromptTemplate, TokenUsageStats, TranslationService};

// @module: Application controller for document translation

/// Interrupt flag shared by every run in the process
static INTERRUPTED: Lazy<Arc<AtomicBool>> = Lazy::new(|| Arc::new(AtomicBool::new(false)));
static INSTALL_INTERRUPT_HANDLER: Once = Once::new();

/// Main application controller for Markdown translation
pub struct Controller {
    // @field: App configuration
    config: Config,
}

/// What one document run produced, for artifact persistence
struct RunResult {
    aggregated: AggregatedTerminology,
    token_cost: u64,
    failed: Vec<(usize, String)>,
    /// Source content of the first segment not written, when the run
    /// stopped early
    first_unwritten: Option<String>,
    /// Whether the run reached the end of the segment list, as opposed
    /// to being interrupted or halted by diagnostics
    completed: bool,
}

impl Controller {
    /// Create a new controller for test purposes with default configuration
    pub fn new_for_test() -> Result<Self> {
        Self::with_config(Config::default())
    }

    // @method: Create a new controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        Ok(Self { config })
    }

    /// Check if the controller is properly initialized with configuration
    pub fn is_initialized(&self) -> bool {
        !self.config.source_language.is_empty() && !self.config.target_language.is_empty()
    }

    /// Run the main workflow for one input document
    pub async fn run(
        &self,
        input_file: PathBuf,
        glossary_path: Option<PathBuf>,
        force_overwrite: bool,
        segment_only: bool,
    ) -> Result<()> {
        let multi_progress = MultiProgress::new();
        self.run_with_progress(
            input_file,
            glossary_path,
            &multi_progress,
            force_overwrite,
            segment_only,
        )
        .await
    }

    /// Run the controller with progress reporting
    async fn run_with_progress(
        &self,
        input_file: PathBuf,
        glossary_path: Option<PathBuf>,
        multi_progress: &MultiProgress,
        force_overwrite: bool,
        segment_only: bool,
    ) -> Result<()> {
        let start_time = Instant::now();

        if !input_file.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", input_file));
        }

        // Base glossary; absent means the run starts with no authoritative
        // terms and everything comes from the aggregate.
        let base_glossary = match &glossary_path {
            Some(path) => {
                let validated = glossary::validate_glossary_file(path)?;
                let loaded = Glossary::load_csv(&validated)?;
                info!(
                    "Loaded {} glossary terms from {}",
                    loaded.len(),
                    validated.display()
                );
                loaded
            }
            None => Glossary::new(),
        };

        let content = FileManager::read_to_string(&input_file)?;
        let segments = self.segment_document(&content);
        if segments.is_empty() {
            warn!("Nothing to translate in {}", input_file.display());
            return Ok(());
        }
        info!("Segmented {} into {} segments", input_file.display(), segments.len());

        let output_path = self.output_path_for(&input_file, force_overwrite);
        // Keyed to the input, not the versioned output, so a restart
        // resumes the interrupted run's checkpoint
        let checkpoint_path = FileManager::checkpoint_path(&input_file);

        if segment_only {
            let checkpoint = Checkpoint::create(&checkpoint_path, &segments)?;
            info!(
                "Wrote {} segment records to {}",
                checkpoint.records().len(),
                checkpoint.path().display()
            );
            return Ok(());
        }

        let system_prompt = self.render_system_prompt()?;
        let service = TranslationService::new(self.config.translation.clone())?;
        let matcher = TermMatcher::new(
            self.config.matching.fuzzy_enabled,
            self.config.matching.fuzzy_max_distance,
        );
        let interrupted = interrupt_flag();

        let progress_bar = multi_progress.add(ProgressBar::new(segments.len() as u64));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} segments ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar.set_message("Translating");

        info!(
            "🚀 TransMark: {} - {}",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model()
        );

        let mut stats = TokenUsageStats::with_provider_info(
            self.config.translation.provider.display_name().to_string(),
            self.config.translation.get_model(),
        );

        let base_glossary = Arc::new(base_glossary);
        let result = if self.config.concurrent {
            self.run_concurrent(
                service,
                matcher,
                system_prompt,
                Arc::clone(&base_glossary),
                segments,
                &output_path,
                &checkpoint_path,
                Arc::clone(&interrupted),
                &progress_bar,
            )
            .await?
        } else {
            self.run_sequential(
                service,
                matcher,
                system_prompt,
                &base_glossary,
                segments,
                &output_path,
                Arc::clone(&interrupted),
                &progress_bar,
            )
            .await?
        };
        stats.add_tokens(result.token_cost);
        progress_bar.finish_and_clear();

        self.persist_run_artifacts(
            &input_file,
            glossary_path.as_deref(),
            &base_glossary,
            &result,
        )?;

        self.finalize_run(&input_file, &content, &output_path, &stats, &result, start_time)
    }

    /// Log the run outcome and append the stats row. A run that was
    /// interrupted or halted skips the stats table and the success
    /// message; its state lives on in the checkpoint.
    fn finalize_run(
        &self,
        input_file: &Path,
        input_content: &str,
        output_path: &Path,
        stats: &TokenUsageStats,
        result: &RunResult,
        start_time: Instant,
    ) -> Result<()> {
        if !result.failed.is_empty() {
            warn!(
                "{} segments failed and were kept untranslated in the output: {:?}",
                result.failed.len(),
                result.failed.iter().map(|(n, _)| n).collect::<Vec<_>>()
            );
        }

        if stats.total_tokens > 0 {
            info!("🔢 {}", stats.summary());
        }

        if !result.completed {
            warn!(
                "Run stopped early after {}; rerun the same command to resume",
                Self::format_duration(start_time.elapsed())
            );
            return Ok(());
        }

        let output_content = FileManager::read_to_string(output_path).unwrap_or_default();
        FileManager::append_stats_row_to(
            &stats_table_path(output_path),
            input_file,
            FileManager::count_markdown_words(input_content),
            output_path,
            FileManager::count_markdown_words(&output_content),
            stats.total_tokens,
            start_time.elapsed(),
        )?;

        info!(
            "Success: {} ({})",
            output_path.display(),
            Self::format_duration(start_time.elapsed())
        );
        Ok(())
    }

    /// Concurrent mode: checkpointed scheduler run with ordered output
    #[allow(clippy::too_many_arguments)]
    async fn run_concurrent(
        &self,
        service: TranslationService,
        matcher: TermMatcher,
        system_prompt: String,
        base_glossary: Arc<Glossary>,
        segments: Vec<Segment>,
        output_path: &Path,
        checkpoint_path: &Path,
        interrupted: Arc<AtomicBool>,
        progress_bar: &ProgressBar,
    ) -> Result<RunResult> {
        let (checkpoint, _resumed) = Checkpoint::load_or_create(checkpoint_path, &segments)?;
        let writer = OutputWriter::create(output_path, self.config.segmentation.preserve_structure)?;

        let mut workers = self.config.translation.optimal_concurrent_requests();
        if let Some(rpm) = self.config.translation.common.rate_limit_rpm {
            if rpm > 0 {
                workers = workers.min(rpm as usize);
            }
        }

        let scheduler = BatchScheduler::new(service, matcher, system_prompt, workers);
        let pb = progress_bar.clone();
        let outcome = scheduler
            .run(base_glossary, writer, checkpoint, interrupted, move |flushed, _total| {
                pb.set_position(flushed as u64);
            })
            .await?;

        if outcome.service_degraded {
            error!("Diagnostics confirmed a service outage during this run");
        }
        if outcome.interrupted {
            warn!("Run interrupted; completed segments are saved in the checkpoint");
        }
        let completed = !outcome.interrupted && !outcome.service_degraded;
        Ok(RunResult {
            aggregated: outcome.aggregated,
            token_cost: outcome.token_cost,
            failed: outcome.failed,
            first_unwritten: if completed {
                None
            } else {
                outcome.first_unwritten_content
            },
            completed,
        })
    }

    /// Sequential mode: one segment at a time with a consecutive-failure
    /// halt backed by the diagnostic probe
    #[allow(clippy::too_many_arguments)]
    async fn run_sequential(
        &self,
        service: TranslationService,
        matcher: TermMatcher,
        system_prompt: String,
        base_glossary: &Glossary,
        segments: Vec<Segment>,
        output_path: &Path,
        interrupted: Arc<AtomicBool>,
        progress_bar: &ProgressBar,
    ) -> Result<RunResult> {
        let mut writer =
            OutputWriter::create(output_path, self.config.segmentation.preserve_structure)?;
        let mut aggregated = AggregatedTerminology::new();
        let mut token_cost: u64 = 0;
        let mut failed: Vec<(usize, String)> = Vec::new();
        let mut consecutive_failures: u32 = 0;
        let mut first_unwritten: Option<String> = None;
        let mut completed = true;

        let mut iter = segments.iter().peekable();
        while let Some(segment) = iter.next() {
            if interrupted.load(Ordering::SeqCst) {
                first_unwritten = Some(segment.content.clone());
                completed = false;
                break;
            }
            match execute_translation_step(
                &service,
                &matcher,
                &system_prompt,
                segment,
                base_glossary,
                &aggregated,
            )
            .await
            {
                Ok(outcome) => {
                    consecutive_failures = 0;
                    token_cost += outcome.token_cost;
                    aggregated.merge(base_glossary, outcome.new_terms.clone());
                    writer.append_segment(
                        header_path_for(segment).as_deref(),
                        &outcome.translated_text,
                        outcome.annotation_notes.as_deref(),
                    )?;
                    progress_bar.inc(1);
                }
                Err(e) => {
                    error!("Segment {} failed: {e}", segment.sequence_number);
                    failed.push((segment.sequence_number, e.to_string()));
                    writer.append_segment(
                        header_path_for(segment).as_deref(),
                        segment.content_without_marker(),
                        Some(&format!("Translation failed: {e}")),
                    )?;
                    progress_bar.inc(1);
                    consecutive_failures += 1;
                    if consecutive_failures >= self.config.consecutive_failure_limit.max(1) {
                        let report = service.run_diagnostics().await;
                        if report.all_failed() {
                            error!(
                                "Halting after {} consecutive failures, the service is down",
                                consecutive_failures
                            );
                            first_unwritten = iter.peek().map(|next| next.content.clone());
                            completed = false;
                            break;
                        }
                        // The service still answers; keep going and reset
                        // the streak so the probe does not refire at once.
                        consecutive_failures = 0;
                    }
                }
            }
        }

        Ok(RunResult {
            aggregated,
            token_cost,
            failed,
            first_unwritten,
            completed,
        })
    }

    /// Persist terminology and the untranslated remainder after a run,
    /// whether it finished, halted or was interrupted
    fn persist_run_artifacts(
        &self,
        input_file: &Path,
        glossary_path: Option<&Path>,
        base_glossary: &Glossary,
        result: &RunResult,
    ) -> Result<()> {
        if !result.aggregated.is_empty() {
            let anchor = glossary_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| input_file.with_file_name("glossary.csv"));
            let saved = glossary::save_terms_result(
                self.config.glossary.merge_into_glossary,
                base_glossary,
                &result.aggregated,
                &anchor,
            )?;
            info!(
                "Saved {} run terms to {}",
                result.aggregated.len(),
                saved.display()
            );
        }

        if let Some(segment_text) = &result.first_unwritten {
            if let Some(rest_path) =
                FileManager::extract_untranslated_rest(input_file, segment_text)?
            {
                info!("Untranslated remainder written to {}", rest_path.display());
            }
        }
        Ok(())
    }

    /// Segment and merge the document per configuration
    fn segment_document(&self, content: &str) -> Vec<Segment> {
        let max_chunk = self
            .config
            .segmentation
            .max_chunk_size
            .min(self.config.translation.get_max_chars_per_request());
        let min_chunk = self.config.segmentation.min_chunk_size;
        let segmenter = Segmenter::new(
            max_chunk,
            min_chunk,
            self.config.segmentation.preserve_structure,
        );
        let merger = Merger::new(min_chunk, max_chunk);
        merger.merge(segmenter.segment(content))
    }

    /// Where the translated document goes. Versioned by default so an
    /// earlier output is never clobbered; plain with `--force-overwrite`.
    fn output_path_for(&self, input_file: &Path, force_overwrite: bool) -> PathBuf {
        if force_overwrite {
            let stem = input_file
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("document");
            input_file.with_file_name(format!("{stem}_output.md"))
        } else {
            FileManager::versioned_output_path(input_file)
        }
    }

    /// Render the system prompt template with language display names
    fn render_system_prompt(&self) -> Result<String> {
        let source = language_utils::get_language_name(&self.config.source_language)?;
        let target = language_utils::get_language_name(&self.config.target_language)?;
        Ok(
            PromptTemplate::new(&self.config.translation.common.system_prompt_template)
                .render(&source, &target),
        )
    }

    // Format duration in a human-readable format
    fn format_duration(duration: std::time::Duration) -> String {
        let total_seconds = duration.as_secs();
        let hours = total_seconds / 3600;
        let minutes = (total_seconds % 3600) / 60;
        let seconds = total_seconds % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}.{:03}s", seconds, duration.subsec_millis())
        }
    }

    /// Run the workflow in folder mode, processing every Markdown file in
    /// a directory tree
    pub async fn run_folder(
        &self,
        input_dir: PathBuf,
        glossary_path: Option<PathBuf>,
        force_overwrite: bool,
        segment_only: bool,
    ) -> Result<()> {
        let start_time = Instant::now();

        if !input_dir.exists() {
            return Err(anyhow!("Input directory does not exist: {:?}", input_dir));
        }

        let markdown_files = FileManager::find_markdown_files(&input_dir)?;
        if markdown_files.is_empty() {
            return Err(anyhow!("No Markdown files found in directory: {:?}", input_dir));
        }

        let multi_progress = MultiProgress::new();
        let folder_pb = multi_progress.add(ProgressBar::new(markdown_files.len() as u64));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        folder_pb.set_style(template_result.progress_chars("█▓▒░"));
        folder_pb.set_message("Processing files");

        let mut success_count = 0;
        let mut error_count = 0;
        let interrupted = interrupt_flag();

        for markdown_file in &markdown_files {
            if interrupted.load(Ordering::SeqCst) {
                warn!("Interrupt received, stopping folder processing");
                break;
            }
            let file_name = markdown_file
                .file_name()
                .map(|f| f.to_string_lossy().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            folder_pb.set_message(format!("Processing: {}", file_name));

            match self
                .run_with_progress(
                    markdown_file.clone(),
                    glossary_path.clone(),
                    &multi_progress,
                    force_overwrite,
                    segment_only,
                )
                .await
            {
                Ok(()) => success_count += 1,
                Err(e) => {
                    error!("Error processing file {}: {}", file_name, e);
                    error_count += 1;
                }
            }
            folder_pb.inc(1);
        }

        folder_pb.finish_with_message("Folder processing complete");
        info!(
            "Folder processing completed: {} processed, {} errors - Duration: {}",
            success_count,
            error_count,
            Self::format_duration(start_time.elapsed())
        );
        Ok(())
    }
}

/// The shared interrupt flag, installing the Ctrl-C listener on first use
fn interrupt_flag() -> Arc<AtomicBool> {
    INSTALL_INTERRUPT_HANDLER.call_once(|| {
        let flag = Arc::clone(&INTERRUPTED);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received; finishing in-flight segments and saving state");
                flag.store(true, Ordering::SeqCst);
            }
        });
    });
    Arc::clone(&INTERRUPTED)
}

/// The stats table lives next to the output document
fn stats_table_path(output_path: &Path) -> PathBuf {
    match output_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.join("counting_table.csv"),
        _ => PathBuf::from("counting_table.csv"),
    }
}
