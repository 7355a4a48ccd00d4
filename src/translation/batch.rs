/*!
 * Concurrent scheduling of translation steps.
 *
 * This module drives up to `W` translation steps at a time over a
 * pre-loaded segment list and guarantees that the output document keeps
 * the input order. Completions pass through one exclusive section that
 * merges new terms into the run's aggregated terminology and hands the
 * result to the ordered flush.
 */

use anyhow::{anyhow, Result};
use futures::stream::{self, StreamExt};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::document::{OutputWriter, Segment};
use crate::glossary::{AggregatedTerminology, Glossary, TermMatcher};
use crate::translation::checkpoint::Checkpoint;
use crate::translation::core::TranslationService;
use crate::translation::step::execute_translation_step;

/// One result queued for ordered writing
#[derive(Debug, Clone)]
pub struct FlushItem {
    /// Heading chain to replay before the text; `None` for continuation
    /// segments, which emit no headings
    pub header_path: Option<Vec<String>>,
    /// The text to append
    pub text: String,
    /// Optional notes block appended behind a rule
    pub notes: Option<String>,
}

/// Append-only writer front backed by the output cursor.
///
/// Results arrive in completion order; a result for sequence `n` parks
/// in the pending map until every earlier segment has been written.
#[derive(Debug)]
pub struct OrderedFlush {
    writer: OutputWriter,
    /// The next sequence number expected to flush
    next: usize,
    /// Out-of-order completions keyed by sequence number
    pending: BTreeMap<usize, FlushItem>,
    /// Segments written so far
    flushed: usize,
}

impl OrderedFlush {
    /// Create an ordered flush starting at `first_sequence`
    pub fn new(writer: OutputWriter, first_sequence: usize) -> Self {
        Self {
            writer,
            next: first_sequence,
            pending: BTreeMap::new(),
            flushed: 0,
        }
    }

    /// Queue one result and drain everything now contiguous. Returns the
    /// number of segments written by this call.
    pub fn push(&mut self, sequence_number: usize, item: FlushItem) -> Result<usize> {
        self.pending.insert(sequence_number, item);
        let mut written = 0;
        while let Some(item) = self.pending.remove(&self.next) {
            self.writer.append_segment(
                item.header_path.as_deref(),
                &item.text,
                item.notes.as_deref(),
            )?;
            self.next += 1;
            self.flushed += 1;
            written += 1;
        }
        Ok(written)
    }

    /// Segments written so far
    pub fn flushed(&self) -> usize {
        self.flushed
    }

    /// The next sequence number awaiting flush
    pub fn next_expected(&self) -> usize {
        self.next
    }

    /// Results parked out of order
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Shared handle gating the diagnostic probe to at most one at a time.
/// Once a probe confirms a systemic outage the degraded flag suppresses
/// all further probes for the run.
#[derive(Debug, Default)]
pub struct DiagnosticsGate {
    state: parking_lot::Mutex<GateState>,
}

#[derive(Debug, Default)]
struct GateState {
    probing: bool,
    degraded: bool,
}

impl DiagnosticsGate {
    /// Create an open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the probe slot; `false` while a probe is in flight or the
    /// run is already known degraded
    pub fn try_begin(&self) -> bool {
        let mut state = self.state.lock();
        if state.probing || state.degraded {
            false
        } else {
            state.probing = true;
            true
        }
    }

    /// Release the probe slot, optionally marking the run degraded
    pub fn finish(&self, degraded: bool) {
        let mut state = self.state.lock();
        state.probing = false;
        state.degraded |= degraded;
    }

    /// Whether a probe confirmed a systemic outage
    pub fn is_degraded(&self) -> bool {
        self.state.lock().degraded
    }
}

/// Everything the workers mutate, behind one async mutex
struct SharedState {
    flush: OrderedFlush,
    aggregated: AggregatedTerminology,
    checkpoint: Checkpoint,
    failed: Vec<(usize, String)>,
    token_cost: u64,
    degraded_segments: usize,
    completed: usize,
}

/// Result of one scheduler run
#[derive(Debug)]
pub struct BatchOutcome {
    /// Terms discovered across the run, for persistence
    pub aggregated: AggregatedTerminology,
    /// Segments translated by this run
    pub completed: usize,
    /// Failed segments with their last error
    pub failed: Vec<(usize, String)>,
    /// Segments that succeeded only on the degraded path
    pub degraded_segments: usize,
    /// Tokens spent across the run
    pub token_cost: u64,
    /// Whether the run stopped on an operator interrupt
    pub interrupted: bool,
    /// Whether a diagnostic probe confirmed a systemic outage
    pub service_degraded: bool,
    /// Source content of the first segment not yet written, for the
    /// rest file
    pub first_unwritten_content: Option<String>,
}

/// Concurrent scheduler over a checkpointed segment list
pub struct BatchScheduler {
    service: TranslationService,
    matcher: TermMatcher,
    system_prompt: String,
    workers: usize,
}

impl BatchScheduler {
    /// Create a scheduler running up to `workers` steps at a time
    pub fn new(
        service: TranslationService,
        matcher: TermMatcher,
        system_prompt: String,
        workers: usize,
    ) -> Self {
        Self {
            service,
            matcher,
            system_prompt,
            workers: workers.max(1),
        }
    }

    /// Run every pending record of the checkpoint to completion.
    ///
    /// Completed records (from a resumed run) are re-emitted through the
    /// ordered flush first and their terms folded into the aggregate, so
    /// conflict detection sees the same terminology the earlier run did.
    /// The progress callback receives `(flushed, total)` after every write.
    pub async fn run(
        &self,
        base_glossary: Arc<Glossary>,
        writer: OutputWriter,
        checkpoint: Checkpoint,
        interrupted: Arc<AtomicBool>,
        progress: impl Fn(usize, usize) + Clone + Send + Sync + 'static,
    ) -> Result<BatchOutcome> {
        let total = checkpoint.records().len();
        let first_sequence = checkpoint
            .records()
            .first()
            .map(|r| r.paragraph_number)
            .unwrap_or(1);
        let pending = checkpoint.pending_segments();

        let mut flush = OrderedFlush::new(writer, first_sequence);
        let mut aggregated = AggregatedTerminology::new();
        for record in checkpoint.completed_records() {
            aggregated.merge(&base_glossary, record.new_terms.clone());
            let segment = record.to_segment();
            flush.push(
                record.paragraph_number,
                FlushItem {
                    header_path: header_path_for(&segment),
                    text: record.translation.clone(),
                    notes: non_empty(&record.notes),
                },
            )?;
        }
        if flush.flushed() > 0 {
            info!(
                "Re-emitted {} completed segments from checkpoint",
                flush.flushed()
            );
            progress(flush.flushed(), total);
        }

        let state = Arc::new(Mutex::new(SharedState {
            flush,
            aggregated,
            checkpoint,
            failed: Vec::new(),
            token_cost: 0,
            degraded_segments: 0,
            completed: 0,
        }));
        let gate = Arc::new(DiagnosticsGate::new());

        let worker_results: Vec<Result<()>> = stream::iter(pending)
            .map(|segment| {
                let service = self.service.clone();
                let matcher = self.matcher.clone();
                let system_prompt = self.system_prompt.clone();
                let base_glossary = Arc::clone(&base_glossary);
                let state = Arc::clone(&state);
                let gate = Arc::clone(&gate);
                let interrupted = Arc::clone(&interrupted);
                let progress = progress.clone();
                async move {
                    if interrupted.load(Ordering::SeqCst) {
                        return Ok(());
                    }
                    let snapshot = { state.lock().await.aggregated.clone() };
                    let result = execute_translation_step(
                        &service,
                        &matcher,
                        &system_prompt,
                        &segment,
                        &base_glossary,
                        &snapshot,
                    )
                    .await;

                    let mut st = state.lock().await;
                    match result {
                        Ok(outcome) => {
                            st.token_cost += outcome.token_cost;
                            if outcome.degraded {
                                st.degraded_segments += 1;
                            }
                            st.aggregated.merge(&base_glossary, outcome.new_terms.clone());
                            let notes = outcome.annotation_notes.clone().unwrap_or_default();
                            st.checkpoint.mark_completed(
                                outcome.sequence_number,
                                &outcome.translated_text,
                                &notes,
                                &outcome.new_terms,
                            )?;
                            st.flush.push(
                                outcome.sequence_number,
                                FlushItem {
                                    header_path: header_path_for(&segment),
                                    text: outcome.translated_text,
                                    notes: outcome.annotation_notes,
                                },
                            )?;
                            st.completed += 1;
                            progress(st.flush.flushed(), total);
                            Ok(())
                        }
                        Err(e) => {
                            error!("Segment {} failed: {e}", segment.sequence_number);
                            st.failed.push((segment.sequence_number, e.to_string()));
                            // The output stays contiguous; the source text
                            // stands in with a visible failure note. The
                            // checkpoint record stays pending for a rerun.
                            st.flush.push(
                                segment.sequence_number,
                                FlushItem {
                                    header_path: header_path_for(&segment),
                                    text: segment.content_without_marker().to_string(),
                                    notes: Some(format!("Translation failed: {e}")),
                                },
                            )?;
                            progress(st.flush.flushed(), total);
                            drop(st);
                            if gate.try_begin() {
                                let report = service.run_diagnostics().await;
                                gate.finish(report.all_failed());
                            }
                            Ok(())
                        }
                    }
                }
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;
        for result in worker_results {
            result?;
        }

        let state = Arc::try_unwrap(state)
            .map_err(|_| anyhow!("Scheduler state still shared after run"))?
            .into_inner();
        let was_interrupted = interrupted.load(Ordering::SeqCst);
        let first_unwritten_content = state
            .checkpoint
            .records()
            .iter()
            .find(|r| r.paragraph_number == state.flush.next_expected())
            .map(|r| r.content.clone());

        if !state.failed.is_empty() {
            warn!(
                "{} of {} segments failed: {:?}",
                state.failed.len(),
                total,
                state.failed.iter().map(|(n, _)| n).collect::<Vec<_>>()
            );
        }
        if state.checkpoint.completed_count() == total && !was_interrupted {
            info!("All {total} segments completed, removing checkpoint");
            state.checkpoint.remove()?;
        }

        Ok(BatchOutcome {
            aggregated: state.aggregated,
            completed: state.completed,
            failed: state.failed,
            degraded_segments: state.degraded_segments,
            token_cost: state.token_cost,
            interrupted: was_interrupted,
            service_degraded: gate.is_degraded(),
            first_unwritten_content,
        })
    }
}

/// Continuation segments already live inside their heading context
pub fn header_path_for(segment: &Segment) -> Option<Vec<String>> {
    if segment.is_continuation {
        None
    } else {
        Some(segment.header_path.clone())
    }
}

fn non_empty(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
