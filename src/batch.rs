//! # Batch Orchestrator
//!
//! Drives sequential compression of a selection and reports progress as a stream of events.
//!
//! ## Event Sequence
//!
//! For a batch of N images the stream yields, in order:
//!
//! ```text
//! ItemStarted(0) [ItemSkipped(0)] ItemStarted(1) ... ItemStarted(N-1) [ItemSkipped(N-1)] Finalizing Completed
//! ```
//!
//! Exactly one `ItemStarted` per image, `Finalizing` always reports 100%, and `Completed`
//! carries the collected results. A failed image yields `ItemSkipped` and contributes no result;
//! it never aborts the batch.
//!
//! ## Scheduling
//!
//! The stream is lazy: nothing is compressed until it is polled. Images are processed one at a
//! time in selection order, and the compressor call is the only suspension point. The stream
//! consumes the images, so a finished run cannot be restarted.

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::{self, Stream, StreamExt};
use tracing::{info, warn};

use crate::compress::{CompressionConstraints, Compressor};
use crate::config::TargetSize;
use crate::config::config::DEFAULT_MAX_ITERATIONS;
use crate::error::{ReduceError, ReduceResult};
use crate::model::CompressedResult;
use crate::selection::{MAX_SELECTION, SourceImage};

/// Progress reported while a batch runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// An image is about to be compressed.
    ItemStarted {
        index: usize,
        total: usize,
        name: String,
        /// Completed share of the batch, `index * 100 / total`.
        percent: u8,
    },
    /// The compressor failed for an image; it is left out of the results.
    ItemSkipped {
        index: usize,
        name: String,
        reason: String,
    },
    /// Every image has been attempted.
    Finalizing { percent: u8 },
    /// Terminal event carrying the results.
    Completed(BatchOutcome),
}

impl ProgressEvent {
    /// Human-readable status line for the event.
    pub fn status(&self) -> String {
        match self {
            ProgressEvent::ItemStarted {
                index, total, name, ..
            } => format!("Compressing {} of {}: {}", index + 1, total, name),
            ProgressEvent::ItemSkipped { name, reason, .. } => {
                format!("Skipped {}: {}", name, reason)
            }
            ProgressEvent::Finalizing { .. } => "Finalizing...".to_string(),
            ProgressEvent::Completed(outcome) => format!(
                "Compressed {} of {} image(s)",
                outcome.results.len(),
                outcome.total
            ),
        }
    }

    /// Progress percentage, where the event carries one.
    pub fn percent(&self) -> Option<u8> {
        match self {
            ProgressEvent::ItemStarted { percent, .. } | ProgressEvent::Finalizing { percent } => {
                Some(*percent)
            }
            ProgressEvent::Completed(_) => Some(100),
            ProgressEvent::ItemSkipped { .. } => None,
        }
    }
}

/// An image that produced no result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub index: usize,
    pub name: String,
    pub reason: String,
}

/// Everything a finished batch produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Results in processing order, with gaps where images were skipped.
    pub results: Vec<CompressedResult>,
    pub skipped: Vec<SkippedItem>,
    /// Number of images submitted.
    pub total: usize,
}

/// Receiver for progress events.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Submits batches to a compressor.
#[derive(Clone)]
pub struct BatchOrchestrator {
    compressor: Arc<dyn Compressor>,
    max_iterations: u32,
}

impl BatchOrchestrator {
    pub fn new(compressor: impl Compressor + 'static) -> Self {
        Self::from_arc(Arc::new(compressor))
    }

    pub fn from_arc(compressor: Arc<dyn Compressor>) -> Self {
        Self {
            compressor,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Start a batch. Fails without emitting anything if the batch is empty, larger than the
    /// selection limit, or the target is outside 10 KB..=2000 KB.
    pub fn submit(
        &self,
        images: Vec<SourceImage>,
        target_bytes: u64,
        preserve_resolution: bool,
    ) -> ReduceResult<BatchRun> {
        if images.is_empty() || images.len() > MAX_SELECTION {
            return Err(ReduceError::validation(
                "images",
                format!("batch must hold 1 to {} images", MAX_SELECTION),
                images.len().to_string(),
            ));
        }
        let target = TargetSize::from_bytes(target_bytes)?;
        info!(
            images = images.len(),
            target_bytes = target.bytes(),
            preserve_resolution,
            "batch submitted"
        );

        let state = RunState {
            compressor: Arc::clone(&self.compressor),
            total: images.len(),
            queue: images.into_iter().enumerate().collect(),
            pending: None,
            target,
            preserve_resolution,
            max_iterations: self.max_iterations,
            outcome: BatchOutcome::default(),
            phase: Phase::Items,
        };
        Ok(BatchRun {
            inner: Box::pin(stream::unfold(state, step)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Items,
    Finalizing,
    Complete,
    Done,
}

struct RunState {
    compressor: Arc<dyn Compressor>,
    total: usize,
    queue: VecDeque<(usize, SourceImage)>,
    /// Image announced by the last `ItemStarted`, compressed on the next poll.
    pending: Option<(usize, SourceImage)>,
    target: TargetSize,
    preserve_resolution: bool,
    max_iterations: u32,
    outcome: BatchOutcome,
    phase: Phase,
}

async fn step(mut st: RunState) -> Option<(ProgressEvent, RunState)> {
    loop {
        if let Some((index, image)) = st.pending.take() {
            if let Some(skipped) = st.compress_one(index, image).await {
                let event = ProgressEvent::ItemSkipped {
                    index: skipped.index,
                    name: skipped.name.clone(),
                    reason: skipped.reason.clone(),
                };
                st.outcome.skipped.push(skipped);
                return Some((event, st));
            }
            continue;
        }

        match st.phase {
            Phase::Items => match st.queue.pop_front() {
                Some((index, image)) => {
                    let event = ProgressEvent::ItemStarted {
                        index,
                        total: st.total,
                        name: image.name().to_string(),
                        percent: (index * 100 / st.total) as u8,
                    };
                    st.pending = Some((index, image));
                    return Some((event, st));
                }
                None => st.phase = Phase::Finalizing,
            },
            Phase::Finalizing => {
                st.phase = Phase::Complete;
                return Some((ProgressEvent::Finalizing { percent: 100 }, st));
            }
            Phase::Complete => {
                st.phase = Phase::Done;
                st.outcome.total = st.total;
                let outcome = std::mem::take(&mut st.outcome);
                info!(
                    compressed = outcome.results.len(),
                    skipped = outcome.skipped.len(),
                    total = outcome.total,
                    "batch complete"
                );
                return Some((ProgressEvent::Completed(outcome), st));
            }
            Phase::Done => return None,
        }
    }
}

impl RunState {
    /// Compress one image, recording the result. Returns the skip record on failure.
    async fn compress_one(&mut self, index: usize, image: SourceImage) -> Option<SkippedItem> {
        let name = image.name().to_string();
        let original_size = image.size();
        let constraints = CompressionConstraints {
            max_bytes: self.target.bytes(),
            max_dimension: image.max_dimension(),
            preserve_resolution: self.preserve_resolution,
            max_iterations: self.max_iterations,
        };
        match self.compressor.compress(image, constraints).await {
            Ok(compressed) => {
                info!(
                    index,
                    name = %name,
                    original_size,
                    new_size = compressed.bytes.len(),
                    iterations = compressed.iterations,
                    "image compressed"
                );
                self.outcome.results.push(CompressedResult::new(
                    compressed.name,
                    compressed.mime,
                    original_size,
                    &compressed.bytes,
                ));
                None
            }
            Err(e) => {
                warn!(index, name = %name, error = %e, "compression failed, skipping image");
                Some(SkippedItem {
                    index,
                    name,
                    reason: e.to_string(),
                })
            }
        }
    }
}

/// A running batch: a lazy, finite, non-restartable stream of [`ProgressEvent`]s.
pub struct BatchRun {
    inner: Pin<Box<dyn Stream<Item = ProgressEvent> + Send>>,
}

impl BatchRun {
    /// Drain the stream into `sink` and return the outcome.
    pub async fn drive(mut self, sink: &dyn ProgressSink) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        while let Some(event) = self.next().await {
            sink.on_event(&event);
            if let ProgressEvent::Completed(done) = event {
                outcome = done;
            }
        }
        outcome
    }
}

impl Stream for BatchRun {
    type Item = ProgressEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}
