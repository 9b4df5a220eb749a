//! # Upload Session
//!
//! State machine behind the upload screen: it owns the selection and the target settings,
//! gates risky or destructive actions behind a [`Confirm`] prompt, runs one batch at a time and
//! hands the results to the store.
//!
//! ## States
//!
//! ```text
//!   Idle ──start()──► Processing ──batch completes──► Idle
//! ```
//!
//! Views only observe [`SessionState`]; the progress of a running batch arrives through the
//! [`ProgressSink`] passed to [`Session::start`].

use std::path::Path;
use std::sync::Mutex;

use tracing::info;

use crate::batch::{BatchOrchestrator, BatchOutcome, ProgressSink};
use crate::config::{ReduceConfig, TargetSize};
use crate::error::{ReduceError, ReduceResult};
use crate::selection::{AddOutcome, Selection, upscale_risk};
use crate::store::{self, HandoffStore, PersistReport};

pub const UPSCALE_WARNING: &str = "At least one image is smaller than the target size. Compressing it may not reduce its size. Continue anyway?";
pub const START_OVER_WARNING: &str =
    "Are you sure? Your current compressed files will be permanently deleted";
pub const LEAVE_WARNING: &str = "You have selected images that have not been compressed. Leave anyway?";

/// Yes/no prompt shown before a risky or destructive action.
pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> bool;
}

impl<F> Confirm for F
where
    F: FnMut(&str) -> bool,
{
    fn confirm(&mut self, prompt: &str) -> bool {
        self(prompt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Processing,
}

/// Result of [`Session::start`].
#[derive(Debug)]
pub enum StartOutcome {
    /// The upscale warning was declined; the selection is untouched.
    Declined,
    /// The batch ran and its results were handed to the store.
    Completed {
        outcome: BatchOutcome,
        persist: PersistReport,
    },
}

pub struct Session {
    selection: Selection,
    target: TargetSize,
    preserve_resolution: bool,
    state: SessionState,
    orchestrator: BatchOrchestrator,
}

impl Session {
    pub fn new(orchestrator: BatchOrchestrator) -> Self {
        Self {
            selection: Selection::new(),
            target: TargetSize::default(),
            preserve_resolution: false,
            state: SessionState::Idle,
            orchestrator,
        }
    }

    /// Session with the target, resolution preference and compressor of `config`.
    pub fn from_config(config: &ReduceConfig) -> Self {
        let orchestrator =
            BatchOrchestrator::new(config.to_compressor()).with_max_iterations(config.max_iterations);
        let mut session = Self::new(orchestrator);
        session.target = config.target;
        session.preserve_resolution = config.preserve_resolution;
        session
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut Selection {
        &mut self.selection
    }

    pub fn target(&self) -> TargetSize {
        self.target
    }

    pub fn set_target(&mut self, target: TargetSize) {
        self.target = target;
    }

    /// Move the target control; out-of-range values clamp to the nearest allowed step.
    pub fn set_target_kb(&mut self, kb: i64) -> TargetSize {
        self.target = TargetSize::clamp_kb(kb);
        self.target
    }

    pub fn preserve_resolution(&self) -> bool {
        self.preserve_resolution
    }

    pub fn set_preserve_resolution(&mut self, preserve: bool) {
        self.preserve_resolution = preserve;
    }

    pub fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> AddOutcome {
        self.selection.add_paths(paths)
    }

    /// Whether leaving now would discard selected images.
    pub fn has_pending_selection(&self) -> bool {
        !self.selection.is_empty()
    }

    /// Navigation guard: `true` when it is fine to leave.
    pub fn confirm_leave(&self, confirm: &mut dyn Confirm) -> bool {
        !self.has_pending_selection() || confirm.confirm(LEAVE_WARNING)
    }

    /// Compress the whole selection and write the results to `handoff`.
    ///
    /// When an image is already smaller than the target the user is asked first; declining
    /// leaves the selection as it was. The store is locked only after the batch finishes.
    pub async fn start(
        &mut self,
        confirm: &mut dyn Confirm,
        sink: &dyn ProgressSink,
        handoff: &Mutex<HandoffStore>,
    ) -> ReduceResult<StartOutcome> {
        if self.selection.is_empty() {
            return Err(ReduceError::validation("images", "select at least one image", "0"));
        }
        let risky = upscale_risk(self.selection.images(), self.target).len();
        if risky > 0 && !confirm.confirm(UPSCALE_WARNING) {
            info!(risky, "batch declined at upscale warning");
            return Ok(StartOutcome::Declined);
        }

        self.state = SessionState::Processing;
        let images = self.selection.take();
        let run = match self
            .orchestrator
            .submit(images, self.target.bytes(), self.preserve_resolution)
        {
            Ok(run) => run,
            Err(e) => {
                self.state = SessionState::Idle;
                return Err(e);
            }
        };
        let outcome = run.drive(sink).await;
        self.state = SessionState::Idle;

        let persist = store::lock(handoff).write(outcome.results.clone());
        Ok(StartOutcome::Completed { outcome, persist })
    }

    /// Start over: after confirmation, drop the selection and the stored results.
    /// Returns `None` when the user declined.
    pub fn start_over(
        &mut self,
        confirm: &mut dyn Confirm,
        handoff: &Mutex<HandoffStore>,
    ) -> Option<PersistReport> {
        if !confirm.confirm(START_OVER_WARNING) {
            return None;
        }
        self.selection.clear();
        Some(store::lock(handoff).clear())
    }
}
