//! Pure upload/validate/predict state machine.
//!
//! Every transition is a synchronous method on [`Workflow`]. Asynchronous
//! work (decoding, the prediction request) happens outside and re-enters
//! through [`Workflow::finish_validation`] and [`Workflow::finish_diagnosis`],
//! carrying the [`Generation`] or [`RequestTicket`] captured when the work
//! started. Results whose marker no longer matches are dropped.

use crate::dimensions::DecodeError;
use crate::prediction::{ImageUpload, PredictionError, PredictionOutcome};
use crate::preview::{PreviewId, PreviewLease, PreviewStore};
use crate::validation::{Rejection, ValidationOutcome, check_dimensions};
use crate::{CandidateFile, Dimensions};
use std::sync::Arc;

/// Bumped on every submission and reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Identity of one prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub generation: Generation,
    pub sequence: u64,
}

/// Coarse workflow state, derived from the fields of [`Workflow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Empty,
    Validating,
    Rejected,
    Ready,
    Predicting,
    Succeeded,
    Failed,
}

/// The accepted image and the preview it owns.
#[derive(Debug)]
pub struct Selection {
    name: String,
    content: Arc<[u8]>,
    dimensions: Dimensions,
    preview: PreviewLease,
}

impl Selection {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn preview(&self) -> PreviewId {
        self.preview.id()
    }

    fn upload(&self) -> ImageUpload {
        ImageUpload {
            name: self.name.clone(),
            content: self.content.clone(),
        }
    }
}

/// Work the driver has to carry out after [`Workflow::begin_diagnosis`].
#[derive(Debug, Clone)]
pub struct DiagnosisRequest {
    pub ticket: RequestTicket,
    pub upload: ImageUpload,
}

/// Read-only view handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub generation: Generation,
    pub phase: Phase,
    pub selection_name: Option<String>,
    pub preview: Option<PreviewId>,
    pub dimensions: Option<Dimensions>,
    pub error: Option<String>,
    pub validating: bool,
    pub in_flight: bool,
    pub result: Option<String>,
    pub tumor_detected: Option<bool>,
    pub can_run_diagnosis: bool,
}

impl WorkflowSnapshot {
    pub fn has_selection(&self) -> bool {
        self.selection_name.is_some()
    }
}

#[derive(Debug)]
pub struct Workflow {
    previews: PreviewStore,
    generation: Generation,
    pending_decode: Option<Generation>,
    selection: Option<Selection>,
    validation_error: Option<String>,
    in_flight: Option<RequestTicket>,
    outcome: Option<PredictionOutcome>,
    next_sequence: u64,
}

impl Workflow {
    pub fn new(previews: PreviewStore) -> Self {
        Self {
            previews,
            generation: Generation::default(),
            pending_decode: None,
            selection: None,
            validation_error: None,
            in_flight: None,
            outcome: None,
            next_sequence: 0,
        }
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn outcome(&self) -> Option<&PredictionOutcome> {
        self.outcome.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Starts a new selection cycle for `candidate`.
    ///
    /// Clears the previous selection (revoking its preview), any error, any
    /// outcome and the in-flight marker before the decode even starts.
    pub fn begin_submission(&mut self, candidate: &CandidateFile) -> Generation {
        self.clear_cycle();
        self.pending_decode = Some(self.generation);
        tracing::debug!(
            generation = self.generation.0,
            file = candidate.name(),
            bytes = candidate.len(),
            "candidate submitted"
        );
        self.generation
    }

    /// Applies a finished decode. Returns `None` when `generation` was
    /// superseded by a later submission or reset.
    pub fn finish_validation(
        &mut self,
        generation: Generation,
        candidate: CandidateFile,
        decoded: Result<Dimensions, DecodeError>,
    ) -> Option<ValidationOutcome> {
        if self.pending_decode != Some(generation) {
            tracing::debug!(
                stale = generation.0,
                current = self.generation.0,
                "discarding superseded decode"
            );
            return None;
        }
        self.pending_decode = None;

        let checked = match decoded {
            Ok(dimensions) => check_dimensions(dimensions).map(|()| dimensions),
            Err(err) => {
                tracing::debug!(file = candidate.name(), "decode failed: {err}");
                Err(Rejection::undecodable())
            }
        };

        match checked {
            Ok(dimensions) => {
                let preview = self.previews.acquire(candidate.content().clone());
                let id = preview.id();
                tracing::info!(file = candidate.name(), %dimensions, "image accepted");
                self.selection = Some(Selection {
                    name: candidate.name().to_string(),
                    content: candidate.content().clone(),
                    dimensions,
                    preview,
                });
                Some(ValidationOutcome::Accepted {
                    preview: id,
                    dimensions,
                })
            }
            Err(rejection) => {
                tracing::info!(file = candidate.name(), reason = %rejection.reason, "image rejected");
                self.selection = None;
                self.validation_error = Some(rejection.reason.clone());
                Some(ValidationOutcome::Rejected(rejection))
            }
        }
    }

    pub fn can_run_diagnosis(&self) -> bool {
        self.selection.is_some()
            && self.in_flight.is_none()
            && self.validation_error.is_none()
            && self.pending_decode.is_none()
    }

    /// Marks a prediction as in flight. `None` when the preconditions fail,
    /// in which case nothing changes.
    pub fn begin_diagnosis(&mut self) -> Option<DiagnosisRequest> {
        if !self.can_run_diagnosis() {
            tracing::debug!(
                in_flight = self.in_flight.is_some(),
                has_selection = self.selection.is_some(),
                "diagnosis request ignored"
            );
            return None;
        }
        let upload = self.selection.as_ref()?.upload();
        self.next_sequence += 1;
        let ticket = RequestTicket {
            generation: self.generation,
            sequence: self.next_sequence,
        };
        self.in_flight = Some(ticket);
        self.outcome = None;
        self.validation_error = None;
        Some(DiagnosisRequest { ticket, upload })
    }

    /// Applies a finished request. Returns `None` for stale tickets.
    pub fn finish_diagnosis(
        &mut self,
        ticket: RequestTicket,
        result: Result<String, PredictionError>,
    ) -> Option<PredictionOutcome> {
        if self.in_flight != Some(ticket) {
            tracing::debug!(
                stale = ticket.sequence,
                generation = ticket.generation.0,
                "discarding superseded prediction"
            );
            return None;
        }
        self.in_flight = None;

        if let Err(err) = &result {
            tracing::warn!(sequence = ticket.sequence, "prediction failed: {err}");
        }
        let outcome = PredictionOutcome::from_result(result);
        if let PredictionOutcome::Success { label } = &outcome {
            tracing::info!(sequence = ticket.sequence, %label, "prediction completed");
        }
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }

    /// Returns to `Empty`, revoking the preview and orphaning pending work.
    pub fn reset(&mut self) {
        self.clear_cycle();
    }

    fn clear_cycle(&mut self) {
        self.generation.0 += 1;
        self.pending_decode = None;
        self.selection = None;
        self.validation_error = None;
        self.in_flight = None;
        self.outcome = None;
    }

    pub fn phase(&self) -> Phase {
        if self.pending_decode.is_some() {
            Phase::Validating
        } else if self.validation_error.is_some() {
            Phase::Rejected
        } else if self.in_flight.is_some() {
            Phase::Predicting
        } else {
            match (&self.selection, &self.outcome) {
                (None, _) => Phase::Empty,
                (Some(_), None) => Phase::Ready,
                (Some(_), Some(PredictionOutcome::Success { .. })) => Phase::Succeeded,
                (Some(_), Some(PredictionOutcome::Failure { .. })) => Phase::Failed,
            }
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        let error = self.validation_error.clone().or_else(|| {
            self.outcome
                .as_ref()
                .and_then(|o| o.failure_reason().map(str::to_string))
        });
        WorkflowSnapshot {
            generation: self.generation,
            phase: self.phase(),
            selection_name: self.selection.as_ref().map(|s| s.name.clone()),
            preview: self.selection.as_ref().map(Selection::preview),
            dimensions: self.selection.as_ref().map(|s| s.dimensions),
            error,
            validating: self.pending_decode.is_some(),
            in_flight: self.in_flight.is_some(),
            result: self
                .outcome
                .as_ref()
                .and_then(|o| o.label().map(str::to_string)),
            tumor_detected: self.outcome.as_ref().and_then(PredictionOutcome::tumor_detected),
            can_run_diagnosis: self.can_run_diagnosis(),
        }
    }
}

impl Default for Workflow {
    fn default() -> Self {
        Self::new(PreviewStore::new())
    }
}
