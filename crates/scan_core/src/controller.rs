//! Async driver around [`Workflow`].
//!
//! The controller is the only thing that mutates workflow state. Each entry
//! point applies its synchronous transition immediately, then spawns the
//! decode or request on the tokio runtime. Results re-enter through the
//! workflow's staleness checks, and every change is published on a watch
//! channel for the presentation layer.

use crate::dimensions::{DecodeError, DimensionReader};
use crate::prediction::{PredictionClient, PredictionError, PredictionOutcome};
use crate::preview::{PreviewId, PreviewStore};
use crate::validation::ValidationOutcome;
use crate::workflow::{Generation, RequestTicket, Workflow, WorkflowSnapshot};
use crate::{CandidateFile, Dimensions};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Shared {
    workflow: Mutex<Workflow>,
    reader: Arc<dyn DimensionReader>,
    client: Arc<dyn PredictionClient>,
    state_tx: watch::Sender<WorkflowSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Workflow> {
        self.workflow
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` against the workflow and publishes the resulting state.
    fn update<R>(&self, f: impl FnOnce(&mut Workflow) -> R) -> R {
        let mut workflow = self.lock();
        let out = f(&mut workflow);
        self.state_tx.send_replace(workflow.snapshot());
        out
    }
}

/// Handle to one user's upload/predict session. Clones share state.
#[derive(Clone)]
pub struct Controller {
    shared: Arc<Shared>,
}

impl Controller {
    pub fn new(reader: Arc<dyn DimensionReader>, client: Arc<dyn PredictionClient>) -> Self {
        let workflow = Workflow::new(PreviewStore::new());
        let (state_tx, _) = watch::channel(workflow.snapshot());
        Self {
            shared: Arc::new(Shared {
                workflow: Mutex::new(workflow),
                reader,
                client,
                state_tx,
            }),
        }
    }

    pub fn snapshot(&self) -> WorkflowSnapshot {
        self.shared.lock().snapshot()
    }

    /// Receiver that observes every published state change.
    pub fn subscribe(&self) -> watch::Receiver<WorkflowSnapshot> {
        self.shared.state_tx.subscribe()
    }

    /// Bytes of a live preview, for rendering.
    pub fn preview_bytes(&self, id: PreviewId) -> Option<Arc<[u8]>> {
        self.shared.lock().previews().resolve(id)
    }

    pub fn live_previews(&self) -> usize {
        self.shared.lock().previews().live_count()
    }

    /// Starts validating `candidate`.
    ///
    /// Previous results are cleared before this returns. The task resolves to
    /// `None` if another submission superseded this one before its decode
    /// finished. Must be called from within a tokio runtime.
    pub fn submit_candidate(&self, candidate: CandidateFile) -> JoinHandle<Option<ValidationOutcome>> {
        let generation = self.shared.update(|wf| wf.begin_submission(&candidate));
        let content = candidate.content().clone();
        let guard = DecodeGuard {
            shared: self.shared.clone(),
            pending: Some((generation, candidate)),
        };
        let reader = self.shared.reader.clone();
        tokio::spawn(async move {
            let decoded = reader.read_dimensions(content).await;
            guard.complete(decoded)
        })
    }

    /// Starts a diagnosis of the current selection.
    ///
    /// Returns `None` without side effects when diagnosis is not allowed
    /// right now (nothing selected, validation error, already in flight).
    /// The task resolves to `None` if the selection changed meanwhile.
    pub fn run_diagnosis(&self) -> Option<JoinHandle<Option<PredictionOutcome>>> {
        let request = {
            let mut workflow = self.shared.lock();
            let request = workflow.begin_diagnosis()?;
            self.shared.state_tx.send_replace(workflow.snapshot());
            request
        };
        let guard = InFlightGuard {
            shared: self.shared.clone(),
            ticket: Some(request.ticket),
        };
        let client = self.shared.client.clone();
        Some(tokio::spawn(async move {
            let result = client.predict(request.upload).await;
            guard.complete(result)
        }))
    }
}

/// Resolves the decode it guards exactly once. A reader that panics or a
/// task that is aborted leaves the candidate rejected as undecodable instead
/// of stuck in `Validating`.
struct DecodeGuard {
    shared: Arc<Shared>,
    pending: Option<(Generation, CandidateFile)>,
}

impl DecodeGuard {
    fn complete(mut self, decoded: Result<Dimensions, DecodeError>) -> Option<ValidationOutcome> {
        let (generation, candidate) = self.pending.take()?;
        self.shared
            .update(|wf| wf.finish_validation(generation, candidate, decoded))
    }
}

impl Drop for DecodeGuard {
    fn drop(&mut self) {
        if let Some((generation, candidate)) = self.pending.take() {
            self.shared.update(|wf| {
                wf.finish_validation(generation, candidate, Err(DecodeError::Aborted))
            });
        }
    }
}

/// Finishes the request it guards exactly once. If the task is dropped
/// before completing (aborted, or the client panicked) the request is
/// finished as a failure so the in-flight flag never sticks.
struct InFlightGuard {
    shared: Arc<Shared>,
    ticket: Option<RequestTicket>,
}

impl InFlightGuard {
    fn complete(mut self, result: Result<String, PredictionError>) -> Option<PredictionOutcome> {
        let ticket = self.ticket.take()?;
        self.shared.update(|wf| wf.finish_diagnosis(ticket, result))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.shared
                .update(|wf| wf.finish_diagnosis(ticket, Err(PredictionError::Aborted)));
        }
    }
}
