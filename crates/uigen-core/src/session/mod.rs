//! Session controller: prompt in, committed snapshot (or recorded failure) out.
//!
//! A [`Session`] owns the snapshot store, the currently displayed artifact
//! and the generation pipeline. Only one generation may be in flight; a
//! second call gets [`SessionError::Busy`]. History and the active pointer
//! can be read at any time, including mid-generation.
//!
//! Failures from the pipeline or the plan parser never escape as errors.
//! They become [`GenerationOutcome::Failed`] and leave history and the
//! active pointer untouched.

pub mod attempt;
pub mod config;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::pipeline::{GenerationPipeline, PipelineError, Stage};
use crate::plan::{PlanParseError, UiNode, count_nodes, parse_plan};
use crate::snapshot::{NewSnapshot, Snapshot, SnapshotId, SnapshotStore, StoreError};

pub use attempt::AttemptState;
pub use config::{DEFAULT_ERROR_PLACEHOLDER, FailureDisplay, INITIAL_CODE, SessionConfig};

/// Errors surfaced to the caller of session commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a generation is already in progress")]
    Busy,

    #[error("snapshot {0} not found")]
    NotFound(SnapshotId),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SessionError::NotFound(id),
        }
    }
}

/// Why a generation attempt did not produce a snapshot.
#[derive(Debug, Error)]
pub enum GenerationFailure {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("plan rejected: {0}")]
    Plan(#[from] PlanParseError),
}

impl GenerationFailure {
    /// The pipeline stage that failed, if the failure came from a model call.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            GenerationFailure::Pipeline(e) => Some(e.stage),
            GenerationFailure::Plan(_) => None,
        }
    }
}

/// Result of [`Session::generate_from_prompt`].
#[derive(Debug)]
pub enum GenerationOutcome {
    /// The prompt was empty or whitespace; nothing happened.
    Skipped,
    /// A new snapshot was committed and made active.
    Committed(Arc<Snapshot>),
    /// Nothing was committed.
    Failed(GenerationFailure),
}

impl GenerationOutcome {
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            GenerationOutcome::Committed(s) => Some(s),
            _ => None,
        }
    }
}

/// Everything the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub generated_code: String,
    pub plan: Option<Vec<UiNode>>,
    /// Explanation of the displayed artifact, when it came from a snapshot.
    pub explanation: Option<String>,
    pub history: Vec<Arc<Snapshot>>,
    pub active_snapshot_id: Option<SnapshotId>,
    pub state: AttemptState,
}

/// The artifact currently on screen.
#[derive(Debug, Clone)]
struct Displayed {
    code: String,
    plan: Option<Vec<UiNode>>,
    explanation: Option<String>,
}

impl Displayed {
    fn initial() -> Self {
        Self {
            code: INITIAL_CODE.to_string(),
            plan: None,
            explanation: None,
        }
    }

    fn of(snapshot: &Snapshot) -> Self {
        Self {
            code: snapshot.code.clone(),
            plan: snapshot.plan.clone(),
            explanation: Some(snapshot.explanation.clone()),
        }
    }
}

#[derive(Debug)]
struct Inner {
    /// Identifies one run of history; a reset starts a new one.
    session_id: Uuid,
    store: SnapshotStore,
    displayed: Displayed,
    state: AttemptState,
}

impl Inner {
    fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            store: SnapshotStore::new(),
            displayed: Displayed::initial(),
            state: AttemptState::Idle,
        }
    }

    fn transition(&mut self, to: AttemptState) {
        debug_assert!(
            AttemptState::is_valid_transition(self.state, to),
            "invalid attempt transition {} -> {}",
            self.state,
            to
        );
        debug!(session_id = %self.session_id, from = %self.state, to = %to, "attempt transition");
        self.state = to;
    }
}

/// Holds the single-flight flag for the duration of a command.
///
/// Dropping the guard (normally, or because the generation future was
/// dropped) clears the flag and returns the attempt machine to idle.
struct FlightGuard<'a> {
    session: &'a Session,
}

impl<'a> FlightGuard<'a> {
    fn acquire(session: &'a Session) -> Result<Self, SessionError> {
        session
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::Busy)?;
        Ok(Self { session })
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        {
            let mut inner = self.session.write();
            if inner.state != AttemptState::Idle {
                inner.state = AttemptState::Idle;
            }
        }
        self.session.busy.store(false, Ordering::Release);
    }
}

/// A single interactive generation session.
#[derive(Debug)]
pub struct Session {
    pipeline: GenerationPipeline,
    config: SessionConfig,
    inner: RwLock<Inner>,
    busy: AtomicBool,
}

impl Session {
    /// Create an empty session. The pipeline's stage timeout is taken from
    /// `config`.
    pub fn new(pipeline: GenerationPipeline, config: SessionConfig) -> Self {
        let inner = Inner::new();
        info!(
            session_id = %inner.session_id,
            failure_display = %config.failure_display,
            "session started"
        );
        Self {
            pipeline: pipeline.with_stage_timeout(config.stage_timeout),
            config,
            inner: RwLock::new(inner),
            busy: AtomicBool::new(false),
        }
    }

    /// Id of the current history run. Changes on [`Self::reset`].
    pub fn id(&self) -> Uuid {
        self.read().session_id
    }

    /// Generate from `prompt` using the active snapshot as the base.
    pub async fn generate_from_prompt(
        &self,
        prompt: &str,
    ) -> Result<GenerationOutcome, SessionError> {
        self.generate_from_prompt_with_cancel(prompt, &CancellationToken::new())
            .await
    }

    /// Like [`Self::generate_from_prompt`], abortable through `cancel`.
    ///
    /// Returns `Err(Busy)` if another generation is in flight. Every other
    /// failure is reported as `Ok(GenerationOutcome::Failed(_))`.
    pub async fn generate_from_prompt_with_cancel(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, SessionError> {
        if prompt.trim().is_empty() {
            debug!(session_id = %self.id(), "ignoring empty prompt");
            return Ok(GenerationOutcome::Skipped);
        }

        let _guard = FlightGuard::acquire(self)?;

        // Capture the base now; a rollback during the request does not
        // change what this attempt was generated from.
        let (session_id, parent_id, base_code) = {
            let mut inner = self.write();
            inner.transition(AttemptState::Requesting);
            (
                inner.session_id,
                inner.store.active_id(),
                inner.store.active().map(|s| s.code.clone()),
            )
        };

        info!(
            session_id = %session_id,
            parent_id = ?parent_id,
            prompt_len = prompt.len(),
            "generation started"
        );

        let output = match self
            .pipeline
            .generate_with_cancel(prompt, base_code.as_deref(), cancel)
            .await
        {
            Ok(output) => output,
            Err(e) => return Ok(self.record_failure(e.into())),
        };

        self.write().transition(AttemptState::Validating);

        let plan = match parse_plan(&output.raw_plan) {
            Ok(plan) => plan,
            Err(e) => return Ok(self.record_failure(e.into())),
        };

        let nodes = count_nodes(&plan);
        let mut inner = self.write();
        let snapshot = inner.store.commit(NewSnapshot {
            parent_id,
            prompt: prompt.to_string(),
            code: output.code,
            plan: Some(plan),
            explanation: output.explanation,
        })?;
        inner.store.set_active(Some(snapshot.id))?;
        inner.displayed = Displayed::of(&snapshot);
        inner.transition(AttemptState::Committed);

        info!(
            session_id = %session_id,
            snapshot_id = snapshot.id,
            parent_id = ?snapshot.parent_id,
            nodes,
            "snapshot committed"
        );
        Ok(GenerationOutcome::Committed(snapshot))
    }

    fn record_failure(&self, failure: GenerationFailure) -> GenerationOutcome {
        let mut inner = self.write();
        warn!(
            session_id = %inner.session_id,
            stage = ?failure.stage(),
            error = %failure,
            "generation failed; nothing committed"
        );

        if self.config.failure_display == FailureDisplay::Placeholder {
            inner.displayed = Displayed {
                code: self.config.error_placeholder.clone(),
                plan: None,
                explanation: None,
            };
        }
        inner.transition(AttemptState::Failed);
        GenerationOutcome::Failed(failure)
    }

    /// Make `id` the active snapshot and display it.
    ///
    /// Never touches history. Allowed while a generation is in flight; that
    /// generation keeps the base it started with.
    pub fn rollback_to(&self, id: SnapshotId) -> Result<Arc<Snapshot>, SessionError> {
        let mut inner = self.write();
        let snapshot = inner
            .store
            .get(id)
            .cloned()
            .ok_or(SessionError::NotFound(id))?;
        inner.store.set_active(Some(id))?;
        inner.displayed = Displayed::of(&snapshot);
        info!(session_id = %inner.session_id, snapshot_id = id, "rolled back");
        Ok(snapshot)
    }

    /// Drop all history and return to the initial state.
    ///
    /// Snapshot ids restart at 1 under a fresh session id.
    pub fn reset(&self) -> Result<(), SessionError> {
        let _guard = FlightGuard::acquire(self)?;
        let mut inner = self.write();
        let previous = inner.session_id;
        *inner = Inner::new();
        info!(session_id = %inner.session_id, previous = %previous, "session reset");
        Ok(())
    }

    /// Snapshot of everything the presentation layer needs.
    pub fn view(&self) -> SessionView {
        let inner = self.read();
        SessionView {
            generated_code: inner.displayed.code.clone(),
            plan: inner.displayed.plan.clone(),
            explanation: inner.displayed.explanation.clone(),
            history: inner.store.history().to_vec(),
            active_snapshot_id: inner.store.active_id(),
            state: inner.state,
        }
    }

    pub fn history(&self) -> Vec<Arc<Snapshot>> {
        self.read().store.history().to_vec()
    }

    pub fn active_snapshot_id(&self) -> Option<SnapshotId> {
        self.read().store.active_id()
    }

    pub fn get(&self, id: SnapshotId) -> Option<Arc<Snapshot>> {
        self.read().store.get(id).cloned()
    }

    /// Run `f` against the store under a read lock.
    pub fn with_store<R>(&self, f: impl FnOnce(&SnapshotStore) -> R) -> R {
        f(&self.read().store)
    }

    pub fn attempt_state(&self) -> AttemptState {
        self.read().state
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
