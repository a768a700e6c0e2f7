//! Operator session: the inputs being prepared and the outcome of the last
//! analysis.
//!
//! - At most one analysis is in flight per session; `submit()` while busy is
//!   refused with `SessionError::Busy` instead of queueing.
//! - Starting a submission clears the previous report and error.
//! - On success the report replaces the previous one in a single step and the
//!   submitted artifacts are consumed from the session.
//! - `current_analysis()` reports what is running (task, model, start time).

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::analysis::{
    AnalysisError, AnalysisPipeline, AnalysisReport, TaskType, UploadedArtifact,
};

/// Snapshot of the analysis currently running.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveAnalysis {
    pub task: TaskType,
    pub artifacts: usize,
    pub model: String,
    /// When the analysis started (ISO 8601).
    pub started_at: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("An analysis is already running")]
    Busy,

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("Internal lock error")]
    LockPoisoned,
}

#[derive(Debug)]
struct SessionState {
    task: TaskType,
    context: String,
    artifacts: Vec<UploadedArtifact>,
    report: Option<AnalysisReport>,
    raw_json: Option<String>,
    last_error: Option<AnalysisError>,
}

pub struct AnalysisSession {
    pipeline: AnalysisPipeline,
    /// Held for the whole submission; `try_lock` gives single-flight.
    flight: tokio::sync::Mutex<()>,
    state: Mutex<SessionState>,
    current: Mutex<Option<ActiveAnalysis>>,
}

impl AnalysisSession {
    pub fn new(pipeline: AnalysisPipeline) -> Self {
        Self {
            pipeline,
            flight: tokio::sync::Mutex::new(()),
            state: Mutex::new(SessionState {
                task: TaskType::DetectOutbreak,
                context: String::new(),
                artifacts: Vec::new(),
                report: None,
                raw_json: None,
                last_error: None,
            }),
            current: Mutex::new(None),
        }
    }

    // ── Inputs ──────────────────────────────────────────────

    pub fn task(&self) -> Result<TaskType, SessionError> {
        Ok(self.lock_state()?.task)
    }

    pub fn set_task(&self, task: TaskType) -> Result<(), SessionError> {
        self.lock_state()?.task = task;
        Ok(())
    }

    pub fn context(&self) -> Result<String, SessionError> {
        Ok(self.lock_state()?.context.clone())
    }

    pub fn set_context(&self, context: impl Into<String>) -> Result<(), SessionError> {
        self.lock_state()?.context = context.into();
        Ok(())
    }

    /// Append an artifact; returns its id for later removal.
    pub fn add_artifact(&self, artifact: UploadedArtifact) -> Result<Uuid, SessionError> {
        let id = artifact.id();
        self.lock_state()?.artifacts.push(artifact);
        Ok(id)
    }

    /// Remove an artifact by id. Returns whether it was present.
    pub fn remove_artifact(&self, id: Uuid) -> Result<bool, SessionError> {
        let mut state = self.lock_state()?;
        let before = state.artifacts.len();
        state.artifacts.retain(|a| a.id() != id);
        Ok(state.artifacts.len() != before)
    }

    pub fn artifacts(&self) -> Result<Vec<UploadedArtifact>, SessionError> {
        Ok(self.lock_state()?.artifacts.clone())
    }

    // ── Outcome ─────────────────────────────────────────────

    pub fn report(&self) -> Result<Option<AnalysisReport>, SessionError> {
        Ok(self.lock_state()?.report.clone())
    }

    /// Pretty-printed JSON of the latest report, for a debug view.
    pub fn raw_json(&self) -> Result<Option<String>, SessionError> {
        Ok(self.lock_state()?.raw_json.clone())
    }

    pub fn last_error(&self) -> Result<Option<AnalysisError>, SessionError> {
        Ok(self.lock_state()?.last_error.clone())
    }

    pub fn is_busy(&self) -> bool {
        self.flight.try_lock().is_err()
    }

    /// What analysis is currently running? `None` when idle.
    pub fn current_analysis(&self) -> Option<ActiveAnalysis> {
        self.current.lock().ok()?.clone()
    }

    // ── Submission ──────────────────────────────────────────

    /// Run one analysis over the current inputs.
    pub async fn submit(&self) -> Result<AnalysisReport, SessionError> {
        let flight = self.flight.try_lock().map_err(|_| SessionError::Busy)?;

        let (task, context, artifacts) = {
            let mut state = self.lock_state()?;
            state.report = None;
            state.raw_json = None;
            state.last_error = None;
            (state.task, state.context.clone(), state.artifacts.clone())
        };
        let submitted: HashSet<Uuid> = artifacts.iter().map(UploadedArtifact::id).collect();

        let _active = ActiveGuard::start(self, flight, task, artifacts.len());
        let result = self.pipeline.analyze(task, &context, artifacts).await;

        let mut state = self.lock_state()?;
        match result {
            Ok(report) => {
                let raw_json = serde_json::to_string_pretty(&report).ok();
                state.report = Some(report.clone());
                state.raw_json = raw_json;
                state.artifacts.retain(|a| !submitted.contains(&a.id()));
                Ok(report)
            }
            Err(err) => {
                state.last_error = Some(err.clone());
                Err(err.into())
            }
        }
    }

    // ── Internal ────────────────────────────────────────────

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, SessionError> {
        self.state.lock().map_err(|_| SessionError::LockPoisoned)
    }

    fn set_current(&self, active: Option<ActiveAnalysis>) {
        if let Ok(mut current) = self.current.lock() {
            *current = active;
        }
    }
}

/// Holds the single-flight lock for one submission. Dropping it releases the
/// lock and clears the current analysis.
struct ActiveGuard<'a> {
    _flight: tokio::sync::MutexGuard<'a, ()>,
    session: &'a AnalysisSession,
}

impl<'a> ActiveGuard<'a> {
    fn start(
        session: &'a AnalysisSession,
        flight: tokio::sync::MutexGuard<'a, ()>,
        task: TaskType,
        artifacts: usize,
    ) -> Self {
        session.set_current(Some(ActiveAnalysis {
            task,
            artifacts,
            model: session.pipeline.model_name().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
        }));
        Self {
            _flight: flight,
            session,
        }
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.session.set_current(None);
    }
}
