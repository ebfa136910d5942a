//! KPI entry submission gate
//!
//! ```text
//! Idle → Validating → Clean ─────────────────┐
//!          │      └─→ AnomalyPending ─confirm─┤
//!          └─ missing fields → Idle           ↓
//!                                   Saving → Saved | Failed
//! ```
//!
//! Validation and the anomaly check are synchronous; only `save` talks to
//! the backend. There is no automatic retry: from `Failed` the caller
//! submits again.

use chrono::NaiveDate;
use tracing::debug;

use crate::analytics::{check_anomalies, AnomalyWarning};
use crate::backend::KpiBackend;
use crate::error::CoreError;
use crate::models::{KpiCandidate, KpiRecord, Metric, TrackedMetricSet};

/// Current state of an entry
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionState {
    Idle,
    Validating,
    /// Ready to save
    Clean,
    /// Waiting for the user to confirm unusual values
    AnomalyPending(Vec<AnomalyWarning>),
    Saving,
    Saved(KpiRecord),
    /// Backend error detail, verbatim
    Failed(String),
}

impl SubmissionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Clean => "clean",
            Self::AnomalyPending(_) => "anomaly-pending",
            Self::Saving => "saving",
            Self::Saved(_) => "saved",
            Self::Failed(_) => "failed",
        }
    }
}

/// Drives one KPI entry from submit to saved
#[derive(Debug)]
pub struct KpiSubmission {
    state: SubmissionState,
    candidate: Option<KpiCandidate>,
}

impl Default for KpiSubmission {
    fn default() -> Self {
        Self::new()
    }
}

impl KpiSubmission {
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Idle,
            candidate: None,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn candidate(&self) -> Option<&KpiCandidate> {
        self.candidate.as_ref()
    }

    /// Warnings awaiting confirmation, empty outside `AnomalyPending`
    pub fn warnings(&self) -> &[AnomalyWarning] {
        match &self.state {
            SubmissionState::AnomalyPending(warnings) => warnings,
            _ => &[],
        }
    }

    fn transition(&mut self, next: SubmissionState) {
        debug!(from = self.state.name(), to = next.name(), "KPI submission transition");
        self.state = next;
    }

    fn invalid(&self, action: &'static str) -> CoreError {
        CoreError::InvalidTransition {
            from: self.state.name(),
            action,
        }
    }

    /// Validate required fields and run the anomaly check
    ///
    /// # Errors
    /// `MissingFields` (state back to `Idle`) when a tracked metric has no
    /// value; `InvalidValue` (state back to `Idle`) for a negative or
    /// non-finite CA; `InvalidTransition` while a save is in flight.
    pub fn submit(
        &mut self,
        candidate: KpiCandidate,
        history: &[KpiRecord],
        tracked: TrackedMetricSet,
    ) -> Result<&SubmissionState, CoreError> {
        if matches!(self.state, SubmissionState::Saving | SubmissionState::Validating) {
            return Err(self.invalid("submit"));
        }

        self.transition(SubmissionState::Validating);

        let missing = tracked.missing_in(&candidate);
        if !missing.is_empty() {
            self.candidate = None;
            self.transition(SubmissionState::Idle);
            return Err(CoreError::MissingFields { fields: missing });
        }

        if let Some(ca) = candidate.ca.filter(|ca| !ca.is_finite() || *ca < 0.0) {
            self.candidate = None;
            self.transition(SubmissionState::Idle);
            return Err(CoreError::InvalidValue {
                metric: Metric::Ca,
                value: ca,
            });
        }

        let warnings = check_anomalies(&candidate, history, tracked);
        self.candidate = Some(candidate);

        if warnings.is_empty() {
            self.transition(SubmissionState::Clean);
        } else {
            self.transition(SubmissionState::AnomalyPending(warnings));
        }

        Ok(&self.state)
    }

    /// User confirmed the flagged values
    pub fn confirm(&mut self) -> Result<(), CoreError> {
        match self.state {
            SubmissionState::AnomalyPending(_) => {
                self.transition(SubmissionState::Clean);
                Ok(())
            }
            _ => Err(self.invalid("confirm")),
        }
    }

    /// User went back to edit the entry
    pub fn cancel(&mut self) -> Result<(), CoreError> {
        match self.state {
            SubmissionState::AnomalyPending(_) => {
                self.transition(SubmissionState::Idle);
                Ok(())
            }
            _ => Err(self.invalid("cancel")),
        }
    }

    /// Persist the validated entry
    ///
    /// `today` is used when the candidate carries no date. On failure the
    /// state is `Failed` with the backend's detail and the error is returned.
    pub async fn save<B: KpiBackend + ?Sized>(
        &mut self,
        backend: &B,
        seller: &str,
        today: NaiveDate,
    ) -> Result<KpiRecord, CoreError> {
        if self.state != SubmissionState::Clean {
            return Err(self.invalid("save"));
        }
        let Some(candidate) = self.candidate.as_ref() else {
            return Err(self.invalid("save"));
        };

        let record = candidate.to_record(today);
        self.transition(SubmissionState::Saving);

        match backend.save_record(seller, &record).await {
            Ok(saved) => {
                self.transition(SubmissionState::Saved(saved.clone()));
                Ok(saved)
            }
            Err(e) => {
                self.transition(SubmissionState::Failed(e.display_detail()));
                Err(e)
            }
        }
    }
}
