//! Evaluation lifecycle.

use crate::error::StateError;
use crate::score::Score;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Status of one `evaluate` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvaluationState {
    NotStarted,
    Running,
    Succeeded { score: Score },
    Failed { reason: String },
}

impl EvaluationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    fn name(&self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
        }
    }
}

impl std::fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One evaluation of a build label, with timestamps.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    pub label: String,
    pub repeat: usize,
    pub state: EvaluationState,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Evaluation {
    pub fn new(label: impl Into<String>, repeat: usize) -> Self {
        Self {
            label: label.into(),
            repeat,
            state: EvaluationState::NotStarted,
            started_at: None,
            finished_at: None,
        }
    }

    fn reject(&self, requested: &str) -> StateError {
        StateError {
            current: self.state.to_string(),
            requested: requested.to_string(),
        }
    }

    /// NotStarted -> Running.
    pub fn start(&mut self) -> Result<(), StateError> {
        if self.state != EvaluationState::NotStarted {
            return Err(self.reject("running"));
        }
        self.state = EvaluationState::Running;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Running -> Succeeded.
    pub fn succeed(&mut self, score: Score) -> Result<(), StateError> {
        if self.state != EvaluationState::Running {
            return Err(self.reject("succeeded"));
        }
        self.state = EvaluationState::Succeeded { score };
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Running -> Failed.
    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), StateError> {
        if self.state != EvaluationState::Running {
            return Err(self.reject("failed"));
        }
        self.state = EvaluationState::Failed {
            reason: reason.into(),
        };
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    pub fn score(&self) -> Option<&Score> {
        match &self.state {
            EvaluationState::Succeeded { score } => Some(score),
            _ => None,
        }
    }
}
