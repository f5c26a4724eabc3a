//! Saga and step state machines.

use serde::{Deserialize, Serialize};

/// The state of a saga in its lifecycle.
///
/// State transitions:
/// ```text
/// Running ──┬──► Completed
///           └──► Compensating ──► Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaStatus {
    /// Forward steps are being executed.
    #[default]
    Running,

    /// A step failed and earlier steps are being undone.
    Compensating,

    /// Compensation finished after a failure (terminal state).
    Failed,

    /// All forward steps succeeded (terminal state).
    Completed,
}

impl SagaStatus {
    /// Returns true if compensation may begin or resume.
    pub fn can_compensate(&self) -> bool {
        matches!(self, SagaStatus::Running | SagaStatus::Compensating)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Failed)
    }

    /// Returns the wire name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Running => "RUNNING",
            SagaStatus::Compensating => "COMPENSATING",
            SagaStatus::Failed => "FAILED",
            SagaStatus::Completed => "COMPLETED",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a single saga step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// The step was recorded and is executing.
    Started,

    /// The step's start event was acknowledged and its work is done.
    Succeeded,

    /// The step's effect was undone.
    Compensated,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Started => "STARTED",
            StepStatus::Succeeded => "SUCCEEDED",
            StepStatus::Compensated => "COMPENSATED",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
