//! Deployment state machine and the step log it produces.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use hvdc_core::ErrorKind;

use crate::validation::ValidationResult;

/// Where a deployment is in the swap protocol.
///
/// `Verified`, `RolledBack` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentState {
    Idle,
    HealthChecked,
    Staged,
    Validated,
    BackedUp,
    Swapped,
    Verified,
    RollbackAttempted,
    RolledBack,
    Failed,
}

impl DeploymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::HealthChecked => "HEALTH_CHECKED",
            Self::Staged => "STAGED",
            Self::Validated => "VALIDATED",
            Self::BackedUp => "BACKED_UP",
            Self::Swapped => "SWAPPED",
            Self::Verified => "VERIFIED",
            Self::RollbackAttempted => "ROLLBACK_ATTEMPTED",
            Self::RolledBack => "ROLLED_BACK",
            Self::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::RolledBack | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    HealthCheck,
    StagingUpload,
    Validation,
    Backup,
    Swap,
    Rollback,
    Cleanup,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub step: Step,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Step-specific counts, e.g. `{"triple_count": 42}`.
    pub detail: serde_json::Value,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeploymentStatus {
    Success,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }
}

/// Outcome of one `deploy` call.
///
/// `status` is `Success` only when the swap was verified. A rolled-back
/// deployment is `Failed` with `final_state == RolledBack`.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentResult {
    pub deployment_id: Uuid,
    pub target_graph: String,
    pub status: DeploymentStatus,
    pub final_state: DeploymentState,
    /// Category of the failure that ended the deployment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<ErrorKind>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub steps: Vec<StepRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
}

impl DeploymentResult {
    pub fn is_success(&self) -> bool {
        self.status == DeploymentStatus::Success
    }

    pub fn step(&self, step: Step) -> Option<&StepRecord> {
        self.steps.iter().find(|s| s.step == step)
    }

    pub fn step_succeeded(&self, step: Step) -> bool {
        self.step(step).is_some_and(|s| s.status == StepStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_screaming_snake() {
        let v = serde_json::to_value(DeploymentState::RollbackAttempted).unwrap();
        assert_eq!(v, "ROLLBACK_ATTEMPTED");
        assert_eq!(DeploymentState::RollbackAttempted.as_str(), "ROLLBACK_ATTEMPTED");
        assert_eq!(serde_json::to_value(Step::StagingUpload).unwrap(), "staging_upload");
    }

    #[test]
    fn terminal_states() {
        assert!(DeploymentState::Verified.is_terminal());
        assert!(DeploymentState::RolledBack.is_terminal());
        assert!(DeploymentState::Failed.is_terminal());
        assert!(!DeploymentState::Swapped.is_terminal());
    }
}
