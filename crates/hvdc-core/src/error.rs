use serde::Serialize;
use thiserror::Error;

/// Shared error taxonomy for the ingest pipeline.
///
/// Crate-level errors (`AuditError`, `GraphError`, …) classify themselves
/// into one of these categories; deployment step logs record the
/// [`ErrorKind`] so operators can tell a connectivity blip from a failed
/// rollback without parsing messages.
#[derive(Error, Debug)]
pub enum HvdcError {
    #[error("Graph store unreachable: {0}")]
    Connectivity(String),

    #[error("Validation failed: {0}")]
    ValidationFailure(String),

    #[error("Validation warning: {0}")]
    ValidationWarning(String),

    #[error("Swap failed: staging has {staging} triples, target has {target}")]
    SwapFailure { staging: u64, target: u64 },

    #[error("Rollback of {graph} failed: {reason}")]
    RollbackFailure { graph: String, reason: String },

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Extraction failed for {path}: {reason}")]
    Extraction { path: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Category of an [`HvdcError`], without the payload.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connectivity,
    ValidationFailure,
    ValidationWarning,
    SwapFailure,
    RollbackFailure,
    IntegrityViolation,
    Extraction,
    Config,
    Serialization,
}

impl HvdcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Connectivity(_) => ErrorKind::Connectivity,
            Self::ValidationFailure(_) => ErrorKind::ValidationFailure,
            Self::ValidationWarning(_) => ErrorKind::ValidationWarning,
            Self::SwapFailure { .. } => ErrorKind::SwapFailure,
            Self::RollbackFailure { .. } => ErrorKind::RollbackFailure,
            Self::IntegrityViolation(_) => ErrorKind::IntegrityViolation,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::Config(_) => ErrorKind::Config,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swap_failure_message_names_counts() {
        let err = HvdcError::SwapFailure {
            staging: 12,
            target: 0,
        };
        assert_eq!(err.kind(), ErrorKind::SwapFailure);
        assert!(err.to_string().contains("12"));
    }

    #[test]
    fn kind_serializes_snake_case() {
        let v = serde_json::to_value(ErrorKind::RollbackFailure).unwrap();
        assert_eq!(v, "rollback_failure");
    }
}
