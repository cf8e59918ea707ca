//! Error types for the hvdc-deploy crate.

use thiserror::Error;

use hvdc_core::{ErrorKind, HvdcError};

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("Graph error: {0}")]
    Graph(#[from] hvdc_graph::GraphError),

    #[error("Audit error: {0}")]
    Audit(#[from] hvdc_audit::AuditError),

    #[error(transparent)]
    Pipeline(#[from] HvdcError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeployError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Graph(e) => e.kind(),
            Self::Pipeline(e) => Some(e.kind()),
            Self::Serialization(_) => Some(ErrorKind::Serialization),
            Self::Audit(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
