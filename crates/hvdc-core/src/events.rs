//! Pipeline event payloads.
//!
//! Events are appended to the NDJSON event log. Each line is a flat JSON
//! object: the envelope fields plus the payload fields, tagged by `action`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warn,
    Error,
    Critical,
}

/// An event emitted by a pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    pub id: EventId,
    pub ts: DateTime<Utc>,
    pub actor: String,
    pub severity: Severity,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl PipelineEvent {
    pub fn new(actor: impl Into<String>, severity: Severity, payload: EventPayload) -> Self {
        Self {
            id: EventId::new(),
            ts: Utc::now(),
            actor: actor.into(),
            severity,
            payload,
        }
    }

    /// Render as the JSON object written to the event log.
    pub fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// The event payload, tagged by action name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EventPayload {
    /// An extraction batch finished.
    ExtractionCompleted {
        run_id: Uuid,
        sources: usize,
        records: usize,
        errors: usize,
        unique_codes: usize,
        avg_confidence: f64,
    },
    /// A deploy call reached a terminal state.
    DeploymentCompleted {
        deployment_id: Uuid,
        target_graph: String,
        status: String,
        final_state: String,
        duration_ms: u64,
    },
    /// The row log was re-hashed and checked.
    AuditVerified {
        status: String,
        verified: usize,
        corrupted: usize,
    },
    /// The event log was rotated.
    LogRotated { rotated_to: String, digest: String },
}
