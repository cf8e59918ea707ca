//! HVDC Audit — append-only, tamper-evident action logging.
//!
//! Two persisted representations share the same redaction rules:
//! - the **row log** ([`AuditLedger`]): one CSV row per action, each carrying
//!   a truncated SHA-256 over its own fields so a single edited row is
//!   located exactly on verification;
//! - the **event log** ([`EventLog`]): free-form NDJSON events with a
//!   whole-file digest checkpoint. A checkpoint mismatch says the file
//!   changed, not which line.
//!
//! A failed audit write is never swallowed. It is logged at `error` and
//! returned to the caller.

pub mod event_log;
pub mod hash;
pub mod ledger;
pub mod redact;
pub mod verify;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use event_log::{CheckpointMeta, CheckpointReport, EventLog, EventLogStats};
pub use ledger::{AuditEntry, AuditLedger, AuditSummary, IntegrityReport};
pub use verify::{verify_trail, TrailReport};

// ── Errors ───────────────────────────────────────────────────────

/// Errors that can occur while writing or verifying audit artifacts.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("Audit artifact not found: {0}")]
    NotFound(PathBuf),

    #[error("Checkpoint metadata is invalid: {0}")]
    InvalidCheckpoint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;

// ── Core Types ───────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// High and critical actions are echoed to the tracing log.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

/// Outcome of an integrity check over either log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntegrityStatus {
    Verified,
    Compromised,
}

impl IntegrityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Verified => "VERIFIED",
            Self::Compromised => "COMPROMISED",
        }
    }
}

// ── Configuration ────────────────────────────────────────────────

/// `[audit]` configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    #[serde(default = "default_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_row_log")]
    pub row_log: String,
    #[serde(default = "default_event_log")]
    pub event_log: String,
    /// Rotate the event log once it reaches this size.
    #[serde(default = "default_rotate_max_bytes")]
    pub rotate_max_bytes: u64,
    #[serde(default = "default_session_id")]
    pub session_id: String,
    #[serde(default = "default_source_ip")]
    pub source_ip: String,
}

fn default_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_row_log() -> String {
    "audit_log.csv".to_string()
}

fn default_event_log() -> String {
    "audit.ndjson".to_string()
}

fn default_rotate_max_bytes() -> u64 {
    100 * 1024 * 1024
}

fn default_session_id() -> String {
    "system".to_string()
}

fn default_source_ip() -> String {
    "localhost".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            dir: default_dir(),
            row_log: default_row_log(),
            event_log: default_event_log(),
            rotate_max_bytes: default_rotate_max_bytes(),
            session_id: default_session_id(),
            source_ip: default_source_ip(),
        }
    }
}

impl AuditConfig {
    pub fn row_log_path(&self) -> PathBuf {
        self.dir.join(&self.row_log)
    }

    pub fn event_log_path(&self) -> PathBuf {
        self.dir.join(&self.event_log)
    }

    /// Open both logs described by this section.
    pub fn open(&self) -> (AuditLedger, EventLog) {
        (
            AuditLedger::new(
                self.row_log_path(),
                self.session_id.clone(),
                self.source_ip.clone(),
            ),
            EventLog::new(self.event_log_path(), self.rotate_max_bytes),
        )
    }
}
