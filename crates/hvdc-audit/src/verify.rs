//! Combined verification of the row log and the event log.

use serde::Serialize;
use serde_json::json;

use hvdc_core::events::{EventPayload, PipelineEvent, Severity};

use crate::event_log::{CheckpointMeta, CheckpointReport, EventLog};
use crate::ledger::{AuditLedger, IntegrityReport};
use crate::{IntegrityStatus, Result, RiskLevel};

#[derive(Debug, Clone, Serialize)]
pub struct TrailReport {
    pub status: IntegrityStatus,
    pub ledger: IntegrityReport,
    /// `None` when the event log has never been checkpointed.
    pub events: Option<CheckpointReport>,
    /// Checkpoint written after the verification was recorded.
    pub checkpoint: Option<CheckpointMeta>,
}

impl TrailReport {
    pub fn is_compromised(&self) -> bool {
        self.status == IntegrityStatus::Compromised
    }
}

/// Verify both logs and record the outcome in each.
///
/// The outcome is appended as an `audit_verify` row and an `audit_verified`
/// event. When the trail is intact the event log is checkpointed again,
/// covering that event, if `checkpoint` is set or a checkpoint already
/// existed; otherwise the next run would see its own record as tampering.
/// A compromised trail keeps its old checkpoint as evidence.
pub fn verify_trail(
    ledger: &AuditLedger,
    events: &EventLog,
    actor: &str,
    checkpoint: bool,
) -> Result<TrailReport> {
    let ledger_report = ledger.verify_integrity()?;
    let had_checkpoint = events.checkpoint_path().exists();
    let event_report = if had_checkpoint {
        Some(events.verify_checkpoint()?)
    } else {
        tracing::info!("No event log checkpoint yet");
        None
    };

    let compromised = ledger_report.status == IntegrityStatus::Compromised
        || event_report
            .as_ref()
            .is_some_and(|r| r.status == IntegrityStatus::Compromised);
    let status = if compromised {
        IntegrityStatus::Compromised
    } else {
        IntegrityStatus::Verified
    };

    let (risk, severity) = if compromised {
        (RiskLevel::Critical, Severity::Critical)
    } else {
        (RiskLevel::Low, Severity::Info)
    };
    ledger.record(
        "audit_verify",
        actor,
        &json!({
            "status": status.as_str(),
            "ledger_verified": ledger_report.verified,
            "ledger_corrupted": ledger_report.corrupted,
            "event_log": event_report.as_ref().map(|r| r.status.as_str()),
        }),
        risk,
        &["AUDIT"],
    )?;
    events.append_event(&PipelineEvent::new(
        actor,
        severity,
        EventPayload::AuditVerified {
            status: status.as_str().to_string(),
            verified: ledger_report.verified,
            corrupted: ledger_report.corrupted,
        },
    ))?;

    let checkpoint = if !compromised && (checkpoint || had_checkpoint) {
        Some(events.write_checkpoint()?)
    } else {
        None
    };

    if compromised {
        tracing::error!(
            ledger_corrupted = ledger_report.corrupted,
            "Audit trail integrity compromised"
        );
    }

    Ok(TrailReport {
        status,
        ledger: ledger_report,
        events: event_report,
        checkpoint,
    })
}
