//! Row log: one CSV row per audited action.
//!
//! The file is append-only. The header is written when the file is created
//! and each row is written with a single `write_all`, so in-process appends
//! never interleave. Multi-process writers need external locking.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::hash::{compute_row_hash, HashableRow};
use crate::redact::{redact_str, redact_value};
use crate::{AuditError, IntegrityStatus, Result, RiskLevel};

/// Column order of the row log.
pub const HEADER: [&str; 9] = [
    "ts",
    "action",
    "actor",
    "detail",
    "risk_level",
    "compliance_tags",
    "session_id",
    "source_ip",
    "integrity_hash",
];

/// Maximum number of corrupted rows listed in an [`IntegrityReport`].
const MAX_CORRUPTED_DETAILS: usize = 10;

/// One persisted row. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub ts: String,
    pub action: String,
    pub actor: String,
    /// Redacted detail payload, as JSON text.
    pub detail: String,
    pub risk_level: RiskLevel,
    /// Comma-joined compliance tags.
    pub compliance_tags: String,
    pub session_id: String,
    pub source_ip: String,
    pub integrity_hash: String,
}

impl AuditEntry {
    fn hashable(&self) -> HashableRow<'_> {
        HashableRow {
            action: &self.action,
            actor: &self.actor,
            compliance_tags: &self.compliance_tags,
            detail: &self.detail,
            risk_level: self.risk_level.as_str(),
            session_id: &self.session_id,
            source_ip: &self.source_ip,
            ts: &self.ts,
        }
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.compliance_tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn detail_value(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.detail)?)
    }
}

/// A row as read back from disk. Every column is kept as text so that a
/// tampered value (e.g. an unknown risk level) is reported as corruption
/// rather than a parse failure.
#[derive(Debug, Deserialize)]
struct RawRow {
    ts: String,
    action: String,
    actor: String,
    detail: String,
    risk_level: String,
    compliance_tags: String,
    session_id: String,
    source_ip: String,
    integrity_hash: String,
}

impl RawRow {
    fn hashable(&self) -> HashableRow<'_> {
        HashableRow {
            action: &self.action,
            actor: &self.actor,
            compliance_tags: &self.compliance_tags,
            detail: &self.detail,
            risk_level: &self.risk_level,
            session_id: &self.session_id,
            source_ip: &self.source_ip,
            ts: &self.ts,
        }
    }
}

/// A row whose stored hash does not match its content.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CorruptedEntry {
    /// 1-based line number in the file (the header is line 1).
    pub line: u64,
    pub ts: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub status: IntegrityStatus,
    pub verified: usize,
    pub corrupted: usize,
    /// At most the first ten corrupted rows.
    pub details: Vec<CorruptedEntry>,
}

impl IntegrityReport {
    pub fn total(&self) -> usize {
        self.verified + self.corrupted
    }
}

/// Aggregates over the rows inside a time window.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuditSummary {
    pub since: Option<DateTime<Utc>>,
    pub total_actions: usize,
    pub risk_levels: BTreeMap<String, usize>,
    pub actions: BTreeMap<String, usize>,
    pub actors: BTreeMap<String, usize>,
    pub compliance_tags: BTreeMap<String, usize>,
}

/// Append-only CSV audit ledger.
pub struct AuditLedger {
    path: PathBuf,
    session_id: String,
    source_ip: String,
    write_lock: Mutex<()>,
}

impl AuditLedger {
    pub fn new(
        path: impl Into<PathBuf>,
        session_id: impl Into<String>,
        source_ip: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            session_id: session_id.into(),
            source_ip: source_ip.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record one action.
    ///
    /// The actor and every string in `detail` are redacted before hashing.
    /// A write failure is logged at `error` and returned.
    pub fn record(
        &self,
        action: &str,
        actor: &str,
        detail: &Value,
        risk_level: RiskLevel,
        compliance_tags: &[&str],
    ) -> Result<AuditEntry> {
        let actor = redact_str(actor);
        let detail = serde_json::to_string(&redact_value(detail))?;

        let mut entry = AuditEntry {
            ts: Utc::now().to_rfc3339(),
            action: action.to_string(),
            actor,
            detail,
            risk_level,
            compliance_tags: compliance_tags.join(","),
            session_id: self.session_id.clone(),
            source_ip: self.source_ip.clone(),
            integrity_hash: String::new(),
        };
        entry.integrity_hash = compute_row_hash(&entry.hashable());

        if let Err(e) = self.append(&entry) {
            tracing::error!(
                error = %e,
                action,
                actor = %entry.actor,
                path = %self.path.display(),
                "Audit log write failed"
            );
            return Err(e);
        }

        if risk_level.is_elevated() {
            tracing::warn!(
                action,
                actor = %entry.actor,
                risk_level = risk_level.as_str(),
                "High-risk action audited"
            );
        } else {
            tracing::debug!(action, "Audit entry recorded");
        }

        Ok(entry)
    }

    fn append(&self, entry: &AuditEntry) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let needs_header = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(Vec::new());
        wtr.serialize(entry)?;
        let bytes = wtr.into_inner().map_err(|e| e.into_error())?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        Ok(())
    }

    /// Read every row back, as written.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        let mut rdr = self.reader()?;
        let mut out = Vec::new();
        for row in rdr.deserialize() {
            out.push(row?);
        }
        Ok(out)
    }

    /// Recompute every row's hash and compare with the stored value.
    ///
    /// Rows that cannot be parsed at all (wrong field count, bytes that are
    /// not UTF-8) are counted as corrupted too; only I/O errors abort.
    pub fn verify_integrity(&self) -> Result<IntegrityReport> {
        let mut rdr = self.reader()?;
        let headers = rdr.byte_headers()?.clone();

        let mut verified = 0;
        let mut corrupted = 0;
        let mut details = Vec::new();

        for record in rdr.byte_records() {
            let detail = match record {
                Ok(record) => {
                    let intact = match record.deserialize::<RawRow>(Some(&headers)) {
                        Ok(row) => compute_row_hash(&row.hashable()) == row.integrity_hash,
                        Err(_) => false,
                    };
                    if intact {
                        verified += 1;
                        continue;
                    }
                    CorruptedEntry {
                        line: record.position().map(|p| p.line()).unwrap_or_default(),
                        ts: record.get(0).map(|f| String::from_utf8_lossy(f).into_owned()),
                        action: record.get(1).map(|f| String::from_utf8_lossy(f).into_owned()),
                    }
                }
                Err(e) if e.is_io_error() => return Err(e.into()),
                Err(e) => CorruptedEntry {
                    line: e.position().map(|p| p.line()).unwrap_or_default(),
                    ts: None,
                    action: None,
                },
            };

            corrupted += 1;
            if details.len() < MAX_CORRUPTED_DETAILS {
                details.push(detail);
            }
        }

        let status = if corrupted == 0 {
            IntegrityStatus::Verified
        } else {
            IntegrityStatus::Compromised
        };

        if status == IntegrityStatus::Compromised {
            tracing::warn!(
                path = %self.path.display(),
                corrupted,
                "Audit log integrity compromised"
            );
        } else {
            tracing::info!(verified, "Audit log integrity verified");
        }

        Ok(IntegrityReport {
            status,
            verified,
            corrupted,
            details,
        })
    }

    /// Aggregate rows newer than `now - window`. Rows with unparseable
    /// timestamps are skipped.
    pub fn summarize(&self, window: Duration) -> Result<AuditSummary> {
        let since = Utc::now() - window;
        let mut rdr = self.reader()?;
        let headers = rdr.headers()?.clone();

        let mut summary = AuditSummary {
            since: Some(since),
            ..Default::default()
        };
        for level in ["LOW", "MEDIUM", "HIGH", "CRITICAL"] {
            summary.risk_levels.insert(level.to_string(), 0);
        }

        for record in rdr.records() {
            let Ok(row) = record?.deserialize::<RawRow>(Some(&headers)) else {
                continue;
            };
            let Ok(ts) = DateTime::parse_from_rfc3339(&row.ts) else {
                continue;
            };
            if ts.with_timezone(&Utc) < since {
                continue;
            }

            summary.total_actions += 1;
            if let Some(n) = summary.risk_levels.get_mut(&row.risk_level.to_uppercase()) {
                *n += 1;
            }
            *summary.actions.entry(row.action).or_default() += 1;
            *summary.actors.entry(row.actor).or_default() += 1;
            for tag in row.compliance_tags.split(',').map(str::trim) {
                if !tag.is_empty() {
                    *summary.compliance_tags.entry(tag.to_string()).or_default() += 1;
                }
            }
        }

        Ok(summary)
    }

    fn reader(&self) -> Result<csv::Reader<fs::File>> {
        if !self.path.exists() {
            return Err(AuditError::NotFound(self.path.clone()));
        }
        Ok(csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)?)
    }
}
