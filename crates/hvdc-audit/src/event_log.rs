//! Event log: line-delimited JSON plus a whole-file digest checkpoint.
//!
//! The checkpoint (`<file>.hash.json`) records the SHA-256 of the file at
//! the moment it was written. Verification detects that the file changed
//! since then but cannot say which line; rows needing per-entry tamper
//! localization belong in the row log.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use hvdc_core::events::{EventPayload, PipelineEvent, Severity};

use crate::hash::sha256_file;
use crate::redact::redact_value;
use crate::{AuditError, IntegrityStatus, Result};

const INTEGRITY_VERSION: &str = "1.0";

/// Contents of a checkpoint file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointMeta {
    pub artifact: String,
    pub digest: String,
    pub method: String,
    pub ts: String,
    pub file_size_bytes: u64,
    pub line_count: usize,
    pub integrity_version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckpointReport {
    pub status: IntegrityStatus,
    pub expected_digest: String,
    pub current_digest: String,
    pub file_size_bytes: u64,
    pub checkpoint_ts: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLogStats {
    pub file_size_bytes: u64,
    pub line_count: usize,
    pub actions: BTreeMap<String, usize>,
    pub severities: BTreeMap<String, usize>,
    pub actors: BTreeMap<String, usize>,
    pub earliest: Option<String>,
    pub latest: Option<String>,
}

/// Append-only NDJSON event log.
pub struct EventLog {
    path: PathBuf,
    rotate_max_bytes: u64,
    write_lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>, rotate_max_bytes: u64) -> Self {
        Self {
            path: path.into(),
            rotate_max_bytes,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the checkpoint written by [`EventLog::write_checkpoint`].
    pub fn checkpoint_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".hash.json");
        PathBuf::from(name)
    }

    /// Append one event. Objects without a `ts` are stamped with the current
    /// time; every string is redacted. Returns the line as written.
    pub fn append(&self, event: Value) -> Result<Value> {
        let mut event = event;
        if let Value::Object(map) = &mut event {
            map.entry("ts")
                .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        }
        let event = redact_value(&event);

        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let written = {
            let _guard = self
                .write_lock
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            self.write_line(&line)
        };

        if let Err(e) = written {
            tracing::error!(
                error = %e,
                path = %self.path.display(),
                "Event log write failed"
            );
            return Err(e);
        }

        Ok(event)
    }

    /// Append a typed pipeline event.
    pub fn append_event(&self, event: &PipelineEvent) -> Result<Value> {
        self.append(event.to_value()?)
    }

    fn write_line(&self, line: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line)?;
        file.flush()?;
        Ok(())
    }

    /// Compute the digest of the log and write it to the checkpoint file.
    pub fn write_checkpoint(&self) -> Result<CheckpointMeta> {
        self.write_checkpoint_to(&self.path, &self.checkpoint_path())
    }

    fn write_checkpoint_to(&self, artifact: &Path, meta_path: &Path) -> Result<CheckpointMeta> {
        if !artifact.exists() {
            return Err(AuditError::NotFound(artifact.to_path_buf()));
        }

        let meta = CheckpointMeta {
            artifact: artifact.display().to_string(),
            digest: sha256_file(artifact)?,
            method: "sha256".to_string(),
            ts: Utc::now().to_rfc3339(),
            file_size_bytes: fs::metadata(artifact)?.len(),
            line_count: count_lines(artifact)?,
            integrity_version: INTEGRITY_VERSION.to_string(),
        };

        fs::write(meta_path, serde_json::to_string_pretty(&meta)?)?;
        tracing::info!(
            artifact = %meta.artifact,
            digest = %meta.digest,
            lines = meta.line_count,
            "Event log checkpoint written"
        );
        Ok(meta)
    }

    /// Compare the current digest with the last checkpoint.
    pub fn verify_checkpoint(&self) -> Result<CheckpointReport> {
        if !self.path.exists() {
            return Err(AuditError::NotFound(self.path.clone()));
        }
        let meta_path = self.checkpoint_path();
        if !meta_path.exists() {
            return Err(AuditError::NotFound(meta_path));
        }

        let meta: CheckpointMeta = serde_json::from_str(&fs::read_to_string(&meta_path)?)?;
        if meta.digest.is_empty() {
            return Err(AuditError::InvalidCheckpoint("empty digest".to_string()));
        }

        let current = sha256_file(&self.path)?;
        let status = if current == meta.digest {
            IntegrityStatus::Verified
        } else {
            tracing::warn!(
                path = %self.path.display(),
                expected = %meta.digest,
                current = %current,
                "Event log changed since checkpoint"
            );
            IntegrityStatus::Compromised
        };

        Ok(CheckpointReport {
            status,
            expected_digest: meta.digest,
            current_digest: current,
            file_size_bytes: fs::metadata(&self.path)?.len(),
            checkpoint_ts: meta.ts,
        })
    }

    /// Size, line count and per-field tallies. Malformed lines count toward
    /// `line_count` but are otherwise skipped.
    pub fn stats(&self) -> Result<EventLogStats> {
        if !self.path.exists() {
            return Err(AuditError::NotFound(self.path.clone()));
        }

        let mut stats = EventLogStats {
            file_size_bytes: fs::metadata(&self.path)?.len(),
            ..Default::default()
        };

        let reader = BufReader::new(fs::File::open(&self.path)?);
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            stats.line_count += 1;

            let Ok(event) = serde_json::from_str::<Value>(&line) else {
                continue;
            };
            let field = |key: &str| {
                event
                    .get(key)
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string()
            };
            *stats.actions.entry(field("action")).or_default() += 1;
            *stats.severities.entry(field("severity")).or_default() += 1;
            *stats.actors.entry(field("actor")).or_default() += 1;

            if let Some(ts) = event.get("ts").and_then(Value::as_str) {
                if stats.earliest.as_deref().map_or(true, |e| ts < e) {
                    stats.earliest = Some(ts.to_string());
                }
                if stats.latest.as_deref().map_or(true, |l| ts > l) {
                    stats.latest = Some(ts.to_string());
                }
            }
        }

        Ok(stats)
    }

    /// Rotate once the log reaches the configured size.
    ///
    /// The log is renamed to `<stem>.<YYYYmmdd_HHMMSS>.ndjson` with a final
    /// checkpoint `<stem>.<stamp>.hash.json` beside it; the next append
    /// starts a fresh file. A second rotation within the same second gets a
    /// `_1`, `_2`, … suffix instead of replacing the earlier file. Returns
    /// the rotated path, if any.
    pub fn rotate_if_needed(&self) -> Result<Option<(PathBuf, CheckpointMeta)>> {
        self.rotate(None)
    }

    /// Like [`EventLog::rotate_if_needed`], but first closes the outgoing log
    /// with a `log_rotated` event naming the rotated file and the digest of
    /// the entries before it. The fresh log starts empty.
    pub fn rotate_and_record(&self, actor: &str) -> Result<Option<PathBuf>> {
        Ok(self.rotate(Some(actor))?.map(|(rotated, _)| rotated))
    }

    fn rotate(&self, marker_actor: Option<&str>) -> Result<Option<(PathBuf, CheckpointMeta)>> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let size = match fs::metadata(&self.path) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if size < self.rotate_max_bytes {
            return Ok(None);
        }

        let (rotated, meta_path) = self.rotation_paths();

        if let Some(actor) = marker_actor {
            let event = PipelineEvent::new(
                actor,
                Severity::Info,
                EventPayload::LogRotated {
                    rotated_to: rotated.display().to_string(),
                    digest: sha256_file(&self.path)?,
                },
            );
            let mut line = serde_json::to_vec(&redact_value(&event.to_value()?))?;
            line.push(b'\n');
            self.write_line(&line)?;
        }

        let meta = self.write_checkpoint_to(&self.path, &meta_path)?;
        fs::rename(&self.path, &rotated)?;

        tracing::info!(
            rotated = %rotated.display(),
            size_bytes = size,
            "Event log rotated"
        );
        Ok(Some((rotated, meta)))
    }

    /// First `<stem>.<stamp>[_n]` whose log and checkpoint names are both free.
    fn rotation_paths(&self) -> (PathBuf, PathBuf) {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audit".to_string());

        let mut n = 0u32;
        loop {
            let base = if n == 0 {
                format!("{stem}.{stamp}")
            } else {
                format!("{stem}.{stamp}_{n}")
            };
            let rotated = self.path.with_file_name(format!("{base}.ndjson"));
            let meta_path = self.path.with_file_name(format!("{base}.hash.json"));
            if !rotated.exists() && !meta_path.exists() {
                return (rotated, meta_path);
            }
            n += 1;
        }
    }
}

fn count_lines(path: &Path) -> Result<usize> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut n = 0;
    for line in reader.lines() {
        line?;
        n += 1;
    }
    Ok(n)
}
