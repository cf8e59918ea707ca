//! The staged swap protocol.
//!
//! ```text
//! IDLE → HEALTH_CHECKED → STAGED → VALIDATED → BACKED_UP → SWAPPED → VERIFIED
//!                                                              ↓
//!                                      ROLLBACK_ATTEMPTED → ROLLED_BACK | FAILED
//! ```
//!
//! Failures before the swap leave production untouched and end in `FAILED`.
//! Failures during or after the swap restore the target from the backup
//! graph. The staging graph is dropped on every path that reached it.

use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use hvdc_audit::{AuditLedger, EventLog, RiskLevel};
use hvdc_core::events::{EventPayload, PipelineEvent, Severity};
use hvdc_core::{ErrorKind, HvdcError};
use hvdc_graph::{graph_stats, GraphConfig, GraphStats, GraphStore};

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use crate::types::{
    DeploymentResult, DeploymentState, DeploymentStatus, Step, StepRecord, StepStatus,
};
use crate::validation::{validate_graph, CheckStatus, ValidationResult};

const DEPLOY_TAGS: &[&str] = &["FUSEKI", "DEPLOYMENT"];

/// Runs deployments against one graph store.
///
/// Every mutating operation takes the same async lock, so at most one
/// deployment, backup, rollback or staging clear is in flight per manager.
pub struct DeploymentManager<S> {
    store: S,
    graph: GraphConfig,
    config: DeployConfig,
    ledger: AuditLedger,
    events: EventLog,
    actor: String,
    lock: Mutex<()>,
}

impl<S: GraphStore> DeploymentManager<S> {
    pub fn new(
        store: S,
        graph: GraphConfig,
        config: DeployConfig,
        ledger: AuditLedger,
        events: EventLog,
    ) -> Self {
        Self {
            store,
            graph,
            config,
            ledger,
            events,
            actor: "hvdc-deploy".to_string(),
            lock: Mutex::new(()),
        }
    }

    /// Actor recorded in the audit trail.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn graph_config(&self) -> &GraphConfig {
        &self.graph
    }

    pub fn default_target(&self) -> &str {
        &self.config.default_target_graph
    }

    // ── Deployment ───────────────────────────────────────────────

    /// Stage `ttl`, validate it, back up production and swap it into
    /// `target_graph`.
    ///
    /// Graph-store failures are reported in the returned step log, never as
    /// `Err`. Only a failure to write the audit record is an error.
    pub async fn deploy(&self, ttl: &str, target_graph: &str) -> Result<DeploymentResult> {
        let _guard = self.lock.lock().await;

        let mut run = Run::new(target_graph);
        tracing::info!(deployment_id = %run.id, target_graph, "Deployment started");
        self.drive(&mut run, ttl).await;
        let result = run.finish();

        match result.final_state {
            DeploymentState::Verified => tracing::info!(
                deployment_id = %result.deployment_id,
                duration_ms = result.duration_ms,
                "Deployment verified"
            ),
            DeploymentState::RolledBack => tracing::warn!(
                deployment_id = %result.deployment_id,
                failure = ?result.failure,
                "Deployment rolled back"
            ),
            _ => tracing::error!(
                deployment_id = %result.deployment_id,
                final_state = result.final_state.as_str(),
                failure = ?result.failure,
                "Deployment failed"
            ),
        }

        self.record_deployment(&result)?;
        Ok(result)
    }

    async fn drive(&self, run: &mut Run, ttl: &str) {
        let staging = self.graph.staging_graph.as_str();
        let target = run.target.clone();

        let t = Instant::now();
        if let Err(e) = self.store.ping().await {
            let e = HvdcError::Connectivity(e.to_string());
            run.fail(Step::HealthCheck, t, &e, Some(e.kind()));
            run.abort(ErrorKind::Connectivity);
            return;
        }
        run.ok(Step::HealthCheck, t, json!({ "base_url": self.graph.base_url }));
        run.state = DeploymentState::HealthChecked;

        let t = Instant::now();
        let staged = match self.upload(ttl).await {
            Ok(n) => n,
            Err(e) => {
                let kind = e.kind().unwrap_or(ErrorKind::ValidationFailure);
                run.fail(Step::StagingUpload, t, &e, Some(kind));
                run.abort(kind);
                self.cleanup(run).await;
                return;
            }
        };
        run.ok(Step::StagingUpload, t, json!({ "triple_count": staged }));
        run.state = DeploymentState::Staged;

        let t = Instant::now();
        match validate_graph(&self.store, staging, &self.config.required_classes).await {
            Ok(v) if v.passed() => {
                let warnings: Vec<&str> =
                    v.with_status(CheckStatus::Warn).map(|c| c.name).collect();
                if !warnings.is_empty() {
                    let w = HvdcError::ValidationWarning(warnings.join(", "));
                    tracing::warn!(deployment_id = %run.id, warning = %w, "Staging passed with warnings");
                }
                run.ok(Step::Validation, t, json!({ "overall_status": v.overall_status, "warnings": warnings }));
                run.validation = Some(v);
                run.state = DeploymentState::Validated;
            }
            Ok(v) => {
                let failed: Vec<&str> =
                    v.with_status(CheckStatus::Fail).map(|c| c.name).collect();
                let e = HvdcError::ValidationFailure(format!("failed checks: {}", failed.join(", ")));
                run.fail(Step::Validation, t, &e, Some(e.kind()));
                run.validation = Some(v);
                run.abort(ErrorKind::ValidationFailure);
                self.cleanup(run).await;
                return;
            }
            Err(e) => {
                let kind = e.kind().unwrap_or(ErrorKind::ValidationFailure);
                run.fail(Step::Validation, t, &e, Some(kind));
                run.abort(kind);
                self.cleanup(run).await;
                return;
            }
        }

        let t = Instant::now();
        match self.snapshot_production().await {
            Ok(n) => {
                run.ok(Step::Backup, t, json!({ "backup_count": n }));
                run.state = DeploymentState::BackedUp;
            }
            Err(e) => {
                let kind = e.kind().unwrap_or(ErrorKind::SwapFailure);
                run.fail(Step::Backup, t, &e, Some(kind));
                run.abort(kind);
                self.cleanup(run).await;
                return;
            }
        }

        let t = Instant::now();
        if let Err(e) = self.replace_from(staging, &target).await {
            run.fail(Step::Swap, t, &e, e.kind().or(Some(ErrorKind::SwapFailure)));
            run.failure = Some(ErrorKind::SwapFailure);
            self.roll_back(run).await;
            self.cleanup(run).await;
            return;
        }
        run.state = DeploymentState::Swapped;

        let counts = match self.store.triple_count(staging).await {
            Ok(s) => self.store.triple_count(&target).await.map(|p| (s, p)),
            Err(e) => Err(e),
        };
        match counts {
            Ok((s, p)) if s == p && p > 0 => {
                run.ok(Step::Swap, t, json!({ "staging_count": s, "production_count": p }));
                run.state = DeploymentState::Verified;
            }
            Ok((s, p)) => {
                let e = HvdcError::SwapFailure { staging: s, target: p };
                run.fail_with(Step::Swap, t, &e, Some(e.kind()), json!({ "staging_count": s, "production_count": p }));
                run.failure = Some(ErrorKind::SwapFailure);
                self.roll_back(run).await;
            }
            Err(e) => {
                run.fail(Step::Swap, t, &e, e.kind().or(Some(ErrorKind::SwapFailure)));
                run.failure = Some(ErrorKind::SwapFailure);
                self.roll_back(run).await;
            }
        }

        self.cleanup(run).await;
    }

    async fn upload(&self, ttl: &str) -> hvdc_graph::Result<u64> {
        let staging = &self.graph.staging_graph;
        self.store.replace_graph(staging, ttl).await?;
        self.store.triple_count(staging).await
    }

    /// Drop `to`, then copy every triple of `from` into it.
    async fn replace_from(&self, from: &str, to: &str) -> hvdc_graph::Result<()> {
        self.store.drop_graph(to).await?;
        self.store.copy_graph(from, to).await
    }

    /// Replace the backup graph with the union of all production graphs.
    async fn snapshot_production(&self) -> hvdc_graph::Result<u64> {
        let backup = &self.graph.backup_graph;
        self.store.drop_graph(backup).await?;
        for graph in &self.graph.production_graphs {
            self.store.copy_graph(graph, backup).await?;
        }
        self.store.triple_count(backup).await
    }

    async fn restore(&self, target: &str) -> hvdc_graph::Result<u64> {
        self.replace_from(&self.graph.backup_graph, target).await?;
        self.store.triple_count(target).await
    }

    async fn roll_back(&self, run: &mut Run) {
        run.state = DeploymentState::RollbackAttempted;
        let t = Instant::now();
        match self.restore(&run.target).await {
            Ok(n) => {
                run.ok(Step::Rollback, t, json!({ "restored_count": n }));
                run.state = DeploymentState::RolledBack;
            }
            Err(e) => {
                let e = HvdcError::RollbackFailure {
                    graph: run.target.clone(),
                    reason: e.to_string(),
                };
                tracing::error!(deployment_id = %run.id, error = %e, "Rollback failed");
                run.fail(Step::Rollback, t, &e, Some(e.kind()));
                run.abort(ErrorKind::RollbackFailure);
            }
        }
    }

    /// Drop the staging graph. A failure is logged and recorded but does not
    /// change the deployment's outcome.
    async fn cleanup(&self, run: &mut Run) {
        let staging = &self.graph.staging_graph;
        let t = Instant::now();
        match self.store.drop_graph(staging).await {
            Ok(()) => run.ok(Step::Cleanup, t, json!({ "graph": staging })),
            Err(e) => {
                tracing::error!(deployment_id = %run.id, graph = %staging, error = %e, "Staging cleanup failed");
                run.fail(Step::Cleanup, t, &e, e.kind());
            }
        }
    }

    fn record_deployment(&self, result: &DeploymentResult) -> Result<()> {
        let steps: Vec<Value> = result
            .steps
            .iter()
            .map(|s| json!({ "step": s.step, "status": s.status, "error_kind": s.error_kind }))
            .collect();
        let detail = json!({
            "deployment_id": result.deployment_id,
            "target_graph": result.target_graph,
            "status": result.status,
            "final_state": result.final_state,
            "failure": result.failure,
            "duration_ms": result.duration_ms,
            "steps": steps,
        });
        self.ledger
            .record("graph_deploy", &self.actor, &detail, RiskLevel::High, DEPLOY_TAGS)?;

        let severity = match (result.status, result.failure) {
            (DeploymentStatus::Success, _) => Severity::Info,
            (_, Some(ErrorKind::RollbackFailure)) => Severity::Critical,
            _ if result.final_state == DeploymentState::RolledBack => Severity::Warn,
            _ => Severity::Error,
        };
        let event = PipelineEvent::new(
            &self.actor,
            severity,
            EventPayload::DeploymentCompleted {
                deployment_id: result.deployment_id,
                target_graph: result.target_graph.clone(),
                status: result.status.as_str().to_string(),
                final_state: result.final_state.as_str().to_string(),
                duration_ms: result.duration_ms,
            },
        );
        self.events.append_event(&event)?;
        self.events.rotate_and_record(&self.actor)?;
        Ok(())
    }

    // ── Standalone operations ────────────────────────────────────

    /// Validate whatever is currently in the staging graph.
    pub async fn validate_staging(&self) -> Result<ValidationResult> {
        let _guard = self.lock.lock().await;
        Ok(validate_graph(&self.store, &self.graph.staging_graph, &self.config.required_classes).await?)
    }

    /// Replace the backup graph with the union of all production graphs.
    /// Returns the backup's triple count.
    pub async fn backup(&self) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let outcome = self.snapshot_production().await;
        let detail = match &outcome {
            Ok(n) => json!({ "status": "SUCCESS", "backup_count": n }),
            Err(e) => json!({ "status": "FAILED", "error": e.to_string() }),
        };
        self.ledger
            .record("graph_backup", &self.actor, &detail, RiskLevel::Medium, DEPLOY_TAGS)?;
        Ok(outcome?)
    }

    /// Restore `target_graph` from the backup graph. Returns the restored
    /// triple count.
    pub async fn rollback(&self, target_graph: &str) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let outcome = self.restore(target_graph).await;
        let detail = match &outcome {
            Ok(n) => json!({ "status": "SUCCESS", "graph": target_graph, "restored_count": n }),
            Err(e) => json!({ "status": "FAILED", "graph": target_graph, "error": e.to_string() }),
        };
        self.ledger
            .record("graph_rollback", &self.actor, &detail, RiskLevel::Critical, DEPLOY_TAGS)?;
        outcome.map_err(|e| {
            DeployError::from(HvdcError::RollbackFailure {
                graph: target_graph.to_string(),
                reason: e.to_string(),
            })
        })
    }

    pub async fn clear_staging(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        let staging = &self.graph.staging_graph;
        let outcome = self.store.drop_graph(staging).await;
        let status = if outcome.is_ok() { "SUCCESS" } else { "FAILED" };
        self.ledger.record(
            "graph_clear_staging",
            &self.actor,
            &json!({ "status": status, "graph": staging }),
            RiskLevel::Low,
            DEPLOY_TAGS,
        )?;
        Ok(outcome?)
    }

    /// Triple counts of staging, backup and every production graph.
    pub async fn graph_stats(&self) -> Result<GraphStats> {
        Ok(graph_stats(&self.store, &self.graph).await?)
    }
}

// ── Step log ─────────────────────────────────────────────────────

struct Run {
    id: Uuid,
    target: String,
    state: DeploymentState,
    failure: Option<ErrorKind>,
    steps: Vec<StepRecord>,
    validation: Option<ValidationResult>,
    started_at: DateTime<Utc>,
    clock: Instant,
}

impl Run {
    fn new(target: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.to_string(),
            state: DeploymentState::Idle,
            failure: None,
            steps: Vec::new(),
            validation: None,
            started_at: Utc::now(),
            clock: Instant::now(),
        }
    }

    fn ok(&mut self, step: Step, started: Instant, detail: Value) {
        tracing::debug!(deployment_id = %self.id, step = ?step, "Step succeeded");
        self.steps.push(StepRecord {
            step,
            status: StepStatus::Success,
            error: None,
            error_kind: None,
            detail,
            duration_ms: elapsed_ms(started),
        });
    }

    fn fail(&mut self, step: Step, started: Instant, error: &dyn Display, kind: Option<ErrorKind>) {
        self.fail_with(step, started, error, kind, json!({}));
    }

    fn fail_with(
        &mut self,
        step: Step,
        started: Instant,
        error: &dyn Display,
        kind: Option<ErrorKind>,
        detail: Value,
    ) {
        tracing::warn!(deployment_id = %self.id, step = ?step, error = %error, "Step failed");
        self.steps.push(StepRecord {
            step,
            status: StepStatus::Failed,
            error: Some(error.to_string()),
            error_kind: kind,
            detail,
            duration_ms: elapsed_ms(started),
        });
    }

    fn abort(&mut self, kind: ErrorKind) {
        self.state = DeploymentState::Failed;
        self.failure = Some(kind);
    }

    fn finish(self) -> DeploymentResult {
        let status = if self.state == DeploymentState::Verified {
            DeploymentStatus::Success
        } else {
            DeploymentStatus::Failed
        };
        let final_state = if self.state.is_terminal() {
            self.state
        } else {
            DeploymentState::Failed
        };
        DeploymentResult {
            deployment_id: self.id,
            target_graph: self.target,
            status,
            final_state,
            failure: self.failure,
            started_at: self.started_at,
            duration_ms: elapsed_ms(self.clock),
            steps: self.steps,
            validation: self.validation,
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
