//! CLI entry point for the HVDC graph deployer.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{json, Value};
use tracing_subscriber::{fmt, EnvFilter};

use hvdc_audit::{verify_trail, AuditConfig, AuditLedger, EventLog};
use hvdc_core::config::{load_section, DEFAULT_FILE_PREFIX};
use hvdc_core::{HvdcError, MergedRecord};
use hvdc_graph::{publisher_from_config, GraphConfig, SparqlClient};

use hvdc_deploy::{DeployConfig, DeploymentManager};

#[derive(Parser)]
#[command(name = "hvdc-deploy")]
#[command(about = "Staged, validated deployment of HVDC facts to the graph store")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Actor recorded in the audit log.
    #[arg(long, default_value = "hvdc-deploy", global = true)]
    actor: String,

    /// Config file prefix (default: hvdc).
    #[arg(short, long, default_value = DEFAULT_FILE_PREFIX, global = true)]
    config: String,
}

#[derive(Subcommand)]
enum Command {
    /// Stage, validate, back up and swap a Turtle document into a graph.
    Deploy {
        /// Turtle file to deploy.
        #[arg(required_unless_present = "records", conflicts_with = "records")]
        ttl: Option<PathBuf>,
        /// hvdc-extract JSON report to render as facts instead of a Turtle file.
        #[arg(long)]
        records: Option<PathBuf>,
        /// Target production graph (default: deploy.default_target_graph).
        #[arg(long)]
        target_graph: Option<String>,
    },
    /// Validate the current staging graph.
    Validate,
    /// Snapshot all production graphs into the backup graph.
    Backup,
    /// Restore a graph from the backup graph.
    Rollback {
        /// Graph to restore.
        graph: String,
    },
    /// Drop the staging graph.
    ClearStaging,
    /// Triple counts of the staging, backup and production graphs.
    Stats,
    /// Run a SELECT query through the graph publisher.
    Query {
        /// SPARQL SELECT text.
        sparql: String,
    },
    /// Re-hash the audit ledger and check the event log checkpoint.
    VerifyAudit {
        /// Checkpoint the event log even if it has never been checkpointed.
        #[arg(long)]
        checkpoint: bool,
    },
    /// Summarize recent audit activity.
    AuditReport {
        /// Window in hours.
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let graph_config: GraphConfig = load_section(&cli.config, "graph")?;
    let deploy_config: DeployConfig = load_section(&cli.config, "deploy")?;
    let audit_config: AuditConfig = load_section(&cli.config, "audit")?;

    match cli.command {
        Command::VerifyAudit { checkpoint } => {
            let (ledger, events) = audit_config.open();
            return verify_audit(&ledger, &events, &cli.actor, checkpoint);
        }
        Command::AuditReport { hours } => {
            let (ledger, events) = audit_config.open();
            let summary = ledger.summarize(chrono::Duration::hours(hours))?;
            let stats = events.stats()?;
            print_json(&json!({ "ledger": summary, "events": stats }))?;
            return Ok(());
        }
        Command::Query { ref sparql } => {
            let Some(publisher) = publisher_from_config(&graph_config)? else {
                anyhow::bail!("graph publishing is disabled; set graph.publish = true");
            };
            let rows = publisher.query(sparql).await?;
            print_json(&rows)?;
            return Ok(());
        }
        _ => {}
    }

    let (ledger, events) = audit_config.open();
    let client = SparqlClient::new(graph_config.clone())?;
    let manager = DeploymentManager::new(client, graph_config.clone(), deploy_config, ledger, events)
        .with_actor(cli.actor.as_str());

    match cli.command {
        Command::Deploy {
            ref ttl,
            ref records,
            ref target_graph,
        } => {
            let payload = match (ttl, records) {
                (Some(path), _) => fs::read_to_string(path)?,
                (None, Some(path)) => render_records(&graph_config, path)?,
                (None, None) => anyhow::bail!("either a Turtle file or --records is required"),
            };
            let target = target_graph.as_deref().unwrap_or(manager.default_target());
            let result = manager.deploy(&payload, target).await?;
            print_json(&result)?;
            if !result.is_success() {
                anyhow::bail!("deployment ended in {}", result.final_state.as_str());
            }
        }
        Command::Validate => {
            let result = manager.validate_staging().await?;
            print_json(&result)?;
            if !result.passed() {
                anyhow::bail!("staging graph failed validation");
            }
        }
        Command::Backup => {
            let count = manager.backup().await?;
            print_json(&json!({ "status": "SUCCESS", "backup_count": count }))?;
        }
        Command::Rollback { ref graph } => {
            let count = manager.rollback(graph).await?;
            print_json(&json!({ "status": "SUCCESS", "graph": graph, "restored_count": count }))?;
        }
        Command::ClearStaging => {
            manager.clear_staging().await?;
            print_json(&json!({ "status": "SUCCESS", "graph": graph_config.staging_graph }))?;
        }
        Command::Stats => {
            print_json(&manager.graph_stats().await?)?;
        }
        Command::Query { .. } | Command::VerifyAudit { .. } | Command::AuditReport { .. } => {}
    }

    Ok(())
}

/// Turn an hvdc-extract report (or a bare record array) into Turtle.
fn render_records(config: &GraphConfig, path: &Path) -> anyhow::Result<String> {
    let Some(publisher) = publisher_from_config(config)? else {
        anyhow::bail!("graph publishing is disabled; set graph.publish = true to deploy records");
    };
    let report: Value = serde_json::from_str(&fs::read_to_string(path)?)?;
    let records = match report {
        Value::Object(mut obj) => obj.remove("records").unwrap_or(Value::Array(Vec::new())),
        other => other,
    };
    let records: Vec<MergedRecord> = serde_json::from_value(records)?;
    tracing::info!(path = %path.display(), records = records.len(), "Rendering records as facts");
    Ok(publisher.build_facts(&records))
}

fn verify_audit(
    ledger: &AuditLedger,
    events: &EventLog,
    actor: &str,
    checkpoint: bool,
) -> anyhow::Result<()> {
    let report = verify_trail(ledger, events, actor, checkpoint)?;
    print_json(&report)?;
    if report.is_compromised() {
        return Err(HvdcError::IntegrityViolation(format!(
            "{} corrupted ledger row(s), event log {}",
            report.ledger.corrupted,
            report
                .events
                .as_ref()
                .map_or("not checkpointed", |r| r.status.as_str()),
        ))
        .into());
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
