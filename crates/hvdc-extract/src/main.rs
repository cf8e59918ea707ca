//! CLI entry point for the HVDC code extractor.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use serde_json::json;
use tracing_subscriber::{fmt, EnvFilter};
use uuid::Uuid;

use hvdc_audit::{AuditConfig, RiskLevel};
use hvdc_core::config::{load_section, DEFAULT_FILE_PREFIX};
use hvdc_core::events::{EventPayload, PipelineEvent, Severity};

use hvdc_extract::engine::failed_documents;
use hvdc_extract::sources::resolve_sources;
use hvdc_extract::{merge, ExtractConfig, ExtractionStats, Extractor};

#[derive(Parser)]
#[command(name = "hvdc-extract")]
#[command(about = "Recover HVDC codes from logistics spreadsheets")]
struct Cli {
    /// Files, glob patterns or directories to extract from.
    #[arg(required = true)]
    sources: Vec<String>,

    /// Trusted document for the lookup index (overrides extract.lookup_source).
    #[arg(long)]
    lookup: Option<PathBuf>,

    /// Write the JSON report here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report every candidate instead of merged records.
    #[arg(long)]
    all: bool,

    /// Actor recorded in the audit log.
    #[arg(long, default_value = "hvdc-extract")]
    actor: String,

    /// Config file prefix (default: hvdc).
    #[arg(short, long, default_value = DEFAULT_FILE_PREFIX)]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let mut extract_config: ExtractConfig = load_section(&cli.config, "extract")?;
    let audit_config: AuditConfig = load_section(&cli.config, "audit")?;
    if let Some(lookup) = &cli.lookup {
        extract_config.lookup_source = Some(lookup.clone());
    }

    let run_id = Uuid::new_v4();
    let paths = resolve_sources(&cli.sources, &extract_config)?;
    tracing::info!(%run_id, documents = paths.len(), "Starting extraction");

    // Workbook parsing is blocking file and CPU work.
    let worker_paths = paths.clone();
    let records = tokio::task::spawn_blocking(move || -> hvdc_extract::Result<_> {
        let extractor = Extractor::from_config(extract_config)?;
        Ok(extractor.extract_paths(&worker_paths))
    })
    .await??;

    let stats = ExtractionStats::from_records(&records);
    for path in failed_documents(&records) {
        tracing::warn!(path = %path.display(), "Document produced no records");
    }

    // Audit before reporting: a lost audit entry fails the run.
    let (ledger, events) = audit_config.open();
    ledger.record(
        "extract",
        &cli.actor,
        &json!({
            "run_id": run_id,
            "sources": cli.sources,
            "documents": paths.len(),
            "records": stats.total,
            "errors": stats.errors,
            "unique_codes": stats.unique_codes,
        }),
        RiskLevel::Low,
        &["EXTRACTION"],
    )?;
    let severity = if stats.errors > 0 {
        Severity::Warn
    } else {
        Severity::Info
    };
    events.append_event(&PipelineEvent::new(
        cli.actor.as_str(),
        severity,
        EventPayload::ExtractionCompleted {
            run_id,
            sources: paths.len(),
            records: stats.total,
            errors: stats.errors,
            unique_codes: stats.unique_codes,
            avg_confidence: stats.avg_confidence,
        },
    ))?;
    events.rotate_and_record(&cli.actor)?;

    let report = if cli.all {
        json!({ "run_id": run_id, "stats": stats, "records": records })
    } else {
        json!({ "run_id": run_id, "stats": stats, "records": merge(records) })
    };
    let text = serde_json::to_string_pretty(&report)?;
    match &cli.output {
        Some(path) => {
            fs::write(path, text)?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => println!("{text}"),
    }

    Ok(())
}
