//! Pre-swap checks run against the staging graph.
//!
//! Only an empty graph fails outright. Missing classes, malformed codes and
//! unlinked cases are warnings: they are recorded with the deployment but
//! do not block the swap.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use hvdc_graph::GraphStore;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
    pub detail: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidationResult {
    pub graph: String,
    /// Worst status over all checks.
    pub overall_status: CheckStatus,
    pub checks: Vec<ValidationCheck>,
    pub checked_at: DateTime<Utc>,
}

impl ValidationResult {
    fn new(graph: &str, checks: Vec<ValidationCheck>) -> Self {
        let overall_status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(CheckStatus::Pass);
        Self {
            graph: graph.to_string(),
            overall_status,
            checks,
            checked_at: Utc::now(),
        }
    }

    /// True unless some check failed. Warnings pass.
    pub fn passed(&self) -> bool {
        self.overall_status != CheckStatus::Fail
    }

    pub fn check(&self, name: &str) -> Option<&ValidationCheck> {
        self.checks.iter().find(|c| c.name == name)
    }

    pub fn with_status(&self, status: CheckStatus) -> impl Iterator<Item = &ValidationCheck> {
        self.checks.iter().filter(move |c| c.status == status)
    }
}

/// Run every check against `graph`.
///
/// Store errors abort the run: a check that could not be evaluated is not
/// a pass.
pub async fn validate_graph<S: GraphStore + ?Sized>(
    store: &S,
    graph: &str,
    required_classes: &[String],
) -> hvdc_graph::Result<ValidationResult> {
    let mut checks = Vec::with_capacity(4);

    // ── Triple count ─────────────────────────────────────────────
    let triples = store.triple_count(graph).await?;
    checks.push(ValidationCheck {
        name: "triple_count",
        status: if triples > 0 { CheckStatus::Pass } else { CheckStatus::Fail },
        message: format!("{triples} triples"),
        detail: json!({ "count": triples }),
    });

    // ── Required classes ─────────────────────────────────────────
    let class_counts = store.class_counts(graph, required_classes).await?;
    let missing: Vec<&String> = required_classes
        .iter()
        .filter(|c| class_counts.get(*c).copied().unwrap_or(0) == 0)
        .collect();
    checks.push(ValidationCheck {
        name: "required_classes",
        status: if missing.is_empty() { CheckStatus::Pass } else { CheckStatus::Warn },
        message: if missing.is_empty() {
            "all required classes present".to_string()
        } else {
            format!("missing classes: {}", join(&missing))
        },
        detail: json!({ "class_counts": class_counts, "missing_classes": missing }),
    });

    // ── Code format ──────────────────────────────────────────────
    let codes = store.code_format_counts(graph).await?;
    let ok = codes.total > 0 && codes.valid == codes.total;
    checks.push(ValidationCheck {
        name: "code_format",
        status: if ok { CheckStatus::Pass } else { CheckStatus::Warn },
        message: format!("{}/{} codes canonical", codes.valid, codes.total),
        detail: json!({
            "total": codes.total,
            "valid": codes.valid,
            "ratio": if codes.total > 0 { codes.valid as f64 / codes.total as f64 } else { 0.0 },
        }),
    });

    // ── Referential integrity ────────────────────────────────────
    let refs = store.referential_counts(graph).await?;
    let ok = refs.cases > 0 && refs.cargo_items > 0 && refs.orphan_cases == 0;
    checks.push(ValidationCheck {
        name: "referential_integrity",
        status: if ok { CheckStatus::Pass } else { CheckStatus::Warn },
        message: format!(
            "{} cases, {} cargo items, {} cases without items",
            refs.cases, refs.cargo_items, refs.orphan_cases
        ),
        detail: serde_json::to_value(refs).unwrap_or_default(),
    });

    let result = ValidationResult::new(graph, checks);
    for check in result.with_status(CheckStatus::Warn) {
        tracing::warn!(graph, check = check.name, message = %check.message, "Validation warning");
    }
    Ok(result)
}

fn join(names: &[&String]) -> String {
    names.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use hvdc_graph::MemoryGraphStore;

    const NS: &str = "http://samsung.com/project-logistics#";

    fn classes() -> Vec<String> {
        vec!["Case".into(), "CargoItem".into(), "Invoice".into()]
    }

    #[tokio::test]
    async fn empty_graph_fails() {
        let store = MemoryGraphStore::new(NS);
        let result = validate_graph(&store, "g", &classes()).await.unwrap();
        assert_eq!(result.overall_status, CheckStatus::Fail);
        assert!(!result.passed());
        assert_eq!(result.check("triple_count").unwrap().status, CheckStatus::Fail);
    }

    #[tokio::test]
    async fn missing_class_and_orphan_only_warn() {
        let store = MemoryGraphStore::new(NS);
        store
            .seed(
                "g",
                r#"@prefix ex: <http://samsung.com/project-logistics#> .
ex:c1 a ex:Case ; ex:hvdcCode "HVDC-ADOPT-SCT-0001" .
ex:c2 a ex:Case ; ex:hvdcCode "HVDC-ADOPT-SCT-0002" .
ex:i1 a ex:CargoItem ; ex:belongsToCase ex:c1 .
"#,
            )
            .unwrap();

        let result = validate_graph(&store, "g", &classes()).await.unwrap();
        assert!(result.passed());
        assert_eq!(result.overall_status, CheckStatus::Warn);
        assert_eq!(result.check("code_format").unwrap().status, CheckStatus::Pass);

        let required = result.check("required_classes").unwrap();
        assert_eq!(required.status, CheckStatus::Warn);
        assert_eq!(required.detail["missing_classes"], json!(["Invoice"]));

        let refs = result.check("referential_integrity").unwrap();
        assert_eq!(refs.status, CheckStatus::Warn);
        assert_eq!(refs.detail["orphan_cases"], 1);
    }

    #[tokio::test]
    async fn store_error_is_not_a_pass() {
        let store = MemoryGraphStore::new(NS);
        store.inject(hvdc_graph::Fault::Unreachable);
        assert!(validate_graph(&store, "g", &classes()).await.is_err());
    }
}
