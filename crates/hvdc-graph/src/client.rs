//! Graph-store connection settings and the shared HTTP client.

use std::time::Duration;

use serde::Deserialize;

use hvdc_core::ErrorKind;

/// Errors from graph operations.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("Graph store unreachable: {0}")]
    Connection(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Graph store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Unexpected SPARQL response: {0}")]
    Response(String),

    #[error("Turtle parse error at line {line}: {message}")]
    Turtle { line: usize, message: String },

    #[error("Invalid graph IRI: {0}")]
    InvalidIri(String),

    #[error("Operation not supported by this store: {0}")]
    Unsupported(&'static str),
}

impl GraphError {
    /// Classify into the shared taxonomy. Transport failures are
    /// connectivity problems; everything else is reported by the caller
    /// in the context of the step that failed.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Connection(_) => Some(ErrorKind::Connectivity),
            Self::Http(e) if e.is_connect() || e.is_timeout() => Some(ErrorKind::Connectivity),
            _ => None,
        }
    }
}

/// `[graph]` configuration section.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_dataset")]
    pub dataset: String,
    #[serde(default = "default_staging_graph")]
    pub staging_graph: String,
    #[serde(default = "default_backup_graph")]
    pub backup_graph: String,
    #[serde(default = "default_production_graphs")]
    pub production_graphs: Vec<String>,
    /// Namespace of the `ex:` vocabulary.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Construct the optional [`crate::GraphPublisher`].
    #[serde(default)]
    pub publish: bool,
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,
    #[serde(default = "default_update_timeout")]
    pub update_timeout_secs: u64,
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_secs: u64,
}

const GRAPH_BASE: &str = "http://samsung.com/graph/";

fn default_base_url() -> String {
    "http://localhost:3030".to_string()
}

fn default_dataset() -> String {
    "hvdc".to_string()
}

fn default_staging_graph() -> String {
    format!("{GRAPH_BASE}STAGING")
}

fn default_backup_graph() -> String {
    format!("{GRAPH_BASE}BACKUP")
}

fn default_production_graphs() -> Vec<String> {
    ["OFCO", "DSV", "PKGS", "EXTRACTED"]
        .iter()
        .map(|g| format!("{GRAPH_BASE}{g}"))
        .collect()
}

fn default_namespace() -> String {
    "http://samsung.com/project-logistics#".to_string()
}

fn default_health_timeout() -> u64 {
    5
}

fn default_query_timeout() -> u64 {
    30
}

fn default_update_timeout() -> u64 {
    60
}

fn default_upload_timeout() -> u64 {
    120
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            dataset: default_dataset(),
            staging_graph: default_staging_graph(),
            backup_graph: default_backup_graph(),
            production_graphs: default_production_graphs(),
            namespace: default_namespace(),
            publish: false,
            health_timeout_secs: default_health_timeout(),
            query_timeout_secs: default_query_timeout(),
            update_timeout_secs: default_update_timeout(),
            upload_timeout_secs: default_upload_timeout(),
        }
    }
}

/// SPARQL 1.1 client for one dataset.
///
/// Clone is cheap (the inner `reqwest::Client` is an `Arc`).
#[derive(Clone)]
pub struct SparqlClient {
    http: reqwest::Client,
    config: GraphConfig,
}

impl SparqlClient {
    pub fn new(config: GraphConfig) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.health_timeout_secs))
            .build()?;
        tracing::debug!(
            base_url = %config.base_url,
            dataset = %config.dataset,
            "SPARQL client created"
        );
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn endpoint(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.dataset,
            name
        )
    }

    pub(crate) fn ping_url(&self) -> String {
        format!("{}/$/ping", self.config.base_url.trim_end_matches('/'))
    }

    pub(crate) fn timeout(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    /// `GET {base}/$/ping`, expecting HTTP 200.
    pub async fn ping(&self) -> Result<(), GraphError> {
        let resp = self
            .http
            .get(self.ping_url())
            .timeout(Self::timeout(self.config.health_timeout_secs))
            .send()
            .await
            .map_err(transport)?;

        if resp.status().as_u16() == 200 {
            Ok(())
        } else {
            Err(status_error(resp).await)
        }
    }
}

/// Map a transport failure, folding connect errors and timeouts into
/// [`GraphError::Connection`].
pub(crate) fn transport(e: reqwest::Error) -> GraphError {
    if e.is_connect() || e.is_timeout() {
        GraphError::Connection(e.to_string())
    } else {
        GraphError::Http(e)
    }
}

pub(crate) async fn status_error(resp: reqwest::Response) -> GraphError {
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    GraphError::Status { status, body }
}

/// Graph IRIs are interpolated into SPARQL text between `<` and `>`.
pub(crate) fn checked_iri(iri: &str) -> Result<&str, GraphError> {
    let bad = |c: char| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\');
    if iri.is_empty() || iri.chars().any(bad) {
        return Err(GraphError::InvalidIri(iri.to_string()));
    }
    Ok(iri)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_follow_dataset_layout() {
        let client = SparqlClient::new(GraphConfig {
            base_url: "http://fuseki:3030/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(client.endpoint("sparql"), "http://fuseki:3030/hvdc/sparql");
        assert_eq!(client.endpoint("update"), "http://fuseki:3030/hvdc/update");
        assert_eq!(client.ping_url(), "http://fuseki:3030/$/ping");
    }

    #[test]
    fn default_graphs() {
        let cfg = GraphConfig::default();
        assert_eq!(cfg.staging_graph, "http://samsung.com/graph/STAGING");
        assert_eq!(cfg.production_graphs.len(), 4);
        assert!(cfg
            .production_graphs
            .contains(&"http://samsung.com/graph/EXTRACTED".to_string()));
        assert!(!cfg.publish);
    }

    #[test]
    fn iri_check_rejects_injection() {
        assert!(checked_iri("http://samsung.com/graph/DSV").is_ok());
        assert!(checked_iri("http://x> } ; DROP ALL ; {<y").is_err());
        assert!(checked_iri("").is_err());
    }
}
