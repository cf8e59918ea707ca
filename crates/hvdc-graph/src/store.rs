//! The graph-store seam used by the deployment manager.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::client::{GraphConfig, SparqlClient};
use crate::Result;

/// One row of a SELECT result: variable name to lexical value.
pub type Binding = BTreeMap<String, String>;

/// How many `ex:hvdcCode` values a graph holds and how many are canonical.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CodeFormatCounts {
    pub total: u64,
    pub valid: u64,
}

/// Case/cargo linkage inside a graph.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ReferentialCounts {
    pub cases: u64,
    pub cargo_items: u64,
    /// Cases with no `ex:belongsToCase` child.
    pub orphan_cases: u64,
}

/// Triple counts of every graph the deployment manager touches.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct GraphStats {
    pub staging: u64,
    pub backup: u64,
    pub production: BTreeMap<String, u64>,
    pub total_production: u64,
}

/// Count triples in the staging, backup and production graphs.
pub async fn graph_stats<S: GraphStore + ?Sized>(store: &S, config: &GraphConfig) -> Result<GraphStats> {
    let mut stats = GraphStats {
        staging: store.triple_count(&config.staging_graph).await?,
        backup: store.triple_count(&config.backup_graph).await?,
        ..Default::default()
    };
    for graph in &config.production_graphs {
        let n = store.triple_count(graph).await?;
        stats.total_production += n;
        stats.production.insert(graph.clone(), n);
    }
    Ok(stats)
}

/// Named-graph operations needed to stage, validate and swap data.
///
/// No operation is retried. Implementations must not hold locks across
/// calls; serializing deployments is the caller's job.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Liveness check.
    async fn ping(&self) -> Result<()>;

    async fn triple_count(&self, graph: &str) -> Result<u64>;

    /// Replace the graph's content wholesale with the Turtle document.
    async fn replace_graph(&self, graph: &str, ttl: &str) -> Result<()>;

    /// Drop the graph. Dropping an absent graph succeeds.
    async fn drop_graph(&self, graph: &str) -> Result<()>;

    /// Add every triple of `from` into `to` (additive).
    async fn copy_graph(&self, from: &str, to: &str) -> Result<()>;

    /// Instance counts of `ex:<class>` for each requested local class name.
    async fn class_counts(&self, graph: &str, classes: &[String]) -> Result<BTreeMap<String, u64>>;

    async fn code_format_counts(&self, graph: &str) -> Result<CodeFormatCounts>;

    async fn referential_counts(&self, graph: &str) -> Result<ReferentialCounts>;

    /// Run an arbitrary SELECT query.
    async fn select(&self, query: &str) -> Result<Vec<Binding>>;
}

#[async_trait]
impl GraphStore for SparqlClient {
    async fn ping(&self) -> Result<()> {
        SparqlClient::ping(self).await
    }

    async fn triple_count(&self, graph: &str) -> Result<u64> {
        SparqlClient::triple_count(self, graph).await
    }

    async fn replace_graph(&self, graph: &str, ttl: &str) -> Result<()> {
        SparqlClient::replace_graph(self, graph, ttl).await
    }

    async fn drop_graph(&self, graph: &str) -> Result<()> {
        SparqlClient::drop_graph(self, graph).await
    }

    async fn copy_graph(&self, from: &str, to: &str) -> Result<()> {
        SparqlClient::copy_graph(self, from, to).await
    }

    async fn class_counts(&self, graph: &str, classes: &[String]) -> Result<BTreeMap<String, u64>> {
        SparqlClient::class_counts(self, graph, classes).await
    }

    async fn code_format_counts(&self, graph: &str) -> Result<CodeFormatCounts> {
        SparqlClient::code_format_counts(self, graph).await
    }

    async fn referential_counts(&self, graph: &str) -> Result<ReferentialCounts> {
        SparqlClient::referential_counts(self, graph).await
    }

    async fn select(&self, query: &str) -> Result<Vec<Binding>> {
        SparqlClient::select(self, query).await
    }
}
