//! Optional graph publishing capability.
//!
//! Callers that can publish extraction results hold an
//! `Option<Box<dyn GraphPublisher>>` decided once from configuration.

use async_trait::async_trait;

use hvdc_core::MergedRecord;

use crate::client::{GraphConfig, SparqlClient};
use crate::facts::FactBuilder;
use crate::store::Binding;
use crate::Result;

#[async_trait]
pub trait GraphPublisher: Send + Sync {
    /// Whether the backing store answers its liveness check.
    async fn health(&self) -> bool;

    /// Render records as the Turtle payload this publisher uploads.
    fn build_facts(&self, records: &[MergedRecord]) -> String;

    async fn query(&self, sparql: &str) -> Result<Vec<Binding>>;
}

/// Publisher backed by a Fuseki dataset.
pub struct FusekiPublisher {
    client: SparqlClient,
    facts: FactBuilder,
}

impl FusekiPublisher {
    pub fn new(client: SparqlClient) -> Self {
        let facts = FactBuilder::new(client.config().namespace.clone());
        Self { client, facts }
    }
}

#[async_trait]
impl GraphPublisher for FusekiPublisher {
    async fn health(&self) -> bool {
        match self.client.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Graph publisher health check failed");
                false
            }
        }
    }

    fn build_facts(&self, records: &[MergedRecord]) -> String {
        self.facts.build(records)
    }

    async fn query(&self, sparql: &str) -> Result<Vec<Binding>> {
        self.client.select(sparql).await
    }
}

/// Construct the publisher when `[graph] publish = true`, otherwise `None`.
pub fn publisher_from_config(config: &GraphConfig) -> Result<Option<Box<dyn GraphPublisher>>> {
    if !config.publish {
        tracing::debug!("Graph publishing disabled");
        return Ok(None);
    }
    let client = SparqlClient::new(config.clone())?;
    tracing::info!(base_url = %config.base_url, "Graph publishing enabled");
    Ok(Some(Box::new(FusekiPublisher::new(client))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_unless_enabled() {
        let cfg = GraphConfig::default();
        assert!(publisher_from_config(&cfg).unwrap().is_none());

        let cfg = GraphConfig {
            publish: true,
            ..Default::default()
        };
        let publisher = publisher_from_config(&cfg).unwrap().unwrap();
        let ttl = publisher.build_facts(&[]);
        assert!(ttl.starts_with("@prefix ex: <http://samsung.com/project-logistics#>"));
    }
}
