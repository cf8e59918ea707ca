//! Write operations: SPARQL Update and graph-store uploads.

use crate::client::{checked_iri, status_error, transport, GraphError, SparqlClient};

pub fn drop_graph_update(graph: &str) -> String {
    format!("DROP SILENT GRAPH <{graph}>")
}

pub fn copy_graph_update(from: &str, to: &str) -> String {
    format!("INSERT {{ GRAPH <{to}> {{ ?s ?p ?o }} }} WHERE {{ GRAPH <{from}> {{ ?s ?p ?o }} }}")
}

impl SparqlClient {
    /// POST a SPARQL Update. 200 and 204 are success.
    pub async fn update(&self, update: &str) -> Result<(), GraphError> {
        let resp = self
            .http()
            .post(self.endpoint("update"))
            .header("Content-Type", "application/sparql-update")
            .body(update.to_string())
            .timeout(Self::timeout(self.config().update_timeout_secs))
            .send()
            .await
            .map_err(transport)?;

        match resp.status().as_u16() {
            200 | 204 => Ok(()),
            _ => Err(status_error(resp).await),
        }
    }

    pub async fn drop_graph(&self, graph: &str) -> Result<(), GraphError> {
        self.update(&drop_graph_update(checked_iri(graph)?)).await?;
        tracing::debug!(graph, "Graph dropped");
        Ok(())
    }

    pub async fn copy_graph(&self, from: &str, to: &str) -> Result<(), GraphError> {
        self.update(&copy_graph_update(checked_iri(from)?, checked_iri(to)?))
            .await?;
        tracing::debug!(from, to, "Graph copied");
        Ok(())
    }

    /// Drop the graph, then `PUT` the Turtle document into it.
    pub async fn replace_graph(&self, graph: &str, ttl: &str) -> Result<(), GraphError> {
        self.drop_graph(graph).await?;

        let resp = self
            .http()
            .put(self.endpoint("data"))
            .query(&[("graph", graph)])
            .header("Content-Type", "text/turtle; charset=utf-8")
            .body(ttl.to_string())
            .timeout(Self::timeout(self.config().upload_timeout_secs))
            .send()
            .await
            .map_err(transport)?;

        match resp.status().as_u16() {
            200 | 201 | 204 => {
                tracing::info!(graph, bytes = ttl.len(), "Turtle uploaded");
                Ok(())
            }
            _ => Err(status_error(resp).await),
        }
    }
}
