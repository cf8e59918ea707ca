//! Read operations and SPARQL SELECT text.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::client::{checked_iri, status_error, transport, GraphError, SparqlClient};
use crate::store::{Binding, CodeFormatCounts, ReferentialCounts};

/// Canonical code pattern in XPath regex syntax.
pub const CODE_PATTERN: &str = "^HVDC(-[A-Z0-9]+){2,}$";

pub fn count_triples_query(graph: &str) -> String {
    format!("SELECT (COUNT(*) AS ?count) WHERE {{ GRAPH <{graph}> {{ ?s ?p ?o }} }}")
}

pub fn class_counts_query(graph: &str, ns: &str, classes: &[String]) -> String {
    let list = classes
        .iter()
        .map(|c| format!("ex:{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "PREFIX ex: <{ns}>
SELECT ?class (COUNT(DISTINCT ?instance) AS ?count) WHERE {{
  GRAPH <{graph}> {{
    ?instance a ?class .
    FILTER(?class IN ({list}))
  }}
}} GROUP BY ?class"
    )
}

pub fn code_format_query(graph: &str, ns: &str) -> String {
    format!(
        "PREFIX ex: <{ns}>
SELECT (COUNT(?code) AS ?total) (COUNT(?validCode) AS ?valid) WHERE {{
  GRAPH <{graph}> {{
    ?entity ex:hvdcCode ?code .
    OPTIONAL {{
      ?entity ex:hvdcCode ?validCode .
      FILTER(?validCode = ?code && REGEX(STR(?validCode), \"{CODE_PATTERN}\"))
    }}
  }}
}}"
    )
}

pub fn referential_query(graph: &str, ns: &str) -> String {
    format!(
        "PREFIX ex: <{ns}>
SELECT (COUNT(DISTINCT ?case) AS ?cases) (COUNT(DISTINCT ?cargo) AS ?cargoItems) WHERE {{
  GRAPH <{graph}> {{
    ?case a ex:Case .
    OPTIONAL {{ ?cargo ex:belongsToCase ?case . }}
  }}
}}"
    )
}

pub fn orphan_cases_query(graph: &str, ns: &str) -> String {
    format!(
        "PREFIX ex: <{ns}>
SELECT (COUNT(DISTINCT ?case) AS ?orphans) WHERE {{
  GRAPH <{graph}> {{
    ?case a ex:Case .
    FILTER NOT EXISTS {{ ?cargo ex:belongsToCase ?case . }}
  }}
}}"
    )
}

impl SparqlClient {
    /// POST a SELECT query, returning the flattened bindings.
    pub async fn select(&self, query: &str) -> Result<Vec<Binding>, GraphError> {
        let resp = self
            .http()
            .post(self.endpoint("sparql"))
            .header("Accept", "application/sparql-results+json")
            .form(&[("query", query)])
            .timeout(Self::timeout(self.config().query_timeout_secs))
            .send()
            .await
            .map_err(transport)?;

        if !resp.status().is_success() {
            return Err(status_error(resp).await);
        }

        let json: Value = resp.json().await?;
        parse_bindings(&json)
    }

    pub async fn triple_count(&self, graph: &str) -> Result<u64, GraphError> {
        let rows = self.select(&count_triples_query(checked_iri(graph)?)).await?;
        first_u64(&rows, "count")
    }

    pub async fn class_counts(
        &self,
        graph: &str,
        classes: &[String],
    ) -> Result<BTreeMap<String, u64>, GraphError> {
        let ns = &self.config().namespace;
        let rows = self
            .select(&class_counts_query(checked_iri(graph)?, ns, classes))
            .await?;

        let mut counts: BTreeMap<String, u64> = classes.iter().map(|c| (c.clone(), 0)).collect();
        for row in &rows {
            let (Some(class), Some(count)) = (row.get("class"), row.get("count")) else {
                continue;
            };
            let local = class.strip_prefix(ns.as_str()).unwrap_or(class);
            if let Some(slot) = counts.get_mut(local) {
                *slot = parse_u64(count)?;
            }
        }
        Ok(counts)
    }

    pub async fn code_format_counts(&self, graph: &str) -> Result<CodeFormatCounts, GraphError> {
        let rows = self
            .select(&code_format_query(checked_iri(graph)?, &self.config().namespace))
            .await?;
        Ok(CodeFormatCounts {
            total: first_u64(&rows, "total")?,
            valid: first_u64(&rows, "valid")?,
        })
    }

    pub async fn referential_counts(&self, graph: &str) -> Result<ReferentialCounts, GraphError> {
        let graph = checked_iri(graph)?;
        let ns = &self.config().namespace;
        let rows = self.select(&referential_query(graph, ns)).await?;
        let orphans = self.select(&orphan_cases_query(graph, ns)).await?;
        Ok(ReferentialCounts {
            cases: first_u64(&rows, "cases")?,
            cargo_items: first_u64(&rows, "cargoItems")?,
            orphan_cases: first_u64(&orphans, "orphans")?,
        })
    }
}

/// Flatten a `application/sparql-results+json` document.
pub fn parse_bindings(json: &Value) -> Result<Vec<Binding>, GraphError> {
    let bindings = json
        .pointer("/results/bindings")
        .and_then(Value::as_array)
        .ok_or_else(|| GraphError::Response("missing results.bindings".to_string()))?;

    Ok(bindings
        .iter()
        .filter_map(Value::as_object)
        .map(|row| {
            row.iter()
                .filter_map(|(var, cell)| {
                    cell.get("value")
                        .and_then(Value::as_str)
                        .map(|v| (var.clone(), v.to_string()))
                })
                .collect()
        })
        .collect())
}

/// Aggregate queries always return one row; a missing row counts as zero.
fn first_u64(rows: &[Binding], var: &str) -> Result<u64, GraphError> {
    match rows.first().and_then(|r| r.get(var)) {
        Some(v) => parse_u64(v),
        None => Ok(0),
    }
}

fn parse_u64(v: &str) -> Result<u64, GraphError> {
    v.parse()
        .map_err(|_| GraphError::Response(format!("expected a count, got {v:?}")))
}
