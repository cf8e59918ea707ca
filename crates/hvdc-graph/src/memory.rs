//! In-process graph store with fault injection.
//!
//! Named graphs are ordered triple sets, so copies are set unions and
//! counts are exact. Faults let tests force connectivity loss, failed
//! writes and lossy copies at specific graphs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use hvdc_core::code::is_canonical;

use crate::client::GraphError;
use crate::store::{Binding, CodeFormatCounts, GraphStore, ReferentialCounts};
use crate::turtle::{self, Term, Triple, RDF_TYPE};
use crate::Result;

/// A failure the store should simulate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Every call fails as if the server were down.
    Unreachable,
    /// Drops, uploads and copies into `graph` fail.
    FailWrites { graph: String },
    /// Copies out of `graph` fail.
    FailCopyFrom { graph: String },
    /// Copies out of `graph` silently lose one triple.
    LossyCopyFrom { graph: String },
}

#[derive(Default)]
struct State {
    graphs: BTreeMap<String, BTreeSet<Triple>>,
    faults: Vec<Fault>,
}

pub struct MemoryGraphStore {
    namespace: String,
    state: Mutex<State>,
}

impl MemoryGraphStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn inject(&self, fault: Fault) {
        self.lock().faults.push(fault);
    }

    pub fn clear_faults(&self) {
        self.lock().faults.clear();
    }

    /// Add triples to a graph directly, ignoring faults.
    pub fn seed(&self, graph: &str, ttl: &str) -> Result<()> {
        let triples = turtle::parse(ttl)?;
        self.lock()
            .graphs
            .entry(graph.to_string())
            .or_default()
            .extend(triples);
        Ok(())
    }

    /// Snapshot of a graph's triples.
    pub fn snapshot(&self, graph: &str) -> BTreeSet<Triple> {
        self.lock().graphs.get(graph).cloned().unwrap_or_default()
    }

    /// Names of all non-empty graphs.
    pub fn graph_names(&self) -> Vec<String> {
        self.lock().graphs.keys().cloned().collect()
    }

    fn ex(&self, local: &str) -> Term {
        Term::Iri(format!("{}{local}", self.namespace))
    }
}

impl State {
    fn reachable(&self) -> Result<()> {
        if self.faults.contains(&Fault::Unreachable) {
            return Err(GraphError::Connection("memory store marked unreachable".to_string()));
        }
        Ok(())
    }

    fn writable(&self, graph: &str) -> Result<()> {
        self.reachable()?;
        let blocked = self
            .faults
            .iter()
            .any(|f| matches!(f, Fault::FailWrites { graph: g } if g == graph));
        if blocked {
            return Err(injected(format!("write to <{graph}> failed")));
        }
        Ok(())
    }

    fn has(&self, fault: impl Fn(&Fault) -> bool) -> bool {
        self.faults.iter().any(fault)
    }

    fn put(&mut self, graph: &str, triples: BTreeSet<Triple>) {
        if triples.is_empty() {
            self.graphs.remove(graph);
        } else {
            self.graphs.insert(graph.to_string(), triples);
        }
    }

    fn subjects_of_type<'a>(&'a self, graph: &str, class: &'a Term) -> BTreeSet<&'a Term> {
        let rdf_type = Term::iri(RDF_TYPE);
        self.graphs
            .get(graph)
            .into_iter()
            .flatten()
            .filter(|t| t.predicate == rdf_type && &t.object == class)
            .map(|t| &t.subject)
            .collect()
    }
}

fn injected(body: String) -> GraphError {
    GraphError::Status { status: 500, body }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn ping(&self) -> Result<()> {
        self.lock().reachable()
    }

    async fn triple_count(&self, graph: &str) -> Result<u64> {
        let state = self.lock();
        state.reachable()?;
        Ok(state.graphs.get(graph).map_or(0, |g| g.len() as u64))
    }

    async fn replace_graph(&self, graph: &str, ttl: &str) -> Result<()> {
        let triples: BTreeSet<Triple> = turtle::parse(ttl)?.into_iter().collect();
        let mut state = self.lock();
        state.writable(graph)?;
        state.put(graph, triples);
        Ok(())
    }

    async fn drop_graph(&self, graph: &str) -> Result<()> {
        let mut state = self.lock();
        state.writable(graph)?;
        state.graphs.remove(graph);
        Ok(())
    }

    async fn copy_graph(&self, from: &str, to: &str) -> Result<()> {
        let mut state = self.lock();
        state.writable(to)?;
        if state.has(|f| matches!(f, Fault::FailCopyFrom { graph } if graph == from)) {
            return Err(injected(format!("copy from <{from}> failed")));
        }

        let mut copied = state.graphs.get(from).cloned().unwrap_or_default();
        if state.has(|f| matches!(f, Fault::LossyCopyFrom { graph } if graph == from)) {
            copied.pop_last();
        }

        let mut merged = state.graphs.get(to).cloned().unwrap_or_default();
        merged.extend(copied);
        state.put(to, merged);
        Ok(())
    }

    async fn class_counts(&self, graph: &str, classes: &[String]) -> Result<BTreeMap<String, u64>> {
        let state = self.lock();
        state.reachable()?;
        Ok(classes
            .iter()
            .map(|c| {
                let class = self.ex(c);
                (c.clone(), state.subjects_of_type(graph, &class).len() as u64)
            })
            .collect())
    }

    async fn code_format_counts(&self, graph: &str) -> Result<CodeFormatCounts> {
        let state = self.lock();
        state.reachable()?;
        let code_pred = self.ex("hvdcCode");

        let mut counts = CodeFormatCounts::default();
        for t in state.graphs.get(graph).into_iter().flatten() {
            if t.predicate != code_pred {
                continue;
            }
            counts.total += 1;
            if t.object.literal_value().is_some_and(is_canonical) {
                counts.valid += 1;
            }
        }
        Ok(counts)
    }

    async fn referential_counts(&self, graph: &str) -> Result<ReferentialCounts> {
        let state = self.lock();
        state.reachable()?;
        let case_class = self.ex("Case");
        let belongs = self.ex("belongsToCase");

        let cases = state.subjects_of_type(graph, &case_class);
        let mut cargo = BTreeSet::new();
        let mut linked = BTreeSet::new();
        for t in state.graphs.get(graph).into_iter().flatten() {
            if t.predicate == belongs && cases.contains(&t.object) {
                cargo.insert(&t.subject);
                linked.insert(&t.object);
            }
        }

        Ok(ReferentialCounts {
            cases: cases.len() as u64,
            cargo_items: cargo.len() as u64,
            orphan_cases: (cases.len() - linked.len()) as u64,
        })
    }

    async fn select(&self, _query: &str) -> Result<Vec<Binding>> {
        self.lock().reachable()?;
        Err(GraphError::Unsupported("SPARQL SELECT"))
    }
}
