//! HVDC Graph — graph-store access for the ingest pipeline.
//!
//! Every read and write against the triple store flows through the
//! [`GraphStore`] trait. Two implementations exist: [`SparqlClient`] talks
//! SPARQL 1.1 over HTTP to a Fuseki-style server, and [`MemoryGraphStore`]
//! keeps named graphs in process (with fault injection) for tests.

pub mod client;
pub mod facts;
pub mod memory;
pub mod mutations;
pub mod publisher;
pub mod queries;
pub mod store;
pub mod turtle;

pub use client::{GraphConfig, GraphError, SparqlClient};
pub use facts::FactBuilder;
pub use memory::{Fault, MemoryGraphStore};
pub use publisher::{publisher_from_config, FusekiPublisher, GraphPublisher};
pub use store::{graph_stats, Binding, CodeFormatCounts, GraphStats, GraphStore, ReferentialCounts};

pub type Result<T> = std::result::Result<T, GraphError>;
