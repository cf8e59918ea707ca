//! hvdc-core: Shared types, configuration, and error handling for the HVDC ingest pipeline.
//!
//! This crate provides the foundational types used across all pipeline components:
//! - Canonical HVDC code patterns and normalization
//! - Candidate records and the extraction-method priority table
//! - Pipeline event payloads for the audit event log
//! - Layered configuration loading
//! - The shared error taxonomy

pub mod code;
pub mod config;
pub mod error;
pub mod events;
pub mod types;

pub use code::{find_code, normalize_code, CodeMatch, HvdcCode};
pub use error::{ErrorKind, HvdcError};
pub use types::{CandidateRecord, ExtractionMethod, MergedRecord, SourceDocument};
