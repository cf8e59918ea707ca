//! hvdc-extract: Recover canonical HVDC codes from logistics spreadsheets.
//!
//! Every sheet of every source document is run through a layered set of
//! strategies (header column, lookup index, auxiliary columns, row scan,
//! sheet and file names, business rule). Each hit becomes a
//! [`hvdc_core::CandidateRecord`]; [`engine::merge`] collapses duplicate
//! hits at the same location by method priority.

pub mod config;
pub mod engine;
pub mod error;
pub mod headers;
pub mod lookup;
pub mod sources;
pub mod stats;
pub mod strategies;
pub mod workbook;

pub use config::ExtractConfig;
pub use engine::{merge, Extractor};
pub use error::{ExtractError, Result};
pub use lookup::LookupIndex;
pub use stats::ExtractionStats;
