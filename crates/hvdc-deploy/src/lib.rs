//! HVDC Deploy — staged deployment of extracted facts to the graph store.
//!
//! A deployment uploads Turtle to a staging graph, validates it, snapshots
//! the production graphs into a backup graph, swaps staging into the target
//! and verifies the swap by triple count. Any failure after the swap began
//! restores the target from the backup. Every deployment leaves one row in
//! the audit ledger and one event in the event log.

pub mod config;
pub mod error;
pub mod manager;
pub mod types;
pub mod validation;

pub use config::DeployConfig;
pub use error::{DeployError, Result};
pub use manager::DeploymentManager;
pub use types::{DeploymentResult, DeploymentState, DeploymentStatus, Step, StepRecord, StepStatus};
pub use validation::{validate_graph, CheckStatus, ValidationCheck, ValidationResult};
