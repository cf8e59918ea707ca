//! Batch statistics for operational monitoring.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use hvdc_core::CandidateRecord;

/// Records at or above this confidence count as high confidence.
pub const HIGH_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ExtractionStats {
    pub total: usize,
    pub errors: usize,
    pub unique_codes: usize,
    pub avg_confidence: f64,
    pub high_confidence_rate: f64,
    /// Non-error fraction of all records.
    pub success_rate: f64,
    pub method_distribution: BTreeMap<String, usize>,
}

impl ExtractionStats {
    pub fn from_records(records: &[CandidateRecord]) -> Self {
        let total = records.len();
        if total == 0 {
            return Self::default();
        }

        let mut method_distribution = BTreeMap::new();
        let mut codes = BTreeSet::new();
        let mut confidence_sum = 0.0;
        let mut high = 0;
        let mut errors = 0;

        for r in records {
            *method_distribution
                .entry(r.method.as_str().to_string())
                .or_insert(0) += 1;
            confidence_sum += r.confidence;
            if r.confidence >= HIGH_CONFIDENCE {
                high += 1;
            }
            if r.is_error() {
                errors += 1;
            }
            if let Some(code) = &r.code {
                codes.insert(code);
            }
        }

        let n = total as f64;
        Self {
            total,
            errors,
            unique_codes: codes.len(),
            avg_confidence: confidence_sum / n,
            high_confidence_rate: high as f64 / n,
            success_rate: (total - errors) as f64 / n,
            method_distribution,
        }
    }
}
