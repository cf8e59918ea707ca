//! Core domain types for the HVDC ingest pipeline.
//!
//! These types describe extraction hits and the documents they came from,
//! shared by the extraction engine, the fact builder and the deployment
//! manager.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::code::HvdcCode;

// ── Extraction Method ─────────────────────────────────────────────

/// How a candidate record was recovered.
///
/// The variants form a closed set with a fixed priority table: when two
/// strategies hit the same location the higher priority wins, then the
/// higher confidence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ExtractionMethod {
    /// A canonical `HVDC CODE` column.
    HeaderDirect,
    /// A PO/invoice/package reference resolved through the lookup index.
    LookupTable,
    /// Pattern match over the auxiliary columns. `reference` is true when the
    /// sheet carries a `REF NO` column.
    ColumnRegex { reference: bool },
    /// Pattern match over the whole row.
    RowScan,
    SheetName,
    FileName,
    /// Code synthesized from supplier and reference fields.
    BusinessRule,
    /// Sentinel for a document that could not be read.
    Error,
}

impl ExtractionMethod {
    pub fn priority(&self) -> i8 {
        match self {
            Self::HeaderDirect => 5,
            Self::LookupTable => 4,
            Self::ColumnRegex { reference: true } => 4,
            Self::ColumnRegex { reference: false } => 3,
            Self::RowScan => 2,
            Self::SheetName => 1,
            Self::FileName => 0,
            Self::BusinessRule => 1,
            Self::Error => -1,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Self::HeaderDirect => 0.95,
            Self::LookupTable => 0.90,
            Self::ColumnRegex { .. } => 0.85,
            Self::RowScan => 0.70,
            Self::SheetName => 0.60,
            Self::FileName => 0.55,
            Self::BusinessRule => 0.70,
            Self::Error => 0.0,
        }
    }

    /// Stable label used in statistics and graph facts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeaderDirect => "header-direct",
            Self::LookupTable => "lookup-table",
            Self::ColumnRegex { .. } => "column-regex",
            Self::RowScan => "row-scan",
            Self::SheetName => "sheet-name",
            Self::FileName => "file-name",
            Self::BusinessRule => "business-rule",
            Self::Error => "error",
        }
    }
}

// ── Source Document ───────────────────────────────────────────────

static COPY_SUFFIX_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:\s*\(\d+\)|[\s_.-]*(?:copy|복사본)|\.\d+)$")
        .expect("copy suffix pattern compiles")
});

/// A spreadsheet file, identified by path and logical source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SourceDocument {
    pub path: PathBuf,
    /// File stem with copy/version suffixes stripped, uppercased. Rotated
    /// copies of the same export share this value.
    pub logical_source: String,
}

impl SourceDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let logical_source = logical_source_of(&path);
        Self {
            path,
            logical_source,
        }
    }

    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Logical source name for `path`: `report (1).xlsx`, `report_copy.xlsx`
/// and `report.2.xlsx` all map to `REPORT`.
pub fn logical_source_of(path: &Path) -> String {
    let mut stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    loop {
        let stripped = COPY_SUFFIX_RX.replace(&stem, "").into_owned();
        if stripped == stem || stripped.trim().is_empty() {
            break;
        }
        stem = stripped;
    }

    stem.trim().to_uppercase()
}

// ── Candidate Records ─────────────────────────────────────────────

/// One extraction hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateRecord {
    /// The text the strategy matched, before normalization.
    pub raw: String,
    /// Canonical code. `None` only for [`ExtractionMethod::Error`] records.
    pub code: Option<HvdcCode>,
    pub confidence: f64,
    pub method: ExtractionMethod,
    pub source: SourceDocument,
    pub sheet: Option<String>,
    /// Zero-based data row index, `None` for sheet and file level hits.
    pub row: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CandidateRecord {
    pub fn new(
        raw: impl Into<String>,
        code: HvdcCode,
        method: ExtractionMethod,
        source: SourceDocument,
        sheet: Option<String>,
        row: Option<usize>,
    ) -> Self {
        Self {
            raw: raw.into(),
            code: Some(code),
            confidence: method.confidence(),
            method,
            source,
            sheet,
            row,
            error: None,
        }
    }

    /// Sentinel record for a document that failed to open or parse.
    pub fn error(source: SourceDocument, message: impl Into<String>) -> Self {
        Self {
            raw: String::new(),
            code: None,
            confidence: 0.0,
            method: ExtractionMethod::Error,
            source,
            sheet: None,
            row: None,
            error: Some(message.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.method == ExtractionMethod::Error
    }

    pub fn priority(&self) -> i8 {
        self.method.priority()
    }

    /// Ordering used before duplicate collapse: code, logical source, file,
    /// sheet, row, then priority and confidence descending.
    pub fn ranking_cmp(&self, other: &Self) -> Ordering {
        self.code
            .cmp(&other.code)
            .then_with(|| self.source.logical_source.cmp(&other.source.logical_source))
            .then_with(|| self.source.path.cmp(&other.source.path))
            .then_with(|| self.sheet.cmp(&other.sheet))
            .then_with(|| self.row.cmp(&other.row))
            .then_with(|| other.priority().cmp(&self.priority()))
            .then_with(|| other.confidence.total_cmp(&self.confidence))
    }

    /// Whether both records describe the same (code, file, sheet, row).
    pub fn same_location(&self, other: &Self) -> bool {
        self.code == other.code
            && self.source.path == other.source.path
            && self.sheet == other.sheet
            && self.row == other.row
    }
}

/// The record kept for a (code, document, sheet, row) location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergedRecord {
    #[serde(flatten)]
    pub record: CandidateRecord,
    /// Lower-ranked hits that collapsed into this one.
    #[serde(default)]
    pub duplicates: usize,
}
