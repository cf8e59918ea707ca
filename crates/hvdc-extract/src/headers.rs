//! Header normalization and the per-sheet table view.

use once_cell::sync::Lazy;
use regex::Regex;

pub const HVDC_CODE: &str = "HVDC CODE";
pub const REF_NO: &str = "REF NO";
pub const REMARKS: &str = "REMARKS";
pub const DESCRIPTION: &str = "DESCRIPTION";

static HEADER_ALIASES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"(?i)^\s*hvdc[\s_-]*code\s*$", HVDC_CODE),
        (r"(?i)^\s*case\s*(no\.?|#)?\s*$", HVDC_CODE),
        (r"(?i)^\s*ref(\.|erence)?\s*no\.?\s*$", REF_NO),
        (r"(?i)^\s*remarks?\s*$", REMARKS),
        (r"(?i)^\s*description\s*$", DESCRIPTION),
    ]
    .into_iter()
    .map(|(p, canon)| (Regex::new(p).expect("header alias compiles"), canon))
    .collect()
});

/// Rewrite a header to its canonical name; unmatched headers come back
/// trimmed but otherwise unchanged.
pub fn normalize_header(header: &str) -> String {
    HEADER_ALIASES
        .iter()
        .find(|(rx, _)| rx.is_match(header))
        .map(|(_, canon)| canon.to_string())
        .unwrap_or_else(|| header.trim().to_string())
}

/// A sheet split into a normalized header row and data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    /// Data rows; index 0 is the first row after the header.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// The first row with any non-blank cell becomes the header.
    /// Returns `None` for a sheet without one.
    pub fn from_rows(mut rows: Vec<Vec<String>>) -> Option<Self> {
        let header_at = rows
            .iter()
            .position(|r| r.iter().any(|c| !c.trim().is_empty()))?;
        let data = rows.split_off(header_at + 1);
        let headers = rows
            .pop()
            .unwrap_or_default()
            .iter()
            .map(|h| normalize_header(h))
            .collect();
        Some(Self {
            headers,
            rows: data,
        })
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h.eq_ignore_ascii_case(name))
    }

    /// First non-blank value among the columns called `name`.
    pub fn cell<'a>(&self, row: &'a [String], name: &str) -> Option<&'a str> {
        self.headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.eq_ignore_ascii_case(name))
            .filter_map(|(i, _)| row.get(i))
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
    }

    /// First non-blank value among several candidate columns, with the
    /// column it came from.
    pub fn first_cell<'a>(&self, row: &'a [String], names: &[&'static str]) -> Option<(&'static str, &'a str)> {
        names
            .iter()
            .find_map(|name| self.cell(row, name).map(|v| (*name, v)))
    }
}
