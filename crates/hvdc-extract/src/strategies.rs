//! The individual code-recovery strategies.
//!
//! Each strategy inspects one location (a row, a sheet title, a file stem)
//! and reports either a [`Hit`] or [`StrategyOutcome::NoMatch`]. A strategy
//! never fails; document-level failures are surfaced by the engine.

use once_cell::sync::Lazy;
use regex::Regex;

use hvdc_core::{find_code, ExtractionMethod, HvdcCode};

use crate::config::ExtractConfig;
use crate::headers::{Table, DESCRIPTION, HVDC_CODE, REF_NO, REMARKS};
use crate::lookup::LookupIndex;

const SUPPLIER_FIELDS: [&str; 3] = ["SUPPLIER", "VENDOR", "SUPPLIER NAME"];
const REFERENCE_FIELDS: [&str; 4] = [REF_NO, "REFERENCE", "INVOICE NO", "PO NO"];

static DIGITS_RX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("digits pattern compiles"));

/// A code a strategy recovered, before it is tied to a location.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub raw: String,
    pub code: HvdcCode,
    pub method: ExtractionMethod,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyOutcome {
    Hit(Hit),
    NoMatch,
}

impl StrategyOutcome {
    fn found(raw: impl Into<String>, code: HvdcCode, method: ExtractionMethod) -> Self {
        Self::Hit(Hit {
            raw: raw.into(),
            code,
            method,
        })
    }

    fn scan(text: &str, method: ExtractionMethod) -> Self {
        match find_code(text) {
            Some(m) => Self::found(m.raw, m.code, method),
            None => Self::NoMatch,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    pub fn into_hit(self) -> Option<Hit> {
        match self {
            Self::Hit(hit) => Some(hit),
            Self::NoMatch => None,
        }
    }
}

/// Code pattern in the canonical `HVDC CODE` column.
pub fn header_direct(table: &Table, row: &[String]) -> StrategyOutcome {
    match table.cell(row, HVDC_CODE) {
        Some(value) => StrategyOutcome::scan(value, ExtractionMethod::HeaderDirect),
        None => StrategyOutcome::NoMatch,
    }
}

/// Reference number resolved through the lookup index.
pub fn lookup_table(index: Option<&LookupIndex>, table: &Table, row: &[String]) -> StrategyOutcome {
    let Some(hit) = index.and_then(|ix| ix.resolve(table, row)) else {
        return StrategyOutcome::NoMatch;
    };
    StrategyOutcome::found(
        format!("{}={}", hit.field, hit.value),
        hit.code.clone(),
        ExtractionMethod::LookupTable,
    )
}

/// Concatenated reference, remarks and description columns.
///
/// Ranks as a reference-column hit whenever the sheet carries `REF NO`.
pub fn column_regex(table: &Table, row: &[String]) -> StrategyOutcome {
    let columns: Vec<&str> = [REF_NO, REMARKS, DESCRIPTION]
        .into_iter()
        .filter(|c| table.has_column(c))
        .collect();
    if columns.is_empty() {
        return StrategyOutcome::NoMatch;
    }

    let joined = columns
        .iter()
        .filter_map(|c| table.cell(row, c))
        .collect::<Vec<_>>()
        .join(" | ");
    let reference = columns.contains(&REF_NO);
    StrategyOutcome::scan(&joined, ExtractionMethod::ColumnRegex { reference })
}

/// Every cell of the row, joined and truncated.
pub fn row_scan(row: &[String], config: &ExtractConfig) -> StrategyOutcome {
    let joined = row
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join(" | ");
    let text: String = joined.chars().take(config.row_text_limit).collect();
    StrategyOutcome::scan(&text, ExtractionMethod::RowScan)
}

pub fn sheet_name(name: &str) -> StrategyOutcome {
    StrategyOutcome::scan(name, ExtractionMethod::SheetName)
}

pub fn file_name(stem: &str) -> StrategyOutcome {
    StrategyOutcome::scan(stem, ExtractionMethod::FileName)
}

/// Synthesize `HVDC-ADOPT-<vendor>-<digits>` from supplier and reference
/// columns. Needs a supplier; the last digit run of the reference is padded
/// to 4, and a missing reference gives `0000`.
pub fn business_rule(table: &Table, row: &[String], config: &ExtractConfig) -> StrategyOutcome {
    let Some((_, supplier)) = table.first_cell(row, &SUPPLIER_FIELDS) else {
        return StrategyOutcome::NoMatch;
    };
    let reference = table.first_cell(row, &REFERENCE_FIELDS).map(|(_, r)| r);

    let vendor = config.vendor_code(supplier);
    let digits = reference
        .and_then(|r| DIGITS_RX.find_iter(r).last())
        .map(|m| m.as_str())
        .unwrap_or("0");
    let generated = format!("HVDC-ADOPT-{vendor}-{digits:0>4}");
    let raw = match reference {
        Some(r) => format!("{supplier}|{r}"),
        None => supplier.to_string(),
    };

    match HvdcCode::parse(&generated) {
        Some(code) => StrategyOutcome::found(raw, code, ExtractionMethod::BusinessRule),
        None => StrategyOutcome::NoMatch,
    }
}
