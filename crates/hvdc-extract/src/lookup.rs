//! Reference-number → code index built from a trusted document.

use std::collections::HashMap;
use std::path::Path;

use hvdc_core::{normalize_code, HvdcCode};

use crate::error::Result;
use crate::headers::{Table, HVDC_CODE};
use crate::workbook::read_workbook;

/// Reference columns consulted, in order.
pub const KEY_FIELDS: [&str; 6] = [
    "PO NO",
    "PO NUMBER",
    "INVOICE NO",
    "INV NO",
    "PACKAGE NO",
    "PKG NO",
];

/// Maps PO, invoice and package numbers to codes.
///
/// Built once per extraction run and never persisted.
#[derive(Debug, Clone, Default)]
pub struct LookupIndex {
    entries: HashMap<String, HvdcCode>,
}

/// A reference value that resolved through the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupHit<'a> {
    pub field: &'static str,
    pub value: &'a str,
    pub code: &'a HvdcCode,
}

impl LookupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every sheet of the document at `path`.
    pub fn from_document(path: &Path) -> Result<Self> {
        let workbook = read_workbook(path)?;
        let mut index = Self::new();
        for sheet in workbook.sheets {
            if let Some(table) = Table::from_rows(sheet.rows) {
                index.add_table(&table);
            }
        }
        tracing::info!(path = %path.display(), keys = index.len(), "Built lookup index");
        Ok(index)
    }

    pub fn from_pairs<K: AsRef<str>>(pairs: impl IntoIterator<Item = (K, HvdcCode)>) -> Self {
        let mut index = Self::new();
        for (key, code) in pairs {
            index.insert(key.as_ref(), code);
        }
        index
    }

    /// Index rows carrying both a code and at least one reference column.
    pub fn add_table(&mut self, table: &Table) {
        for row in &table.rows {
            let Some(code) = table.cell(row, HVDC_CODE).and_then(normalize_code) else {
                continue;
            };
            for field in KEY_FIELDS {
                if let Some(value) = table.cell(row, field) {
                    self.insert(value, code.clone());
                }
            }
        }
    }

    fn insert(&mut self, key: &str, code: HvdcCode) {
        let key = normalize_key(key);
        if !key.is_empty() {
            self.entries.insert(key, code);
        }
    }

    pub fn get(&self, reference: &str) -> Option<&HvdcCode> {
        self.entries.get(&normalize_key(reference))
    }

    /// Resolve a data row through its reference columns.
    pub fn resolve<'a>(&'a self, table: &Table, row: &'a [String]) -> Option<LookupHit<'a>> {
        KEY_FIELDS.iter().find_map(|field| {
            let value = table.cell(row, field)?;
            let code = self.get(value)?;
            Some(LookupHit {
                field: *field,
                value,
                code,
            })
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_index_from_table() {
        let table = Table::from_rows(vec![
            row(&["HVDC CODE", "PO NO", "INV NO"]),
            row(&["HVDC-ADOPT-SCT-0001", "po-100", "INV-9"]),
            row(&["", "PO-200", ""]),
            row(&["sct 2", "", "INV-10"]),
        ])
        .unwrap();

        let mut index = LookupIndex::new();
        index.add_table(&table);
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(" PO-100 ").unwrap().as_str(), "HVDC-ADOPT-SCT-0001");
        assert_eq!(index.get("inv-10").unwrap().as_str(), "HVDC-ADOPT-SCT-0002");
        assert!(index.get("PO-200").is_none());
    }

    #[test]
    fn test_resolve_walks_key_fields_in_order() {
        let index = LookupIndex::from_pairs([
            ("INV-7", HvdcCode::parse("HVDC-ADOPT-SCT-0007").unwrap()),
            ("PKG-1", HvdcCode::parse("HVDC-ADOPT-SCT-0009").unwrap()),
        ]);
        let table = Table::from_rows(vec![
            row(&["PKG NO", "INVOICE NO", "PO NO"]),
            row(&["PKG-1", "INV-7", "PO-unknown"]),
        ])
        .unwrap();

        let hit = index.resolve(&table, &table.rows[0]).unwrap();
        assert_eq!(hit.field, "INVOICE NO");
        assert_eq!(hit.value, "INV-7");
        assert_eq!(hit.code.as_str(), "HVDC-ADOPT-SCT-0007");
    }
}
