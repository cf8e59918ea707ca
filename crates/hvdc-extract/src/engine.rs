//! The extraction engine: runs every strategy over every sheet of every
//! document and ranks the resulting candidates.

use std::path::{Path, PathBuf};

use hvdc_core::{CandidateRecord, MergedRecord, SourceDocument};

use crate::config::ExtractConfig;
use crate::error::Result;
use crate::headers::Table;
use crate::lookup::LookupIndex;
use crate::sources::resolve_sources;
use crate::strategies::{self, Hit, StrategyOutcome};
use crate::workbook::{read_workbook, Sheet, Workbook};

pub struct Extractor {
    config: ExtractConfig,
    lookup: Option<LookupIndex>,
}

impl Extractor {
    pub fn new(config: ExtractConfig) -> Self {
        Self {
            config,
            lookup: None,
        }
    }

    /// Build an extractor, loading the lookup index from
    /// `config.lookup_source` when one is configured.
    pub fn from_config(config: ExtractConfig) -> Result<Self> {
        let lookup = match &config.lookup_source {
            Some(path) => Some(LookupIndex::from_document(path)?),
            None => None,
        };
        Ok(Self { config, lookup })
    }

    pub fn with_lookup(mut self, index: LookupIndex) -> Self {
        self.lookup = Some(index);
        self
    }

    pub fn config(&self) -> &ExtractConfig {
        &self.config
    }

    /// Resolve `inputs` and extract from every document.
    ///
    /// The result is sorted in ranking order (code, logical source, file,
    /// sheet, row, priority desc, confidence desc). A document that fails
    /// to open contributes a single error record.
    pub fn extract<S: AsRef<str>>(&self, inputs: &[S]) -> Result<Vec<CandidateRecord>> {
        self.run(inputs, self.lookup.as_ref())
    }

    /// As [`Extractor::extract`], consulting `index` instead of the
    /// configured lookup index.
    pub fn extract_with_lookup<S: AsRef<str>>(
        &self,
        inputs: &[S],
        index: &LookupIndex,
    ) -> Result<Vec<CandidateRecord>> {
        self.run(inputs, Some(index))
    }

    fn run<S: AsRef<str>>(&self, inputs: &[S], index: Option<&LookupIndex>) -> Result<Vec<CandidateRecord>> {
        let paths = resolve_sources(inputs, &self.config)?;
        Ok(self.documents(&paths, index))
    }

    /// Extract from already-resolved document paths, in ranking order.
    pub fn extract_paths(&self, paths: &[PathBuf]) -> Vec<CandidateRecord> {
        self.documents(paths, self.lookup.as_ref())
    }

    fn documents(&self, paths: &[PathBuf], index: Option<&LookupIndex>) -> Vec<CandidateRecord> {
        let mut records: Vec<CandidateRecord> = paths
            .iter()
            .flat_map(|path| self.document(path, index))
            .collect();
        records.sort_by(CandidateRecord::ranking_cmp);

        tracing::info!(
            documents = paths.len(),
            records = records.len(),
            errors = records.iter().filter(|r| r.is_error()).count(),
            "Extraction complete"
        );
        records
    }

    /// Extract from a single document. Never fails: open or parse errors
    /// come back as one error record.
    pub fn extract_document(&self, path: &Path) -> Vec<CandidateRecord> {
        self.document(path, self.lookup.as_ref())
    }

    fn document(&self, path: &Path, index: Option<&LookupIndex>) -> Vec<CandidateRecord> {
        let doc = SourceDocument::new(path);
        match read_workbook(path) {
            Ok(workbook) => self.workbook(&doc, &workbook, index),
            Err(e) => {
                let err = e.for_document(path);
                tracing::error!(path = %path.display(), error = %err, "Failed to read document");
                vec![CandidateRecord::error(doc, err.to_string())]
            }
        }
    }

    fn workbook(&self, doc: &SourceDocument, workbook: &Workbook, index: Option<&LookupIndex>) -> Vec<CandidateRecord> {
        let mut out = Vec::new();
        for sheet in &workbook.sheets {
            out.extend(self.sheet(doc, sheet, index));
        }

        if out.is_empty() {
            let stem = doc.file_stem();
            if let Some(hit) = strategies::file_name(&stem).into_hit() {
                let sheet = workbook.sheets.first().map(|s| s.name.clone());
                out.push(place(hit, doc, sheet, None));
            }
        }
        out
    }

    fn sheet(&self, doc: &SourceDocument, sheet: &Sheet, index: Option<&LookupIndex>) -> Vec<CandidateRecord> {
        let Some(table) = Table::from_rows(sheet.rows.clone()) else {
            tracing::warn!(path = %doc.path.display(), sheet = %sheet.name, "Skipping empty sheet");
            return Vec::new();
        };

        let scan_rows = table.rows.len() <= self.config.row_scan_limit;
        if !scan_rows {
            tracing::warn!(
                path = %doc.path.display(),
                sheet = %sheet.name,
                rows = table.rows.len(),
                limit = self.config.row_scan_limit,
                "Sheet exceeds row-scan limit, skipping row scan"
            );
        }

        let mut out = Vec::new();
        for (i, row) in table.rows.iter().enumerate() {
            let mut outcomes = vec![
                strategies::header_direct(&table, row),
                strategies::lookup_table(index, &table, row),
                strategies::column_regex(&table, row),
            ];
            if scan_rows {
                outcomes.push(strategies::row_scan(row, &self.config));
            }
            if !outcomes.iter().any(StrategyOutcome::is_hit) {
                outcomes.push(strategies::business_rule(&table, row, &self.config));
            }

            out.extend(
                outcomes
                    .into_iter()
                    .filter_map(StrategyOutcome::into_hit)
                    .map(|hit| place(hit, doc, Some(sheet.name.clone()), Some(i))),
            );
        }

        if out.is_empty() {
            if let Some(hit) = strategies::sheet_name(&sheet.name).into_hit() {
                out.push(place(hit, doc, Some(sheet.name.clone()), None));
            }
        }

        tracing::debug!(
            path = %doc.path.display(),
            sheet = %sheet.name,
            rows = table.rows.len(),
            hits = out.len(),
            "Sheet processed"
        );
        out
    }
}

fn place(hit: Hit, doc: &SourceDocument, sheet: Option<String>, row: Option<usize>) -> CandidateRecord {
    CandidateRecord::new(hit.raw, hit.code, hit.method, doc.clone(), sheet, row)
}

/// Collapse duplicate hits at the same (code, file, sheet, row), keeping
/// the highest priority then highest confidence. Distinct locations are
/// never merged.
pub fn merge(mut records: Vec<CandidateRecord>) -> Vec<MergedRecord> {
    records.sort_by(CandidateRecord::ranking_cmp);

    let mut out: Vec<MergedRecord> = Vec::with_capacity(records.len());
    for record in records {
        match out.last_mut() {
            Some(last) if last.record.same_location(&record) => last.duplicates += 1,
            _ => out.push(MergedRecord {
                record,
                duplicates: 0,
            }),
        }
    }
    out
}

/// Paths of the documents that produced error records.
pub fn failed_documents(records: &[CandidateRecord]) -> Vec<PathBuf> {
    records
        .iter()
        .filter(|r| r.is_error())
        .map(|r| r.source.path.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hvdc_core::{ExtractionMethod, HvdcCode};

    fn record(code: &str, path: &str, row: usize, method: ExtractionMethod) -> CandidateRecord {
        CandidateRecord::new(
            code,
            HvdcCode::parse(code).unwrap(),
            method,
            SourceDocument::new(path),
            Some("Sheet1".into()),
            Some(row),
        )
    }

    #[test]
    fn test_merge_keeps_highest_priority_regardless_of_order() {
        let scan = record("HVDC-ADOPT-SCT-0001", "a.xlsx", 0, ExtractionMethod::RowScan);
        let header = record("HVDC-ADOPT-SCT-0001", "a.xlsx", 0, ExtractionMethod::HeaderDirect);

        for input in [vec![scan.clone(), header.clone()], vec![header.clone(), scan.clone()]] {
            let merged = merge(input);
            assert_eq!(merged.len(), 1);
            assert_eq!(merged[0].record.method, ExtractionMethod::HeaderDirect);
            assert_eq!(merged[0].duplicates, 1);
        }
    }

    #[test]
    fn test_merge_keeps_distinct_locations() {
        let merged = merge(vec![
            record("HVDC-ADOPT-SCT-0001", "a.xlsx", 0, ExtractionMethod::RowScan),
            record("HVDC-ADOPT-SCT-0001", "b.xlsx", 0, ExtractionMethod::RowScan),
            record("HVDC-ADOPT-SCT-0001", "a.xlsx", 1, ExtractionMethod::RowScan),
            record("HVDC-ADOPT-SCT-0002", "a.xlsx", 0, ExtractionMethod::RowScan),
        ]);
        assert_eq!(merged.len(), 4);
        assert!(merged.iter().all(|m| m.duplicates == 0));
    }

    #[test]
    fn test_merge_ties_break_on_confidence() {
        let mut low = record("HVDC-ADOPT-SCT-0001", "a.xlsx", 0, ExtractionMethod::LookupTable);
        low.confidence = 0.5;
        let high = record("HVDC-ADOPT-SCT-0001", "a.xlsx", 0, ExtractionMethod::LookupTable);
        let merged = merge(vec![low, high]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].record.confidence, 0.90);
    }

    #[test]
    fn test_missing_document_is_error_record() {
        let extractor = Extractor::new(ExtractConfig::default());
        let records = extractor.extract_document(Path::new("/nonexistent/HVDC_DSV.xlsx"));
        assert_eq!(records.len(), 1);
        assert!(records[0].is_error());
        assert_eq!(records[0].confidence, 0.0);
        assert!(records[0].error.as_deref().unwrap().contains("HVDC_DSV.xlsx"));
        assert_eq!(failed_documents(&records), vec![PathBuf::from("/nonexistent/HVDC_DSV.xlsx")]);
    }
}
