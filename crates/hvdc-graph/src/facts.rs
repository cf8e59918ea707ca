//! Render merged extraction records as Turtle facts.

use std::collections::BTreeSet;
use std::fmt::Write;

use uuid::Uuid;

use hvdc_core::{HvdcCode, MergedRecord};

/// Builds the Turtle payload uploaded to the staging graph.
///
/// One `ex:Case` per distinct code and one `ex:CargoItem` per record,
/// linked by `ex:belongsToCase`. Item IRIs are UUIDv5 over the record's
/// location, so rebuilding from the same records yields the same document.
#[derive(Debug, Clone)]
pub struct FactBuilder {
    namespace: String,
}

impl FactBuilder {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn case_iri(&self, code: &HvdcCode) -> String {
        format!("{}Case_{}", self.namespace, code)
    }

    fn item_iri(&self, record: &MergedRecord, code: &HvdcCode) -> String {
        let r = &record.record;
        let key = format!(
            "{}|{}|{}|{}",
            source_path(r.source.path.to_string_lossy().as_ref()),
            r.sheet.as_deref().unwrap_or(""),
            r.row.map(|n| n.to_string()).unwrap_or_default(),
            code
        );
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes());
        format!("{}CargoItem_{}", self.namespace, id)
    }

    /// Render records to Turtle. Error records carry no code and are skipped.
    pub fn build(&self, records: &[MergedRecord]) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "@prefix ex: <{}> .", self.namespace);
        let _ = writeln!(out, "@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .");
        let _ = writeln!(out, "@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .");

        let codes: BTreeSet<&HvdcCode> = records
            .iter()
            .filter_map(|m| m.record.code.as_ref())
            .collect();

        for code in &codes {
            let lit = escape_literal(code.as_str());
            let _ = write!(
                out,
                "\n<{}> a ex:Case ;\n    ex:hvdcCode \"{lit}\" ;\n    rdfs:label \"{lit}\" .\n",
                self.case_iri(code)
            );
        }

        for merged in records {
            let Some(code) = merged.record.code.as_ref() else {
                continue;
            };
            let r = &merged.record;
            let path = source_path(r.source.path.to_string_lossy().as_ref());

            let _ = write!(
                out,
                "\n<{}> a ex:CargoItem ;\n    ex:belongsToCase <{}> ;\n    ex:sourceFile \"{}\" ;\n    ex:logicalSource \"{}\" ;\n",
                self.item_iri(merged, code),
                self.case_iri(code),
                escape_literal(&path),
                escape_literal(&r.source.logical_source),
            );
            if let Some(sheet) = &r.sheet {
                let _ = writeln!(out, "    ex:sheetName \"{}\" ;", escape_literal(sheet));
            }
            if let Some(row) = r.row {
                let _ = writeln!(out, "    ex:rowIndex \"{row}\"^^xsd:integer ;");
            }
            let _ = write!(
                out,
                "    ex:extractionMethod \"{}\" ;\n    ex:rawValue \"{}\" ;\n    ex:confidence \"{:.2}\"^^xsd:decimal .\n",
                r.method.as_str(),
                escape_literal(&r.raw),
                r.confidence
            );
        }

        out
    }
}

/// Source paths use `/` regardless of platform.
fn source_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// Escape a string for a double-quoted Turtle literal.
pub fn escape_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turtle::{parse, Term, RDF_TYPE};
    use hvdc_core::{CandidateRecord, ExtractionMethod, SourceDocument};

    const NS: &str = "http://samsung.com/project-logistics#";

    fn merged(code: &str, path: &str, row: usize, raw: &str) -> MergedRecord {
        MergedRecord {
            record: CandidateRecord::new(
                raw,
                HvdcCode::parse(code).unwrap(),
                ExtractionMethod::HeaderDirect,
                SourceDocument::new(path),
                Some("Sheet1".into()),
                Some(row),
            ),
            duplicates: 0,
        }
    }

    #[test]
    fn builds_parseable_facts() {
        let records = vec![
            merged("HVDC-ADOPT-SCT-0001", r"data\HVDC_DSV.xlsx", 0, "HVDC-ADOPT-SCT-0001"),
            merged("HVDC-ADOPT-SCT-0001", r"data\HVDC_DSV.xlsx", 1, "say \"x\"\n"),
            merged("HVDC-ADOPT-SCT-0002", "data/other.xlsx", 0, "SCT-0002"),
            MergedRecord {
                record: CandidateRecord::error(SourceDocument::new("bad.xlsx"), "boom"),
                duplicates: 0,
            },
        ];
        let ttl = FactBuilder::new(NS).build(&records);
        assert!(ttl.contains("\"data/HVDC_DSV.xlsx\""));
        assert!(!ttl.contains(r"data\HVDC"));

        let triples = parse(&ttl).unwrap();
        let rdf_type = Term::iri(RDF_TYPE);
        let count_type = |class: &str| {
            triples
                .iter()
                .filter(|t| t.predicate == rdf_type && t.object == Term::iri(format!("{NS}{class}")))
                .count()
        };
        assert_eq!(count_type("Case"), 2);
        assert_eq!(count_type("CargoItem"), 3);

        let raw = Term::iri(format!("{NS}rawValue"));
        assert!(triples
            .iter()
            .any(|t| t.predicate == raw && t.object.literal_value() == Some("say \"x\"\n")));
    }

    #[test]
    fn output_is_deterministic() {
        let records = vec![merged("HVDC-ADOPT-SCT-0001", "a.xlsx", 3, "x")];
        let b = FactBuilder::new(NS);
        assert_eq!(b.build(&records), b.build(&records));
    }

    #[test]
    fn empty_input_yields_prefixes_only() {
        let ttl = FactBuilder::new(NS).build(&[]);
        assert!(parse(&ttl).unwrap().is_empty());
    }
}
