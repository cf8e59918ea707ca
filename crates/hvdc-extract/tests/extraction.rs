//! End-to-end extraction over CSV and XLSX documents written to a temp dir.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use hvdc_core::{ExtractionMethod, HvdcCode};
use hvdc_extract::{merge, ExtractConfig, ExtractionStats, Extractor, LookupIndex};
use zip::write::SimpleFileOptions;

fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn path_str(p: &Path) -> String {
    p.to_string_lossy().into_owned()
}

fn extractor() -> Extractor {
    Extractor::new(ExtractConfig::default())
}

/// Minimal workbook: two sheets, the first using shared strings.
fn write_xlsx(path: &Path) {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

    let entries: [(&str, &str); 5] = [
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
          xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <sheets>
    <sheet name="Packing List" sheetId="1" r:id="rId1"/>
    <sheet name="HVDC-ADOPT-SCT-0009" sheetId="2" r:id="rId2"/>
  </sheets>
</workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
  <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
</Relationships>"#,
        ),
        (
            "xl/sharedStrings.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
  <si><t>Case No.</t></si>
  <si><t>Remarks</t></si>
  <si><t>HVDC-ADOPT-SCT-0001</t></si>
  <si><t>SCT 12 spare drums</t></si>
</sst>"#,
        ),
        (
            "xl/worksheets/sheet1.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>QTY</t></is></c></row>
    <row r="2"><c r="A2" t="s"><v>2</v></c><c r="C2"><v>4</v></c></row>
    <row r="3"><c r="B3" t="s"><v>3</v></c><c r="C3"><v>1</v></c></row>
  </sheetData>
</worksheet>"#,
        ),
        (
            "xl/worksheets/sheet2.xml",
            r#"<?xml version="1.0" encoding="UTF-8"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1"><c r="A1" t="inlineStr"><is><t>ITEM</t></is></c></row>
    <row r="2"><c r="A2" t="inlineStr"><is><t>cable drum</t></is></c></row>
  </sheetData>
</worksheet>"#,
        ),
    ];

    for (name, body) in entries {
        zip.start_file(name, opts).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    let cursor = zip.finish().unwrap();
    fs::write(path, cursor.into_inner()).unwrap();
}

#[test]
fn remarks_fragment_is_promoted_by_column_regex() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "OFCO.csv", "REMARKS,QTY\nSCT-0002 Cable System,3\n");

    let records = extractor().extract(&[path_str(&file)]).unwrap();
    let merged = merge(records);
    assert_eq!(merged.len(), 1);

    let r = &merged[0].record;
    assert_eq!(r.code.as_ref().unwrap().as_str(), "HVDC-ADOPT-SCT-0002");
    assert_eq!(r.method, ExtractionMethod::ColumnRegex { reference: false });
    assert_eq!(r.confidence, 0.85);
    assert_eq!(r.row, Some(0));
    assert_eq!(r.sheet.as_deref(), Some("OFCO"));
}

#[test]
fn same_code_in_two_files_stays_two_records() {
    let dir = tempfile::tempdir().unwrap();
    let a = write(dir.path(), "DSV.csv", "HVDC CODE\nHVDC-ADOPT-SCT-0001\n");
    let b = write(dir.path(), "DSV (1).csv", "HVDC CODE\nHVDC-ADOPT-SCT-0001\n");

    let records = extractor().extract(&[path_str(&a), path_str(&b)]).unwrap();
    let merged = merge(records);
    let headers: Vec<_> = merged
        .iter()
        .filter(|m| m.record.method == ExtractionMethod::HeaderDirect)
        .collect();
    assert_eq!(headers.len(), 2);
    assert_eq!(headers[0].record.source.logical_source, "DSV");
    assert_eq!(headers[1].record.source.logical_source, "DSV");
    assert_ne!(headers[0].record.source.path, headers[1].record.source.path);
}

#[test]
fn header_direct_wins_over_row_scan_at_same_row() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "PKGS.csv", "HVDC CODE,QTY\nHVDC-ADOPT-SCT-0003,1\n");

    let records = extractor().extract(&[path_str(&file)]).unwrap();
    let methods: Vec<_> = records.iter().map(|r| r.method).collect();
    assert!(methods.contains(&ExtractionMethod::HeaderDirect));
    assert!(methods.contains(&ExtractionMethod::RowScan));

    let merged = merge(records);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].record.method, ExtractionMethod::HeaderDirect);
    assert_eq!(merged[0].record.confidence, 0.95);
    assert_eq!(merged[0].duplicates, 1);
}

#[test]
fn unreadable_document_does_not_abort_batch() {
    let dir = tempfile::tempdir().unwrap();
    let bad = write(dir.path(), "broken.xlsx", "this is not a zip archive");
    let good = write(dir.path(), "good.csv", "HVDC CODE\nHVDC-ADOPT-SCT-0004\n");

    let records = extractor().extract(&[path_str(&bad), path_str(&good)]).unwrap();
    let errors: Vec<_> = records.iter().filter(|r| r.is_error()).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source.path, bad);
    assert_eq!(errors[0].confidence, 0.0);
    assert!(errors[0].error.is_some());
    assert!(records
        .iter()
        .any(|r| r.code.as_ref().map(HvdcCode::as_str) == Some("HVDC-ADOPT-SCT-0004")));

    let stats = ExtractionStats::from_records(&records);
    assert_eq!(stats.errors, 1);
    assert!(stats.success_rate < 1.0);
}

#[test]
fn xlsx_workbook_is_read_sheet_by_sheet() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("HVDC_PKGS.xlsx");
    write_xlsx(&file);

    let merged = merge(extractor().extract(&[path_str(&file)]).unwrap());

    let header = merged
        .iter()
        .find(|m| m.record.method == ExtractionMethod::HeaderDirect)
        .unwrap();
    assert_eq!(header.record.code.as_ref().unwrap().as_str(), "HVDC-ADOPT-SCT-0001");
    assert_eq!(header.record.sheet.as_deref(), Some("Packing List"));
    assert_eq!(header.record.row, Some(0));

    let remarks = merged
        .iter()
        .find(|m| m.record.row == Some(1) && m.record.sheet.as_deref() == Some("Packing List"))
        .unwrap();
    assert_eq!(remarks.record.code.as_ref().unwrap().as_str(), "HVDC-ADOPT-SCT-0012");
    assert_eq!(remarks.record.method, ExtractionMethod::ColumnRegex { reference: false });

    // The second sheet has no row hits, so its title is used.
    let titled = merged
        .iter()
        .find(|m| m.record.method == ExtractionMethod::SheetName)
        .unwrap();
    assert_eq!(titled.record.sheet.as_deref(), Some("HVDC-ADOPT-SCT-0009"));
    assert_eq!(titled.record.row, None);
    assert_eq!(titled.record.confidence, 0.60);
}

#[test]
fn large_sheet_skips_row_scan_and_falls_back_to_names() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(
        dir.path(),
        "HVDC_ADOPT_SCT_0042.csv",
        "ITEM,NOTE\n1,HVDC-ADOPT-SCT-0042 drum\n2,HVDC-ADOPT-SCT-0042 drum\n",
    );

    let scanned = extractor().extract(&[path_str(&file)]).unwrap();
    assert_eq!(scanned.len(), 2);
    assert!(scanned.iter().all(|r| r.method == ExtractionMethod::RowScan));

    let config = ExtractConfig {
        row_scan_limit: 1,
        ..Default::default()
    };
    let limited = Extractor::new(config).extract(&[path_str(&file)]).unwrap();
    assert_eq!(limited.len(), 1);
    assert_eq!(limited[0].method, ExtractionMethod::SheetName);
    assert_eq!(limited[0].row, None);
}

#[test]
fn file_stem_is_last_resort() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(dir.path(), "HVDC-ADOPT-HE-0077.csv", "");

    let records = extractor().extract(&[path_str(&file)]).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, ExtractionMethod::FileName);
    assert_eq!(records[0].confidence, 0.55);
    assert_eq!(records[0].code.as_ref().unwrap().as_str(), "HVDC-ADOPT-HE-0077");
}

#[test]
fn lookup_index_resolves_reference_numbers() {
    let dir = tempfile::tempdir().unwrap();
    let trusted = write(
        dir.path(),
        "PKGS_MASTER.csv",
        "HVDC CODE,PO NO\nHVDC-ADOPT-SCT-0005,PO-5501\n",
    );
    let invoice = write(dir.path(), "invoices.csv", "PO NO,AMOUNT\npo-5501,1200\n");

    let index = LookupIndex::from_document(&trusted).unwrap();
    assert_eq!(index.len(), 1);

    let records = extractor()
        .extract_with_lookup(&[path_str(&invoice)], &index)
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].method, ExtractionMethod::LookupTable);
    assert_eq!(records[0].confidence, 0.90);
    assert_eq!(records[0].raw, "PO NO=po-5501");

    let config = ExtractConfig {
        lookup_source: Some(trusted),
        ..Default::default()
    };
    let configured = Extractor::from_config(config).unwrap();
    assert_eq!(configured.extract(&[path_str(&invoice)]).unwrap(), records);
}

#[test]
fn business_rule_only_when_nothing_else_matches() {
    let dir = tempfile::tempdir().unwrap();
    let file = write(
        dir.path(),
        "vendor_invoices.csv",
        "SUPPLIER,REF NO,REMARKS\n\
         Hyundai Electric,INV-2024-318,transformer parts\n\
         Hyundai Electric,INV-2024-319,see SCT-0007\n",
    );

    let records = extractor().extract(&[path_str(&file)]).unwrap();
    let generated: Vec<_> = records
        .iter()
        .filter(|r| r.method == ExtractionMethod::BusinessRule)
        .collect();
    assert_eq!(generated.len(), 1);
    assert_eq!(generated[0].code.as_ref().unwrap().as_str(), "HVDC-ADOPT-HE-0318");
    assert_eq!(generated[0].row, Some(0));

    assert!(records
        .iter()
        .any(|r| r.row == Some(1) && r.method == ExtractionMethod::ColumnRegex { reference: true }));
}

#[test]
fn output_is_deterministic_and_sorted() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "b.csv", "HVDC CODE\nHVDC-ADOPT-SCT-0002\nHVDC-ADOPT-SCT-0001\n");
    write(dir.path(), "a.csv", "REMARKS\nSCT-0001\n");

    let first = extractor().extract(&[path_str(dir.path())]).unwrap();
    let second = extractor().extract(&[path_str(dir.path())]).unwrap();
    assert_eq!(first, second);

    let codes: Vec<_> = first
        .iter()
        .map(|r| r.code.as_ref().unwrap().as_str().to_string())
        .collect();
    let mut sorted = codes.clone();
    sorted.sort();
    assert_eq!(codes, sorted);
}
