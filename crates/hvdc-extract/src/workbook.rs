//! Spreadsheet reading: `.xlsx`/`.xlsm` via zip + quick-xml, `.csv` via csv.
//!
//! Every sheet is flattened into rows of cell strings. Empty cells are empty
//! strings; row and column positions follow the cell references in the
//! sheet XML so sparse sheets keep their layout. Each row ends at its own
//! last non-empty cell.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;

use crate::error::{ExtractError, Result};

/// Per-entry decompression bound.
const MAX_ENTRY_BYTES: u64 = 256 * 1024 * 1024;

/// Worksheet limits (column XFD, row 1048576).
const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

/// One named sheet of cell text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// All sheets of a document, in workbook order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

/// Read a spreadsheet file, dispatching on its extension.
pub fn read_workbook(path: &Path) -> Result<Workbook> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xlsx" | "xlsm" => {
            let bytes = fs::read(path)?;
            read_xlsx(&bytes)
        }
        "csv" => read_csv(path),
        _ => Err(ExtractError::Unsupported(path.to_path_buf())),
    }
}

// ── CSV ──────────────────────────────────────────────────────────

/// A CSV file is a single sheet named after the file stem.
fn read_csv(path: &Path) -> Result<Workbook> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Workbook {
        sheets: vec![Sheet { name, rows }],
    })
}

// ── XLSX ─────────────────────────────────────────────────────────

/// Parse an OOXML workbook held in memory.
pub fn read_xlsx(bytes: &[u8]) -> Result<Workbook> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let workbook_xml = read_entry(&mut archive, "xl/workbook.xml")?
        .ok_or_else(|| ExtractError::Workbook("xl/workbook.xml not found".to_string()))?;
    let sheet_refs = parse_sheet_refs(&workbook_xml)?;

    let rels = match read_entry(&mut archive, "xl/_rels/workbook.xml.rels")? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };
    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut sheets = Vec::with_capacity(sheet_refs.len());
    for (position, sheet_ref) in sheet_refs.into_iter().enumerate() {
        let entry = rels
            .get(&sheet_ref.rel_id)
            .map(|target| resolve_target(target))
            .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", position + 1));

        let Some(xml) = read_entry(&mut archive, &entry)? else {
            tracing::warn!(sheet = %sheet_ref.name, entry = %entry, "Worksheet entry missing");
            continue;
        };
        let rows = parse_sheet(&xml, &shared)?;
        sheets.push(Sheet {
            name: sheet_ref.name,
            rows,
        });
    }

    Ok(Workbook { sheets })
}

fn read_entry(archive: &mut Archive<'_>, name: &str) -> Result<Option<Vec<u8>>> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let mut out = Vec::new();
    entry.take(MAX_ENTRY_BYTES).read_to_end(&mut out)?;
    if out.len() as u64 >= MAX_ENTRY_BYTES {
        return Err(ExtractError::Workbook(format!(
            "{name} exceeds size limit ({MAX_ENTRY_BYTES} bytes)"
        )));
    }
    Ok(Some(out))
}

/// Relationship targets are relative to `xl/` unless absolute.
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{target}"),
    }
}

#[derive(Debug)]
struct SheetRef {
    name: String,
    rel_id: String,
}

fn parse_sheet_refs(xml: &[u8]) -> Result<Vec<SheetRef>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut out = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(&e, b"name")?.unwrap_or_default();
                let rel_id = attr(&e, b"id")?.unwrap_or_default();
                out.push(SheetRef { name, rel_id });
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

/// `<Relationships>` root of `workbook.xml.rels`.
#[derive(Debug, Deserialize)]
struct Relationships {
    #[serde(rename = "Relationship", default)]
    items: Vec<Relationship>,
}

#[derive(Debug, Deserialize)]
struct Relationship {
    #[serde(rename = "@Id")]
    id: String,
    #[serde(rename = "@Target")]
    target: String,
}

fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>> {
    let text = String::from_utf8_lossy(xml);
    let rels: Relationships = quick_xml::de::from_str(&text)?;
    Ok(rels.items.into_iter().map(|r| (r.id, r.target)).collect())
}

/// Shared strings, one entry per `<si>`. Rich-text runs are concatenated.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"t" if in_si => in_t = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(te) if in_t => current.push_str(&te.unescape()?),
            Event::CData(cd) if in_t => current.push_str(&String::from_utf8_lossy(&cd)),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => {
                    in_si = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Cell under construction while walking `<c>` children.
#[derive(Default)]
struct CellState {
    col: usize,
    kind: Option<String>,
    text: String,
    capture: bool,
}

impl CellState {
    fn value(self, shared: &[String]) -> String {
        match self.kind.as_deref() {
            Some("s") => self
                .text
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared.get(i).cloned())
                .unwrap_or_default(),
            Some("b") => match self.text.trim() {
                "1" => "TRUE".to_string(),
                _ => "FALSE".to_string(),
            },
            _ => self.text,
        }
    }
}

/// Worksheet XML into row-major cell text.
fn parse_sheet(xml: &[u8], shared: &[String]) -> Result<Vec<Vec<String>>> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut cells: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();

    let mut row = 0usize;
    let mut next_row = 0usize;
    let mut next_col = 0usize;
    let mut cell: Option<CellState> = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = row_index(&e)?.unwrap_or(next_row);
                    next_row = row + 1;
                    next_col = 0;
                }
                b"c" => {
                    let col = cell_column(&e)?.unwrap_or(next_col);
                    next_col = col + 1;
                    cell = Some(CellState {
                        col,
                        kind: attr(&e, b"t")?,
                        ..Default::default()
                    });
                }
                // `<v>` for stored values, `<is><t>` for inline strings.
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.capture = true;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = row_index(&e)?.unwrap_or(next_row);
                    next_row = row + 1;
                }
                b"c" => {
                    let col = cell_column(&e)?.unwrap_or(next_col);
                    next_col = col + 1;
                }
                _ => {}
            },
            Event::Text(te) => {
                if let Some(c) = cell.as_mut().filter(|c| c.capture) {
                    c.text.push_str(&te.unescape()?);
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.capture = false;
                    }
                }
                b"c" => {
                    if let Some(c) = cell.take() {
                        let col = c.col;
                        let value = c.value(shared);
                        if row >= MAX_ROWS || col >= MAX_COLUMNS {
                            return Err(ExtractError::Workbook(format!(
                                "cell at row {} column {} is outside the worksheet",
                                row + 1,
                                col + 1
                            )));
                        }
                        if !value.is_empty() {
                            cells.entry(row).or_default().insert(col, value);
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(densify(cells))
}

fn densify(cells: BTreeMap<usize, BTreeMap<usize, String>>) -> Vec<Vec<String>> {
    let Some(&last_row) = cells.keys().next_back() else {
        return Vec::new();
    };

    let mut grid = vec![Vec::new(); last_row + 1];
    for (r, cols) in cells {
        let width = cols.keys().next_back().map_or(0, |c| c + 1);
        let mut row = vec![String::new(); width];
        for (c, value) in cols {
            row[c] = value;
        }
        grid[r] = row;
    }
    grid
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>> {
    for a in e.attributes() {
        let a = a.map_err(|err| ExtractError::Xml(err.to_string()))?;
        if a.key.local_name().as_ref() == local {
            return Ok(Some(a.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Zero-based row index from `<row r="12">`.
fn row_index(e: &BytesStart<'_>) -> Result<Option<usize>> {
    let Some(r) = attr(e, b"r")? else {
        return Ok(None);
    };
    match r.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_ROWS).contains(&n) => Ok(Some(n - 1)),
        _ => Err(ExtractError::Workbook(format!("invalid row reference {r:?}"))),
    }
}

/// Zero-based column index from the letters of `<c r="AB12">`.
fn cell_column(e: &BytesStart<'_>) -> Result<Option<usize>> {
    match attr(e, b"r")? {
        Some(r) => column_index(&r),
        None => Ok(None),
    }
}

/// `A` → 0, `Z` → 25, `AA` → 26. `None` when the reference has no column
/// letters; an error past column XFD.
pub fn column_index(reference: &str) -> Result<Option<usize>> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .map(|b| b.to_ascii_uppercase())
        .collect();
    if letters.is_empty() {
        return Ok(None);
    }
    letters
        .iter()
        .try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?.checked_add(usize::from(b - b'A') + 1)
        })
        .filter(|n| *n <= MAX_COLUMNS)
        .map(|n| Some(n - 1))
        .ok_or_else(|| ExtractError::Workbook(format!("column of {reference:?} is past XFD")))
}
