//! Minimal XLSX reader: first worksheet only, every cell rendered as a string.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::input::InputError;

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const FALLBACK_SHEET_PART: &str = "xl/worksheets/sheet1.xml";
/// Column XFD, the widest sheet Excel writes.
pub const MAX_COLUMNS: usize = 16_384;
pub const MAX_ROWS: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FirstSheet {
    Sheet(Vec<Vec<String>>),
    /// Not a zip container, or a zip without a workbook part.
    NotSpreadsheet,
}

pub fn read_first_sheet(path: &Path) -> Result<FirstSheet, InputError> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    let mut filled = 0usize;
    while filled < magic.len() {
        let n = file.read(&mut magic[filled..])?;
        if n == 0 {
            return Ok(FirstSheet::NotSpreadsheet);
        }
        filled += n;
    }
    if &magic != ZIP_MAGIC {
        return Ok(FirstSheet::NotSpreadsheet);
    }
    file.rewind()?;

    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(ZipError::InvalidArchive(_)) | Err(ZipError::UnsupportedArchive(_)) => {
            return Ok(FirstSheet::NotSpreadsheet);
        }
        Err(e) => return Err(spreadsheet_error(path, e)),
    };

    let Some(workbook) = read_part(&mut archive, WORKBOOK_PART, path)? else {
        return Ok(FirstSheet::NotSpreadsheet);
    };
    let sheet_part = match first_sheet_rel_id(&workbook, path)? {
        Some(rel_id) => match read_part(&mut archive, WORKBOOK_RELS_PART, path)? {
            Some(rels) => resolve_relationship(&rels, &rel_id, path)?,
            None => None,
        },
        None => None,
    }
    .unwrap_or_else(|| FALLBACK_SHEET_PART.to_string());

    let shared = match read_part(&mut archive, SHARED_STRINGS_PART, path)? {
        Some(xml) => parse_shared_strings(&xml, path)?,
        None => Vec::new(),
    };
    let Some(sheet) = read_part(&mut archive, &sheet_part, path)? else {
        return Err(InputError::Spreadsheet {
            path: path.to_path_buf(),
            reason: format!("worksheet part {sheet_part} is missing"),
        });
    };

    Ok(FirstSheet::Sheet(parse_sheet(&sheet, &shared, path)?))
}

fn read_part<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    path: &Path,
) -> Result<Option<String>, InputError> {
    let mut entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(spreadsheet_error(path, e)),
    };
    let mut out = String::new();
    entry.read_to_string(&mut out)?;
    Ok(Some(out))
}

fn spreadsheet_error(path: &Path, err: impl std::fmt::Display) -> InputError {
    InputError::Spreadsheet {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}

fn attr_value(e: &BytesStart<'_>, local: &[u8], path: &Path) -> Result<Option<String>, InputError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| spreadsheet_error(path, err))?;
        if attr.key.local_name().as_ref() == local {
            let value = attr
                .unescape_value()
                .map_err(|err| spreadsheet_error(path, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn first_sheet_rel_id(xml: &str, path: &Path) -> Result<Option<String>, InputError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                return attr_value(&e, b"id", path);
            }
            Ok(Event::Eof) => return Ok(None),
            Err(err) => return Err(spreadsheet_error(path, err)),
            _ => {}
        }
    }
}

fn resolve_relationship(
    xml: &str,
    rel_id: &str,
    path: &Path,
) -> Result<Option<String>, InputError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if attr_value(&e, b"Id", path)?.as_deref() != Some(rel_id) {
                    continue;
                }
                let Some(target) = attr_value(&e, b"Target", path)? else {
                    return Ok(None);
                };
                let part = match target.strip_prefix('/') {
                    Some(absolute) => absolute.to_string(),
                    None => format!("xl/{target}"),
                };
                return Ok(Some(part));
            }
            Ok(Event::Eof) => return Ok(None),
            Err(err) => return Err(spreadsheet_error(path, err)),
            _ => {}
        }
    }
}

fn parse_shared_strings(xml: &str, path: &Path) -> Result<Vec<String>, InputError> {
    let mut reader = Reader::from_str(xml);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    // Phonetic runs carry their own <t> elements that are not part of the value.
    let mut phonetic_depth = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"rPh" => phonetic_depth += 1,
                b"t" if phonetic_depth == 0 => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"si" => out.push(String::new()),
            Ok(Event::Text(t)) if in_text => {
                let text = t.unescape().map_err(|err| spreadsheet_error(path, err))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"si" => out.push(std::mem::take(&mut current)),
                b"rPh" => phonetic_depth = phonetic_depth.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(spreadsheet_error(path, err)),
            _ => {}
        }
    }
    Ok(out)
}

#[derive(Debug, Default)]
struct PendingCell {
    col: usize,
    cell_type: Option<String>,
    value: String,
}

/// Rows come back ragged: trailing empty cells are not materialized.
fn parse_sheet(xml: &str, shared: &[String], path: &Path) -> Result<Vec<Vec<String>>, InputError> {
    let mut reader = Reader::from_str(xml);
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    pad_to_row(&mut rows, row_number(&e, path)?, path)?;
                    row = Some(Vec::new());
                }
                b"c" => {
                    let next_col = row.as_ref().map(Vec::len).unwrap_or(0);
                    cell = Some(PendingCell {
                        col: cell_column(&e, path)?.unwrap_or(next_col),
                        cell_type: attr_value(&e, b"t", path)?,
                        value: String::new(),
                    });
                }
                b"v" | b"t" if cell.is_some() => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => {
                    pad_to_row(&mut rows, row_number(&e, path)?, path)?;
                    rows.push(Vec::new());
                }
                b"c" => {
                    if let Some(current) = row.as_mut() {
                        let next_col = current.len();
                        let col = cell_column(&e, path)?.unwrap_or(next_col);
                        place_cell(current, col, String::new(), path)?;
                    }
                }
                _ => {}
            },
            Ok(Event::Text(t)) if in_value => {
                let text = t.unescape().map_err(|err| spreadsheet_error(path, err))?;
                if let Some(pending) = cell.as_mut() {
                    pending.value.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    if let (Some(pending), Some(current)) = (cell.take(), row.as_mut()) {
                        let col = pending.col;
                        let value = render_cell(pending, shared, path)?;
                        place_cell(current, col, value, path)?;
                    }
                }
                b"row" => {
                    if let Some(done) = row.take() {
                        rows.push(done);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(err) => return Err(spreadsheet_error(path, err)),
            _ => {}
        }
    }

    let leading = rows
        .iter()
        .take_while(|r| r.iter().all(String::is_empty))
        .count();
    rows.drain(..leading);
    Ok(rows)
}

fn render_cell(cell: PendingCell, shared: &[String], path: &Path) -> Result<String, InputError> {
    match cell.cell_type.as_deref() {
        Some("s") => {
            let Ok(idx) = cell.value.trim().parse::<usize>() else {
                let reason = format!("invalid shared string index '{}'", cell.value);
                return Err(spreadsheet_error(path, reason));
            };
            let Some(value) = shared.get(idx) else {
                let reason = format!("shared string index {idx} out of range");
                return Err(spreadsheet_error(path, reason));
            };
            Ok(value.clone())
        }
        Some("b") => Ok(if cell.value.trim() == "1" {
            "TRUE".to_string()
        } else {
            "FALSE".to_string()
        }),
        _ => Ok(cell.value),
    }
}

fn place_cell(
    row: &mut Vec<String>,
    col: usize,
    value: String,
    path: &Path,
) -> Result<(), InputError> {
    if col >= MAX_COLUMNS {
        return Err(spreadsheet_error(
            path,
            format!("cell in column {} is beyond column XFD", col + 1),
        ));
    }
    if row.len() <= col {
        row.resize(col + 1, String::new());
    }
    row[col] = value;
    Ok(())
}

/// Inserts empty rows for row numbers skipped by a sparse sheet.
fn pad_to_row(
    rows: &mut Vec<Vec<String>>,
    number: Option<usize>,
    path: &Path,
) -> Result<(), InputError> {
    if rows.len() >= MAX_ROWS {
        let reason = format!("sheet has more than {MAX_ROWS} rows");
        return Err(spreadsheet_error(path, reason));
    }
    if let Some(number) = number {
        while rows.len() + 1 < number {
            rows.push(Vec::new());
        }
    }
    Ok(())
}

fn row_number(e: &BytesStart<'_>, path: &Path) -> Result<Option<usize>, InputError> {
    let Some(r) = attr_value(e, b"r", path)? else {
        return Ok(None);
    };
    let r = r.trim();
    if r.is_empty() || !r.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match r.parse::<usize>() {
        Ok(n) if (1..=MAX_ROWS).contains(&n) => Ok(Some(n)),
        _ => {
            let reason = format!("row number {r} is outside 1..={MAX_ROWS}");
            Err(spreadsheet_error(path, reason))
        }
    }
}

fn cell_column(e: &BytesStart<'_>, path: &Path) -> Result<Option<usize>, InputError> {
    let Some(cell_ref) = attr_value(e, b"r", path)? else {
        return Ok(None);
    };
    if !cell_ref.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Ok(None);
    }
    match column_index(&cell_ref) {
        Some(col) => Ok(Some(col)),
        None => Err(spreadsheet_error(
            path,
            format!("cell reference '{cell_ref}' is beyond column XFD"),
        )),
    }
}

/// `"A1"` -> 0, `"AB12"` -> 27. `None` without column letters or past column XFD.
pub fn column_index(cell_ref: &str) -> Option<usize> {
    let mut col = 0usize;
    for ch in cell_ref.chars().take_while(char::is_ascii_alphabetic) {
        let digit = ch.to_ascii_uppercase() as usize - 'A' as usize + 1;
        col = col.checked_mul(26)?.checked_add(digit)?;
        if col > MAX_COLUMNS {
            return None;
        }
    }
    col.checked_sub(1)
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/xlsx.rs"]
pub(crate) mod tests;
