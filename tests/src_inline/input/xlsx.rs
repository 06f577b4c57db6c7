use super::*;
use std::io::Write;

use zip::CompressionMethod;
use zip::write::{FileOptions, ZipWriter};

use crate::input::ColumnKind;
use crate::input::table::parse_table;

const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets><sheet name="Counts" sheetId="1" r:id="rId7"/></sheets>
</workbook>"#;

const RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/counts.xml"/>
</Relationships>"#;

/// Writes a one-sheet workbook built from inline-string and numeric cells.
pub(crate) fn write_test_xlsx(path: &Path, rows: &[&[&str]]) {
    let mut sheet = String::from(
        r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>"#,
    );
    for (r, row) in rows.iter().enumerate() {
        sheet.push_str(&format!("<row r=\"{}\">", r + 1));
        for (c, value) in row.iter().enumerate() {
            let cell_ref = format!("{}{}", (b'A' + c as u8) as char, r + 1);
            if value.parse::<f64>().is_ok() {
                sheet.push_str(&format!("<c r=\"{cell_ref}\"><v>{value}</v></c>"));
            } else {
                sheet.push_str(&format!(
                    "<c r=\"{cell_ref}\" t=\"inlineStr\"><is><t>{value}</t></is></c>"
                ));
            }
        }
        sheet.push_str("</row>");
    }
    sheet.push_str("</sheetData></worksheet>");
    write_parts(
        path,
        &[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/worksheets/counts.xml", &sheet),
        ],
    );
}

fn write_parts(path: &Path, parts: &[(&str, &str)]) {
    let file = File::create(path).unwrap();
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(CompressionMethod::Stored);
    for (name, body) in parts {
        zip.start_file(*name, options).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn test_column_index() {
    assert_eq!(column_index("A1"), Some(0));
    assert_eq!(column_index("Z9"), Some(25));
    assert_eq!(column_index("AB12"), Some(27));
    assert_eq!(column_index("12"), None);
    assert_eq!(column_index("XFD1"), Some(MAX_COLUMNS - 1));
    assert_eq!(column_index("XFE1"), None);
    assert_eq!(column_index("AAAAAAAAAAAAAAAA1"), None);
}

fn write_sheet(path: &Path, sheet: &str) {
    write_parts(
        path,
        &[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/worksheets/counts.xml", sheet),
        ],
    );
}

#[test]
fn test_overlong_cell_reference_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wide.xlsx");
    write_sheet(
        &path,
        r#"<worksheet><sheetData><row r="1"><c r="AAAAAAAAAAAAAAAA1"><v>1</v></c></row></sheetData></worksheet>"#,
    );

    let err = read_first_sheet(&path).unwrap_err();
    assert!(matches!(err, InputError::Spreadsheet { .. }));
    assert!(err.to_string().contains("beyond column XFD"));
}

#[test]
fn test_row_number_past_sheet_limit_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tall.xlsx");
    write_sheet(
        &path,
        r#"<worksheet><sheetData><row r="4000000000"><c r="A4000000000"><v>1</v></c></row></sheetData></worksheet>"#,
    );

    let err = read_first_sheet(&path).unwrap_err();
    assert!(matches!(err, InputError::Spreadsheet { .. }));
    assert!(err.to_string().contains("row number 4000000000"));
}

#[test]
fn test_leading_empty_rows_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("offset.xlsx");
    write_sheet(
        &path,
        r#"<worksheet><sheetData>
<row r="2"><c r="A2" t="inlineStr"><is><t>gene_id</t></is></c><c r="B2" t="inlineStr"><is><t>S1</t></is></c></row>
<row r="3"><c r="A3" t="inlineStr"><is><t>G1</t></is></c><c r="B3"><v>7</v></c></row>
</sheetData></worksheet>"#,
    );

    let FirstSheet::Sheet(rows) = read_first_sheet(&path).unwrap() else {
        panic!("expected a spreadsheet");
    };
    assert_eq!(rows[0], vec!["gene_id", "S1"]);

    let table = parse_table(&path).unwrap();
    assert_eq!(table.headers, vec!["gene_id", "S1"]);
    let gene = table.column("gene_id", ColumnKind::GeneId).unwrap();
    let rows: Vec<Vec<String>> = table.map(Result::unwrap).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(gene.get(&rows[0]), "G1");
}

#[test]
fn test_reads_first_sheet_via_relationships() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counts.xlsx");
    write_test_xlsx(
        &path,
        &[
            &["gene_id", "s1", "s2"],
            &["ENSG1", "10", "0"],
            &["ENSG2", "3", "5"],
        ],
    );

    let FirstSheet::Sheet(rows) = read_first_sheet(&path).unwrap() else {
        panic!("expected a spreadsheet");
    };
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec!["gene_id", "s1", "s2"]);
    assert_eq!(rows[2], vec!["ENSG2", "3", "5"]);
}

#[test]
fn test_shared_strings_booleans_and_sparse_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("design.xlsx");
    let shared = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="3" uniqueCount="3">
<si><t>Sample</t></si>
<si><r><t>Condi</t></r><r><t>tion</t></r></si>
<si><t>Treated</t><rPh sb="0" eb="1"><t>x</t></rPh></si>
</sst>"#;
    let sheet = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="inlineStr"><is><t>Paired</t></is></c></row>
<row r="3"><c r="A3" t="inlineStr"><is><t>S1</t></is></c><c r="C3" t="b"><v>1</v></c></row>
<row r="4"><c r="A4" t="inlineStr"><is><t>S2</t></is></c><c r="B4" t="s"><v>2</v></c></row>
</sheetData></worksheet>"#;
    write_parts(
        &path,
        &[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/sharedStrings.xml", shared),
            ("xl/worksheets/counts.xml", sheet),
        ],
    );

    let FirstSheet::Sheet(rows) = read_first_sheet(&path).unwrap() else {
        panic!("expected a spreadsheet");
    };
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0], vec!["Sample", "Condition", "Paired"]);
    assert!(rows[1].is_empty());
    assert_eq!(rows[2], vec!["S1", "", "TRUE"]);
    assert_eq!(rows[3], vec!["S2", "Treated"]);
}

#[test]
fn test_falls_back_to_sheet1_without_relationships() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bare.xlsx");
    write_parts(
        &path,
        &[
            ("xl/workbook.xml", "<workbook><sheets/></workbook>"),
            (
                "xl/worksheets/sheet1.xml",
                r#"<worksheet><sheetData><row><c t="inlineStr"><is><t>gene</t></is></c><c><v>1</v></c></row></sheetData></worksheet>"#,
            ),
        ],
    );

    let FirstSheet::Sheet(rows) = read_first_sheet(&path).unwrap() else {
        panic!("expected a spreadsheet");
    };
    assert_eq!(rows, vec![vec!["gene".to_string(), "1".to_string()]]);
}

#[test]
fn test_text_files_and_foreign_zips_are_not_spreadsheets() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("counts.csv");
    std::fs::write(&csv_path, "gene_id,s1\nG1,1\n").unwrap();
    assert_eq!(
        read_first_sheet(&csv_path).unwrap(),
        FirstSheet::NotSpreadsheet
    );

    let tiny = dir.path().join("tiny.csv");
    std::fs::write(&tiny, "a\n").unwrap();
    assert_eq!(read_first_sheet(&tiny).unwrap(), FirstSheet::NotSpreadsheet);

    let zip_path = dir.path().join("other.zip");
    write_parts(&zip_path, &[("readme.txt", "hello")]);
    assert_eq!(
        read_first_sheet(&zip_path).unwrap(),
        FirstSheet::NotSpreadsheet
    );
}
