use super::*;
use std::fs;

use crate::input::xlsx::tests::write_test_xlsx;

#[test]
fn test_parse_csv_table_with_bom() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("design.csv");
    fs::write(&path, "\u{feff}Sample,Condition\nS1,Treated\nS2,Control\n").unwrap();

    let table = parse_table(&path).unwrap();
    assert_eq!(table.format, TableFormat::Delimited(b','));
    assert_eq!(table.headers, vec!["Sample", "Condition"]);

    let col = table.column("Condition", ColumnKind::SampleId).unwrap();
    let values = table
        .map(|row| col.get(&row.unwrap()).to_string())
        .collect::<Vec<_>>();
    assert_eq!(values, vec!["Treated", "Control"]);
}

#[test]
fn test_parse_tsv_table_detects_tab() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counts.tsv");
    fs::write(&path, "gene_id\ts1\ts2\nG1\t1\t2\n").unwrap();

    let table = parse_table(&path).unwrap();
    assert_eq!(table.format, TableFormat::Delimited(b'\t'));
    assert_eq!(table.first_header(), Some("gene_id"));
    let rows = table.collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(rows, vec![vec!["G1", "1", "2"]]);
}

#[test]
fn test_parse_spreadsheet_table() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counts.xlsx");
    write_test_xlsx(&path, &[&["gene_id", "s1"], &["G1", "5"], &["G2", "6"]]);

    let table = parse_table(&path).unwrap();
    assert_eq!(table.format, TableFormat::Spreadsheet);
    let gene = table.column("gene_id", ColumnKind::GeneId).unwrap();
    assert_eq!(gene, ColumnIndex(0));
    let genes = table
        .map(|row| gene.get(&row.unwrap()).to_string())
        .collect::<Vec<_>>();
    assert_eq!(genes, vec!["G1", "G2"]);
}

#[test]
fn test_missing_column_lists_available_columns() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counts.csv");
    fs::write(&path, "Geneid,s1,s2\nG1,1,2\n").unwrap();

    let table = parse_table(&path).unwrap();
    let err = table.column("gene_id", ColumnKind::GeneId).unwrap_err();
    match &err {
        InputError::ColumnNotFound {
            column, available, ..
        } => {
            assert_eq!(column, "gene_id");
            assert_eq!(available, &vec!["Geneid", "s1", "s2"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    let notice = err.notice().unwrap();
    assert_eq!(notice.title, "Invalid gene ID column selected");
    assert!(notice.body.contains("- Geneid"));
}

#[test]
fn test_short_rows_read_as_empty_cells() {
    let row = vec!["only".to_string()];
    assert_eq!(ColumnIndex(0).get(&row), "only");
    assert_eq!(ColumnIndex(3).get(&row), "");
}

#[test]
fn test_missing_and_empty_tables() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.csv");
    assert!(matches!(
        parse_table(&missing),
        Err(InputError::MissingInput(_))
    ));

    let empty = dir.path().join("empty.csv");
    fs::write(&empty, "").unwrap();
    assert!(matches!(
        parse_table(&empty),
        Err(InputError::EmptyTable(_))
    ));
}
