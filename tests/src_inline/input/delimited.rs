use super::*;
use std::fs;
use std::io::Write;

use flate2::Compression;
use flate2::write::GzEncoder;

#[test]
fn test_sniff_delimiter_variants() {
    assert_eq!(sniff_delimiter("gene_id,s1,s2\n"), b',');
    assert_eq!(sniff_delimiter("gene_id\ts1\ts2\n"), b'\t');
    assert_eq!(sniff_delimiter("gene_id;s1;s2\n"), b';');
    assert_eq!(sniff_delimiter("gene_id|s1|s2\n"), b'|');
}

#[test]
fn test_sniff_delimiter_ignores_quoted_separators() {
    assert_eq!(sniff_delimiter("\"a,b,c\"\t\"d\"\te\n"), b'\t');
}

#[test]
fn test_sniff_delimiter_single_column_defaults_to_comma() {
    assert_eq!(sniff_delimiter("gene_id\n"), b',');
}

#[test]
fn test_delimited_reader_reads_gz_tsv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("counts.tsv.gz");
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    enc.write_all(b"gene_id\ts1\nG1\t4\nG2\t7\n").unwrap();
    fs::write(&path, enc.finish().unwrap()).unwrap();

    let (delimiter, reader) = delimited_reader(&path, false).unwrap();
    assert_eq!(delimiter, b'\t');
    let rows = reader
        .into_records()
        .map(|r| record_to_row(r.unwrap()))
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        vec![
            vec!["gene_id".to_string(), "s1".to_string()],
            vec!["G1".to_string(), "4".to_string()],
            vec!["G2".to_string(), "7".to_string()],
        ]
    );
}

#[test]
fn test_strip_bom_only_touches_first_cell() {
    let mut row = vec!["\u{feff}gene_id".to_string(), "\u{feff}s1".to_string()];
    strip_bom(&mut row);
    assert_eq!(row[0], "gene_id");
    assert_eq!(row[1], "\u{feff}s1");
}
