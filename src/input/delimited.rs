use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::input::InputError;

/// Candidate delimiters in order of preference when counts tie.
const DELIMITERS: [u8; 4] = [b',', b'\t', b';', b'|'];

pub const UTF8_BOM: char = '\u{feff}';

pub fn open_maybe_gz(path: &Path) -> Result<Box<dyn Read>, InputError> {
    let file = File::open(path)?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn read_first_line(path: &Path) -> Result<String, InputError> {
    let mut reader = BufReader::new(open_maybe_gz(path)?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line)
}

/// Picks the delimiter occurring most often outside double quotes.
pub fn sniff_delimiter(line: &str) -> u8 {
    let mut counts = [0usize; DELIMITERS.len()];
    let mut in_quotes = false;
    for b in line.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
            continue;
        }
        if in_quotes {
            continue;
        }
        if let Some(idx) = DELIMITERS.iter().position(|&d| d == b) {
            counts[idx] += 1;
        }
    }

    let mut best = 0usize;
    for idx in 1..DELIMITERS.len() {
        if counts[idx] > counts[best] {
            best = idx;
        }
    }
    DELIMITERS[best]
}

/// Opens a delimited text table with a sniffed dialect. Every line, the header
/// included, is yielded as a record.
pub fn delimited_reader(
    path: &Path,
    flexible: bool,
) -> Result<(u8, csv::Reader<Box<dyn Read>>), InputError> {
    let delimiter = sniff_delimiter(&read_first_line(path)?);
    let reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(flexible)
        .from_reader(open_maybe_gz(path)?);
    Ok((delimiter, reader))
}

pub fn record_to_row(record: csv::StringRecord) -> Vec<String> {
    record.iter().map(str::to_string).collect()
}

pub fn strip_bom(row: &mut [String]) {
    if let Some(first) = row.first_mut()
        && let Some(stripped) = first.strip_prefix(UTF8_BOM)
    {
        *first = stripped.to_string();
    }
}

#[cfg(test)]
#[path = "../../tests/src_inline/input/delimited.rs"]
mod tests;
