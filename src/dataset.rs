//! Reading phase datasets.
//!
//! A dataset is a `;`-delimited text file with a header line naming a
//! `sample` column and an `annotation` column, one evaluation unit per row.
//! The annotation column holds the gold list-of-triples literal parsed by
//! [`crate::annotation::parse_annotation_literal`].
//!
//! > ⚠️ This file is manually parsed and supports only the two expected
//! > columns. Quoted fields are not supported; when the sample text itself
//! > contains `;`, the split is taken at the annotation side of the row, so
//! > samples with semicolons survive as long as `annotation` is the first or
//! > the last column.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// One dataset row: the raw sample text and the gold annotation literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetRecord {
    pub sample: String,
    pub annotation: String,
}

/// Reads an entire dataset file in row order.
///
/// # Errors
/// Returns an `io::Error` when the file cannot be opened or the header does
/// not name both a `sample` and an `annotation` column.
pub fn read_dataset(path: impl AsRef<Path>) -> io::Result<Vec<DatasetRecord>> {
    let file = File::open(path.as_ref())?;
    let mut lines = BufReader::new(file).lines();

    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(invalid("dataset file is empty")),
    };
    let columns: Vec<&str> = header.split(';').map(str::trim).collect();
    let sample_col = position(&columns, "sample")?;
    let annotation_col = position(&columns, "annotation")?;
    if columns.len() != 2 {
        return Err(invalid("expected exactly the 'sample' and 'annotation' columns"));
    }

    let mut records = Vec::new();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // split at the annotation side so a ';' inside the sample text does
        // not shift the columns
        let (sample, annotation) = if annotation_col > sample_col {
            let (s, a) = line
                .rsplit_once(';')
                .ok_or_else(|| invalid("row is missing the ';' separator"))?;
            (s, a)
        } else {
            let (a, s) = line
                .split_once(';')
                .ok_or_else(|| invalid("row is missing the ';' separator"))?;
            (s, a)
        };
        records.push(DatasetRecord {
            sample: sample.to_owned(),
            annotation: annotation.trim().to_owned(),
        });
    }
    Ok(records)
}

fn position(columns: &[&str], name: &str) -> io::Result<usize> {
    columns
        .iter()
        .position(|c| *c == name)
        .ok_or_else(|| invalid(&format!("dataset header has no '{name}' column")))
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_dataset(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn reads_rows_in_order() {
        let file = write_dataset(
            "sample;annotation\n\
             John works at ACME;[(0,4,'PER'),(19,23,'ORG')]\n\
             nothing here;[]\n",
        );
        let records = read_dataset(file.path()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sample, "John works at ACME");
        assert_eq!(records[0].annotation, "[(0,4,'PER'),(19,23,'ORG')]");
        assert_eq!(records[1].annotation, "[]");
    }

    #[test]
    fn sample_may_contain_semicolons() {
        let file = write_dataset("sample;annotation\na; b; c;[(0,1,'X')]\n");
        let records = read_dataset(file.path()).unwrap();
        assert_eq!(records[0].sample, "a; b; c");
        assert_eq!(records[0].annotation, "[(0,1,'X')]");
    }

    #[test]
    fn reversed_column_order_is_accepted() {
        let file = write_dataset("annotation;sample\n[(0,1,'X')];some; text\n");
        let records = read_dataset(file.path()).unwrap();
        assert_eq!(records[0].sample, "some; text");
        assert_eq!(records[0].annotation, "[(0,1,'X')]");
    }

    #[test]
    fn missing_columns_are_rejected() {
        let file = write_dataset("text;labels\nfoo;[]\n");
        assert!(read_dataset(file.path()).is_err());
        let empty = write_dataset("");
        assert!(read_dataset(empty.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(read_dataset("/definitely/not/here.csv").is_err());
    }
}
