//! Append-only CSV table whose schema is fixed by its first write.
//!
//! A destination is either not created yet, or has a header row. Reopening an
//! existing file reads its header back, so appends across runs keep the same
//! columns. Records may omit schema columns (empty cell) but must never carry
//! a column the header lacks.

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use csv::{QuoteStyle, Terminator, WriterBuilder};
use thiserror::Error;
use tracing::{debug, info};

use crate::record::{FieldValue, Record};

const BOM: &str = "\u{feff}";

#[derive(Debug, Error)]
pub enum TableError {
    #[error("record has fields outside the table schema: {unexpected:?}")]
    SchemaViolation { unexpected: Vec<String> },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub struct TableWriter {
    path: PathBuf,
    schema: Option<Vec<String>>,
    writer: Option<csv::Writer<File>>,
}

impl TableWriter {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref().to_path_buf();
        let schema = read_header(&path)?;
        if let Some(schema) = &schema {
            debug!("Reusing {} columns from {}", schema.len(), path.display());
        }
        Ok(Self {
            path,
            schema,
            writer: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> Option<&[String]> {
        self.schema.as_deref()
    }

    /// Writes one row. The first row of a new file also fixes the schema:
    /// `schema_hint` when given, else the record's own keys.
    pub fn append(&mut self, record: &Record, schema_hint: Option<&[String]>) -> Result<(), TableError> {
        if self.schema.is_none() {
            let schema = match schema_hint {
                Some(hint) if !hint.is_empty() => hint.to_vec(),
                _ => record.keys().cloned().collect(),
            };
            self.writer = Some(create(&self.path, &schema)?);
            self.schema = Some(schema);
        }
        let schema = self.schema.as_deref().unwrap_or_default();

        let unexpected: Vec<String> = record
            .keys()
            .filter(|k| !schema.contains(*k))
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            return Err(TableError::SchemaViolation { unexpected });
        }

        let row: Vec<String> = schema
            .iter()
            .map(|key| record.get(key).map(FieldValue::to_cell).unwrap_or_default())
            .collect();

        let mut writer = match self.writer.take() {
            Some(writer) => writer,
            None => open_append(&self.path)?,
        };
        writer.write_record(&row)?;
        writer.flush()?;
        self.writer = Some(writer);
        Ok(())
    }
}

/// Sorted union of every key across `records`.
pub fn union_fields(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .flat_map(|r| r.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Writes a whole batch under the union schema, so no record can violate it.
pub fn write_batch(path: impl AsRef<Path>, records: &[Record]) -> Result<usize, TableError> {
    let schema = union_fields(records);
    let mut table = TableWriter::open(path)?;
    for record in records {
        table.append(record, Some(&schema))?;
    }
    info!("Wrote {} rows to {}", records.len(), table.path().display());
    Ok(records.len())
}

fn writer_for(file: File) -> csv::Writer<File> {
    WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::CRLF)
        .from_writer(file)
}

fn open_append(path: &Path) -> Result<csv::Writer<File>, TableError> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(writer_for(file))
}

fn create(path: &Path, schema: &[String]) -> Result<csv::Writer<File>, TableError> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(BOM.as_bytes())?;
    let mut writer = writer_for(file);
    writer.write_record(schema)?;
    writer.flush()?;
    info!("Created {} with {} columns", path.display(), schema.len());
    Ok(writer)
}

/// Header of an existing, non-empty table.
fn read_header(path: &Path) -> Result<Option<Vec<String>>, TableError> {
    if !path.exists() || path.metadata()?.len() == 0 {
        return Ok(None);
    }
    let mut reader = csv::ReaderBuilder::new().has_headers(false).from_path(path)?;
    let mut header = csv::StringRecord::new();
    if !reader.read_record(&mut header)? {
        return Ok(None);
    }
    let columns = header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches(BOM) } else { h };
            h.to_string()
        })
        .collect();
    Ok(Some(columns))
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(pairs: &[(&str, &str)]) -> Record {
        pairs.iter().copied().collect()
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_path(path)
            .unwrap();
        reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn first_record_fixes_sorted_schema_with_bom() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("video_data.csv");

        let mut table = TableWriter::open(&path).unwrap();
        table.append(&rec(&[("title", "A"), ("channelName", "Aimer")]), None).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("\u{feff}\"channelName\",\"title\"\r\n"));
        assert!(raw.ends_with("\"Aimer\",\"A\"\r\n"));
    }

    #[test]
    fn missing_fields_leave_empty_cells_and_header_never_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let schema: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();

        let mut table = TableWriter::open(&path).unwrap();
        table.append(&rec(&[("a", "1"), ("b", "2"), ("c", "3")]), Some(&schema)).unwrap();
        table.append(&rec(&[("c", "only c")]), Some(&schema)).unwrap();
        drop(table);

        // a later run appends to the same file under the stored header
        let mut again = TableWriter::open(&path).unwrap();
        assert_eq!(again.schema(), Some(schema.as_slice()));
        again.append(&rec(&[("b", "x")]), None).unwrap();

        let rows = read_rows(&path);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0][0].trim_start_matches(BOM), "a");
        assert_eq!(&rows[0][1..], ["b", "c"]);
        assert_eq!(rows[2], ["", "", "only c"]);
        assert_eq!(rows[3], ["", "x", ""]);
    }

    #[test]
    fn extra_field_is_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");

        let mut table = TableWriter::open(&path).unwrap();
        table.append(&rec(&[("title", "A")]), None).unwrap();
        let err = table
            .append(&rec(&[("title", "B"), ("comment_1", "hi")]), None)
            .unwrap_err();

        match err {
            TableError::SchemaViolation { unexpected } => assert_eq!(unexpected, ["comment_1"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(read_rows(&path).len(), 2);
    }

    #[test]
    fn groups_are_written_as_json_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.csv");
        let mut record = rec(&[("name", "n")]);
        record.insert("links", vec![rec(&[("url", "u")])]);

        TableWriter::open(&path).unwrap().append(&record, None).unwrap();
        let rows = read_rows(&path);
        assert_eq!(rows[1], ["[{\"url\":\"u\"}]", "n"]);
    }

    #[test]
    fn batch_uses_union_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.csv");
        let records = vec![
            rec(&[("title", "A"), ("comment_1", "x")]),
            rec(&[("title", "B"), ("comment_1", "y"), ("comment_2", "z")]),
            rec(&[("title", "C")]),
        ];
        assert_eq!(union_fields(&records), ["comment_1", "comment_2", "title"]);

        assert_eq!(write_batch(&path, &records).unwrap(), 3);
        let rows = read_rows(&path);
        assert_eq!(rows[2], ["y", "z", "B"]);
        assert_eq!(rows[3], ["", "", "C"]);
    }
}
