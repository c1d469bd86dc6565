pub mod document;
pub mod table;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::config::OUTPUT_TIME_FORMAT;
use crate::record::Record;
use table::TableWriter;

/// Destination for finished records.
pub trait Sink: Send {
    fn persist(&mut self, record: Record) -> Result<()>;

    /// Whether a record is durable as soon as `persist` returns. Sinks that
    /// buffer until `finish` return false, and ledger marks wait for it.
    fn persists_per_record(&self) -> bool {
        true
    }

    /// Flushes whatever is buffered; returns the file written, if any.
    fn finish(&mut self) -> Result<Option<PathBuf>>;
}

/// `{prefix}_{YYYYmmdd_HHMMSS}.{ext}` in the working directory.
pub fn default_filename(prefix: &str, ext: &str) -> PathBuf {
    PathBuf::from(format!(
        "{}_{}.{}",
        prefix,
        Local::now().format(OUTPUT_TIME_FORMAT),
        ext
    ))
}

/// Rows appended to a CSV table as each record arrives.
pub struct CsvSink {
    table: TableWriter,
    schema_hint: Option<Vec<String>>,
    rows: usize,
}

impl CsvSink {
    pub fn open(path: impl AsRef<Path>, schema_hint: Option<Vec<String>>) -> Result<Self> {
        let path = path.as_ref();
        let table = TableWriter::open(path)
            .with_context(|| format!("Failed to open table {}", path.display()))?;
        Ok(Self {
            table,
            schema_hint,
            rows: 0,
        })
    }
}

impl Sink for CsvSink {
    fn persist(&mut self, record: Record) -> Result<()> {
        self.table
            .append(&record, self.schema_hint.as_deref())
            .with_context(|| format!("Failed to append row to {}", self.table.path().display()))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        Ok((self.rows > 0).then(|| self.table.path().to_path_buf()))
    }
}

/// Collects records and writes one JSON document at the end of the run.
pub struct JsonSink {
    path: PathBuf,
    records: Vec<Record>,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }
}

impl Sink for JsonSink {
    fn persist(&mut self, record: Record) -> Result<()> {
        self.records.push(record);
        Ok(())
    }

    fn persists_per_record(&self) -> bool {
        false
    }

    fn finish(&mut self) -> Result<Option<PathBuf>> {
        document::write_document(&self.path, &self.records)?;
        Ok(Some(self.path.clone()))
    }
}
