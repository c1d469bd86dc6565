use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::record::Record;

/// One run's worth of records plus when they were captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub scrape_time: DateTime<Local>,
    pub channels: Vec<Record>,
}

#[derive(Serialize)]
struct DocumentRef<'a> {
    scrape_time: DateTime<Local>,
    channels: &'a [Record],
}

/// Overwrites `path` with a pretty-printed document of `records`.
pub fn write_document(path: &Path, records: &[Record]) -> Result<DateTime<Local>> {
    let scrape_time = Local::now();
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(
        &mut out,
        &DocumentRef {
            scrape_time,
            channels: records,
        },
    )?;
    out.flush()?;
    info!("Data saved to {} ({} records)", path.display(), records.len());
    Ok(scrape_time)
}

pub fn read_document(path: &Path) -> Result<Document> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let doc = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Malformed document {}", path.display()))?;
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heterogeneous_records_round_trip_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("channel_data.json");

        let mut first: Record = [("channel_name", "THE FIRST TAKE"), ("country", "日本")]
            .into_iter()
            .collect();
        first.insert("social_links", vec![[("title", "X"), ("url", "https://x.com/a")].into_iter().collect::<Record>()]);
        let second: Record = [("channel_name", "Aimer"), ("description", "Not found")]
            .into_iter()
            .collect();
        let mut third = Record::new();
        third.insert("social_links", Vec::<Record>::new());
        let records = vec![first, second, third];

        let written_at = write_document(&path, &records).unwrap();
        let doc = read_document(&path).unwrap();
        assert_eq!(doc.channels, records);
        assert_eq!(doc.scrape_time, written_at);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("日本"), "non-ASCII must not be escaped");
        assert!(raw.contains("\n  \"channels\""));
    }

    #[test]
    fn rewrites_instead_of_appending() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let one: Record = [("a", "1")].into_iter().collect();

        write_document(&path, &[one.clone(), one.clone()]).unwrap();
        write_document(&path, &[one]).unwrap();
        assert_eq!(read_document(&path).unwrap().channels.len(), 1);
    }
}
