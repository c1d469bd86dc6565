//! Append-only record of completed work items.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::debug;

use crate::config::LEDGER_TIME_FORMAT;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub identifier: String,
    pub completed_at: String,
}

pub trait Ledger: Send {
    /// Every entry ever recorded, oldest first. Duplicates are kept.
    fn entries(&self) -> Result<Vec<LedgerEntry>>;

    /// Durably records `identifier` as done.
    fn mark_done(&mut self, identifier: &str) -> Result<()>;

    fn location(&self) -> String;

    fn processed_set(&self) -> Result<HashSet<String>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|e| e.identifier)
            .collect())
    }
}

/// Seeds not yet processed, in seed order, without repeats.
pub fn pending(seeds: &[String], processed: &HashSet<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    seeds
        .iter()
        .filter(|id| !processed.contains(*id) && seen.insert(id.as_str()))
        .cloned()
        .collect()
}

pub fn timestamp() -> String {
    Local::now().format(LEDGER_TIME_FORMAT).to_string()
}

/// `identifier,timestamp` lines in a text file.
pub struct FileLedger {
    path: PathBuf,
}

impl FileLedger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Ledger for FileLedger {
    fn entries(&self) -> Result<Vec<LedgerEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Failed to open ledger {}", self.path.display()))?;

        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.with_context(|| format!("Failed to read ledger {}", self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            // Identifiers are kept verbatim; the timestamp is the last field.
            let (identifier, completed_at) = line.rsplit_once(',').unwrap_or((line.as_str(), ""));
            entries.push(LedgerEntry {
                identifier: identifier.to_string(),
                completed_at: completed_at.trim().to_string(),
            });
        }
        Ok(entries)
    }

    fn mark_done(&mut self, identifier: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ledger {}", self.path.display()))?;
        writeln!(file, "{},{}", identifier, timestamp())?;
        file.flush()?;
        file.sync_data()?;
        debug!("Marked {} done in {}", identifier, self.path.display());
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FileLedger::new(dir.path().join("processed_videos.txt"));
        assert!(ledger.processed_set().unwrap().is_empty());
    }

    #[test]
    fn marks_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_videos.txt");

        let mut ledger = FileLedger::new(&path);
        ledger.mark_done("c2tuxS3Pcto").unwrap();
        ledger.mark_done("kxs9Su_mbpU").unwrap();
        ledger.mark_done("c2tuxS3Pcto").unwrap();

        let reopened = FileLedger::new(&path);
        let entries = reopened.entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].identifier, "c2tuxS3Pcto");
        assert_eq!(entries[0].completed_at.len(), "2024-01-01 00:00:00".len());

        let set = reopened.processed_set().unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("kxs9Su_mbpU"));
    }

    #[test]
    fn reads_hand_written_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");
        std::fs::write(&path, "abc,2024-01-01 10:00:00\r\n\ndef\nAbc,later\n").unwrap();

        let set = FileLedger::new(&path).processed_set().unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.contains("abc") && set.contains("def") && set.contains("Abc"));
    }

    #[test]
    fn identifiers_round_trip_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.txt");

        let mut ledger = FileLedger::new(&path);
        ledger.mark_done("abc ").unwrap();
        ledger.mark_done("a,b").unwrap();

        let set = FileLedger::new(&path).processed_set().unwrap();
        assert!(set.contains("abc ") && set.contains("a,b"));
        assert!(!set.contains("abc"));

        let todo = pending(&ids(&["abc ", "abc", "a,b"]), &set);
        assert_eq!(todo, ids(&["abc"]));
    }

    #[test]
    fn pending_keeps_order_and_skips_done() {
        let processed: HashSet<String> = ids(&["b"]).into_iter().collect();
        let todo = pending(&ids(&["a", "b", "c", "a"]), &processed);
        assert_eq!(todo, ids(&["a", "c"]));
    }
}
