use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::ledger::{timestamp, Ledger, LedgerEntry};

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open ledger database {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS processed (
            identifier   TEXT PRIMARY KEY,
            processed_at TEXT NOT NULL
        );
        ",
    )?;
    Ok(())
}

/// Ledger kept in a SQLite table instead of a flat file.
pub struct SqliteLedger {
    conn: Connection,
    location: String,
}

impl SqliteLedger {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = connect(path)?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            location: path.display().to_string(),
        })
    }

    #[cfg(test)]
    fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn,
            location: ":memory:".into(),
        })
    }
}

impl Ledger for SqliteLedger {
    fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT identifier, processed_at FROM processed ORDER BY rowid")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LedgerEntry {
                    identifier: row.get(0)?,
                    completed_at: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn mark_done(&mut self, identifier: &str) -> Result<()> {
        // First completion wins; repeats are tolerated.
        self.conn.execute(
            "INSERT OR IGNORE INTO processed (identifier, processed_at) VALUES (?1, ?2)",
            rusqlite::params![identifier, timestamp()],
        )?;
        Ok(())
    }

    fn location(&self) -> String {
        self.location.clone()
    }
}
