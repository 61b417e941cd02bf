//! Per-run scratch storage for decoded row tables
//!
//! Each (side, table) pair gets one file holding one JSON array per row. The
//! directory is removed when the `ScratchArea` is dropped, so nothing leaks
//! from one run into the next.

use crate::dump::Row;
use crate::error::Result;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Which dump of the pair a row table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Old,
    New,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Old => write!(f, "old"),
            Side::New => write!(f, "new"),
        }
    }
}

pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("catalog-mirror-").tempdir()?;
        log::debug!("Scratch area at {}", dir.path().display());
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn table_path(&self, side: Side, table: &str) -> PathBuf {
        self.dir.path().join(format!("complete-{}-{}.jsonl", side, table))
    }

    /// Create (or truncate) the file for a table
    pub fn create(&self, side: Side, table: &str) -> Result<()> {
        File::create(self.table_path(side, table))?;
        Ok(())
    }

    pub fn append_rows(&self, side: Side, table: &str, rows: &[Row]) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.table_path(side, table))?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load all rows of a table; a table never written to is empty
    pub fn load_rows(&self, side: Side, table: &str) -> Result<Vec<Row>> {
        let path = self.table_path(side, table);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(path)?);
        let mut rows = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            rows.push(serde_json::from_str(&line)?);
        }
        Ok(rows)
    }
}
