//! Deletion of removed records from the store, with an audit trail

use crate::config::TableSchema;
use crate::diff::{row_id, RecordId};
use crate::dump::Row;
use crate::error::Result;
use crate::writer::StoreWriter;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only CSV record of deleted rows edited by tracked actors
#[derive(Debug, Clone)]
pub struct AuditLedger {
    path: PathBuf,
}

impl AuditLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the ledger if it does not exist; never truncates
    pub fn touch(&self) -> Result<()> {
        OpenOptions::new().create(true).append(true).open(&self.path)?;
        Ok(())
    }

    /// Append one deleted row, prefixed with its table
    pub fn append(&self, table: &str, row: &Row) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = std::iter::once(table)
            .chain(row.iter().map(String::as_str))
            .map(csv_field)
            .collect::<Vec<_>>()
            .join(",");
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Quote a CSV field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Outcome of resolving one table's removals
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionReport {
    /// Deleted files, relative to the store root
    pub removed_paths: Vec<PathBuf>,
    /// Number of rows appended to the ledger
    pub audited: usize,
}

pub struct DeletionResolver<'a> {
    writer: &'a StoreWriter,
    ledger: &'a AuditLedger,
    audited_actors: &'a HashSet<String>,
}

impl<'a> DeletionResolver<'a> {
    pub fn new(
        writer: &'a StoreWriter,
        ledger: &'a AuditLedger,
        audited_actors: &'a HashSet<String>,
    ) -> Self {
        Self {
            writer,
            ledger,
            audited_actors,
        }
    }

    /// Whether a pruned row was last touched by a tracked actor
    fn is_tracked(&self, schema: &TableSchema, row: &Row) -> bool {
        match schema.last_modified_by_column.and_then(|c| schema.pruned_index(c)) {
            Some(column) => row
                .get(column)
                .is_some_and(|actor| self.audited_actors.contains(actor)),
            None => row.iter().any(|value| self.audited_actors.contains(value)),
        }
    }

    /// Delete the artifacts of every removed id. `old_rows` are the pruned
    /// rows of the older snapshot, used for the audit trail.
    pub fn resolve(
        &self,
        table: &str,
        schema: &TableSchema,
        removed: &BTreeSet<RecordId>,
        old_rows: &[Row],
    ) -> Result<DeletionReport> {
        let mut report = DeletionReport::default();
        if removed.is_empty() {
            return Ok(report);
        }

        let old_by_id: HashMap<RecordId, &Row> = old_rows
            .iter()
            .filter_map(|row| row_id(row).map(|id| (id, row)))
            .filter(|(id, _)| removed.contains(id))
            .collect();

        for &id in removed {
            let artifacts = self.writer.find_artifacts(table, id)?;
            if artifacts.is_empty() {
                log::debug!("{}/{}: nothing to delete", table, id);
                continue;
            }
            for path in artifacts {
                self.writer.remove(&path)?;
                log::info!("Deleted {}", path.display());
                report.removed_paths.push(path);
            }

            if let Some(row) = old_by_id.get(&id) {
                if self.is_tracked(schema, row) {
                    self.ledger.append(table, row)?;
                    report.audited += 1;
                }
            }
        }

        Ok(report)
    }
}
