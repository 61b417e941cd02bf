//! Removal of volatile columns before snapshots are compared

use crate::config::TableSchema;
use crate::dump::Row;
use crate::error::{MirrorError, Result};

/// Drop the version counter and system timestamp columns from every row.
///
/// Each row must have exactly `total_columns` values; the identifier column is
/// never touched.
pub fn prune_rows(table: &str, schema: &TableSchema, rows: Vec<Row>) -> Result<Vec<Row>> {
    let volatile = schema.volatile_columns();
    rows.into_iter()
        .map(|mut row| {
            if row.len() != schema.total_columns {
                return Err(MirrorError::schema_mismatch(
                    table,
                    format!(
                        "row {} has {} columns, expected {}",
                        row.first().map(String::as_str).unwrap_or("<empty>"),
                        row.len(),
                        schema.total_columns
                    ),
                ));
            }
            for column in volatile {
                row.remove(column);
            }
            Ok(row)
        })
        .collect()
}
