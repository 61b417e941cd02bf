//! Row-level comparison of two pruned snapshots of one table

use crate::dump::Row;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Record identifier as stored in column 0
pub type RecordId = u64;

/// Identifiers touched between two snapshots of one table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSet {
    pub added_or_modified: BTreeSet<RecordId>,
    /// Never overlaps `added_or_modified`: an id whose row disappears and
    /// reappears with new content is a modification
    pub removed: BTreeSet<RecordId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.added_or_modified.is_empty() && self.removed.is_empty()
    }
}

/// Lines that differ between two sorted row tables
#[derive(Debug, Default)]
pub struct RowDiff<'a> {
    pub removed: Vec<&'a Row>,
    pub added: Vec<&'a Row>,
}

/// Numeric identifier of a row, if its leading value is purely digits
pub fn row_id(row: &Row) -> Option<RecordId> {
    let first = row.first()?;
    if first.is_empty() || !first.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    first.parse().ok()
}

fn compare_rows(a: &Row, b: &Row) -> Ordering {
    // Numeric ids first in numeric order, anything else after them
    let key = |row: &Row| row_id(row).map_or((1, 0), |id| (0, id));
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

/// Sort rows by identifier so that reordering alone never shows up as a change
pub fn sort_rows(rows: &mut [Row]) {
    rows.sort_by(compare_rows);
}

/// Diff two tables that are already sorted with [`sort_rows`]
pub fn diff_sorted<'a>(old: &'a [Row], new: &'a [Row]) -> RowDiff<'a> {
    let mut diff = RowDiff::default();
    let (mut i, mut j) = (0, 0);

    while i < old.len() && j < new.len() {
        match compare_rows(&old[i], &new[j]) {
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                diff.removed.push(&old[i]);
                i += 1;
            }
            Ordering::Greater => {
                diff.added.push(&new[j]);
                j += 1;
            }
        }
    }
    diff.removed.extend(&old[i..]);
    diff.added.extend(&new[j..]);
    diff
}

/// Compute the change set between two pruned snapshots of one table. Both
/// tables are sorted in place first.
pub fn diff_snapshots(old: &mut [Row], new: &mut [Row]) -> ChangeSet {
    sort_rows(old);
    sort_rows(new);
    let diff = diff_sorted(old, new);

    let added_or_modified: BTreeSet<RecordId> =
        diff.added.iter().filter_map(|row| row_id(row)).collect();
    let removed = diff
        .removed
        .iter()
        .filter_map(|row| row_id(row))
        .filter(|id| !added_or_modified.contains(id))
        .collect();

    ChangeSet {
        added_or_modified,
        removed,
    }
}
