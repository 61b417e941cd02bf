//! Snapshot store layout, record persistence and commit batching

use crate::diff::RecordId;
use crate::error::Result;
use crate::normalize::AttributionClass;
use crate::store::VersionStore;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Serializer, Value};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Longest slug kept in a file name, in UTF-8 bytes, leaving room for the id
/// prefix and extension under a 255-byte name limit
pub const MAX_SLUG_BYTES: usize = 240;

/// Filesystem-safe slug for a record label.
///
/// Non-alphanumeric characters become `_`. Archivist slugs are lowercased when
/// `lowercase_archivist` is set so case-only renames do not churn the store;
/// volunteer slugs keep their case.
pub fn make_slug(label: &str, class: AttributionClass, lowercase_archivist: bool) -> String {
    let safe: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect();
    let cased = if class == AttributionClass::Archivist && lowercase_archivist {
        safe.to_lowercase()
    } else {
        safe
    };
    truncate_bytes(&cased, MAX_SLUG_BYTES)
        .trim_end_matches('_')
        .to_string()
}

/// Longest prefix of `s` that fits in `max` bytes and ends on a char boundary
fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// One record ready to be written to the store
#[derive(Debug, Clone, PartialEq)]
pub struct ExportUnit {
    pub table: String,
    pub id: RecordId,
    pub slug: String,
    pub json: Value,
}

impl ExportUnit {
    pub fn file_name(&self) -> String {
        format!("{}-{}.json", self.id, self.slug)
    }

    /// Path relative to the store root
    pub fn relative_path(&self) -> PathBuf {
        Path::new(&self.table).join(self.file_name())
    }
}

/// Result of persisting one export unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenArtifact {
    pub path: PathBuf,
    /// Older files for the same id under a different slug, now deleted
    pub stale: Vec<PathBuf>,
    /// The file already held exactly these bytes and was left alone
    pub unchanged: bool,
}

/// Serialize JSON the way the store keeps it: 4-space indent, sorted keys,
/// trailing newline
pub fn to_store_json(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut serializer =
        Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    sort_keys(value).serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, item)| (key.clone(), sort_keys(item)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        scalar => scalar.clone(),
    }
}

/// Writes export units beneath the snapshot store root
#[derive(Debug, Clone)]
pub struct StoreWriter {
    root: PathBuf,
}

impl StoreWriter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files in a table's directory that belong to `id`, relative to the root
    pub fn find_artifacts(&self, table: &str, id: RecordId) -> Result<Vec<PathBuf>> {
        let dir = self.root.join(table);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let prefix = format!("{}-", id);
        let mut found = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(&prefix) {
                found.push(Path::new(table).join(name));
            }
        }
        found.sort();
        Ok(found)
    }

    /// Delete a file given relative to the root
    pub fn remove(&self, relative: &Path) -> Result<()> {
        fs::remove_file(self.root.join(relative))?;
        Ok(())
    }

    /// Atomically write an export unit, deleting older files for the same id.
    /// A file whose content would not change is not rewritten.
    pub fn write(&self, unit: &ExportUnit) -> Result<WrittenArtifact> {
        let relative = unit.relative_path();
        let target = self.root.join(&relative);
        let dir = self.root.join(&unit.table);
        fs::create_dir_all(&dir)?;

        let bytes = to_store_json(&unit.json)?;
        let unchanged = match fs::read(&target) {
            Ok(existing) => existing == bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if !unchanged {
            let mut file = NamedTempFile::new_in(&dir)?;
            file.write_all(&bytes)?;
            file.as_file().sync_all()?;
            file.persist(&target).map_err(|e| e.error)?;
        }

        let mut stale = Vec::new();
        for existing in self.find_artifacts(&unit.table, unit.id)? {
            if existing != relative {
                self.remove(&existing)?;
                log::debug!("Removed stale artifact {}", existing.display());
                stale.push(existing);
            }
        }

        Ok(WrittenArtifact {
            path: relative,
            stale,
            unchanged,
        })
    }
}

/// Category of a commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    Archivist,
    Deletions,
    Volunteer,
}

impl BatchKind {
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Archivist => "archivist changes",
            Self::Deletions => "deletions",
            Self::Volunteer => "volunteer changes",
        }
    }

    pub fn commit_message(&self, dump_label: &str) -> String {
        format!("{} [{}]", self.describe(), dump_label)
    }
}

/// Paths staged together in one commit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl Batch {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.added.len() + self.removed.len()
    }
}

/// What happened to one batch at commit time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitOutcome {
    pub kind: BatchKind,
    pub paths: usize,
    /// New commit id, or `None` when the batch left the tree unchanged
    pub commit: Option<String>,
}

/// The three disjoint batches of one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeBatches {
    pub archivist: Batch,
    pub volunteer: Batch,
    pub deletions: Batch,
}

impl ChangeBatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// File a written artifact under its attribution class. An unchanged file
    /// is only routed for its stale removals.
    pub fn route(&mut self, class: AttributionClass, artifact: WrittenArtifact) {
        let batch = match class {
            AttributionClass::Archivist => &mut self.archivist,
            AttributionClass::Volunteer => &mut self.volunteer,
        };
        if !artifact.unchanged {
            batch.added.push(artifact.path);
        }
        batch.removed.extend(artifact.stale);
    }

    pub fn record_removals(&mut self, paths: impl IntoIterator<Item = PathBuf>) {
        self.deletions.removed.extend(paths);
    }

    /// Extra file committed with the deletions, such as the audit ledger
    pub fn record_deletion_note(&mut self, path: PathBuf) {
        if !self.deletions.added.contains(&path) {
            self.deletions.added.push(path);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.archivist.is_empty() && self.volunteer.is_empty() && self.deletions.is_empty()
    }

    /// Stage and commit each batch in order: archivist, deletions, volunteer.
    /// A batch that leaves the tree unchanged produces no commit.
    pub fn commit_all(
        &self,
        store: &mut dyn VersionStore,
        dump_label: &str,
    ) -> Result<Vec<CommitOutcome>> {
        let ordered = [
            (BatchKind::Archivist, &self.archivist),
            (BatchKind::Deletions, &self.deletions),
            (BatchKind::Volunteer, &self.volunteer),
        ];

        let mut outcomes = Vec::new();
        for (kind, batch) in ordered {
            store.stage_remove(&batch.removed)?;
            store.stage_add(&batch.added)?;

            let commit = if store.has_staged_changes()? {
                let id = store.commit(&kind.commit_message(dump_label))?;
                log::info!("{} detected; committed {}", kind.describe(), id);
                Some(id)
            } else {
                log::info!("no {} detected", kind.describe());
                None
            };
            outcomes.push(CommitOutcome {
                kind,
                paths: batch.len(),
                commit,
            });
        }
        Ok(outcomes)
    }
}
