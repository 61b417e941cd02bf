//! Run configuration: rosters, locations, record service and table schemas

use crate::error::{MirrorError, Result};
use anyhow::Context;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default name of the append-only deletion ledger at the store root
pub const DEFAULT_LEDGER_FILE: &str = "deleted_records.csv";

/// Column layout of one catalog table and where its records live on the
/// record service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Endpoint path without leading or trailing slashes
    pub endpoint: String,
    pub total_columns: usize,
    /// Monotonic version counter column
    pub lock_version_column: usize,
    /// System write timestamp column
    pub system_mtime_column: usize,
    /// Column holding the last editor, in the unpruned row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by_column: Option<usize>,
}

impl TableSchema {
    pub fn new(
        endpoint: &str,
        total_columns: usize,
        lock_version_column: usize,
        system_mtime_column: usize,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            total_columns,
            lock_version_column,
            system_mtime_column,
            last_modified_by_column: None,
        }
    }

    /// Volatile column indices, highest first
    pub fn volatile_columns(&self) -> [usize; 2] {
        let (a, b) = (self.lock_version_column, self.system_mtime_column);
        if a > b {
            [a, b]
        } else {
            [b, a]
        }
    }

    /// Where an unpruned column index lands after pruning, if it survives
    pub fn pruned_index(&self, column: usize) -> Option<usize> {
        let volatile = self.volatile_columns();
        if volatile.contains(&column) {
            return None;
        }
        Some(column - volatile.iter().filter(|&&v| v < column).count())
    }

    pub fn validate(&self, table: &str) -> Result<()> {
        let fail = |msg: String| Err(MirrorError::config(format!("table `{}`: {}", table, msg)));

        if self.endpoint.is_empty() {
            return fail("endpoint must not be empty".to_string());
        }
        if self.endpoint.starts_with('/') || self.endpoint.ends_with('/') {
            return fail(format!("endpoint `{}` must not start or end with '/'", self.endpoint));
        }
        if self.lock_version_column == self.system_mtime_column {
            return fail("volatile columns must be distinct".to_string());
        }
        for (name, column) in [
            ("lock_version_column", self.lock_version_column),
            ("system_mtime_column", self.system_mtime_column),
        ] {
            if column == 0 {
                return fail(format!("{} cannot be the identifier column", name));
            }
            if column >= self.total_columns {
                return fail(format!(
                    "{} {} is out of range for {} columns",
                    name, column, self.total_columns
                ));
            }
        }
        if let Some(column) = self.last_modified_by_column {
            if column >= self.total_columns || self.volatile_columns().contains(&column) {
                return fail(format!("last_modified_by_column {} is not a kept column", column));
            }
        }
        Ok(())
    }
}

/// Tables mirrored when the configuration names none
pub fn default_tables() -> IndexMap<String, TableSchema> {
    let mut tables = IndexMap::new();
    tables.insert(
        "agent_corporate_entity".to_string(),
        TableSchema::new("agents/corporate_entities", 12, 1, 7),
    );
    tables.insert("agent_person".to_string(), TableSchema::new("agents/people", 12, 1, 7));
    tables.insert(
        "archival_object".to_string(),
        TableSchema::new("repositories/2/archival_objects", 27, 1, 21),
    );
    tables.insert(
        "resource".to_string(),
        TableSchema::new("repositories/2/resources", 40, 1, 30),
    );
    tables.insert("subject".to_string(), TableSchema::new("subjects", 16, 1, 12));
    tables
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8089".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Root of the version-controlled snapshot store
    pub output_dir: PathBuf,
    pub dump_dir: Option<PathBuf>,
    pub volunteers: Vec<String>,
    /// Actors whose deletions are written to the ledger; defaults to `volunteers`
    pub audited_actors: Option<Vec<String>>,
    pub ledger_file: String,
    pub lowercase_archivist_slugs: bool,
    pub push: bool,
    pub service: ServiceConfig,
    pub tables: IndexMap<String, TableSchema>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            dump_dir: None,
            volunteers: Vec::new(),
            audited_actors: None,
            ledger_file: DEFAULT_LEDGER_FILE.to_string(),
            lowercase_archivist_slugs: true,
            push: false,
            service: ServiceConfig::default(),
            tables: default_tables(),
        }
    }
}

impl MirrorConfig {
    /// Load from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path)
                    .with_context(|| format!("reading config file {}", path.display()))?;
                serde_json::from_str::<Self>(&content)
                    .with_context(|| format!("parsing config file {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in production)
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("GIT_REPOSITORY") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("MYSQLDUMP_DIR") {
            self.dump_dir = Some(PathBuf::from(dir));
        }
        if let Some(list) = lookup("VOLUNTEERS") {
            self.volunteers = split_list(&list);
        }
        if let Some(list) = lookup("AUDITED_ACTORS") {
            self.audited_actors = Some(split_list(&list));
        }
        if let Some(url) = lookup("ASPACE_BASEURL") {
            self.service.base_url = url;
        }
        if let Some(user) = lookup("ASPACE_USERNAME") {
            self.service.username = user;
        }
        if let Some(password) = lookup("ASPACE_PASSWORD") {
            self.service.password = password;
        }
    }

    /// Keep only the named tables, in configured order
    pub fn restrict_tables(&mut self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        for name in names {
            if !self.tables.contains_key(name) {
                return Err(MirrorError::config(format!("unknown table `{}`", name)));
            }
        }
        self.tables.retain(|table, _| names.contains(table));
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(MirrorError::config("no tables configured"));
        }
        if self.ledger_file.is_empty() || self.ledger_file.contains('/') {
            return Err(MirrorError::config(format!(
                "ledger_file `{}` must be a plain file name",
                self.ledger_file
            )));
        }
        for (table, schema) in &self.tables {
            schema.validate(table)?;
        }
        Ok(())
    }

    pub fn volunteer_roster(&self) -> HashSet<String> {
        self.volunteers.iter().cloned().collect()
    }

    pub fn audit_roster(&self) -> HashSet<String> {
        self.audited_actors
            .as_ref()
            .unwrap_or(&self.volunteers)
            .iter()
            .cloned()
            .collect()
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.output_dir.join(&self.ledger_file)
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
