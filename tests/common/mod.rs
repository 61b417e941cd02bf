//! Common test utilities and helpers

use catalog_mirror::config::{MirrorConfig, TableSchema};
use catalog_mirror::dump::DumpPair;
use catalog_mirror::error::{MirrorError, Result};
use catalog_mirror::service::RecordService;
use catalog_mirror::store::GitStore;
use catalog_mirror::RecordId;
use flate2::write::GzEncoder;
use flate2::Compression;
use git2::{IndexAddOption, Repository, Signature};
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test layout of the `subject` table:
/// id, lock_version, title, system_mtime, last_modified_by
pub fn subject_schema() -> TableSchema {
    TableSchema::new("subjects", 5, 1, 3)
}

/// One `subject` row as it appears in a dump
pub struct SubjectRow<'a> {
    pub id: RecordId,
    pub lock_version: u32,
    pub title: &'a str,
    pub editor: &'a str,
}

pub fn subject<'a>(
    id: RecordId,
    lock_version: u32,
    title: &'a str,
    editor: &'a str,
) -> SubjectRow<'a> {
    SubjectRow {
        id,
        lock_version,
        title,
        editor,
    }
}

/// Build an extended insert statement for the `subject` table
pub fn subject_insert(rows: &[SubjectRow<'_>]) -> String {
    let tuples: Vec<String> = rows
        .iter()
        .map(|row| {
            format!(
                "({},{},'{}','2021-05-0{} 10:00:00','{}')",
                row.id,
                row.lock_version,
                row.title.replace('\\', "\\\\").replace('\'', "\\'"),
                row.lock_version % 10,
                row.editor
            )
        })
        .collect();
    format!("INSERT INTO `subject` VALUES {};", tuples.join(","))
}

/// In-memory record service keyed by endpoint and id
#[derive(Default)]
pub struct FakeRecordService {
    records: HashMap<String, BTreeMap<RecordId, Value>>,
    pub fetched: RefCell<Vec<(String, RecordId)>>,
}

impl FakeRecordService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, endpoint: &str, id: RecordId, record: Value) -> Self {
        self.records.entry(endpoint.to_string()).or_default().insert(id, record);
        self
    }

    pub fn fetched_ids(&self) -> Vec<RecordId> {
        self.fetched.borrow().iter().map(|(_, id)| *id).collect()
    }
}

impl RecordService for FakeRecordService {
    fn list_ids(&self, endpoint: &str) -> Result<Vec<RecordId>> {
        Ok(self
            .records
            .get(endpoint)
            .map(|records| records.keys().copied().collect())
            .unwrap_or_default())
    }

    fn fetch(&self, endpoint: &str, id: RecordId) -> Result<Value> {
        self.fetched.borrow_mut().push((endpoint.to_string(), id));
        self.records
            .get(endpoint)
            .and_then(|records| records.get(&id))
            .cloned()
            .ok_or_else(|| {
                MirrorError::service(format!("/{}/{} returned 404 Not Found", endpoint, id))
            })
    }
}

/// Temporary snapshot store (a git repository with one initial commit) plus
/// a dump directory
pub struct MirrorFixture {
    pub temp_dir: TempDir,
    pub store_root: PathBuf,
    pub dump_dir: PathBuf,
    pub config: MirrorConfig,
}

impl MirrorFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let store_root = temp_dir.path().join("store");
        let dump_dir = temp_dir.path().join("dumps");
        fs::create_dir_all(&store_root).unwrap();
        fs::create_dir_all(&dump_dir).unwrap();
        Repository::init(&store_root).unwrap();

        let mut tables = IndexMap::new();
        tables.insert("subject".to_string(), subject_schema());
        let config = MirrorConfig {
            output_dir: store_root.clone(),
            dump_dir: Some(dump_dir.clone()),
            volunteers: vec!["vera".to_string()],
            tables,
            ..MirrorConfig::default()
        };

        let fixture = Self {
            temp_dir,
            store_root,
            dump_dir,
            config,
        };
        fixture.write_file("README.md", "Catalog mirror\n");
        fixture.commit_everything("initial");
        fixture
    }

    pub fn store(&self) -> GitStore {
        GitStore::open(&self.store_root).unwrap()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.store_root.join(relative)
    }

    pub fn write_file(&self, relative: &str, content: &str) {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Stage every change in the working tree and commit it
    pub fn commit_everything(&self, message: &str) {
        let repo = Repository::open(&self.store_root).unwrap();
        let mut index = repo.index().unwrap();
        index.add_all(["*"], IndexAddOption::DEFAULT, None).unwrap();
        index.update_all(["*"], None).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();

        let parents: Vec<git2::Commit<'_>> = repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .and_then(|oid| repo.find_commit(oid).ok())
            .into_iter()
            .collect();
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, parent_refs.as_slice())
            .unwrap();
    }

    /// Write a gzip-compressed dump made of the given lines
    pub fn write_dump(&self, name: &str, lines: &[String]) -> PathBuf {
        let path = self.dump_dir.join(name);
        let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::default());
        writeln!(encoder, "-- MySQL dump 10.13").unwrap();
        writeln!(encoder, "DROP TABLE IF EXISTS `subject`;").unwrap();
        for line in lines {
            writeln!(encoder, "{}", line).unwrap();
        }
        encoder.finish().unwrap();
        path
    }

    pub fn dump_pair(&self, old: &[String], new: &[String]) -> DumpPair {
        DumpPair::new(
            self.write_dump("archivesspace-2021-05-02.sql.gz", old),
            self.write_dump("archivesspace-2021-05-03.sql.gz", new),
        )
    }

    pub fn commit_count(&self) -> usize {
        let repo = Repository::open(&self.store_root).unwrap();
        let mut walk = repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.count()
    }

    /// Commit messages, newest first
    pub fn commit_messages(&self) -> Vec<String> {
        let repo = Repository::open(&self.store_root).unwrap();
        let mut walk = repo.revwalk().unwrap();
        walk.push_head().unwrap();
        walk.map(|oid| {
            repo.find_commit(oid.unwrap())
                .unwrap()
                .message()
                .unwrap_or_default()
                .to_string()
        })
        .collect()
    }

    /// Whether a path is present in the HEAD tree
    pub fn committed(&self, relative: &str) -> bool {
        let repo = Repository::open(&self.store_root).unwrap();
        let tree = repo.head().unwrap().peel_to_tree().unwrap();
        tree.get_path(Path::new(relative)).is_ok()
    }

    /// Register an empty bare repository as `origin`
    pub fn add_bare_origin(&self) -> PathBuf {
        let origin = self.temp_dir.path().join("origin.git");
        Repository::init_bare(&origin).unwrap();
        let repo = Repository::open(&self.store_root).unwrap();
        repo.remote("origin", origin.to_str().unwrap()).unwrap();
        origin
    }

    pub fn head_id(&self) -> Option<String> {
        let repo = Repository::open(&self.store_root).unwrap();
        let head = repo.head().unwrap();
        head.target().map(|oid| oid.to_string())
    }

    /// Commit id of the store's current branch in a bare remote
    pub fn origin_head(&self, origin: &Path) -> Option<String> {
        let repo = Repository::open(&self.store_root).unwrap();
        let branch = repo.head().unwrap().shorthand().unwrap().to_string();
        let remote = Repository::open_bare(origin).unwrap();
        let reference = remote.find_reference(&format!("refs/heads/{}", branch)).ok()?;
        reference.target().map(|oid| oid.to_string())
    }

    pub fn read_json(&self, relative: &str) -> Value {
        serde_json::from_str(&fs::read_to_string(self.path(relative)).unwrap()).unwrap()
    }
}

impl Default for MirrorFixture {
    fn default() -> Self {
        Self::new()
    }
}
