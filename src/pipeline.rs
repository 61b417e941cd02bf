//! Baseline and incremental mirror runs

use crate::config::{MirrorConfig, TableSchema};
use crate::deletion::{AuditLedger, DeletionResolver};
use crate::diff::{diff_snapshots, RecordId};
use crate::dump::{decode_dump, DumpPair};
use crate::error::{MirrorError, Result};
use crate::normalize::{AttributionClass, Normalizer};
use crate::progress::ProgressReporter;
use crate::prune::prune_rows;
use crate::scratch::{ScratchArea, Side};
use crate::service::RecordService;
use crate::store::{ensure_clean, VersionStore};
use crate::writer::{
    make_slug, ChangeBatches, CommitOutcome, ExportUnit, StoreWriter, WrittenArtifact,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Baseline,
    Incremental,
}

/// Per-table counts for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub added_or_modified: usize,
    pub removed: usize,
    pub archivist: usize,
    pub volunteer: usize,
    /// Records fetched without a usable label
    pub skipped: usize,
    pub audited: usize,
}

impl TableSummary {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub mode: RunMode,
    pub dump_label: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub tables: Vec<TableSummary>,
    pub commits: Vec<CommitOutcome>,
    pub pushed: bool,
}

impl RunSummary {
    pub fn commit_count(&self) -> usize {
        self.commits.iter().filter(|c| c.commit.is_some()).count()
    }
}

/// One mirror run against a record service and snapshot store
pub struct Mirror<'a> {
    config: &'a MirrorConfig,
    service: &'a dyn RecordService,
    normalizer: Normalizer,
    writer: StoreWriter,
    ledger: AuditLedger,
    progress: ProgressReporter,
}

impl<'a> Mirror<'a> {
    pub fn new(config: &'a MirrorConfig, service: &'a dyn RecordService) -> Self {
        Self {
            config,
            service,
            normalizer: Normalizer::new(config.volunteer_roster()),
            writer: StoreWriter::new(config.output_dir.clone()),
            ledger: AuditLedger::new(config.ledger_path()),
            progress: ProgressReporter::new_minimal(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    /// Fetch, classify, normalize and write one record. Returns `None` when
    /// the record has no label and was skipped.
    fn export_record(
        &self,
        table: &str,
        schema: &TableSchema,
        id: RecordId,
    ) -> Result<Option<(AttributionClass, WrittenArtifact)>> {
        let record = self
            .service
            .fetch(&schema.endpoint, id)
            .map_err(|e| MirrorError::record(table, id, e))?;

        let Some(normalized) = self.normalizer.normalize(&record) else {
            log::warn!("{}/{}: missing title & display_string", table, id);
            return Ok(None);
        };

        let unit = ExportUnit {
            table: table.to_string(),
            id,
            slug: make_slug(
                &normalized.label,
                normalized.class,
                self.config.lowercase_archivist_slugs,
            ),
            json: normalized.json,
        };
        let artifact = self
            .writer
            .write(&unit)
            .map_err(|e| MirrorError::record(table, id, e))?;
        log::debug!("{} {}", normalized.class, artifact.path.display());

        Ok(Some((normalized.class, artifact)))
    }

    fn export_ids<'i>(
        &mut self,
        table: &str,
        schema: &TableSchema,
        ids: impl ExactSizeIterator<Item = &'i RecordId>,
        batches: &mut ChangeBatches,
        summary: &mut TableSummary,
    ) -> Result<()> {
        self.progress.start_fetch(table, ids.len() as u64);
        for &id in ids {
            match self.export_record(table, schema, id)? {
                Some((class, artifact)) => {
                    match class {
                        AttributionClass::Archivist => summary.archivist += 1,
                        AttributionClass::Volunteer => summary.volunteer += 1,
                    }
                    batches.route(class, artifact);
                }
                None => summary.skipped += 1,
            }
            self.progress.inc_fetch();
        }
        self.progress.finish_fetch(&format!(
            "{}: {} archivist, {} volunteer, {} skipped",
            table, summary.archivist, summary.volunteer, summary.skipped
        ));
        Ok(())
    }

    /// Export every known record of every table. Nothing is committed.
    pub fn run_baseline(&mut self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let config = self.config;

        fs::create_dir_all(&config.output_dir)?;
        self.ledger.touch()?;

        let mut batches = ChangeBatches::new();
        let mut tables = Vec::new();
        for (table, schema) in &config.tables {
            log::info!("{}: listing identifiers", table);
            let ids = self.service.list_ids(&schema.endpoint)?;
            log::info!("{}: {} identifiers", table, ids.len());

            let mut summary = TableSummary::new(table);
            summary.added_or_modified = ids.len();
            self.export_ids(table, schema, ids.iter(), &mut batches, &mut summary)?;
            tables.push(summary);
        }

        Ok(RunSummary {
            mode: RunMode::Baseline,
            dump_label: None,
            started_at,
            finished_at: Utc::now(),
            tables,
            commits: Vec::new(),
            pushed: false,
        })
    }

    /// Diff a dump pair, refresh changed records and commit the results
    pub fn run_incremental(
        &mut self,
        store: &mut dyn VersionStore,
        dumps: &DumpPair,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        let config = self.config;

        ensure_clean(&*store, &config.output_dir)?;

        let scratch = ScratchArea::new()?;
        for (side, path) in [(Side::Old, &dumps.old), (Side::New, &dumps.new)] {
            self.progress.start_decode(&format!("Decoding {} dump {}", side, path.display()));
            let counts = decode_dump(path, &config.tables, &scratch, side)?;
            self.progress.finish_decode(&format!("Decoded {} dump", side));
            log::info!("{} dump {}: {:?}", side, path.display(), counts);
        }

        let audit_roster = config.audit_roster();
        let mut batches = ChangeBatches::new();
        let mut tables = Vec::new();
        let mut audited_any = false;

        for (table, schema) in &config.tables {
            let mut old = prune_rows(table, schema, scratch.load_rows(Side::Old, table)?)?;
            let mut new = prune_rows(table, schema, scratch.load_rows(Side::New, table)?)?;
            let changes = diff_snapshots(&mut old, &mut new);
            drop(new);
            log::info!(
                "{}: {} added or modified, {} removed",
                table,
                changes.added_or_modified.len(),
                changes.removed.len()
            );

            let mut summary = TableSummary::new(table);
            summary.added_or_modified = changes.added_or_modified.len();
            summary.removed = changes.removed.len();

            let report = DeletionResolver::new(&self.writer, &self.ledger, &audit_roster).resolve(
                table,
                schema,
                &changes.removed,
                &old,
            )?;
            summary.audited = report.audited;
            audited_any |= report.audited > 0;
            batches.record_removals(report.removed_paths);

            self.export_ids(
                table,
                schema,
                changes.added_or_modified.iter(),
                &mut batches,
                &mut summary,
            )?;
            tables.push(summary);
        }
        drop(scratch);

        if audited_any {
            batches.record_deletion_note(PathBuf::from(&config.ledger_file));
        }

        let label = dumps.label();
        let commits = batches.commit_all(store, &label)?;

        let mut pushed = false;
        if config.push && commits.iter().any(|c| c.commit.is_some()) {
            if let Err(e) = store.push() {
                log::error!("Commits for [{}] are in place locally but were not pushed", label);
                return Err(e);
            }
            pushed = true;
        }

        Ok(RunSummary {
            mode: RunMode::Incremental,
            dump_label: Some(label),
            started_at,
            finished_at: Utc::now(),
            tables,
            commits,
            pushed,
        })
    }
}
