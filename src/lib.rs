//! # catalog-mirror
//!
//! Mirrors an archival-records catalog into a version-controlled tree of JSON
//! files, one per record. Two database dumps are compared to find changed
//! records, only those are re-fetched from the record service, and the
//! results are committed in separate batches for archivist edits, volunteer
//! edits and deletions.

pub mod cli;
pub mod commands;
pub mod config;
pub mod deletion;
pub mod diff;
pub mod dump;
pub mod error;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prune;
pub mod scratch;
pub mod service;
pub mod store;
pub mod writer;

pub use config::{MirrorConfig, TableSchema};
pub use diff::{ChangeSet, RecordId};
pub use error::{MirrorError, Result};
pub use pipeline::{Mirror, RunSummary};
