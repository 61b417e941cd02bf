//! Error types for catalog-mirror operations

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MirrorError>;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Walkdir error: {0}")]
    WalkDir(#[from] walkdir::Error),

    #[error("Decode error in table `{table}`: {message}")]
    Decode { table: String, message: String },

    #[error("Schema mismatch in table `{table}`: {message}")]
    SchemaMismatch { table: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Record service error: {message}")]
    Service { message: String },

    #[error("Record {table}/{id}: {source}")]
    Record {
        table: String,
        id: u64,
        #[source]
        source: Box<MirrorError>,
    },

    #[error("Snapshot store has uncommitted changes: {path}")]
    DirtyStore { path: PathBuf },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Generic error: {0}")]
    Generic(#[from] anyhow::Error),
}

impl MirrorError {
    pub fn decode(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            table: table.into(),
            message: msg.into(),
        }
    }

    pub fn schema_mismatch(table: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            table: table.into(),
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn service(msg: impl Into<String>) -> Self {
        Self::Service {
            message: msg.into(),
        }
    }

    /// Attach the table and identifier a failure happened on
    pub fn record(table: impl Into<String>, id: u64, source: MirrorError) -> Self {
        Self::Record {
            table: table.into(),
            id,
            source: Box::new(source),
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: msg.into(),
        }
    }
}
