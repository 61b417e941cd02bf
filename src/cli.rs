//! Command-line interface for catalog-mirror

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "catalog-mirror")]
#[command(about = "Mirror an archival-records catalog into a version-controlled JSON tree")]
#[command(version)]
pub struct Cli {
    /// Export every known record without diffing dumps (initial export)
    #[arg(short = 'i', long)]
    pub baseline: bool,

    /// JSON configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Snapshot store root (overrides configuration)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Directory holding dated dump files; the two newest are compared
    #[arg(long)]
    pub dump_dir: Option<PathBuf>,

    /// Older dump file
    #[arg(long, requires = "new")]
    pub old: Option<PathBuf>,

    /// Newer dump file
    #[arg(long, requires = "old")]
    pub new: Option<PathBuf>,

    /// Only mirror these tables (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub tables: Vec<String>,

    /// Push to the `origin` remote after committing
    #[arg(long)]
    pub push: bool,

    /// Output format: "pretty", "json"
    #[arg(long, default_value = "pretty")]
    pub format: String,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse output format string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}
