//! Output formatting utilities

use crate::error::Result;
use crate::pipeline::{RunMode, RunSummary};

/// Pretty printer for run results
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print the outcome of a mirror run
    pub fn print_run_summary(summary: &RunSummary) {
        match &summary.dump_label {
            Some(label) => println!("🔄 Mirror run [{}]", label),
            None => println!("📦 Baseline export"),
        }
        println!("├─ Started: {}", summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("├─ Finished: {}", summary.finished_at.format("%Y-%m-%d %H:%M:%S UTC"));

        println!("├─ Tables:");
        for (i, table) in summary.tables.iter().enumerate() {
            let prefix = if i == summary.tables.len() - 1 { "│  └─" } else { "│  ├─" };
            println!(
                "{} {}: {} changed, {} removed, {} archivist, {} volunteer, {} skipped",
                prefix,
                table.table,
                table.added_or_modified,
                table.removed,
                table.archivist,
                table.volunteer,
                table.skipped
            );
        }

        if summary.mode == RunMode::Baseline {
            println!("└─ ✅ Baseline files generated; add & commit them to the repository");
            return;
        }

        println!("└─ Commits:");
        for (i, outcome) in summary.commits.iter().enumerate() {
            let prefix = if i == summary.commits.len() - 1 { "   └─" } else { "   ├─" };
            match &outcome.commit {
                Some(id) => println!(
                    "{} ✅ {}: {} ({} paths)",
                    prefix,
                    outcome.kind.describe(),
                    short_id(id),
                    outcome.paths
                ),
                None => println!("{} no {} detected", prefix, outcome.kind.describe()),
            }
        }
        if summary.pushed {
            println!("⬆️  Pushed to origin");
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }
}

fn short_id(id: &str) -> &str {
    id.get(..10).unwrap_or(id)
}
