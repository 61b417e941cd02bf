//! Command execution for the catalog-mirror CLI

use crate::cli::{Cli, OutputFormat};
use crate::config::MirrorConfig;
use crate::dump::DumpPair;
use crate::error::{MirrorError, Result};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::pipeline::{Mirror, RunSummary};
use crate::progress::ProgressReporter;
use crate::service::HttpRecordService;
use crate::store::GitStore;

/// Resolve configuration from file, environment and flags
pub fn build_config(cli: &Cli) -> Result<MirrorConfig> {
    let mut config = MirrorConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(dir) = &cli.dump_dir {
        config.dump_dir = Some(dir.clone());
    }
    if cli.push {
        config.push = true;
    }
    config.restrict_tables(&cli.tables)?;
    config.validate()?;
    Ok(config)
}

/// Pick the dump pair from explicit paths or the dump directory
pub fn resolve_dumps(cli: &Cli, config: &MirrorConfig) -> Result<DumpPair> {
    match (&cli.old, &cli.new, &config.dump_dir) {
        (Some(old), Some(new), _) => Ok(DumpPair::new(old.clone(), new.clone())),
        (_, _, Some(dir)) => DumpPair::latest_in(dir),
        _ => Err(MirrorError::invalid_input(
            "incremental mode needs --old/--new or a dump directory (--dump-dir or MYSQLDUMP_DIR)",
        )),
    }
}

/// Execute a run described by the command line
pub fn execute(cli: &Cli) -> Result<()> {
    let format = OutputFormat::parse(&cli.format).map_err(MirrorError::invalid_input)?;
    let config = build_config(cli)?;

    // Fail on a dirty store before logging in anywhere
    let mut store = if cli.baseline {
        None
    } else {
        let store = GitStore::open(&config.output_dir)?;
        crate::store::ensure_clean(&store, &config.output_dir)?;
        Some(store)
    };

    let service = HttpRecordService::login(&config.service)?;
    let progress = if cli.no_progress || format == OutputFormat::Json {
        ProgressReporter::new_minimal()
    } else {
        ProgressReporter::new()
    };
    let mut mirror = Mirror::new(&config, &service).with_progress(progress);

    let summary = match store.as_mut() {
        None => mirror.run_baseline()?,
        Some(store) => {
            let dumps = resolve_dumps(cli, &config)?;
            log::info!("Comparing {} -> {}", dumps.old.display(), dumps.new.display());
            mirror.run_incremental(store, &dumps)?
        }
    };

    print_summary(&summary, &format)
}

fn print_summary(summary: &RunSummary, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Pretty => PrettyPrinter::print_run_summary(summary),
        OutputFormat::Json => println!("{}", JsonFormatter::format(summary)?),
    }
    Ok(())
}
