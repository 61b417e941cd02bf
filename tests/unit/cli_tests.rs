//! Unit tests for CLI parsing and configuration resolution

use catalog_mirror::cli::Cli;
use catalog_mirror::commands::{build_config, resolve_dumps};
use catalog_mirror::error::MirrorError;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[test]
fn test_baseline_flag() {
    let cli = Cli::try_parse_from(["catalog-mirror", "-i"]).unwrap();
    assert!(cli.baseline);

    let cli = Cli::try_parse_from(["catalog-mirror", "--baseline"]).unwrap();
    assert!(cli.baseline);
}

#[test]
fn test_old_requires_new() {
    assert!(Cli::try_parse_from(["catalog-mirror", "--old", "a.sql.gz"]).is_err());
    assert!(Cli::try_parse_from(["catalog-mirror", "--new", "b.sql.gz"]).is_err());
}

#[test]
fn test_tables_are_comma_separated() {
    let cli = Cli::try_parse_from(["catalog-mirror", "--tables", "subject,agent_person"]).unwrap();
    assert_eq!(cli.tables, vec!["subject", "agent_person"]);
}

#[test]
fn test_flags_override_config_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("mirror.json");
    fs::write(
        &config_path,
        r#"{ "output_dir": "/srv/from-file", "volunteers": ["vera"], "push": false }"#,
    )
    .unwrap();

    let cli = Cli::try_parse_from([
        "catalog-mirror",
        "--config",
        config_path.to_str().unwrap(),
        "--output-dir",
        "/srv/from-flag",
        "--tables",
        "subject",
        "--push",
    ])
    .unwrap();
    let config = build_config(&cli).unwrap();

    assert_eq!(config.output_dir, PathBuf::from("/srv/from-flag"));
    assert_eq!(config.volunteers, vec!["vera"]);
    assert!(config.push);
    assert_eq!(config.tables.keys().collect::<Vec<_>>(), vec!["subject"]);
}

#[test]
fn test_unknown_table_is_rejected() {
    let cli = Cli::try_parse_from(["catalog-mirror", "--tables", "accession"]).unwrap();
    assert!(matches!(build_config(&cli), Err(MirrorError::Config { .. })));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let cli =
        Cli::try_parse_from(["catalog-mirror", "--config", "/nonexistent/mirror.json"]).unwrap();
    assert!(build_config(&cli).is_err());
}

#[test]
fn test_dump_directory_supplies_the_pair() {
    let temp_dir = TempDir::new().unwrap();
    let dir = temp_dir.path().to_str().unwrap().to_string();
    for name in ["a.sql.gz", "b.sql.gz"] {
        fs::write(temp_dir.path().join(name), "").unwrap();
    }

    let cli = Cli::try_parse_from(["catalog-mirror", "--dump-dir", &dir]).unwrap();
    let config = build_config(&cli).unwrap();
    let dumps = resolve_dumps(&cli, &config).unwrap();
    assert_ne!(dumps.old, dumps.new);
}
