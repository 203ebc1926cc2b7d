mod commands;
mod logging;
mod progress;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use progress::CliReporter;
use totalfiles_core::config::load_configuration_from;
use totalfiles_core::platform::normalize_path;
use totalfiles_core::storage::Database;
use totalfiles_core::{AppConfig, CatalogEngine, CollectionConfig, FileRecord, RunSummary};
use tracing::{error, info, warn};

fn main() -> ExitCode {
    dotenv().ok();

    let _guard = logging::init_logger();

    let args = Cli::parse();

    let config = match load_configuration_from(&args.config) {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let result = match args.command {
        Some(Commands::Process { table }) => run_process(&config, table.as_deref()),
        Some(Commands::Hash { paths }) => run_hash(&config, &paths),
        Some(Commands::Collections) => run_collections(&config),
        Some(Commands::AddCollection {
            catalog,
            root,
            table,
            backup_table,
        }) => run_add_collection(&config, catalog, &root, table, backup_table),
        Some(Commands::Lookup { digest, table }) => run_lookup(&config, &digest, &table),
        Some(Commands::Export { table, output }) => run_export(&config, &table, &output),
        Some(Commands::PrintConfig) => {
            println!("Configuration: {:#?}", config);
            Ok(ExitCode::SUCCESS)
        }
        None => {
            let _ = Cli::command().print_long_help();
            Ok(ExitCode::SUCCESS)
        }
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn open_database(config: &AppConfig) -> anyhow::Result<Database> {
    Database::open_url(&config.database_url)
        .with_context(|| format!("Cannot open catalog database '{}'", config.database_url))
}

fn run_process(config: &AppConfig, table: Option<&str>) -> anyhow::Result<ExitCode> {
    let engine = CatalogEngine::new(config.clone())?;

    let cancel = engine.cancel_token();
    ctrlc::set_handler(move || {
        warn!("Received Ctrl+C, stopping after the current file...");
        cancel.store(true, Ordering::SeqCst);
    })?;

    let reporter = CliReporter::new();
    let summary = match table {
        Some(table) => engine.run_only(table, &reporter)?,
        None => engine.run(&reporter)?,
    };

    print_summary(&summary);

    Ok(if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(summary: &RunSummary) {
    println!();
    info!(
        "{} collection(s), {} files catalogued, {} failed",
        format!("{}", summary.jobs.len()).green(),
        format!("{}", summary.files_catalogued()).green(),
        format!("{}", summary.files_failed()).red(),
    );
    for job in &summary.jobs {
        for failure in &job.failures {
            warn!("{}: {}", failure.path, failure.message);
        }
    }
    for failed in &summary.failed_jobs {
        error!(
            "Collection {} ({}) failed: {}",
            failed.collection.primary_table, failed.collection.root_path, failed.message
        );
    }
}

fn run_hash(config: &AppConfig, paths: &[PathBuf]) -> anyhow::Result<ExitCode> {
    let hasher = config.hasher()?;
    let mut code = ExitCode::SUCCESS;

    for path in paths {
        match hasher.hash_file(path) {
            Ok(outcome) => println!("{}  {}", outcome.digest, normalize_path(path)?),
            Err(err) => {
                error!("Cannot hash {}: {}", path.display(), err);
                code = ExitCode::FAILURE;
            }
        }
    }

    Ok(code)
}

fn run_collections(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let db = open_database(config)?;
    db.collections_or_seed(&config.default_collection)?;

    for stored in db.list_collections()? {
        let c = &stored.collection;
        println!(
            "{:>3}  {}  {} {} {}  (backup: {})",
            stored.id,
            c.catalog_name.dimmed(),
            c.root_path,
            "->".dimmed(),
            c.primary_table.cyan(),
            c.backup_table
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_add_collection(
    config: &AppConfig,
    catalog_name: String,
    root: &str,
    primary_table: String,
    backup_table: String,
) -> anyhow::Result<ExitCode> {
    let collection = CollectionConfig {
        catalog_name,
        root_path: normalize_path(Path::new(root))?,
        primary_table,
        backup_table,
    };

    let db = open_database(config)?;
    let id = db.add_collection(&collection)?;
    info!(
        "Added collection {}: {} -> {} (backup: {})",
        id, collection.root_path, collection.primary_table, collection.backup_table
    );
    Ok(ExitCode::SUCCESS)
}

fn run_lookup(config: &AppConfig, digest: &str, table: &str) -> anyhow::Result<ExitCode> {
    let db = open_database(config)?;
    let records = db.find_all_by_digest(table, &digest.to_ascii_lowercase())?;

    if records.is_empty() {
        println!("No file in {} has digest {}", table, digest);
        return Ok(ExitCode::FAILURE);
    }

    for record in &records {
        println!(
            "{}  {} bytes  {}{}",
            record.full_path,
            record.size_bytes,
            format_timestamp(record.last_modified).dimmed(),
            record
                .backup_location
                .as_deref()
                .map(|l| format!("  backup: {}", l.green()))
                .unwrap_or_default()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn run_export(config: &AppConfig, table: &str, output: &Path) -> anyhow::Result<ExitCode> {
    let db = open_database(config)?;
    let records = db.list_file_records(table)?;

    let mut writer = csv::Writer::from_path(output)
        .with_context(|| format!("Cannot create {}", output.display()))?;
    writer.write_record([
        "full_path",
        "name",
        "size_bytes",
        "digest",
        "backup_location",
        "last_modified",
    ])?;
    for record in &records {
        writer.write_record(csv_row(record))?;
    }
    writer.flush()?;

    info!("Exported {} records from {} to {}", records.len(), table, output.display());
    Ok(ExitCode::SUCCESS)
}

fn csv_row(record: &FileRecord) -> [String; 6] {
    [
        record.full_path.clone(),
        record.name.clone(),
        record.size_bytes.to_string(),
        record.digest.clone(),
        record.backup_location.clone().unwrap_or_default(),
        format_timestamp(record.last_modified),
    ]
}

fn format_timestamp(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_default()
}
