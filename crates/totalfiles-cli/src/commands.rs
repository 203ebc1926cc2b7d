use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)] // requires `derive` feature
#[command(name = "totalfiles")]
#[command(about = "Catalogue files by content hash and find their backups", long_about = None)]
pub struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, global = true, default_value = "Config")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Walk every configured collection and catalogue its files
    Process {
        /// Only run the collection writing to this table
        #[arg(long)]
        table: Option<String>,
    },
    /// Print the digest of each file without touching the catalog
    Hash {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List configured collections (seeding the default if none exist)
    Collections,
    /// Add a collection to the settings table
    AddCollection {
        #[arg(long, default_value = "filecatalogue")]
        catalog: String,
        #[arg(long)]
        root: String,
        #[arg(long)]
        table: String,
        #[arg(long)]
        backup_table: String,
    },
    /// List catalogued files with the given digest
    Lookup {
        digest: String,
        #[arg(long)]
        table: String,
    },
    /// Write a catalog table to CSV
    Export {
        #[arg(long)]
        table: String,
        #[arg(long)]
        output: PathBuf,
    },
    /// Print configuration values
    PrintConfig,
}
