use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// sqlbackup: streaming database backups with retention and restore
#[derive(Parser, Debug)]
#[command(name = "sqlbackup", version, about = "Create, restore and prune SQL backups of a database.", long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Database to back up or restore into (e.g., sqlite://var/app.db or var/app.sqlite)
    #[arg(short = 'd', long = "database", global = true)]
    pub database: Option<String>,

    /// Settings file (defaults to ~/.sqlbackup/settings.json when present)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Backup directory, overriding the settings file
    #[arg(long = "directory", global = true)]
    pub directory: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List existing backups, newest first
    List {
        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create a new backup and prune old ones
    Create {
        /// File name prefix of the backup
        #[arg(short = 'n', long = "name")]
        name: Option<String>,

        /// Comma separated tables; +name / -name modify the configured list
        #[arg(long = "ignore-tables", value_name = "tables", allow_hyphen_values = true)]
        ignore_tables: Option<String>,

        /// Write a plain .sql file instead of .sql.gz
        #[arg(long)]
        no_compress: bool,

        /// Quote every identifier and decode legacy HTML entities
        #[arg(long)]
        migration: bool,
    },

    /// Restore a backup (the latest one if no file is given)
    Restore {
        /// Backup file name inside the backup directory, or a path
        file: Option<String>,

        /// Do not ask for confirmation
        #[arg(short = 'f', long)]
        force: bool,

        /// Accept dumps that were not created by sqlbackup
        #[arg(long)]
        ignore_origin_check: bool,

        /// Comma separated tables; +name / -name modify the configured list
        #[arg(long = "ignore-tables", value_name = "tables", allow_hyphen_values = true)]
        ignore_tables: Option<String>,
    },

    /// Delete backups the retention policy does not keep
    Prune,

    /// Print CLI version
    Version,
}
