use anyhow::{Result, anyhow};
use colored::*;
use comfy_table::{Attribute, Cell, CellAlignment, ContentArrangement, Table, presets::UTF8_FULL};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use sqlbackup::config::operation::merge_ignore_tables;
use sqlbackup::drivers::selector::open_connection;
use sqlbackup::storage::{self, sanitize};
use sqlbackup::{Backup, BackupManager, BackupSettings, DumpStrategyKind, RestoreConfig};

use crate::cli::Cli;

pub struct CreateOptions {
    pub name: Option<String>,
    pub ignore_tables: Option<String>,
    pub no_compress: bool,
    pub migration: bool,
}

pub struct RestoreOptions {
    pub file: Option<String>,
    pub force: bool,
    pub ignore_origin_check: bool,
    pub ignore_tables: Option<String>,
}

/// Settings file (or defaults) with the global command line overrides applied.
pub fn load_settings(cli: &Cli) -> Result<BackupSettings> {
    let mut settings = BackupSettings::load_or_default(cli.config.as_deref())?;
    if let Some(directory) = &cli.directory {
        settings.directory = directory.clone();
    }
    Ok(settings)
}

pub fn do_list(settings: &BackupSettings, json: bool) -> Result<()> {
    let backups = storage::list_backups(&settings.directory)?;

    if json {
        let summaries: Vec<_> = backups.iter().map(Backup::to_summary).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    if backups.is_empty() {
        println!("{} {}", "i".yellow().bold(), "No backups found".yellow());
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Backup").add_attribute(Attribute::Bold),
            Cell::new("Created").add_attribute(Attribute::Bold),
            Cell::new("Size").add_attribute(Attribute::Bold),
        ]);

    for backup in &backups {
        table.add_row(vec![
            Cell::new(backup.filename()),
            Cell::new(backup.created_at().format("%Y-%m-%d %H:%M:%S").to_string()),
            Cell::new(backup.human_readable_size()).set_alignment(CellAlignment::Right),
        ]);
    }

    println!("{}", table);
    Ok(())
}

pub fn do_create(database: Option<&str>, mut settings: BackupSettings, options: CreateOptions) -> Result<()> {
    if let Some(option) = &options.ignore_tables {
        settings.ignore_tables = merge_ignore_tables(&settings.ignore_tables, option);
    }
    if options.no_compress {
        settings.compress = false;
    }
    if options.migration {
        settings.strategy = DumpStrategyKind::Migration;
    }

    let mut manager = open_manager(database, &settings)?;
    let config = match &options.name {
        Some(name) => manager.create_named_config(&sanitize(name))?,
        None => manager.create_create_config()?,
    };

    let bar = create_progress_bar(&format!("Creating {}", config.backup().filename()));
    let result = manager.create(&config);
    bar.finish_and_clear();
    let backup = result?;

    println!(
        "{} {} {}",
        "✔".green().bold(),
        format!("Created {}", backup.filename()).green(),
        format!("({})", backup.human_readable_size()).dimmed()
    );
    Ok(())
}

pub fn do_restore(database: Option<&str>, mut settings: BackupSettings, options: RestoreOptions) -> Result<()> {
    if let Some(option) = &options.ignore_tables {
        settings.ignore_tables = merge_ignore_tables(&settings.ignore_tables, option);
    }

    let mut manager = open_manager(database, &settings)?;
    let config = match &options.file {
        Some(file) => RestoreConfig::new(Backup::new(resolve_backup_path(&settings.directory, file))?)
            .with_tables_to_ignore(settings.ignore_tables.iter().cloned()),
        None => manager.create_restore_config()?,
    }
    .with_ignore_origin_check(options.ignore_origin_check);

    let filename = config.backup().filename().to_string();
    if !options.force && !prompt_confirm(&format!("Restore '{}' into the database? [y/N] ", filename))? {
        println!("Aborted.");
        return Ok(());
    }

    let bar = create_progress_bar(&format!("Restoring {}", filename));
    let result = manager.restore(&config);
    bar.finish_and_clear();
    let summary = result?;

    println!(
        "{} {} {}",
        "✔".green().bold(),
        format!("Restored {}", filename).green(),
        format!("({} statements, {} skipped)", summary.executed, summary.skipped).dimmed()
    );
    Ok(())
}

pub fn do_prune(settings: &BackupSettings) -> Result<()> {
    let policy = settings.retention_policy()?;
    let deleted = storage::prune(&settings.directory, &policy)?;

    if deleted.is_empty() {
        println!("{} {}", "i".yellow().bold(), "Nothing to prune".yellow());
        return Ok(());
    }
    for backup in &deleted {
        println!("{} {}", "-".red().bold(), backup.filename());
    }
    println!(
        "{} {}",
        "✔".green().bold(),
        format!("Removed {} backup(s)", deleted.len()).green()
    );
    Ok(())
}

pub fn do_version() {
    println!("{} {}", "sqlbackup".bold(), env!("CARGO_PKG_VERSION").cyan());
}

fn open_manager(database: Option<&str>, settings: &BackupSettings) -> Result<BackupManager> {
    let target = database.ok_or_else(|| anyhow!("no database given, pass --database <target>"))?;
    let connection = open_connection(target)?;
    tracing::debug!(driver = connection.name(), database = target, "opened connection");
    Ok(BackupManager::from_settings(connection, settings)?)
}

/// A bare file name refers to the backup directory; anything else is a path.
fn resolve_backup_path(directory: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.components().count() == 1 && !path.exists() {
        directory.join(path)
    } else {
        path.to_path_buf()
    }
}

fn create_progress_bar(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        bar.set_style(style.tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "));
    }
    bar.set_message(message.to_string());
    bar.enable_steady_tick(std::time::Duration::from_millis(80));
    bar
}

fn prompt_confirm(message: &str) -> Result<bool> {
    use std::io::{self, Write};
    print!("{} {}", "?".cyan().bold(), message.cyan());
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let ans = input.trim().to_lowercase();
    Ok(ans == "y" || ans == "yes")
}
