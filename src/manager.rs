use chrono::Utc;
use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{BackupSettings, CreateConfig, DumpStrategyKind, RestoreConfig};
use crate::drivers::Connection;
use crate::dump::{DecodeHtmlEntities, DumpStrategy, Dumper, MigrationDumper};
use crate::error::{BackupError, Result};
use crate::storage::{self, backup::Backup, retention::RetentionPolicy};
use crate::utils::io::{open_dump_reader, remove_if_exists, DumpWriter};
use crate::utils::lock::DirectoryLock;

/// Outcome of a restore run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    /// Statements sent to the database.
    pub executed: usize,
    /// Statements left out because they belong to an ignored table.
    pub skipped: usize,
}

/// Creates, restores and prunes backups of one database in one directory.
pub struct BackupManager {
    connection: Box<dyn Connection>,
    dumper: Box<dyn DumpStrategy>,
    directory: PathBuf,
    tables_to_ignore: Vec<String>,
    compress: bool,
    batch_size: usize,
    retention_policy: RetentionPolicy,
}

impl BackupManager {
    /// Fails with [`BackupError::RetentionConfig`] when a keep interval is malformed.
    pub fn new(
        connection: Box<dyn Connection>,
        dumper: Box<dyn DumpStrategy>,
        settings: &BackupSettings,
    ) -> Result<Self> {
        Ok(Self {
            connection,
            dumper,
            directory: settings.directory.clone(),
            tables_to_ignore: settings.ignore_tables.clone(),
            compress: settings.compress,
            batch_size: settings.batch_size,
            retention_policy: settings.retention_policy()?,
        })
    }

    /// Same as [`BackupManager::new`] with the dumper chosen by `settings.strategy`.
    pub fn from_settings(connection: Box<dyn Connection>, settings: &BackupSettings) -> Result<Self> {
        let dumper: Box<dyn DumpStrategy> = match settings.strategy {
            DumpStrategyKind::Plain => Box::new(Dumper),
            DumpStrategyKind::Migration => Box::new(
                MigrationDumper::new().with_transform(DecodeHtmlEntities::new(settings.html_columns.iter().cloned())),
            ),
        };
        Self::new(connection, dumper, settings)
    }

    /// Backups in the directory, newest first. Creates the directory when missing.
    pub fn list_backups(&self) -> Result<Vec<Backup>> {
        storage::list_backups(&self.directory)
    }

    pub fn latest_backup(&self) -> Result<Option<Backup>> {
        Ok(self.list_backups()?.into_iter().next())
    }

    pub fn create_create_config(&self) -> Result<CreateConfig> {
        self.create_named_config("backup")
    }

    /// Like [`BackupManager::create_create_config`], with `name` as the file name prefix.
    pub fn create_named_config(&self, name: &str) -> Result<CreateConfig> {
        let backup = Backup::create_new(&self.directory, name, None, self.compress)?;
        Ok(CreateConfig::new(backup)
            .with_tables_to_ignore(self.tables_to_ignore.iter().cloned())
            .with_batch_size(self.batch_size))
    }

    /// Restore configuration for the latest backup.
    pub fn create_restore_config(&self) -> Result<RestoreConfig> {
        let latest = self.latest_backup()?.ok_or(BackupError::NoBackupExists)?;
        Ok(RestoreConfig::new(latest).with_tables_to_ignore(self.tables_to_ignore.iter().cloned()))
    }

    /// Dump the database into `config.backup()` and prune old backups.
    ///
    /// The file is removed again if anything before the commit fails, so a
    /// failed run never leaves a backup behind.
    pub fn create(&mut self, config: &CreateConfig) -> Result<Backup> {
        let backup = config.backup();
        let started = Instant::now();

        let _lock = match DirectoryLock::acquire(&self.directory) {
            Ok(lock) => lock,
            Err(e) => {
                discard_partial(backup.filepath());
                return Err(e);
            }
        };

        let dumper = self.dumper.as_ref();
        let written = in_transaction(self.connection.as_mut(), |connection| write_dump(connection, dumper, config));
        if let Err(e) = written {
            discard_partial(backup.filepath());
            return Err(e);
        }

        tracing::info!(
            backup = %backup.filename(),
            size = %backup.human_readable_size(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backup created"
        );

        self.tidy_directory()?;
        Ok(backup.clone())
    }

    /// Replay `config.backup()` statement by statement inside one transaction.
    pub fn restore(&mut self, config: &RestoreConfig) -> Result<RestoreSummary> {
        let path = config.backup().filepath();
        if !path.is_file() {
            return Err(BackupError::RestoreFormat {
                path: path.to_path_buf(),
                reason: "file does not exist".to_string(),
            });
        }

        let _lock = DirectoryLock::acquire(&self.directory)?;
        let started = Instant::now();
        let reader = open_dump_reader(path)?;
        let summary = in_transaction(self.connection.as_mut(), |connection| replay(connection, reader, config))?;

        tracing::info!(
            backup = %config.backup().filename(),
            executed = summary.executed,
            skipped = summary.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backup restored"
        );
        Ok(summary)
    }

    /// Delete every backup the retention policy does not keep. Returns the deleted backups.
    pub fn tidy_directory(&self) -> Result<Vec<Backup>> {
        storage::prune(&self.directory, &self.retention_policy)
    }
}

/// Turns auto-commit off for its lifetime if it was on.
struct AutoCommitGuard<'c> {
    connection: &'c mut dyn Connection,
    restore: bool,
}

impl<'c> AutoCommitGuard<'c> {
    fn disable(connection: &'c mut dyn Connection) -> Result<Self> {
        let restore = connection.is_auto_commit();
        if restore {
            connection.set_auto_commit(false).map_err(BackupError::Transaction)?;
        }
        Ok(Self { connection, restore })
    }
}

impl Drop for AutoCommitGuard<'_> {
    fn drop(&mut self) {
        if self.restore {
            if let Err(e) = self.connection.set_auto_commit(true) {
                tracing::warn!(error = %e, "failed to re-enable auto-commit");
            }
        }
    }
}

/// Run `operation` in a transaction that is committed on success and rolled
/// back on failure.
fn in_transaction<T>(
    connection: &mut dyn Connection,
    operation: impl FnOnce(&mut dyn Connection) -> Result<T>,
) -> Result<T> {
    let guard = AutoCommitGuard::disable(connection)?;
    let connection: &mut dyn Connection = &mut *guard.connection;

    connection.begin_transaction().map_err(BackupError::Transaction)?;
    match operation(&mut *connection) {
        Ok(value) => {
            connection.commit().map_err(BackupError::Transaction)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = connection.roll_back() {
                tracing::warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

fn write_dump(connection: &mut dyn Connection, dumper: &dyn DumpStrategy, config: &CreateConfig) -> Result<()> {
    let path = config.backup().filepath();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer = DumpWriter::create(path, config.gzip_compression())?;
    writer.write_line(config.dump_header())?;
    writer.write_line(&format!("-- Generated at {}", Utc::now().to_rfc3339()))?;

    for line in dumper.dump(connection, config) {
        writer.write_line(&line?)?;
    }
    writer.finish()?;
    Ok(())
}

fn discard_partial(path: &Path) {
    if let Err(e) = remove_if_exists(path) {
        tracing::warn!(path = %path.display(), error = %e, "failed to remove partial backup");
    }
}

fn replay(connection: &mut dyn Connection, reader: Box<dyn BufRead>, config: &RestoreConfig) -> Result<RestoreSummary> {
    let format_error = |reason: String| BackupError::RestoreFormat {
        path: config.backup().filepath().to_path_buf(),
        reason,
    };

    let mut summary = RestoreSummary::default();
    let mut statement = String::new();
    let mut header_checked = config.ignore_origin_check();
    let mut skipping = false;

    for line in reader.lines() {
        let line = line.map_err(|e| match e.kind() {
            io::ErrorKind::InvalidData => format_error("file is not valid UTF-8 text".to_string()),
            _ => BackupError::Io(e),
        })?;

        if !header_checked {
            if line.trim().is_empty() {
                continue;
            }
            if line.trim_end() != config.dump_header() {
                return Err(format_error("missing dump header, the file was not created by this tool".to_string()));
            }
            header_checked = true;
            continue;
        }

        if line.starts_with("--") {
            if let Some(section) = line.strip_prefix("-- BEGIN ") {
                skipping = match section.split_once(' ') {
                    Some(("STRUCTURE" | "DATA", table)) => config.is_ignored(table),
                    _ => false,
                };
            }
            continue;
        }
        if statement.is_empty() && line.trim().is_empty() {
            continue;
        }

        if !statement.is_empty() {
            statement.push('\n');
        }
        statement.push_str(&line);
        if !statement.trim_end().ends_with(';') {
            continue;
        }

        if skipping && !statement.starts_with("SET FOREIGN_KEY_CHECKS") {
            summary.skipped += 1;
        } else {
            connection
                .execute(&statement)
                .map_err(|source| BackupError::StatementExecution { statement: statement.clone(), source })?;
            summary.executed += 1;
        }
        statement.clear();
    }

    if !header_checked {
        return Err(format_error("file is empty".to_string()));
    }
    if !statement.trim().is_empty() {
        return Err(format_error("file ends inside a statement".to_string()));
    }
    Ok(summary)
}
