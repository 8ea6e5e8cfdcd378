use std::path::PathBuf;

use thiserror::Error;

/// Failures raised by a [`Connection`](crate::drivers::Connection) implementation.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

/// The one error type callers of the backup engine branch on.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("'{0}' is not a valid backup name, expected <name>__<YYYYMMDDHHMMSS>.sql[.gz]")]
    InvalidBackupName(String),

    #[error("no backup exists that could be restored")]
    NoBackupExists,

    #[error("dump failed{}: {source}", .table.as_ref().map(|t| format!(" on table '{t}'")).unwrap_or_default())]
    DumpFailed {
        table: Option<String>,
        #[source]
        source: DriverError,
    },

    #[error("cannot restore '{}': {reason}", .path.display())]
    RestoreFormat { path: PathBuf, reason: String },

    #[error("statement failed during restore ({}): {source}", abbreviate(.statement))]
    StatementExecution {
        statement: String,
        #[source]
        source: DriverError,
    },

    #[error("invalid keep interval '{spec}': {reason}")]
    RetentionConfig { spec: String, reason: String },

    #[error("backup directory '{}' is locked by another process", .0.display())]
    DirectoryLocked(PathBuf),

    #[error("cannot open connection: {0}")]
    Connection(#[source] DriverError),

    #[error("transaction failed: {0}")]
    Transaction(#[source] DriverError),

    #[error("invalid settings file '{}': {source}", .path.display())]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no driver available for target '{0}'")]
    UnsupportedDriver(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn abbreviate(statement: &str) -> String {
    const MAX: usize = 120;
    match statement.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &statement[..idx]),
        None => statement.to_string(),
    }
}

pub type Result<T, E = BackupError> = std::result::Result<T, E>;
