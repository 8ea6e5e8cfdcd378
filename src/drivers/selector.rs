use std::path::Path;

use super::{sqlite::SqliteConnection, Connection};
use crate::error::{BackupError, Result};

/// Open a connection for a target address such as `sqlite://app.db`, `app.sqlite` or `:memory:`.
pub fn open_connection(target: &str) -> Result<Box<dyn Connection>> {
    let open = |path: &str| {
        let conn = if path == ":memory:" {
            SqliteConnection::open_in_memory()
        } else {
            SqliteConnection::open(Path::new(path))
        };
        conn.map(|c| Box::new(c) as Box<dyn Connection>)
            .map_err(BackupError::Connection)
    };

    if let Some(path) = target.strip_prefix("sqlite://") {
        open(path)
    } else if target == ":memory:"
        || [".sqlite", ".sqlite3", ".db"].iter().any(|ext| target.ends_with(ext))
    {
        open(target)
    } else {
        Err(BackupError::UnsupportedDriver(target.to_string()))
    }
}
