use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::error::{BackupError, Result};
use crate::utils::io::normalize_path;

const DATETIME_FORMAT: &str = "%Y%m%d%H%M%S";

static VALID_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^.+__(\d{14})\.sql(\.gz)?$").expect("valid backup name pattern"));

/// One backup file, identified by `<name>__<YYYYMMDDHHMMSS>.sql[.gz]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    filepath: PathBuf,
    created_at: DateTime<Utc>,
}

/// Flat view of a backup for listings and JSON output.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSummary {
    pub created_at: String,
    pub size: u64,
    pub human_readable_size: String,
    pub path: String,
}

impl Backup {
    pub fn new(filepath: impl AsRef<Path>) -> Result<Self> {
        let filepath = normalize_path(filepath.as_ref());
        let name = filepath
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| BackupError::InvalidBackupName(filepath.display().to_string()))?;

        let created_at = Self::parse_created_at(name)
            .ok_or_else(|| BackupError::InvalidBackupName(name.to_string()))?;

        Ok(Self { filepath, created_at })
    }

    /// Whether a file name follows the backup naming scheme.
    pub fn is_valid_name(name: &str) -> bool {
        Self::parse_created_at(name).is_some()
    }

    fn parse_created_at(name: &str) -> Option<DateTime<Utc>> {
        let stamp = VALID_NAME.captures(name)?.get(1)?.as_str();
        NaiveDateTime::parse_from_str(stamp, DATETIME_FORMAT)
            .ok()
            .map(|dt| dt.and_utc())
    }

    /// Create `backup__<now>.sql.gz` in `directory` as an empty placeholder file.
    pub fn create_new_at_path(directory: &Path, now: Option<DateTime<Utc>>) -> Result<Self> {
        Self::create_new(directory, "backup", now, true)
    }

    /// Claim a fresh, empty backup file so it shows up in listings right away.
    /// Fails if a backup with the same name and second already exists.
    pub fn create_new(directory: &Path, name: &str, now: Option<DateTime<Utc>>, compressed: bool) -> Result<Self> {
        let now = now.unwrap_or_else(Utc::now);
        let extension = if compressed { "sql.gz" } else { "sql" };
        let filename = format!("{}__{}.{}", name, now.format(DATETIME_FORMAT), extension);
        let backup = Self::new(directory.join(filename))?;

        fs::create_dir_all(directory)?;
        OpenOptions::new().write(true).create_new(true).open(&backup.filepath)?;

        Ok(backup)
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn filename(&self) -> &str {
        self.filepath.file_name().and_then(|n| n.to_str()).unwrap_or_default()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_compressed(&self) -> bool {
        self.filename().ends_with(".gz")
    }

    /// Size on disk in bytes; 0 when the file is missing.
    pub fn size(&self) -> u64 {
        fs::metadata(&self.filepath).map(|m| m.len()).unwrap_or(0)
    }

    pub fn human_readable_size(&self) -> String {
        human_readable_size(self.size())
    }

    pub fn to_summary(&self) -> BackupSummary {
        let size = self.size();
        BackupSummary {
            created_at: self.created_at.to_rfc3339(),
            size,
            human_readable_size: human_readable_size(size),
            path: self.filepath.display().to_string(),
        }
    }
}

pub fn human_readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    // Integer steps instead of log(bytes) so that 0 and exact powers of 1024 are safe.
    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);
    format!("{:.2} {}", value, UNITS[exponent])
}
