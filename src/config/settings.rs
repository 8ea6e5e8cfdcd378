use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BackupError, Result};
use crate::storage::retention::RetentionPolicy;

/// Which dumper produces the statement stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DumpStrategyKind {
    #[default]
    Plain,
    Migration,
}

/// Static configuration of the backup engine, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub directory: PathBuf,
    pub ignore_tables: Vec<String>,
    pub keep_max: usize,
    pub keep_intervals: Vec<String>,
    pub compress: bool,
    pub batch_size: usize,
    pub strategy: DumpStrategyKind,
    /// `table.column` pairs that store raw HTML and must not be entity-decoded
    /// by the migration dumper.
    pub html_columns: Vec<String>,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("var/backups"),
            ignore_tables: ["tl_crawl_queue", "tl_log", "tl_search", "tl_search_index", "tl_search_term"]
                .map(String::from)
                .to_vec(),
            keep_max: 5,
            keep_intervals: ["1D", "7D", "14D", "1M"].map(String::from).to_vec(),
            compress: true,
            batch_size: 1000,
            strategy: DumpStrategyKind::Plain,
            html_columns: Vec::new(),
        }
    }
}

impl BackupSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content).map_err(|source| BackupError::Settings { path: path.to_path_buf(), source })
    }

    /// Load `explicit` if given, else the per-user settings file if it exists, else defaults.
    pub fn load_or_default(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match settings_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn retention_policy(&self) -> Result<RetentionPolicy> {
        RetentionPolicy::new(self.keep_max, &self.keep_intervals)
    }
}

fn config_dir() -> Option<PathBuf> {
    if cfg!(windows) {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return Some(PathBuf::from(appdata).join("sqlbackup"));
        }
        std::env::var("USERPROFILE")
            .ok()
            .map(|home| PathBuf::from(home).join("AppData\\Roaming").join("sqlbackup"))
    } else {
        std::env::var("HOME").ok().map(|home| PathBuf::from(home).join(".sqlbackup"))
    }
}

/// Per-user settings location, `~/.sqlbackup/settings.json` on Unix.
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("settings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "keep_max": 2, "strategy": "migration", "ignore_tables": [] }"#).unwrap();

        let settings = BackupSettings::load(&path).unwrap();
        assert_eq!(settings.keep_max, 2);
        assert_eq!(settings.strategy, DumpStrategyKind::Migration);
        assert!(settings.ignore_tables.is_empty());
        assert_eq!(settings.keep_intervals, BackupSettings::default().keep_intervals);
        assert!(settings.compress);
    }

    #[test]
    fn malformed_json_is_a_settings_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ keep_max: ").unwrap();
        assert!(matches!(BackupSettings::load(&path), Err(BackupError::Settings { .. })));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(BackupSettings::load_or_default(Some(&missing)), Err(BackupError::Io(_))));
    }

    #[test]
    fn default_retention_policy_is_valid() {
        let policy = BackupSettings::default().retention_policy().unwrap();
        assert_eq!(policy.keep_max(), 5);
        assert_eq!(policy.keep_intervals().len(), 4);
    }
}
