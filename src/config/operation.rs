use std::collections::BTreeSet;

use crate::storage::backup::Backup;

/// First line of every dump; restore refuses files without it unless told otherwise.
pub const DUMP_HEADER: &str = "-- Generated by the sqlbackup Backup Manager (version: v1).";

pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Parameters of one `create` run.
#[derive(Debug, Clone)]
pub struct CreateConfig {
    backup: Backup,
    tables_to_ignore: BTreeSet<String>,
    gzip_compression: bool,
    dump_header: String,
    batch_size: usize,
}

impl CreateConfig {
    pub fn new(backup: Backup) -> Self {
        Self {
            gzip_compression: backup.is_compressed(),
            backup,
            tables_to_ignore: BTreeSet::new(),
            dump_header: DUMP_HEADER.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_backup(self, backup: Backup) -> Self {
        Self { backup, ..self }
    }

    pub fn with_tables_to_ignore<I, S>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { tables_to_ignore: tables.into_iter().map(Into::into).collect(), ..self }
    }

    pub fn with_gzip_compression(self, gzip_compression: bool) -> Self {
        Self { gzip_compression, ..self }
    }

    pub fn with_dump_header(self, dump_header: impl Into<String>) -> Self {
        Self { dump_header: dump_header.into(), ..self }
    }

    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size: batch_size.max(1), ..self }
    }

    pub fn backup(&self) -> &Backup {
        &self.backup
    }

    pub fn tables_to_ignore(&self) -> &BTreeSet<String> {
        &self.tables_to_ignore
    }

    pub fn is_ignored(&self, table: &str) -> bool {
        self.tables_to_ignore.contains(table)
    }

    pub fn gzip_compression(&self) -> bool {
        self.gzip_compression
    }

    pub fn dump_header(&self) -> &str {
        &self.dump_header
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Parameters of one `restore` run.
#[derive(Debug, Clone)]
pub struct RestoreConfig {
    backup: Backup,
    tables_to_ignore: BTreeSet<String>,
    ignore_origin_check: bool,
    dump_header: String,
}

impl RestoreConfig {
    pub fn new(backup: Backup) -> Self {
        Self {
            backup,
            tables_to_ignore: BTreeSet::new(),
            ignore_origin_check: false,
            dump_header: DUMP_HEADER.to_string(),
        }
    }

    pub fn with_backup(self, backup: Backup) -> Self {
        Self { backup, ..self }
    }

    pub fn with_tables_to_ignore<I, S>(self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { tables_to_ignore: tables.into_iter().map(Into::into).collect(), ..self }
    }

    pub fn with_ignore_origin_check(self, ignore_origin_check: bool) -> Self {
        Self { ignore_origin_check, ..self }
    }

    pub fn with_dump_header(self, dump_header: impl Into<String>) -> Self {
        Self { dump_header: dump_header.into(), ..self }
    }

    pub fn backup(&self) -> &Backup {
        &self.backup
    }

    pub fn tables_to_ignore(&self) -> &BTreeSet<String> {
        &self.tables_to_ignore
    }

    pub fn is_ignored(&self, table: &str) -> bool {
        self.tables_to_ignore.contains(table)
    }

    pub fn ignore_origin_check(&self) -> bool {
        self.ignore_origin_check
    }

    pub fn dump_header(&self) -> &str {
        &self.dump_header
    }
}

/// Apply a comma separated `--ignore-tables` value to the configured list.
///
/// `+name` adds and `-name` removes a table; if any entry has no prefix the
/// configured list is replaced entirely.
pub fn merge_ignore_tables(configured: &[String], option: &str) -> Vec<String> {
    let entries: Vec<&str> = option.split(',').map(str::trim).filter(|e| !e.is_empty()).collect();
    let modifies = entries.iter().all(|e| e.starts_with('+') || e.starts_with('-'));

    let mut tables: BTreeSet<String> =
        if modifies { configured.iter().cloned().collect() } else { BTreeSet::new() };
    for entry in entries {
        if let Some(table) = entry.strip_prefix('-') {
            tables.remove(table);
        } else {
            tables.insert(entry.trim_start_matches('+').to_string());
        }
    }
    tables.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backup() -> Backup {
        Backup::new("/b/backup__20211101141254.sql.gz").unwrap()
    }

    #[test]
    fn create_config_defaults_follow_the_backup() {
        let config = CreateConfig::new(backup());
        assert!(config.gzip_compression());
        assert_eq!(config.dump_header(), DUMP_HEADER);
        assert_eq!(config.batch_size(), DEFAULT_BATCH_SIZE);

        let plain = CreateConfig::new(Backup::new("/b/backup__20211101141254.sql").unwrap());
        assert!(!plain.gzip_compression());
    }

    #[test]
    fn with_methods_return_modified_copies() {
        let original = CreateConfig::new(backup());
        let changed = original
            .clone()
            .with_tables_to_ignore(["tl_log"])
            .with_gzip_compression(false)
            .with_batch_size(0);

        assert!(original.tables_to_ignore().is_empty());
        assert!(changed.is_ignored("tl_log"));
        assert!(!changed.gzip_compression());
        assert_eq!(changed.batch_size(), 1);

        let restore = RestoreConfig::new(backup()).with_ignore_origin_check(true);
        assert!(restore.ignore_origin_check());
        assert!(!RestoreConfig::new(backup()).ignore_origin_check());
    }

    #[test]
    fn ignore_option_modifies_or_replaces() {
        let configured = vec!["tl_log".to_string(), "tl_search".to_string()];
        assert_eq!(merge_ignore_tables(&configured, "+tl_cron,-tl_log"), ["tl_cron", "tl_search"]);
        assert_eq!(merge_ignore_tables(&configured, "tl_member, tl_user"), ["tl_member", "tl_user"]);
        assert_eq!(merge_ignore_tables(&configured, ""), ["tl_log", "tl_search"]);
    }
}
