use std::cmp::Reverse;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

use crate::error::Result;
use crate::utils::io::remove_if_exists;

pub mod backup;
pub mod retention;

use backup::Backup;
use retention::RetentionPolicy;

/// List the backups directly inside `directory`, newest first.
/// The directory is created when missing.
pub fn list_backups(directory: &Path) -> Result<Vec<Backup>> {
    fs::create_dir_all(directory)?;

    let mut backups = Vec::new();
    for entry in WalkDir::new(directory).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = match entry.file_name().to_str() { Some(n) => n, None => continue };
        if Backup::is_valid_name(name) {
            backups.push(Backup::new(entry.path())?);
        }
    }

    // Same second: fall back to the name so the order is still stable.
    backups.sort_by(|a, b| {
        Reverse(a.created_at())
            .cmp(&Reverse(b.created_at()))
            .then_with(|| b.filename().cmp(a.filename()))
    });
    Ok(backups)
}

/// Delete every backup in `directory` that `policy` does not keep and return
/// the deleted ones.
pub fn prune(directory: &Path, policy: &RetentionPolicy) -> Result<Vec<Backup>> {
    let backups = list_backups(directory)?;
    let Some(latest) = backups.first() else {
        return Ok(Vec::new());
    };

    let keep = policy.apply(latest, &backups);
    let mut deleted = Vec::new();
    for backup in backups.iter().filter(|b| !keep.contains(b)) {
        remove_if_exists(backup.filepath())?;
        tracing::info!(backup = %backup.filename(), "removed backup");
        deleted.push(backup.clone());
    }
    Ok(deleted)
}

/// Turn a free-form label into something safe to embed in a backup file name.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
