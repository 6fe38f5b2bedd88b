use std::collections::BTreeSet;
use std::fs;
use std::io;

use anyhow::{Context, Result};

use crate::fs_utils::remove_path_if_exists;
use crate::PkgLayout;

/// Top-level entries of the managed directories, relative to the pkg home.
pub type ManagedSnapshot = BTreeSet<String>;

pub fn snapshot_managed_files(layout: &PkgLayout) -> Result<ManagedSnapshot> {
    let mut files = ManagedSnapshot::new();
    for (rel_dir, dir) in layout.managed_dirs() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("failed to list {}", dir.display()));
            }
        };
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
            files.insert(format!(
                "{rel_dir}/{}",
                entry.file_name().to_string_lossy()
            ));
        }
    }
    Ok(files)
}

/// Entries present in `after` but not in `before`. Deletions are ignored.
pub fn new_files(before: &ManagedSnapshot, after: &ManagedSnapshot) -> Vec<String> {
    after.difference(before).cloned().collect()
}

/// Best-effort removal of whatever a failed script left behind.
pub(crate) fn discard_new_files(layout: &PkgLayout, before: &ManagedSnapshot) {
    let after = match snapshot_managed_files(layout) {
        Ok(after) => after,
        Err(err) => {
            tracing::warn!(%err, "could not snapshot managed dirs to clean up failed install");
            return;
        }
    };
    for rel_path in new_files(before, &after) {
        let path = layout.home().join(&rel_path);
        if let Err(err) = remove_path_if_exists(&path) {
            tracing::warn!(path = %path.display(), %err, "failed to discard file from failed install");
        }
    }
}
