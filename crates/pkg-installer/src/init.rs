use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::lockfile::write_lockfile;
use crate::{Lockfile, PkgLayout};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<PathBuf>,
}

impl InitReport {
    pub fn already_initialized(&self) -> bool {
        self.created.is_empty()
    }
}

/// Creates the managed directories and an empty lockfile. Existing state is
/// left untouched.
pub fn init_layout(layout: &PkgLayout) -> Result<InitReport> {
    let mut created = Vec::new();
    for dir in layout.base_dirs() {
        if dir.is_dir() {
            continue;
        }
        fs::create_dir_all(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
        created.push(dir);
    }

    let lockfile_path = layout.lockfile_path();
    if !lockfile_path.exists() {
        write_lockfile(layout, &Lockfile::default())?;
        created.push(lockfile_path);
    }

    tracing::debug!(home = %layout.home().display(), created = created.len(), "initialized pkg home");
    Ok(InitReport { created })
}
