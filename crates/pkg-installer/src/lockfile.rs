use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::PkgLayout;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockfileEntry {
    /// Path or URL the manifest was resolved from.
    pub manifest: String,
    pub version: String,
    /// Packages installed because of this one; removed along with it.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    /// Paths relative to the pkg home created by this install.
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lockfile {
    packages: BTreeMap<String, LockfileEntry>,
}

impl Lockfile {
    pub fn get(&self, name: &str) -> Option<&LockfileEntry> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn set(&mut self, name: &str, entry: LockfileEntry) {
        self.packages.insert(name.to_string(), entry);
    }

    pub fn delete(&mut self, name: &str) -> Option<LockfileEntry> {
        self.packages.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &LockfileEntry)> {
        self.packages.iter()
    }

    pub fn names(&self) -> Vec<String> {
        self.packages.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Entries that track `name` as one of their dependencies, sorted by name.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        self.packages
            .iter()
            .filter(|(owner, entry)| {
                owner.as_str() != name && entry.dependencies.iter().any(|dep| dep == name)
            })
            .map(|(owner, _)| owner.clone())
            .collect()
    }

    /// Drops `name` from every dependency list so it no longer cascades with
    /// its former parents. Returns those parents.
    pub fn promote(&mut self, name: &str) -> Vec<String> {
        let mut former_parents = Vec::new();
        for (owner, entry) in &mut self.packages {
            let before = entry.dependencies.len();
            entry.dependencies.retain(|dep| dep != name);
            if entry.dependencies.len() != before {
                former_parents.push(owner.clone());
            }
        }
        former_parents
    }
}

/// The lockfile as loaded for one invocation, plus where to persist it.
#[derive(Debug)]
pub struct LockfileStore {
    layout: PkgLayout,
    lockfile: Lockfile,
}

impl LockfileStore {
    pub fn load(layout: &PkgLayout) -> Result<Self> {
        let lockfile = read_lockfile(&layout.lockfile_path())?;
        Ok(Self {
            layout: layout.clone(),
            lockfile,
        })
    }

    pub fn lockfile(&self) -> &Lockfile {
        &self.lockfile
    }

    pub fn lockfile_mut(&mut self) -> &mut Lockfile {
        &mut self.lockfile
    }

    pub fn into_lockfile(self) -> Lockfile {
        self.lockfile
    }

    pub fn write(&self) -> Result<()> {
        write_lockfile(&self.layout, &self.lockfile)
    }
}

pub fn read_lockfile(path: &Path) -> Result<Lockfile> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(err).with_context(|| {
                format!(
                    "lockfile not found: {} (run `pkg --init` first)",
                    path.display()
                )
            });
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read lockfile: {}", path.display()));
        }
    };
    if raw.trim().is_empty() {
        return Ok(Lockfile::default());
    }
    serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse lockfile: {}", path.display()))
}

/// Serializes the whole map to a staging file and renames it over the lockfile.
pub fn write_lockfile(layout: &PkgLayout, lockfile: &Lockfile) -> Result<()> {
    let path = layout.lockfile_path();
    let staging = layout.lockfile_staging_path();
    let mut payload =
        serde_json::to_string_pretty(lockfile).context("failed to serialize lockfile")?;
    payload.push('\n');

    let mut file = fs::File::create(&staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;
    file.write_all(payload.as_bytes())
        .with_context(|| format!("failed to write {}", staging.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to flush {}", staging.display()))?;
    drop(file);

    fs::rename(&staging, &path).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            staging.display(),
            path.display()
        )
    })?;
    tracing::debug!(path = %path.display(), packages = lockfile.len(), "wrote lockfile");
    Ok(())
}
