use std::collections::BTreeSet;

use anyhow::Result;
use pkg_core::PkgError;

use crate::fs_utils::remove_path_if_exists;
use crate::{Lockfile, PkgLayout, RemoveOutcome};

/// Deletes `name`'s owned files, cascades into its tracked dependencies, and
/// drops its lockfile entry.
///
/// `retain` names dependencies that must survive the cascade. `visited`
/// collects every package removed in this call tree; a dependency that is
/// still listed by a package outside it is kept.
pub(crate) fn remove_package(
    layout: &PkgLayout,
    lockfile: &mut Lockfile,
    name: &str,
    check_dependents: bool,
    retain: &BTreeSet<String>,
    visited: &mut BTreeSet<String>,
) -> Result<RemoveOutcome> {
    let Some(entry) = lockfile.get(name).cloned() else {
        return Err(PkgError::PackageNotInstalled {
            name: name.to_string(),
        }
        .into());
    };

    if check_dependents {
        if let Some(dependent) = lockfile.dependents_of(name).into_iter().next() {
            return Err(PkgError::PackageDependencyOf {
                name: name.to_string(),
                dependent,
            }
            .into());
        }
    }
    visited.insert(name.to_string());

    let mut deleted_files = Vec::new();
    for rel_path in &entry.files {
        let path = match layout.owned_file_path(rel_path) {
            Ok(path) => path,
            Err(err) => {
                tracing::warn!(package = name, %err, "skipping invalid owned path");
                continue;
            }
        };
        match remove_path_if_exists(&path) {
            Ok(()) => deleted_files.push(rel_path.clone()),
            Err(err) => {
                tracing::warn!(package = name, path = %path.display(), %err, "failed to delete owned file");
            }
        }
    }

    let mut removed_dependencies = Vec::new();
    for dependency in &entry.dependencies {
        if retain.contains(dependency) || visited.contains(dependency) {
            continue;
        }
        if !lockfile.contains(dependency) {
            tracing::debug!(package = name, %dependency, "tracked dependency already gone");
            continue;
        }
        let still_needed_by = lockfile
            .dependents_of(dependency)
            .into_iter()
            .filter(|dependent| !visited.contains(dependent))
            .collect::<Vec<_>>();
        if !still_needed_by.is_empty() {
            tracing::debug!(package = name, %dependency, ?still_needed_by, "keeping shared dependency");
            continue;
        }

        let cascade = remove_package(layout, lockfile, dependency, false, retain, visited)?;
        removed_dependencies.push(dependency.clone());
        removed_dependencies.extend(cascade.removed_dependencies);
    }

    lockfile.delete(name);
    tracing::info!(package = name, version = %entry.version, files = deleted_files.len(), "removed package");

    Ok(RemoveOutcome {
        name: name.to_string(),
        version: entry.version,
        deleted_files,
        removed_dependencies,
    })
}
