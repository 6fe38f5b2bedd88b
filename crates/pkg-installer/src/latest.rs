use std::fs;
use std::path::Path;
use std::thread;

use anyhow::{anyhow, Context, Result};
use pkg_core::ScriptStage;
use pkg_registry::ManifestResolver;

use crate::fs_utils::remove_path_if_exists;
use crate::scripts::ScriptRunner;
use crate::{LatestCheck, LatestReport, Lockfile, PkgLayout};

/// Runs every installed package's `latest` script, one worker thread per
/// package, each in its own directory under the scratch dir. The lockfile is
/// only read; a failing package does not affect the others. Reports come back
/// sorted by package name.
pub fn check_latest_versions(
    resolver: &ManifestResolver,
    scripts: &ScriptRunner,
    layout: &PkgLayout,
    lockfile: &Lockfile,
) -> Vec<LatestReport> {
    let scratch = layout.tmp_dir();
    let scratch = scratch.as_path();

    thread::scope(|scope| {
        let workers = lockfile
            .iter()
            .enumerate()
            .map(|(index, (name, entry))| {
                let work_dir = scratch.join(format!("latest-{index}"));
                let worker = scope.spawn(move || {
                    let result = check_one(resolver, scripts, &work_dir, &entry.manifest);
                    if let Err(err) = remove_path_if_exists(&work_dir) {
                        tracing::warn!(dir = %work_dir.display(), %err, "failed to remove work dir");
                    }
                    result
                });
                (name, entry, worker)
            })
            .collect::<Vec<_>>();

        workers
            .into_iter()
            .map(|(name, entry, worker)| LatestReport {
                name: name.clone(),
                installed: entry.version.clone(),
                check: worker
                    .join()
                    .unwrap_or_else(|_| Err(anyhow!("latest check for {name} panicked"))),
            })
            .collect()
    })
}

fn check_one(
    resolver: &ManifestResolver,
    scripts: &ScriptRunner,
    work_dir: &Path,
    origin: &str,
) -> Result<LatestCheck> {
    let manifest = resolver.resolve(origin)?;
    fs::create_dir_all(work_dir)
        .with_context(|| format!("failed to create {}", work_dir.display()))?;
    let output = scripts.run(
        &manifest.name,
        ScriptStage::Latest,
        &manifest.latest_script,
        work_dir,
        true,
    )?;
    let latest = output.stdout().trim();
    tracing::debug!(package = %manifest.name, latest, "latest script finished");

    Ok(LatestCheck {
        manifest_version: manifest.version,
        latest: (!latest.is_empty()).then(|| latest.to_string()),
    })
}
