use std::collections::BTreeSet;

use anyhow::Result;
use pkg_core::{PkgError, ResolvedManifest, ScriptStage};
use pkg_registry::ManifestResolver;

use crate::fetch::{fetch_and_verify, ArtifactFetcher, FetchStatus};
use crate::fs_utils::clear_dir_contents;
use crate::scripts::{ScriptOutcome, ScriptRunner};
use crate::snapshot::{discard_new_files, new_files, snapshot_managed_files};
use crate::uninstall::remove_package;
use crate::{
    AddOutcome, AddStatus, Lockfile, LockfileEntry, LockfileStore, PkgLayout, RemoveOutcome,
    UpdateOutcome, UpdateStatus,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineOptions {
    /// Run scripts without asking (`-y`).
    pub skip_confirmation: bool,
}

/// Whether the user still has to be asked before scripts run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Consent {
    Ask,
    Given { completions: bool },
}

struct InstalledPackage {
    files: Vec<String>,
    /// Every dependency freshly installed underneath, in install order.
    installed_dependencies: Vec<String>,
    download: FetchStatus,
}

#[derive(Default)]
struct PreparedDependencies {
    /// Direct dependencies installed by this call.
    fresh: Vec<String>,
    /// Every dependency installed underneath, in install order.
    installed: Vec<String>,
}

/// Drives add, remove and update against one in-memory lockfile.
///
/// Every public operation persists the lockfile before returning, whether or
/// not it succeeded.
pub struct InstallEngine<'a> {
    layout: &'a PkgLayout,
    resolver: &'a ManifestResolver,
    fetcher: &'a dyn ArtifactFetcher,
    scripts: &'a ScriptRunner,
    store: LockfileStore,
    options: EngineOptions,
}

impl<'a> InstallEngine<'a> {
    pub fn new(
        layout: &'a PkgLayout,
        resolver: &'a ManifestResolver,
        fetcher: &'a dyn ArtifactFetcher,
        scripts: &'a ScriptRunner,
        store: LockfileStore,
        options: EngineOptions,
    ) -> Self {
        Self {
            layout,
            resolver,
            fetcher,
            scripts,
            store,
            options,
        }
    }

    pub fn lockfile(&self) -> &Lockfile {
        self.store.lockfile()
    }

    pub fn into_store(self) -> LockfileStore {
        self.store
    }

    pub fn add(&mut self, reference: &str) -> Result<AddOutcome> {
        let result = self.add_root(reference);
        self.persist(result)
    }

    pub fn remove(&mut self, name: &str) -> Result<RemoveOutcome> {
        let mut visited = BTreeSet::new();
        let result = remove_package(
            self.layout,
            self.store.lockfile_mut(),
            name,
            true,
            &BTreeSet::new(),
            &mut visited,
        );
        self.persist(result)
    }

    pub fn update(&mut self, name: &str) -> Result<UpdateOutcome> {
        let result = self.update_installed(name);
        self.persist(result)
    }

    /// Updates every installed package in name order. Packages an earlier
    /// update removed as no longer needed are skipped.
    pub fn update_all(&mut self) -> Vec<(String, Result<UpdateOutcome>)> {
        let mut results = Vec::new();
        for name in self.lockfile().names() {
            if !self.lockfile().contains(&name) {
                tracing::debug!(package = %name, "removed by an earlier update");
                continue;
            }
            let result = self.update(&name);
            results.push((name, result));
        }
        results
    }

    fn persist<T>(&self, result: Result<T>) -> Result<T> {
        match (result, self.store.write()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(write_err)) => Err(write_err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(write_err)) => {
                tracing::warn!(error = %write_err, "failed to persist lockfile after error");
                Err(err)
            }
        }
    }

    fn add_root(&mut self, reference: &str) -> Result<AddOutcome> {
        let manifest = self.resolver.resolve(reference)?;
        let name = manifest.name.clone();

        if let Some(entry) = self.store.lockfile().get(&name).cloned() {
            if entry.version == manifest.version {
                let former_parents = self.promote(&name);
                let status = if former_parents.is_empty() {
                    AddStatus::AlreadyInstalled
                } else {
                    AddStatus::Promoted {
                        from: former_parents,
                    }
                };
                return Ok(AddOutcome {
                    name,
                    version: entry.version,
                    status,
                    installed_dependencies: Vec::new(),
                    files: entry.files,
                    caveats: String::new(),
                    download: None,
                });
            }

            // Promotion waits until the replacement is in place.
            let update = self.update_resolved(&name, &entry, &manifest)?;
            let status = match update.status {
                UpdateStatus::Declined => AddStatus::Declined,
                _ => {
                    self.promote(&name);
                    AddStatus::Updated {
                        from_version: entry.version,
                    }
                }
            };
            return Ok(AddOutcome {
                name,
                version: manifest.version,
                status,
                installed_dependencies: update.installed_dependencies,
                files: update.files,
                caveats: manifest.caveats,
                download: None,
            });
        }

        let mut chain = Vec::new();
        let outcome = match self.install_resolved(&manifest, &mut chain, &[], Consent::Ask)? {
            Some(installed) => AddOutcome {
                name,
                version: manifest.version,
                status: AddStatus::Installed,
                installed_dependencies: installed.installed_dependencies,
                files: installed.files,
                caveats: manifest.caveats,
                download: Some(installed.download),
            },
            None => AddOutcome {
                name,
                version: manifest.version,
                status: AddStatus::Declined,
                installed_dependencies: Vec::new(),
                files: Vec::new(),
                caveats: String::new(),
                download: None,
            },
        };
        Ok(outcome)
    }

    fn update_installed(&mut self, name: &str) -> Result<UpdateOutcome> {
        let Some(entry) = self.store.lockfile().get(name).cloned() else {
            return Err(PkgError::PackageNotInstalled {
                name: name.to_string(),
            }
            .into());
        };
        let manifest = self.resolver.resolve(&entry.manifest)?;
        self.update_resolved(name, &entry, &manifest)
    }

    /// Replaces the installed `entry` with `manifest`. The new artifact is
    /// downloaded and verified, every prompt is answered, and newly listed
    /// dependencies are installed before anything is removed.
    fn update_resolved(
        &mut self,
        name: &str,
        entry: &LockfileEntry,
        manifest: &ResolvedManifest,
    ) -> Result<UpdateOutcome> {
        if entry.version == manifest.version {
            return Ok(UpdateOutcome::up_to_date(name));
        }
        let result = self.replace_installed(name, entry, manifest);
        self.clear_scratch();
        result
    }

    fn replace_installed(
        &mut self,
        name: &str,
        entry: &LockfileEntry,
        manifest: &ResolvedManifest,
    ) -> Result<UpdateOutcome> {
        let declined = || UpdateOutcome {
            status: UpdateStatus::Declined,
            ..UpdateOutcome::up_to_date(name)
        };
        let scratch = self.layout.tmp_dir();
        fetch_and_verify(self.fetcher, manifest, &scratch)?;

        let consent = if self.options.skip_confirmation {
            Consent::Given { completions: true }
        } else {
            if !self.scripts.confirm(
                &manifest.name,
                ScriptStage::Install,
                &manifest.install_script,
            )? {
                return Ok(declined());
            }
            Consent::Given {
                completions: self.scripts.confirm(
                    &manifest.name,
                    ScriptStage::Completions,
                    &manifest.completions_script,
                )?,
            }
        };

        let retain = entry
            .dependencies
            .iter()
            .filter(|dependency| manifest.dependencies.contains(dependency))
            .cloned()
            .collect::<BTreeSet<_>>();
        let retained = retain.iter().cloned().collect::<Vec<_>>();

        let mut chain = vec![manifest.name.clone()];
        let Some(prepared) = self.install_missing_dependencies(manifest, &mut chain, &retained)?
        else {
            return Ok(declined());
        };

        // Installing dependencies clears the scratch dir.
        if let Err(err) = fetch_and_verify(self.fetcher, manifest, &scratch) {
            self.rollback(&prepared.fresh);
            return Err(err);
        }

        let mut visited = BTreeSet::new();
        let removed = match remove_package(
            self.layout,
            self.store.lockfile_mut(),
            name,
            false,
            &retain,
            &mut visited,
        ) {
            Ok(removed) => removed,
            Err(err) => {
                self.rollback(&prepared.fresh);
                return Err(err);
            }
        };

        let mut inherited = retained;
        inherited.extend(prepared.fresh.iter().cloned());
        let mut chain = Vec::new();
        let installed = match self.install_resolved(manifest, &mut chain, &inherited, consent) {
            Ok(Some(installed)) => installed,
            Ok(None) => {
                self.rollback(&prepared.fresh);
                return Ok(UpdateOutcome {
                    removed_dependencies: removed.removed_dependencies,
                    ..declined()
                });
            }
            Err(err) => {
                self.rollback(&prepared.fresh);
                return Err(err.context(format!(
                    "{name} {} was removed but {} could not be installed",
                    entry.version, manifest.version
                )));
            }
        };

        Ok(UpdateOutcome {
            name: name.to_string(),
            status: UpdateStatus::Updated {
                from: entry.version.clone(),
                to: manifest.version.clone(),
            },
            files: installed.files,
            installed_dependencies: prepared.installed,
            removed_dependencies: removed.removed_dependencies,
        })
    }

    /// Installs missing dependencies, then the package itself, then commits
    /// its lockfile entry. `Ok(None)` means the user declined somewhere in the
    /// tree; nothing from this call is left behind in that case.
    fn install_resolved(
        &mut self,
        manifest: &ResolvedManifest,
        chain: &mut Vec<String>,
        inherited: &[String],
        consent: Consent,
    ) -> Result<Option<InstalledPackage>> {
        chain.push(manifest.name.clone());
        let result = self.install_with_dependencies(manifest, chain, inherited, consent);
        chain.pop();
        result
    }

    fn install_with_dependencies(
        &mut self,
        manifest: &ResolvedManifest,
        chain: &mut Vec<String>,
        inherited: &[String],
        consent: Consent,
    ) -> Result<Option<InstalledPackage>> {
        let Some(PreparedDependencies {
            fresh,
            installed: installed_dependencies,
        }) = self.install_missing_dependencies(manifest, chain, inherited)?
        else {
            return Ok(None);
        };

        let (files, download) = match self.install_package(manifest, consent) {
            Ok(Some(installed)) => installed,
            Ok(None) => {
                self.rollback(&fresh);
                return Ok(None);
            }
            Err(err) => {
                self.rollback(&fresh);
                return Err(err);
            }
        };

        let dependencies = manifest
            .dependencies
            .iter()
            .filter(|dependency| inherited.contains(dependency) || fresh.contains(dependency))
            .cloned()
            .collect::<Vec<_>>();
        self.store.lockfile_mut().set(
            &manifest.name,
            LockfileEntry {
                manifest: manifest.origin.clone(),
                version: manifest.version.clone(),
                dependencies,
                files: files.clone(),
            },
        );
        tracing::info!(
            package = %manifest.name,
            version = %manifest.version,
            files = files.len(),
            "committed lockfile entry"
        );

        Ok(Some(InstalledPackage {
            files,
            installed_dependencies,
            download,
        }))
    }

    /// Installs every dependency of `manifest` that is neither inherited nor
    /// already in the lockfile. On decline or error the dependencies installed
    /// here are removed again before returning.
    fn install_missing_dependencies(
        &mut self,
        manifest: &ResolvedManifest,
        chain: &mut Vec<String>,
        inherited: &[String],
    ) -> Result<Option<PreparedDependencies>> {
        let mut prepared = PreparedDependencies::default();

        for dependency in &manifest.dependencies {
            if chain.contains(dependency) {
                self.rollback(&prepared.fresh);
                let mut cycle = chain.clone();
                cycle.push(dependency.clone());
                return Err(PkgError::DependencyCycle { chain: cycle }.into());
            }
            if inherited.contains(dependency) || self.store.lockfile().contains(dependency) {
                tracing::debug!(package = %manifest.name, %dependency, "dependency already installed");
                continue;
            }

            match self.install_dependency(dependency, chain) {
                Ok(Some(installed)) => {
                    prepared.fresh.push(dependency.clone());
                    prepared.installed.extend(installed.installed_dependencies);
                    prepared.installed.push(dependency.clone());
                }
                Ok(None) => {
                    self.rollback(&prepared.fresh);
                    return Ok(None);
                }
                Err(err) => {
                    self.rollback(&prepared.fresh);
                    return Err(err.context(format!(
                        "failed to install {dependency}, a dependency of {}",
                        manifest.name
                    )));
                }
            }
        }
        Ok(Some(prepared))
    }

    fn install_dependency(
        &mut self,
        dependency: &str,
        chain: &mut Vec<String>,
    ) -> Result<Option<InstalledPackage>> {
        let manifest = self.resolver.resolve(dependency)?;
        if manifest.name != dependency {
            return Err(PkgError::MalformedManifest {
                reference: dependency.to_string(),
                reason: format!("manifest declares name '{}'", manifest.name),
            }
            .into());
        }
        self.install_resolved(&manifest, chain, &[], Consent::Ask)
    }

    /// Snapshot, fetch, verify, run scripts, diff. Files the scripts created
    /// are discarded again when a script fails. The scratch dir is cleared on
    /// every exit.
    fn install_package(
        &self,
        manifest: &ResolvedManifest,
        consent: Consent,
    ) -> Result<Option<(Vec<String>, FetchStatus)>> {
        let result = self.run_install_steps(manifest, consent);
        self.clear_scratch();
        result
    }

    fn run_install_steps(
        &self,
        manifest: &ResolvedManifest,
        consent: Consent,
    ) -> Result<Option<(Vec<String>, FetchStatus)>> {
        let scratch = self.layout.tmp_dir();
        let before = snapshot_managed_files(self.layout)?;
        tracing::debug!(package = %manifest.name, entries = before.len(), "snapshot before install");

        let artifact = fetch_and_verify(self.fetcher, manifest, &scratch)?;

        let skip_install = self.options.skip_confirmation || consent != Consent::Ask;
        match self.scripts.run(
            &manifest.name,
            ScriptStage::Install,
            &manifest.install_script,
            &scratch,
            skip_install,
        ) {
            Ok(ScriptOutcome::Declined) => return Ok(None),
            Ok(_) => {}
            Err(err) => {
                discard_new_files(self.layout, &before);
                return Err(err);
            }
        }

        let run_completions = !matches!(consent, Consent::Given { completions: false });
        if run_completions {
            let skip_completions =
                self.options.skip_confirmation || matches!(consent, Consent::Given { .. });
            match self.scripts.run(
                &manifest.name,
                ScriptStage::Completions,
                &manifest.completions_script,
                &scratch,
                skip_completions,
            ) {
                Ok(ScriptOutcome::Declined) => {
                    tracing::debug!(package = %manifest.name, "completions declined");
                }
                Ok(_) => {}
                Err(err) => {
                    discard_new_files(self.layout, &before);
                    return Err(err);
                }
            }
        }

        let after = snapshot_managed_files(self.layout)?;
        let files = new_files(&before, &after);
        tracing::debug!(package = %manifest.name, ?files, "snapshot diff");

        Ok(Some((files, artifact.status)))
    }

    fn clear_scratch(&self) {
        let scratch = self.layout.tmp_dir();
        if let Err(err) = clear_dir_contents(&scratch) {
            tracing::warn!(dir = %scratch.display(), %err, "failed to clear scratch directory");
        }
    }

    /// Drops `name` from every other entry's dependency list.
    fn promote(&mut self, name: &str) -> Vec<String> {
        let former_parents = self.store.lockfile_mut().promote(name);
        if !former_parents.is_empty() {
            tracing::debug!(package = %name, ?former_parents, "promoted to top-level package");
        }
        former_parents
    }

    /// Removes dependencies freshly installed by an add that did not complete.
    fn rollback(&mut self, fresh: &[String]) {
        let mut visited = BTreeSet::new();
        for dependency in fresh.iter().rev() {
            if visited.contains(dependency) {
                continue;
            }
            if let Err(err) = remove_package(
                self.layout,
                self.store.lockfile_mut(),
                dependency,
                false,
                &BTreeSet::new(),
                &mut visited,
            ) {
                tracing::warn!(%dependency, error = %err, "failed to roll back dependency");
            }
        }
    }
}
