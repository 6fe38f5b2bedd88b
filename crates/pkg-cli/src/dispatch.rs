use std::io;
use std::process::ExitCode;

use anyhow::Result;
use pkg_core::{find_pkg_error, Platform};
use pkg_installer::{
    check_latest_versions, init_layout, AddOutcome, AddStatus, EngineOptions, InstallEngine,
    LockfileGuard, LockfileStore, PkgConfig, PkgLayout, RemoveOutcome, ScriptRunner,
    UpdateOutcome, UpdateStatus,
};
use pkg_registry::{fetch_catalog_index, search_catalog, HttpTransport, ManifestResolver};

use crate::completion::{render_init_snippet, write_completions_script};
use crate::download::HttpFetcher;
use crate::prompt::TerminalPrompt;
use crate::render::{format_info_lines, format_list_lines, format_search_results, TerminalRenderer};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli, renderer: TerminalRenderer) -> Result<ExitCode> {
    let Cli { init, command } = cli;

    if let Some(Commands::Completions { shell }) = &command {
        write_completions_script(*shell, &mut io::stdout().lock())?;
        return Ok(ExitCode::SUCCESS);
    }

    let config = PkgConfig::from_env()?;
    let layout = config.layout();
    tracing::debug!(home = %layout.home().display(), host = %config.manifest_host, "loaded config");

    if init {
        run_init(&layout, renderer)?;
    }
    let Some(command) = command else {
        return Ok(ExitCode::SUCCESS);
    };

    let resolver = ManifestResolver::new(
        config.manifest_host.clone(),
        Platform::current(),
        layout.template_dirs(),
        Box::new(HttpTransport::new()?),
    );
    let session = Session {
        layout: &layout,
        resolver: &resolver,
        renderer,
    };

    match command {
        Commands::Add { packages, yes } => session.add(&packages, yes),
        Commands::Update { packages, yes } => session.update(&packages, yes),
        Commands::Remove { packages } => session.remove(&packages),
        Commands::Info { package } => session.info(&package),
        Commands::Search { query } => session.search(&query),
        Commands::List => session.list(),
        Commands::Outdated => session.outdated(),
        Commands::Completions { .. } => Ok(ExitCode::SUCCESS),
    }
}

fn run_init(layout: &PkgLayout, renderer: TerminalRenderer) -> Result<()> {
    let report = init_layout(layout)?;
    if report.already_initialized() {
        renderer.print_status("ok", "pkg is already initialised!");
        return Ok(());
    }

    renderer.print_status(
        "ok",
        &format!("pkg has been installed to {}!", layout.home().display()),
    );
    println!("Add the following to your ~/.zshrc to complete installation:");
    println!();
    print!("{}", render_init_snippet(layout));
    Ok(())
}

struct Session<'a> {
    layout: &'a PkgLayout,
    resolver: &'a ManifestResolver,
    renderer: TerminalRenderer,
}

impl Session<'_> {
    fn scripts(&self) -> ScriptRunner {
        ScriptRunner::new(Box::new(TerminalPrompt::new(self.renderer.style())))
    }

    fn add(&self, packages: &[String], yes: bool) -> Result<ExitCode> {
        let _guard = LockfileGuard::acquire(self.layout)?;
        let store = LockfileStore::load(self.layout)?;
        let fetcher = HttpFetcher::new(self.renderer)?;
        let scripts = self.scripts();
        let mut engine = InstallEngine::new(
            self.layout,
            self.resolver,
            &fetcher,
            &scripts,
            store,
            EngineOptions {
                skip_confirmation: yes,
            },
        );

        let mut failures = Vec::new();
        for package in packages {
            match engine.add(package) {
                Ok(outcome) => self.print_add_outcome(&outcome),
                Err(err) => {
                    self.report_failure(package, &err);
                    failures.push(package.clone());
                }
            }
        }
        Ok(self.batch_exit_code("add", &failures))
    }

    fn update(&self, packages: &[String], yes: bool) -> Result<ExitCode> {
        let _guard = LockfileGuard::acquire(self.layout)?;
        let store = LockfileStore::load(self.layout)?;
        let fetcher = HttpFetcher::new(self.renderer)?;
        let scripts = self.scripts();
        let mut engine = InstallEngine::new(
            self.layout,
            self.resolver,
            &fetcher,
            &scripts,
            store,
            EngineOptions {
                skip_confirmation: yes,
            },
        );

        let results = if packages.is_empty() {
            engine.update_all()
        } else {
            packages
                .iter()
                .map(|package| (package.clone(), engine.update(package)))
                .collect()
        };

        let mut failures = Vec::new();
        let mut changed = 0_usize;
        for (package, result) in results {
            match result {
                Ok(outcome) => {
                    if matches!(outcome.status, UpdateStatus::Updated { .. }) {
                        changed += 1;
                    }
                    self.print_update_outcome(&outcome, !packages.is_empty());
                }
                Err(err) => {
                    self.report_failure(&package, &err);
                    failures.push(package);
                }
            }
        }

        if packages.is_empty() && changed == 0 && failures.is_empty() {
            self.renderer
                .print_status("ok", "All packages are up to date");
        }
        Ok(self.batch_exit_code("update", &failures))
    }

    fn remove(&self, packages: &[String]) -> Result<ExitCode> {
        let _guard = LockfileGuard::acquire(self.layout)?;
        let store = LockfileStore::load(self.layout)?;
        let fetcher = HttpFetcher::new(self.renderer)?;
        let scripts = self.scripts();
        let mut engine = InstallEngine::new(
            self.layout,
            self.resolver,
            &fetcher,
            &scripts,
            store,
            EngineOptions::default(),
        );

        let mut failures = Vec::new();
        for package in packages {
            match engine.remove(package) {
                Ok(outcome) => self.print_remove_outcome(&outcome),
                Err(err) => {
                    self.report_failure(package, &err);
                    failures.push(package.clone());
                }
            }
        }
        Ok(self.batch_exit_code("remove", &failures))
    }

    fn info(&self, package: &str) -> Result<ExitCode> {
        match self.resolver.resolve(package) {
            Ok(manifest) => {
                println!();
                self.renderer
                    .print_lines(&format_info_lines(&manifest, self.renderer.style()));
                Ok(ExitCode::SUCCESS)
            }
            Err(err) if find_pkg_error(&err).is_some() => {
                self.renderer.print_error(&format!("{err:#}"));
                Ok(ExitCode::FAILURE)
            }
            Err(err) => Err(err),
        }
    }

    fn search(&self, query: &str) -> Result<ExitCode> {
        let index = fetch_catalog_index(self.resolver.transport(), self.resolver.host())?;
        let results = search_catalog(&index, query);
        if results.is_empty() {
            self.renderer.print_status("warn", "No results found");
            return Ok(ExitCode::SUCCESS);
        }

        self.renderer.print_section("Search results");
        self.renderer.print_lines(&format_search_results(&results));
        Ok(ExitCode::SUCCESS)
    }

    fn list(&self) -> Result<ExitCode> {
        let lockfile = LockfileStore::load(self.layout)?.into_lockfile();
        if lockfile.is_empty() {
            println!("No packages installed!");
            return Ok(ExitCode::SUCCESS);
        }

        self.renderer.print_section("Installed");
        self.renderer.print_lines(&format_list_lines(&lockfile));
        Ok(ExitCode::SUCCESS)
    }

    fn outdated(&self) -> Result<ExitCode> {
        let lockfile = LockfileStore::load(self.layout)?.into_lockfile();
        let scripts = self.scripts();
        let reports = check_latest_versions(self.resolver, &scripts, self.layout, &lockfile);

        let mut failures = Vec::new();
        let mut outdated = 0_usize;
        for report in &reports {
            match &report.check {
                Ok(check) => {
                    if let (true, Some(latest)) = (report.is_outdated(), &check.latest) {
                        outdated += 1;
                        self.renderer.print_status(
                            "warn",
                            &format!("{}: {} -> {latest}", report.name, check.manifest_version),
                        );
                    }
                }
                Err(err) => {
                    self.report_failure(&report.name, err);
                    failures.push(report.name.clone());
                }
            }
        }

        if outdated == 0 && failures.is_empty() {
            self.renderer
                .print_status("ok", "All packages are up to date");
        }
        Ok(self.batch_exit_code("latest check", &failures))
    }

    fn print_add_outcome(&self, outcome: &AddOutcome) {
        let AddOutcome {
            name,
            version,
            status,
            installed_dependencies,
            caveats,
            ..
        } = outcome;
        match status {
            AddStatus::Installed => {
                let mut message = format!("installed {name} {version}");
                if !installed_dependencies.is_empty() {
                    message.push_str(&format!(
                        " (with {})",
                        installed_dependencies.join(", ")
                    ));
                }
                self.renderer.print_status("ok", &message);
            }
            AddStatus::AlreadyInstalled => {
                self.renderer
                    .print_status("ok", &format!("{name} {version} is already installed"));
            }
            AddStatus::Promoted { from } => {
                self.renderer.print_status(
                    "ok",
                    &format!(
                        "{name} {version} is already installed; no longer tracked as a dependency of {}",
                        from.join(", ")
                    ),
                );
            }
            AddStatus::Updated { from_version } => {
                self.renderer
                    .print_status("ok", &format!("updated {name} {from_version} -> {version}"));
            }
            AddStatus::Declined => {
                self.renderer
                    .print_status("warn", &format!("skipped {name}: install script declined"));
            }
        }

        if !caveats.trim().is_empty() {
            self.renderer.print_section(&format!("{name} caveats"));
            println!("{}", caveats.trim());
        }
    }

    fn print_update_outcome(&self, outcome: &UpdateOutcome, explicit: bool) {
        let name = &outcome.name;
        match &outcome.status {
            UpdateStatus::UpToDate => {
                if explicit {
                    self.renderer
                        .print_status("ok", &format!("{name} is already up to date"));
                }
            }
            UpdateStatus::Updated { from, to } => {
                self.renderer
                    .print_status("ok", &format!("updated {name} {from} -> {to}"));
                if !outcome.removed_dependencies.is_empty() {
                    self.renderer.print_status(
                        "ok",
                        &format!(
                            "removed dependencies no longer needed: {}",
                            outcome.removed_dependencies.join(", ")
                        ),
                    );
                }
            }
            UpdateStatus::Declined => {
                self.renderer
                    .print_status("warn", &format!("skipped {name}: install script declined"));
            }
        }
    }

    fn print_remove_outcome(&self, outcome: &RemoveOutcome) {
        self.renderer.print_status(
            "ok",
            &format!("removed {} {}", outcome.name, outcome.version),
        );
        if !outcome.removed_dependencies.is_empty() {
            self.renderer.print_status(
                "ok",
                &format!(
                    "removed dependencies: {}",
                    outcome.removed_dependencies.join(", ")
                ),
            );
        }
    }

    fn report_failure(&self, package: &str, err: &anyhow::Error) {
        self.renderer.print_error(&format!("{package}: {err:#}"));
    }

    fn batch_exit_code(&self, operation: &str, failures: &[String]) -> ExitCode {
        if failures.is_empty() {
            return ExitCode::SUCCESS;
        }
        self.renderer.print_error(&format!(
            "{operation} failed for {} package(s): {}",
            failures.len(),
            failures.join(", ")
        ));
        ExitCode::FAILURE
    }
}
