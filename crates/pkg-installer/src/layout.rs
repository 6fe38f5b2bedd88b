use anyhow::{anyhow, Context, Result};
use pkg_core::TemplateDirs;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const LOCKFILE_NAME: &str = "pkg.lock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgLayout {
    home: PathBuf,
}

impl PkgLayout {
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn bin_dir(&self) -> PathBuf {
        self.home.join("bin")
    }

    pub fn opt_dir(&self) -> PathBuf {
        self.home.join("opt")
    }

    pub fn share_dir(&self) -> PathBuf {
        self.home.join("share")
    }

    pub fn zsh_completions_dir(&self) -> PathBuf {
        self.share_dir().join("zsh").join("site-functions")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.home.join("tmp")
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.home.join(LOCKFILE_NAME)
    }

    pub fn lockfile_staging_path(&self) -> PathBuf {
        self.home.join(format!("{LOCKFILE_NAME}.tmp"))
    }

    pub fn lock_guard_path(&self) -> PathBuf {
        self.home.join(format!("{LOCKFILE_NAME}.guard"))
    }

    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Directories whose top-level entries are attributed to installs, keyed by
    /// their path relative to the home directory.
    pub fn managed_dirs(&self) -> [(&'static str, PathBuf); 3] {
        [
            ("bin", self.bin_dir()),
            ("opt", self.opt_dir()),
            ("share/zsh/site-functions", self.zsh_completions_dir()),
        ]
    }

    pub fn template_dirs(&self) -> TemplateDirs {
        TemplateDirs {
            bin_dir: self.bin_dir(),
            opt_dir: self.opt_dir(),
            tmp_dir: self.tmp_dir(),
            zsh_completions_dir: self.zsh_completions_dir(),
        }
    }

    /// Maps a lockfile-recorded path back under the home directory.
    pub fn owned_file_path(&self, rel_path: &str) -> Result<PathBuf> {
        let path = Path::new(rel_path);
        if rel_path.trim().is_empty() || path.is_absolute() {
            return Err(anyhow!("owned file path must be relative: '{rel_path}'"));
        }
        if path
            .components()
            .any(|component| !matches!(component, Component::Normal(_)))
        {
            return Err(anyhow!(
                "owned file path must not contain '.', '..' or prefixes: '{rel_path}'"
            ));
        }
        Ok(self.home.join(path))
    }

    pub fn ensure_base_dirs(&self) -> Result<()> {
        for dir in self.base_dirs() {
            fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(())
    }

    pub(crate) fn base_dirs(&self) -> [PathBuf; 5] {
        [
            self.home.clone(),
            self.bin_dir(),
            self.opt_dir(),
            self.zsh_completions_dir(),
            self.tmp_dir(),
        ]
    }
}

pub fn default_pkg_home() -> Result<PathBuf> {
    if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve Windows pkg home")?;
        return Ok(PathBuf::from(app_data).join("pkg"));
    }

    let home = std::env::var("HOME").context("HOME is not set; cannot resolve pkg home")?;
    Ok(PathBuf::from(home).join(".pkg"))
}
