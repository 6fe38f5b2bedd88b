use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use pkg_core::MANIFEST_EXT;

/// Where a manifest is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestReference {
    Local(PathBuf),
    Remote(String),
}

impl ManifestReference {
    /// Classifies a user-supplied reference.
    ///
    /// Paths ending in `.json` are read from disk, `http(s)://` URLs are used
    /// as-is, and anything else is a package name joined onto `host`.
    pub fn parse(reference: &str, host: &str) -> Result<Self> {
        let trimmed = reference.trim();
        if trimmed.is_empty() {
            return Err(anyhow!("package reference must not be empty"));
        }
        if is_url(trimmed) {
            return Ok(Self::Remote(trimmed.to_string()));
        }
        if trimmed.ends_with(MANIFEST_EXT) {
            return Ok(Self::Local(PathBuf::from(trimmed)));
        }
        if trimmed.contains('/') || trimmed.contains('\\') {
            return Err(anyhow!(
                "invalid package name '{trimmed}': local manifests must end in {MANIFEST_EXT}"
            ));
        }

        Ok(Self::Remote(remote_manifest_url(host, trimmed)))
    }

    /// Stable identity recorded in the lockfile.
    pub fn origin(&self) -> Result<String> {
        match self {
            Self::Remote(url) => Ok(url.clone()),
            Self::Local(path) => Ok(absolute_path(path)?.display().to_string()),
        }
    }
}

pub(crate) fn remote_manifest_url(host: &str, name: &str) -> String {
    format!("{}/{}{}", host.trim_end_matches('/'), name, MANIFEST_EXT)
}

fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn absolute_path(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    Ok(cwd.join(path))
}
