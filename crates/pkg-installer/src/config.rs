use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::layout::{default_pkg_home, PkgLayout};

pub const DEFAULT_MANIFEST_HOST: &str = "https://pkg.zerolimits.dev";
pub const PKG_HOME_ENV: &str = "PKG_HOME";
pub const PKG_MANIFEST_HOST_ENV: &str = "PKG_MANIFEST_HOST";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgConfig {
    pub home: PathBuf,
    pub manifest_host: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    manifest_host: Option<String>,
}

impl PkgConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(
            std::env::var(PKG_HOME_ENV).ok(),
            std::env::var(PKG_MANIFEST_HOST_ENV).ok(),
        )
    }

    /// Environment values win over `config.toml`, which wins over defaults.
    pub fn from_vars(pkg_home: Option<String>, manifest_host: Option<String>) -> Result<Self> {
        let home = match pkg_home.filter(|value| !value.trim().is_empty()) {
            Some(value) => {
                let path = PathBuf::from(value.trim());
                if path.is_absolute() {
                    path
                } else {
                    std::env::current_dir()
                        .context("failed to resolve current directory for PKG_HOME")?
                        .join(path)
                }
            }
            None => default_pkg_home()?,
        };

        let file = read_config_file(&PkgLayout::new(&home))?;
        let manifest_host = manifest_host
            .filter(|value| !value.trim().is_empty())
            .or(file.manifest_host)
            .unwrap_or_else(|| DEFAULT_MANIFEST_HOST.to_string());

        Ok(Self {
            home,
            manifest_host: manifest_host.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn layout(&self) -> PkgLayout {
        PkgLayout::new(&self.home)
    }
}

fn read_config_file(layout: &PkgLayout) -> Result<ConfigFile> {
    let path = layout.config_path();
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(ConfigFile::default()),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read config file: {}", path.display()));
        }
    };
    toml::from_str(&raw).with_context(|| format!("failed to parse config file: {}", path.display()))
}
