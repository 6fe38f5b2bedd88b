use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::resolved::{substitute_template, ResolvedManifest, TemplateDirs};
use crate::{PkgError, Platform};

pub const MANIFEST_EXT: &str = ".json";

/// A script group is either one global sequence of lines or a per-platform map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ScriptGroup {
    Global(Vec<String>),
    PerPlatform(BTreeMap<String, Vec<String>>),
}

impl ScriptGroup {
    pub fn lines_for(&self, platform: &Platform) -> Option<&[String]> {
        match self {
            Self::Global(lines) => Some(lines),
            Self::PerPlatform(by_platform) => by_platform.get(&platform.key()).map(Vec::as_slice),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestScripts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install: Option<ScriptGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<ScriptGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions: Option<ScriptGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawManifest {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub homepage: String,
    pub version: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub caveats: String,
    #[serde(default)]
    pub sha256: BTreeMap<String, String>,
    #[serde(default)]
    pub url: BTreeMap<String, String>,
    #[serde(default)]
    pub scripts: ManifestScripts,
}

impl RawManifest {
    /// Parses manifest JSON. `reference` names the source in error messages.
    pub fn from_json_str(reference: &str, input: &str) -> anyhow::Result<Self> {
        let manifest: Self =
            serde_json::from_str(input).map_err(|err| PkgError::MalformedManifest {
                reference: reference.to_string(),
                reason: err.to_string(),
            })?;

        let malformed = |reason: String| PkgError::MalformedManifest {
            reference: reference.to_string(),
            reason,
        };
        if manifest.name.trim().is_empty() {
            return Err(malformed("name must not be empty".to_string()).into());
        }
        if manifest.version.trim().is_empty() {
            return Err(malformed(format!("version of '{}' must not be empty", manifest.name)).into());
        }
        if manifest
            .dependencies
            .iter()
            .any(|dependency| dependency == &manifest.name)
        {
            return Err(malformed(format!("manifest '{}' depends on itself", manifest.name)).into());
        }

        Ok(manifest)
    }

    pub fn supports(&self, platform: &Platform) -> bool {
        let key = platform.key();
        self.url.contains_key(&key)
            && self.sha256.contains_key(&key)
            && self
                .scripts
                .install
                .as_ref()
                .and_then(|group| group.lines_for(platform))
                .is_some()
    }

    /// Projects the manifest onto `platform` and substitutes template placeholders.
    ///
    /// The checksum is copied verbatim. A missing completions or latest group
    /// resolves to an empty script.
    pub fn resolve(
        &self,
        origin: &str,
        platform: &Platform,
        dirs: &TemplateDirs,
    ) -> anyhow::Result<ResolvedManifest> {
        let key = platform.key();
        let unsupported = || PkgError::PackageUnsupported {
            name: self.name.clone(),
            platform: platform.clone(),
        };

        let url = self.url.get(&key).ok_or_else(unsupported)?;
        let sha256 = self.sha256.get(&key).ok_or_else(unsupported)?;
        let install = self
            .scripts
            .install
            .as_ref()
            .and_then(|group| group.lines_for(platform))
            .ok_or_else(unsupported)?;

        let substitute = |value: &str| substitute_template(value, &self.version, dirs);
        let substitute_group = |group: Option<&ScriptGroup>| {
            group
                .and_then(|group| group.lines_for(platform))
                .unwrap_or_default()
                .iter()
                .map(|line| substitute(line))
                .collect::<Vec<_>>()
        };

        let mut seen = HashSet::new();
        let dependencies = self
            .dependencies
            .iter()
            .map(|dependency| dependency.trim())
            .filter(|dependency| !dependency.is_empty())
            .filter(|dependency| seen.insert(dependency.to_string()))
            .map(ToOwned::to_owned)
            .collect();

        Ok(ResolvedManifest {
            name: self.name.clone(),
            description: self.description.clone(),
            homepage: self.homepage.clone(),
            version: self.version.clone(),
            origin: origin.to_string(),
            platform: platform.clone(),
            url: substitute(url),
            sha256: sha256.clone(),
            dependencies,
            caveats: substitute(&self.caveats),
            install_script: install.iter().map(|line| substitute(line)).collect(),
            completions_script: substitute_group(self.scripts.completions.as_ref()),
            latest_script: substitute_group(self.scripts.latest.as_ref()),
        })
    }
}
