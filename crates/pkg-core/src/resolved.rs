use std::path::PathBuf;

use anyhow::anyhow;

use crate::Platform;

/// Fixed on-disk directories that manifests can reference through placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateDirs {
    pub bin_dir: PathBuf,
    pub opt_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub zsh_completions_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
    pub name: String,
    pub description: String,
    pub homepage: String,
    pub version: String,
    /// Path or URL the manifest was loaded from; re-resolved at update time.
    pub origin: String,
    pub platform: Platform,
    pub url: String,
    pub sha256: String,
    pub dependencies: Vec<String>,
    pub caveats: String,
    pub install_script: Vec<String>,
    pub completions_script: Vec<String>,
    pub latest_script: Vec<String>,
}

impl ResolvedManifest {
    /// File name the artifact is stored under in the scratch directory.
    pub fn artifact_file_name(&self) -> anyhow::Result<String> {
        let without_fragment = self.url.split('#').next().unwrap_or(&self.url);
        let without_query = without_fragment
            .split('?')
            .next()
            .unwrap_or(without_fragment);
        let file_name = without_query.rsplit('/').next().unwrap_or("");

        if file_name.is_empty() || file_name == "." || file_name == ".." || file_name.contains('\\')
        {
            return Err(anyhow!(
                "could not infer artifact file name from URL '{}' for {}",
                self.url,
                self.name
            ));
        }

        Ok(file_name.to_string())
    }
}

pub fn substitute_template(value: &str, version: &str, dirs: &TemplateDirs) -> String {
    value
        .replace("{{ version }}", version)
        .replace("{{ pkg.bin_dir }}", &dirs.bin_dir.display().to_string())
        .replace("{{ pkg.opt_dir }}", &dirs.opt_dir.display().to_string())
        .replace("{{ pkg.tmp_dir }}", &dirs.tmp_dir.display().to_string())
        .replace(
            "{{ pkg.completions.zsh }}",
            &dirs.zsh_completions_dir.display().to_string(),
        )
}
