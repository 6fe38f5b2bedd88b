use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pkg_core::{PkgError, ResolvedManifest};
use pkg_security::sha256_file_hex;

use crate::fs_utils::remove_file_if_exists;

/// Downloads an artifact to a local path. Progress reporting is up to the implementation.
pub trait ArtifactFetcher {
    fn download(&self, url: &str, destination: &Path) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Downloaded,
    Reused,
}

impl FetchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Downloaded => "downloaded",
            Self::Reused => "reused",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    pub status: FetchStatus,
}

/// Downloads the artifact into `scratch_dir` unless it is already there, then
/// checks its SHA-256. A reused file that fails the check is downloaded again
/// once. A mismatch deletes the file and fails with
/// [`PkgError::ChecksumMismatch`].
pub fn fetch_and_verify(
    fetcher: &dyn ArtifactFetcher,
    manifest: &ResolvedManifest,
    scratch_dir: &Path,
) -> Result<FetchedArtifact> {
    fs::create_dir_all(scratch_dir)
        .with_context(|| format!("failed to create {}", scratch_dir.display()))?;
    let path = scratch_dir.join(manifest.artifact_file_name()?);

    if path.is_file() {
        tracing::debug!(package = %manifest.name, path = %path.display(), "reusing downloaded artifact");
        if verify_artifact(manifest, &path)?.is_none() {
            return Ok(FetchedArtifact {
                path,
                status: FetchStatus::Reused,
            });
        }
        tracing::debug!(package = %manifest.name, path = %path.display(), "stale artifact in scratch dir");
    }

    download_to(fetcher, &manifest.url, &path)
        .with_context(|| format!("failed to fetch {} for {}", manifest.url, manifest.name))?;
    if let Some(actual) = verify_artifact(manifest, &path)? {
        return Err(PkgError::ChecksumMismatch {
            name: manifest.name.clone(),
            expected: manifest.sha256.clone(),
            actual,
        }
        .into());
    }

    Ok(FetchedArtifact {
        path,
        status: FetchStatus::Downloaded,
    })
}

/// Returns the actual digest when it does not match, after deleting the file.
fn verify_artifact(manifest: &ResolvedManifest, path: &Path) -> Result<Option<String>> {
    let actual = sha256_file_hex(path)?;
    if actual.eq_ignore_ascii_case(manifest.sha256.trim()) {
        return Ok(None);
    }
    let _ = remove_file_if_exists(path);
    Ok(Some(actual))
}

fn download_to(fetcher: &dyn ArtifactFetcher, url: &str, path: &Path) -> Result<()> {
    let part_path = path.with_file_name(format!(
        "{}.part",
        path.file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("artifact")
    ));

    if let Err(err) = fetcher.download(url, &part_path) {
        let _ = fs::remove_file(&part_path);
        return Err(err);
    }

    fs::rename(&part_path, path).with_context(|| {
        format!(
            "failed to move downloaded artifact into place: {}",
            path.display()
        )
    })
}
