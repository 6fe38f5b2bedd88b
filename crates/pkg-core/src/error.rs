use std::path::PathBuf;

use thiserror::Error;

use crate::Platform;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptStage {
    Install,
    Completions,
    Latest,
}

impl ScriptStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Completions => "completions",
            Self::Latest => "latest",
        }
    }
}

impl std::fmt::Display for ScriptStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure kinds that callers branch on.
///
/// These travel inside `anyhow::Error`; use [`find_pkg_error`] to recover the
/// kind once context has been layered on top.
#[derive(Debug, Error)]
pub enum PkgError {
    #[error("package {reference} does not exist")]
    PackageNotFound { reference: String },

    #[error("could not reach manifest host for {url}: {reason}")]
    ManifestUnreachable { url: String, reason: String },

    #[error("malformed manifest {reference}: {reason}")]
    MalformedManifest { reference: String, reason: String },

    #[error("package {name} is not supported on this platform ({platform})")]
    PackageUnsupported { name: String, platform: Platform },

    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("{stage} script for {name} failed ({status}): {stderr}")]
    ScriptFailed {
        name: String,
        stage: ScriptStage,
        status: String,
        stderr: String,
    },

    #[error("{name} is not installed")]
    PackageNotInstalled { name: String },

    #[error("cannot remove {name} as it is a dependency of {dependent}")]
    PackageDependencyOf { name: String, dependent: String },

    #[error("dependency cycle detected: {}", .chain.join(" -> "))]
    DependencyCycle { chain: Vec<String> },

    #[error("lockfile is in use by another pkg process{}: {} (delete it if no pkg process is running)", holder_detail(.holder), .path.display())]
    LockfileBusy {
        path: PathBuf,
        holder: Option<String>,
    },
}

fn holder_detail(holder: &Option<String>) -> String {
    holder
        .as_deref()
        .map(|pid| format!(" (pid {pid})"))
        .unwrap_or_default()
}

pub fn find_pkg_error(err: &anyhow::Error) -> Option<&PkgError> {
    err.chain().find_map(|cause| cause.downcast_ref::<PkgError>())
}
