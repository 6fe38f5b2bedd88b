use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pkg_core::PkgError;

use crate::fs_utils::remove_file_if_exists;
use crate::PkgLayout;

/// Advisory exclusive claim over the lockfile's read-modify-write cycle.
///
/// The marker is created with `create_new` and removed on drop.
#[derive(Debug)]
pub struct LockfileGuard {
    path: PathBuf,
}

impl LockfileGuard {
    /// Claims the guard. A marker left by a process that no longer exists is
    /// replaced once.
    pub fn acquire(layout: &PkgLayout) -> Result<Self> {
        let path = layout.lock_guard_path();
        if let Some(file) = try_create(&path)? {
            return Self::claimed(path, file);
        }

        let holder = read_guard_holder(&path);
        if holder_is_gone(holder.as_deref()) {
            tracing::warn!(path = %path.display(), ?holder, "replacing stale lockfile guard");
            remove_file_if_exists(&path)
                .with_context(|| format!("failed to remove stale guard: {}", path.display()))?;
            if let Some(file) = try_create(&path)? {
                return Self::claimed(path, file);
            }
        }

        Err(PkgError::LockfileBusy {
            holder: read_guard_holder(&path),
            path,
        }
        .into())
    }

    fn claimed(path: PathBuf, mut file: fs::File) -> Result<Self> {
        let claimed = Self { path };
        file.write_all(format!("{}\n", std::process::id()).as_bytes())
            .and_then(|()| file.flush())
            .with_context(|| {
                format!("failed to write lockfile guard: {}", claimed.path.display())
            })?;
        Ok(claimed)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockfileGuard {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), %err, "failed to release lockfile guard");
            }
        }
    }
}

fn try_create(path: &Path) -> Result<Option<fs::File>> {
    match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
    {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(None),
        Err(err) => {
            Err(err).with_context(|| format!("failed to claim lockfile guard: {}", path.display()))
        }
    }
}

#[cfg(target_os = "linux")]
fn holder_is_gone(holder: Option<&str>) -> bool {
    holder
        .and_then(|pid| pid.parse::<u32>().ok())
        .is_some_and(|pid| !Path::new("/proc").join(pid.to_string()).exists())
}

#[cfg(not(target_os = "linux"))]
fn holder_is_gone(_holder: Option<&str>) -> bool {
    false
}

fn read_guard_holder(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let holder = raw.trim();
    if holder.is_empty() {
        return None;
    }
    Some(holder.to_string())
}
