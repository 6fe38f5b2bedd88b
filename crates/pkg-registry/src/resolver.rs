use std::fs;
use std::io;

use anyhow::{Context, Result};
use pkg_core::{PkgError, Platform, RawManifest, ResolvedManifest, TemplateDirs};

use crate::reference::remote_manifest_url;
use crate::{ManifestReference, ManifestTransport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedManifest {
    pub origin: String,
    pub manifest: RawManifest,
}

/// Loads manifests from disk or the catalog host and projects them onto one platform.
pub struct ManifestResolver {
    host: String,
    platform: Platform,
    dirs: TemplateDirs,
    transport: Box<dyn ManifestTransport>,
}

impl ManifestResolver {
    pub fn new(
        host: impl Into<String>,
        platform: Platform,
        dirs: TemplateDirs,
        transport: Box<dyn ManifestTransport>,
    ) -> Self {
        Self {
            host: host.into(),
            platform,
            dirs,
            transport,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    pub fn transport(&self) -> &dyn ManifestTransport {
        self.transport.as_ref()
    }

    pub fn manifest_url(&self, name: &str) -> String {
        remote_manifest_url(&self.host, name)
    }

    /// Reads and parses a manifest without platform projection.
    pub fn load(&self, reference: &str) -> Result<LoadedManifest> {
        let parsed = ManifestReference::parse(reference, &self.host)?;
        let origin = parsed.origin()?;
        let raw = match &parsed {
            ManifestReference::Local(path) => match fs::read_to_string(path) {
                Ok(raw) => raw,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    return Err(PkgError::PackageNotFound {
                        reference: reference.to_string(),
                    }
                    .into());
                }
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to read manifest {}", path.display()));
                }
            },
            ManifestReference::Remote(url) => {
                self.transport
                    .get_text(url)?
                    .ok_or_else(|| PkgError::PackageNotFound {
                        reference: reference.to_string(),
                    })?
            }
        };

        let manifest = RawManifest::from_json_str(reference, &raw)?;
        tracing::debug!(reference, origin = %origin, version = %manifest.version, "loaded manifest");
        Ok(LoadedManifest { origin, manifest })
    }

    pub fn resolve(&self, reference: &str) -> Result<ResolvedManifest> {
        let loaded = self.load(reference)?;
        loaded
            .manifest
            .resolve(&loaded.origin, &self.platform, &self.dirs)
    }
}
