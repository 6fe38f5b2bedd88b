mod error;
mod manifest;
mod platform;
mod resolved;

pub use error::{find_pkg_error, PkgError, ScriptStage};
pub use manifest::{ManifestScripts, RawManifest, ScriptGroup, MANIFEST_EXT};
pub use platform::Platform;
pub use resolved::{substitute_template, ResolvedManifest, TemplateDirs};

#[cfg(test)]
mod tests;
