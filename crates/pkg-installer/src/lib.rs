mod config;
mod engine;
mod fetch;
mod fs_utils;
mod guard;
mod init;
mod latest;
mod layout;
mod lockfile;
mod scripts;
mod snapshot;
mod types;
mod uninstall;

pub use config::{PkgConfig, DEFAULT_MANIFEST_HOST, PKG_HOME_ENV, PKG_MANIFEST_HOST_ENV};
pub use engine::{EngineOptions, InstallEngine};
pub use fetch::{fetch_and_verify, ArtifactFetcher, FetchStatus, FetchedArtifact};
pub use guard::LockfileGuard;
pub use init::{init_layout, InitReport};
pub use latest::check_latest_versions;
pub use layout::{default_pkg_home, PkgLayout, LOCKFILE_NAME};
pub use lockfile::{read_lockfile, write_lockfile, Lockfile, LockfileEntry, LockfileStore};
pub use scripts::{build_script_text, ConfirmPrompt, ScriptOutcome, ScriptRunner};
pub use snapshot::{new_files, snapshot_managed_files, ManagedSnapshot};
pub use types::{
    AddOutcome, AddStatus, LatestCheck, LatestReport, RemoveOutcome, UpdateOutcome, UpdateStatus,
};
