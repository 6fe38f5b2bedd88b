use crate::FetchStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddStatus {
    Installed,
    AlreadyInstalled,
    /// Was tracked as a dependency of `from` and is now top-level.
    Promoted { from: Vec<String> },
    /// Installed at a different version and replaced.
    Updated { from_version: String },
    Declined,
}

impl AddStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Installed => "installed",
            Self::AlreadyInstalled => "already installed",
            Self::Promoted { .. } => "promoted",
            Self::Updated { .. } => "updated",
            Self::Declined => "declined",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome {
    pub name: String,
    pub version: String,
    pub status: AddStatus,
    /// Dependencies freshly installed by this add, in install order.
    pub installed_dependencies: Vec<String>,
    pub files: Vec<String>,
    pub caveats: String,
    pub download: Option<FetchStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoveOutcome {
    pub name: String,
    pub version: String,
    pub deleted_files: Vec<String>,
    /// Tracked dependencies removed in the cascade.
    pub removed_dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    UpToDate,
    Updated { from: String, to: String },
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub name: String,
    pub status: UpdateStatus,
    pub files: Vec<String>,
    pub installed_dependencies: Vec<String>,
    pub removed_dependencies: Vec<String>,
}

impl UpdateOutcome {
    pub(crate) fn up_to_date(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: UpdateStatus::UpToDate,
            files: Vec::new(),
            installed_dependencies: Vec::new(),
            removed_dependencies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestCheck {
    /// Version the catalog manifest currently advertises.
    pub manifest_version: String,
    /// Trimmed stdout of the `latest` script; `None` when there is no script
    /// or it printed nothing.
    pub latest: Option<String>,
}

/// Result of one package's latest-version check.
#[derive(Debug)]
pub struct LatestReport {
    pub name: String,
    pub installed: String,
    pub check: anyhow::Result<LatestCheck>,
}

impl LatestReport {
    pub fn is_outdated(&self) -> bool {
        matches!(
            &self.check,
            Ok(LatestCheck { manifest_version, latest: Some(latest) }) if latest != manifest_version
        )
    }
}
