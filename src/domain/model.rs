use crate::domain::ports::RepoRef;
use crate::domain::version::Version;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Materialization state of a requirement.
///
/// `Declared -> Resolving -> {Replaced | Fetching -> Downloaded | Failed}`.
/// A failed requirement goes back to `Resolving` on the next `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleState {
    Declared,
    Resolving,
    Replaced,
    Fetching,
    Downloaded,
    Failed,
}

/// One resolved external module dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// `address@rel` as declared in the manifest.
    pub url: String,
    pub domain: String,
    pub owner: String,
    pub repo: String,
    /// Subpath inside the repository, `""` or `/a/b`.
    pub path: String,
    /// `domain/owner/repo`
    pub addr: String,
    pub name: String,
    pub alias: String,
    pub version: Version,
    pub rel: String,
    pub replaced: bool,
    pub downloaded: bool,
    pub state: ModuleState,
    /// Effective on-disk source: the override location or the cache entry.
    pub location: PathBuf,
}

impl Requirement {
    /// `domain/owner/repo/path`, the identity a requirement is unique by.
    pub fn module(&self) -> String {
        format!("{}{}", self.addr, self.path)
    }

    /// Key of the per-revision cache entry shared by every subpath of a repository.
    pub fn cache_key(&self) -> String {
        format!("{}@{}", self.addr, self.rel)
    }

    pub fn repo_ref(&self) -> RepoRef {
        RepoRef {
            domain: self.domain.clone(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
        }
    }

    /// The subpath of this requirement beneath a repository checkout at `base`.
    pub fn location_in(&self, base: &Path) -> PathBuf {
        match self.path.trim_start_matches('/') {
            "" => base.to_path_buf(),
            sub => base.join(sub),
        }
    }

    pub fn same_module(&self, addr: &str, path: &str) -> bool {
        self.addr == addr && self.path == path
    }

    pub fn transition(&mut self, state: ModuleState) {
        self.state = state;
        match state {
            ModuleState::Replaced => self.replaced = true,
            ModuleState::Downloaded => self.downloaded = true,
            ModuleState::Declared | ModuleState::Resolving => {}
            ModuleState::Fetching | ModuleState::Failed => self.downloaded = false,
        }
    }

    /// Re-points the requirement at a new version and revision.
    pub fn set_version(&mut self, version: Version, rel: String) {
        self.url = format!("{}@{}", self.module(), rel);
        self.version = version;
        self.rel = rel;
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.alias, self.url, self.version)
    }
}

/// Persisted form of a requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequireEntry {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Result of materializing one requirement during a batch download.
#[derive(Debug)]
pub struct DownloadOutcome {
    pub module: String,
    pub cache_key: String,
    pub result: crate::utils::error::Result<PathBuf>,
}
