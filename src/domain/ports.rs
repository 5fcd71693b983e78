use crate::utils::error::RemoteError;
use async_trait::async_trait;

/// Repository identity on a remote host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoRef {
    pub domain: String,
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn addr(&self) -> String {
        format!("{}/{}/{}", self.domain, self.owner, self.repo)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTag {
    pub name: String,
}

/// Source host for module metadata and archives.
#[async_trait]
pub trait RemoteHost: Send + Sync {
    async fn tags(&self, repo: &RepoRef) -> Result<Vec<RemoteTag>, RemoteError>;

    /// Revision at the head of the default branch.
    async fn head_revision(&self, repo: &RepoRef) -> Result<String, RemoteError>;

    /// Zip archive of the repository at `rel`.
    async fn download(&self, repo: &RepoRef, rel: &str) -> Result<Vec<u8>, RemoteError>;
}
