use crate::core::address::{ModuleAddress, VersionSpec};
use crate::domain::model::Requirement;
use crate::domain::ports::{RemoteHost, RemoteTag};
use crate::domain::version::{self, Release, Version};
use crate::utils::error::{Result, WorkshopError};
use std::sync::Arc;

/// A version together with the revision that backs it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub version: Version,
    pub rel: String,
}

impl Resolved {
    pub fn of(requirement: &Requirement) -> Self {
        Self {
            version: requirement.version.clone(),
            rel: requirement.rel.clone(),
        }
    }
}

/// Turns version specifiers into concrete versions.
pub struct VersionResolver {
    remote: Arc<dyn RemoteHost>,
}

impl VersionResolver {
    pub fn new(remote: Arc<dyn RemoteHost>) -> Self {
        Self { remote }
    }

    /// Resolves the requested version for `address`.
    ///
    /// `siblings` are the requirements already declared for the same repository.
    /// A latest request reuses their version unless `force_latest` is set.
    pub async fn resolve(
        &self,
        address: &ModuleAddress,
        siblings: &[Resolved],
        force_latest: bool,
    ) -> Result<Resolved> {
        match &address.spec {
            VersionSpec::Release { release, tag } => Ok(Resolved {
                version: Version::Release(release.clone()),
                rel: tag.clone(),
            }),
            VersionSpec::Revision(rev) => {
                let rel = version::short_revision(rev);
                Ok(Resolved {
                    version: Version::Pseudo { rev: rel.clone() },
                    rel,
                })
            }
            VersionSpec::Latest => {
                if !force_latest {
                    if let Some(cached) = select(siblings.iter().cloned()) {
                        tracing::debug!(
                            "🔁 Reusing recorded version {} for {}",
                            cached.version,
                            address.addr()
                        );
                        return Ok(cached);
                    }
                }
                self.latest(address).await
            }
        }
    }

    /// Highest released tag, or the head revision when the repository has none.
    async fn latest(&self, address: &ModuleAddress) -> Result<Resolved> {
        let repo = address.repo_ref();
        let addr = repo.addr();
        tracing::debug!("🔍 Looking up latest version of {}", addr);

        let tags = self.remote.tags(&repo).await.map_err(|e| {
            WorkshopError::VersionUnavailable {
                addr: addr.clone(),
                reason: e.to_string(),
            }
        })?;

        if let Some((release, tag)) = highest_release(&tags) {
            tracing::info!("🏷️  Latest release of {} is {}", addr, release);
            return Ok(Resolved {
                version: Version::Release(release),
                rel: tag.name.clone(),
            });
        }

        let head = self.remote.head_revision(&repo).await.map_err(|e| {
            WorkshopError::VersionUnavailable {
                addr: addr.clone(),
                reason: e.to_string(),
            }
        })?;
        if !version::is_revision(&head) {
            return Err(WorkshopError::VersionUnavailable {
                addr,
                reason: format!("remote returned an invalid head revision '{}'", head),
            });
        }

        let rel = version::short_revision(&head);
        tracing::info!("🏷️  {} has no releases, pinning head revision {}", addr, rel);
        Ok(Resolved {
            version: Version::Pseudo { rev: rel.clone() },
            rel,
        })
    }
}

/// Stable releases win over pre-releases; tags that are not version shaped are ignored.
fn highest_release(tags: &[RemoteTag]) -> Option<(Release, &RemoteTag)> {
    let releases: Vec<(Release, &RemoteTag)> = tags
        .iter()
        .filter_map(|tag| Release::parse(&tag.name).map(|r| (r, tag)))
        .collect();

    let stable = releases
        .iter()
        .filter(|(r, _)| !r.is_prerelease())
        .max_by(|(a, _), (b, _)| a.cmp(b));

    stable
        .or_else(|| releases.iter().max_by(|(a, _), (b, _)| a.cmp(b)))
        .map(|(r, tag)| (r.clone(), *tag))
}

/// Minimal version selection: the highest of all versions requested for a repository.
pub fn select(candidates: impl IntoIterator<Item = Resolved>) -> Option<Resolved> {
    candidates.into_iter().max_by(|a, b| a.version.cmp(&b.version))
}
