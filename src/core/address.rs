use crate::domain::ports::RepoRef;
use crate::domain::version::{self, Release, Version};
use crate::utils::error::{Result, WorkshopError};
use std::fmt;

/// Version part of a requirement string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSpec {
    Latest,
    /// Tagged release, with the tag as written.
    Release { release: Release, tag: String },
    /// Raw revision hash.
    Revision(String),
}

/// Parsed `domain/owner/repo[/subpath][@version]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAddress {
    pub domain: String,
    pub owner: String,
    pub repo: String,
    pub path: String,
    pub spec: VersionSpec,
}

impl ModuleAddress {
    pub fn addr(&self) -> String {
        format!("{}/{}/{}", self.domain, self.owner, self.repo)
    }

    pub fn module(&self) -> String {
        format!("{}{}", self.addr(), self.path)
    }

    /// `repo.owner` followed by the subpath segments, dot separated.
    pub fn name(&self) -> String {
        let mut name = format!("{}.{}", self.repo, self.owner);
        for segment in self.path.split('/').filter(|s| !s.is_empty()) {
            name.push('.');
            name.push_str(segment);
        }
        name
    }

    pub fn repo_ref(&self) -> RepoRef {
        RepoRef {
            domain: self.domain.clone(),
            owner: self.owner.clone(),
            repo: self.repo.clone(),
        }
    }
}

impl fmt::Display for ModuleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module())?;
        match &self.spec {
            VersionSpec::Latest => Ok(()),
            VersionSpec::Release { tag, .. } => write!(f, "@{}", tag),
            VersionSpec::Revision(rev) => write!(f, "@{}", rev),
        }
    }
}

/// Parses a requirement string. Pure, never touches the network or disk.
pub fn parse(raw: &str) -> Result<ModuleAddress> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(WorkshopError::malformed(raw, "address is empty"));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(WorkshopError::malformed(raw, "address contains whitespace"));
    }

    let (address, spec) = match raw.rsplit_once('@') {
        Some((address, spec)) => (address, parse_spec(raw, spec)?),
        None => (raw, VersionSpec::Latest),
    };

    let segments: Vec<&str> = address.split('/').collect();
    if segments.len() < 3 {
        return Err(WorkshopError::malformed(
            raw,
            format!("expected domain/owner/repo, got {} segment(s)", segments.len()),
        ));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(WorkshopError::malformed(raw, "address has an empty segment"));
    }

    let path = segments[3..]
        .iter()
        .map(|s| format!("/{}", s))
        .collect::<String>();

    Ok(ModuleAddress {
        domain: segments[0].to_string(),
        owner: segments[1].to_string(),
        repo: segments[2].to_string(),
        path,
        spec,
    })
}

fn parse_spec(raw: &str, spec: &str) -> Result<VersionSpec> {
    if spec.is_empty() {
        return Err(WorkshopError::malformed(raw, "empty version after '@'"));
    }
    if spec == "latest" {
        return Ok(VersionSpec::Latest);
    }
    // 0.0.0-<rev> 是偽版本，指向 revision 而非 tag
    match Version::parse(spec) {
        Some(Version::Pseudo { rev }) => return Ok(VersionSpec::Revision(rev)),
        Some(Version::Release(release)) => {
            return Ok(VersionSpec::Release {
                release,
                tag: spec.to_string(),
            })
        }
        None => {}
    }
    if version::is_revision(spec) {
        return Ok(VersionSpec::Revision(spec.to_string()));
    }
    Err(WorkshopError::malformed(
        raw,
        format!("'{}' is neither a release version nor a revision", spec),
    ))
}
