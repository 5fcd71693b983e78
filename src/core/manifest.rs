use crate::core::address::{self, ModuleAddress, VersionSpec};
use crate::core::resolver::Resolved;
use crate::domain::model::{ModuleState, RequireEntry, Requirement};
use crate::domain::version::{self, Version};
use crate::utils::error::{Result, WorkshopError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// On-disk layout of the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    #[serde(default)]
    pub require: Vec<RequireEntry>,
    /// `Addr` or `Addr/Path` to a local source location.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub replace: BTreeMap<String, String>,
}

/// Reads and atomically writes the manifest file of a workspace.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing manifest is an empty workspace.
    pub fn load(&self) -> Result<ManifestFile> {
        if !self.path.exists() {
            tracing::debug!("📄 No manifest at {}, starting empty", self.path.display());
            return Ok(ManifestFile::default());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(ManifestFile::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes to a temporary sibling and renames it over the manifest,
    /// so readers never observe a half-written file.
    pub fn persist(&self, file: &ManifestFile) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let json = serde_json::to_string_pretty(file)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(
            "💾 Persisted {} requirement(s) to {}",
            file.require.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// In-memory requirement list and override table.
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    pub require: Vec<Requirement>,
    pub replace: BTreeMap<String, String>,
}

impl Manifest {
    pub fn from_file(file: ManifestFile) -> Result<Self> {
        let mut manifest = Manifest {
            require: Vec::with_capacity(file.require.len()),
            replace: file.replace,
        };
        for entry in file.require {
            let requirement = requirement_from_entry(&entry)?;
            manifest.upsert(requirement);
        }
        Ok(manifest)
    }

    pub fn to_file(&self) -> ManifestFile {
        ManifestFile {
            require: self
                .require
                .iter()
                .map(|r| RequireEntry {
                    url: r.url.clone(),
                    alias: (r.alias != r.name).then(|| r.alias.clone()),
                })
                .collect(),
            replace: self.replace.clone(),
        }
    }

    pub fn position(&self, addr: &str, path: &str) -> Option<usize> {
        self.require.iter().position(|r| r.same_module(addr, path))
    }

    /// Inserts at the end, or replaces the entry with the same `Addr+Path` in place.
    /// Returns the index of the entry.
    pub fn upsert(&mut self, requirement: Requirement) -> usize {
        match self.position(&requirement.addr, &requirement.path) {
            Some(index) => {
                self.require[index] = requirement;
                index
            }
            None => {
                self.require.push(requirement);
                self.require.len() - 1
            }
        }
    }

    /// Removes requirements matched by alias, canonical name or module address.
    pub fn remove(&mut self, key: &str) -> Result<Vec<Requirement>> {
        let key = key.trim();
        let module_key = address::parse(key)
            .ok()
            .map(|a| (a.addr(), a.path));

        let (removed, kept): (Vec<Requirement>, Vec<Requirement>) =
            std::mem::take(&mut self.require).into_iter().partition(|r| {
                r.alias == key
                    || r.name == key
                    || module_key
                        .as_ref()
                        .is_some_and(|(addr, path)| r.same_module(addr, path))
            });
        self.require = kept;

        if removed.is_empty() {
            return Err(WorkshopError::RequirementNotFound(key.to_string()));
        }
        Ok(removed)
    }

    /// Requirements declared for the repository `addr`.
    pub fn siblings(&self, addr: &str) -> Vec<Resolved> {
        self.require
            .iter()
            .filter(|r| r.addr == addr)
            .map(Resolved::of)
            .collect()
    }
}

/// Builds a requirement for `address` at `resolved`. `Replaced`, `Downloaded`
/// and the location are filled in by the workspace.
pub fn build_requirement(
    address: &ModuleAddress,
    resolved: Resolved,
    alias: Option<&str>,
) -> Requirement {
    let name = address.name();
    let alias = alias
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| name.clone());

    Requirement {
        url: format!("{}@{}", address.module(), resolved.rel),
        domain: address.domain.clone(),
        owner: address.owner.clone(),
        repo: address.repo.clone(),
        path: address.path.clone(),
        addr: address.addr(),
        name,
        alias,
        version: resolved.version,
        rel: resolved.rel,
        replaced: false,
        downloaded: false,
        state: ModuleState::Declared,
        location: PathBuf::new(),
    }
}

fn requirement_from_entry(entry: &RequireEntry) -> Result<Requirement> {
    let address = address::parse(&entry.url)?;
    let resolved = match &address.spec {
        VersionSpec::Release { release, tag } => Resolved {
            version: Version::Release(release.clone()),
            rel: tag.clone(),
        },
        VersionSpec::Revision(rev) => Resolved {
            version: Version::pseudo(rev),
            rel: version::short_revision(rev),
        },
        VersionSpec::Latest => {
            return Err(WorkshopError::malformed(
                &entry.url,
                "manifest entries must pin a version",
            ))
        }
    };
    Ok(build_requirement(&address, resolved, entry.alias.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(url: &str, alias: Option<&str>) -> RequireEntry {
        RequireEntry {
            url: url.to_string(),
            alias: alias.map(str::to_string),
        }
    }

    #[test]
    fn test_load_missing_manifest_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("workshop.json"));

        let file = store.load().unwrap();
        assert!(file.require.is_empty());
        assert!(file.replace.is_empty());
    }

    #[test]
    fn test_entries_become_requirements() {
        let file = ManifestFile {
            require: vec![
                entry("github.com/yaoapp/demo-wms/cloud@e86eab4c8490", None),
                entry("github.com/yaoapp/demo-crm@v0.9.1", Some("crm")),
            ],
            replace: BTreeMap::new(),
        };

        let manifest = Manifest::from_file(file).unwrap();
        let wms = &manifest.require[0];
        assert_eq!(wms.version.to_string(), "0.0.0-e86eab4c8490");
        assert_eq!(wms.rel, "e86eab4c8490");
        assert_eq!(wms.alias, "demo-wms.yaoapp.cloud");

        let crm = &manifest.require[1];
        assert_eq!(crm.version.to_string(), "0.9.1");
        assert_eq!(crm.rel, "v0.9.1");
        assert_eq!(crm.alias, "crm");
        assert_eq!(crm.url, "github.com/yaoapp/demo-crm@v0.9.1");
    }

    #[test]
    fn test_unpinned_entry_is_rejected() {
        let file = ManifestFile {
            require: vec![entry("github.com/acme/kit", None)],
            replace: BTreeMap::new(),
        };
        assert!(matches!(
            Manifest::from_file(file),
            Err(WorkshopError::MalformedAddress { .. })
        ));
    }

    #[test]
    fn test_upsert_keeps_position() {
        let mut manifest = Manifest::default();
        for raw in [
            "github.com/a/one@1.0.0",
            "github.com/a/two@1.0.0",
            "github.com/a/three@1.0.0",
        ] {
            let parsed = address::parse(raw).unwrap();
            manifest.upsert(requirement_from_entry(&entry(raw, None)).unwrap());
            assert_eq!(manifest.require.last().unwrap().addr, parsed.addr());
        }

        let upgraded =
            requirement_from_entry(&entry("github.com/a/two@2.0.0", Some("two"))).unwrap();
        let index = manifest.upsert(upgraded);

        assert_eq!(index, 1);
        assert_eq!(manifest.require.len(), 3);
        assert_eq!(manifest.require[1].version.to_string(), "2.0.0");
        assert_eq!(manifest.require[1].alias, "two");
    }

    #[test]
    fn test_remove_by_alias_and_address() {
        let mut manifest = Manifest::from_file(ManifestFile {
            require: vec![
                entry("github.com/a/one@1.0.0", Some("first")),
                entry("github.com/a/two/sub@1.0.0", None),
            ],
            replace: BTreeMap::new(),
        })
        .unwrap();

        let removed = manifest.remove("first").unwrap();
        assert_eq!(removed[0].addr, "github.com/a/one");

        manifest.remove("github.com/a/two/sub").unwrap();
        assert!(manifest.require.is_empty());

        assert!(matches!(
            manifest.remove("missing"),
            Err(WorkshopError::RequirementNotFound(_))
        ));
    }

    #[test]
    fn test_persist_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = ManifestStore::new(dir.path().join("workshop.json"));
        let mut file = ManifestFile {
            require: vec![
                entry("github.com/a/one@1.0.0", Some("one")),
                entry("github.com/a/two@0123456789ab", None),
            ],
            replace: BTreeMap::new(),
        };
        file.replace
            .insert("github.com/a/two".to_string(), "../two".to_string());

        store.persist(&file).unwrap();
        let reloaded = store.load().unwrap();

        assert_eq!(reloaded, file);
        assert_eq!(Manifest::from_file(reloaded).unwrap().to_file(), file);
    }
}
