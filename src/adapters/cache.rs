use crate::domain::ports::RepoRef;
use crate::utils::error::RemoteError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};

/// Marker written last into a cache entry; an entry without it is incomplete.
pub const COMPLETE_MARKER: &str = ".workshop-complete";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMarker {
    pub addr: String,
    pub rel: String,
    pub files: usize,
    pub bytes: u64,
    pub fetched_at: DateTime<Utc>,
}

/// Per-revision module cache: `<root>/<domain>/<owner>/<repo>@<rel>/`.
#[derive(Debug, Clone)]
pub struct ModuleCache {
    root: PathBuf,
}

impl ModuleCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn entry_dir(&self, repo: &RepoRef, rel: &str) -> PathBuf {
        self.root
            .join(&repo.domain)
            .join(&repo.owner)
            .join(format!("{}@{}", repo.repo, rel))
    }

    pub fn marker(&self, repo: &RepoRef, rel: &str) -> Option<CacheMarker> {
        let marker = self.entry_dir(repo, rel).join(COMPLETE_MARKER);
        let content = std::fs::read_to_string(marker).ok()?;
        serde_json::from_str(&content).ok()
    }

    pub fn is_complete(&self, repo: &RepoRef, rel: &str) -> bool {
        self.marker(repo, rel).is_some()
    }

    /// Extracts `archive` into a staging directory and renames it into place.
    ///
    /// The staging directory is removed if anything fails before the rename,
    /// so a torn entry is never published.
    pub fn publish(
        &self,
        repo: &RepoRef,
        rel: &str,
        archive: &[u8],
    ) -> Result<PathBuf, RemoteError> {
        let target = self.entry_dir(repo, rel);
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        std::fs::create_dir_all(&parent)?;

        let staging = tempfile::Builder::new()
            .prefix(&format!(".{}@{}.staging-", repo.repo, rel))
            .tempdir_in(&parent)?;

        let (files, bytes) = extract_archive(archive, staging.path())?;
        if files == 0 {
            return Err(RemoteError::EmptyArchive {
                key: format!("{}@{}", repo.addr(), rel),
            });
        }

        let marker = CacheMarker {
            addr: repo.addr(),
            rel: rel.to_string(),
            files,
            bytes,
            fetched_at: Utc::now(),
        };
        let marker_json = serde_json::to_vec_pretty(&marker)
            .map_err(|e| RemoteError::Io(std::io::Error::other(e)))?;
        std::fs::write(staging.path().join(COMPLETE_MARKER), marker_json)?;

        if target.exists() {
            if self.is_complete(repo, rel) {
                tracing::debug!(
                    "📦 {} already published, discarding staged copy",
                    target.display()
                );
                return Ok(target);
            }
            tracing::warn!("🧹 Removing incomplete cache entry {}", target.display());
            std::fs::remove_dir_all(&target)?;
        }

        let staged = staging.keep();
        if let Err(e) = std::fs::rename(&staged, &target) {
            let _ = std::fs::remove_dir_all(&staged);
            return Err(e.into());
        }

        tracing::debug!(
            "📦 Published {} file(s), {} bytes to {}",
            files,
            bytes,
            target.display()
        );
        Ok(target)
    }
}

/// Unpacks a zip archive, dropping the single top-level directory that
/// source archives wrap their content in. Returns file count and total size.
fn extract_archive(archive: &[u8], dest: &Path) -> Result<(usize, u64), RemoteError> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;

    let mut names = Vec::with_capacity(zip.len());
    for i in 0..zip.len() {
        names.push(zip.by_index(i)?.enclosed_name());
    }
    let prefix = common_root(names.iter().flatten());

    let mut files = 0;
    let mut bytes = 0;
    for (i, name) in names.into_iter().enumerate() {
        // 跳過會逃出目錄的項目
        let Some(name) = name else { continue };
        let relative = match &prefix {
            Some(prefix) => match name.strip_prefix(prefix) {
                Ok(rest) => rest.to_path_buf(),
                Err(_) => name,
            },
            None => name,
        };
        if relative.as_os_str().is_empty() {
            continue;
        }

        let out = dest.join(&relative);
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() {
            std::fs::create_dir_all(&out)?;
            continue;
        }
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(&out)?;
        bytes += std::io::copy(&mut entry, &mut file)?;
        files += 1;
    }

    Ok((files, bytes))
}

fn common_root<'a>(names: impl Iterator<Item = &'a PathBuf>) -> Option<PathBuf> {
    let mut root: Option<PathBuf> = None;
    let mut nested = false;
    for name in names {
        let mut components = name.components();
        let first = match components.next() {
            Some(Component::Normal(part)) => PathBuf::from(part),
            _ => return None,
        };
        nested |= components.next().is_some();
        match &root {
            Some(existing) if *existing != first => return None,
            Some(_) => {}
            None => root = Some(first),
        }
    }
    // 單一層的壓縮檔不剝除
    root.filter(|_| nested)
}
