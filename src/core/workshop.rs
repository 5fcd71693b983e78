use crate::adapters::cache::ModuleCache;
use crate::adapters::github::HttpRemote;
use crate::config::WorkshopConfig;
use crate::core::address;
use crate::core::fetch::{FetchOrchestrator, RetryPolicy};
use crate::core::manifest::{build_requirement, Manifest, ManifestStore};
use crate::core::mapping::Mapping;
use crate::core::replace::ReplacementResolver;
use crate::core::resolver::{self, VersionResolver};
use crate::domain::model::{DownloadOutcome, ModuleState, Requirement};
use crate::domain::ports::RemoteHost;
use crate::domain::version::Version;
use crate::utils::error::{Result, WorkshopError};
use crate::utils::validation::Validate;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
pub struct GetOptions {
    /// Re-query the highest version even if one is already recorded.
    pub force_latest: bool,
    /// Record the requirement without materializing content.
    pub skip_fetch: bool,
}

struct State {
    manifest: Manifest,
    mapping: Mapping,
}

/// What one `get` changed in the manifest, kept until its fetch settles.
struct Undo {
    module: String,
    rel: String,
    previous: Option<Requirement>,
    /// Sibling modules moved to `rel`, with their earlier version and revision.
    upgraded: Vec<(String, Version, String)>,
    created_file: bool,
}

/// An opened workspace: its requirements, mapping and module cache.
///
/// Mutations are serialized through an internal lock and persisted before
/// they become visible; fetches run outside of it.
pub struct Workshop {
    root: PathBuf,
    config: WorkshopConfig,
    store: ManifestStore,
    resolver: VersionResolver,
    fetcher: FetchOrchestrator,
    state: Mutex<State>,
}

impl Workshop {
    /// Opens the workspace at `root` using `workshop.toml` and the HTTP remote.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let config = WorkshopConfig::load(root.as_ref())?;
        config.validate()?;
        let remote = Arc::new(HttpRemote::new(config.clone())?);
        Self::open_with(root, config, remote)
    }

    pub fn open_with<P: AsRef<Path>>(
        root: P,
        config: WorkshopConfig,
        remote: Arc<dyn RemoteHost>,
    ) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let store = ManifestStore::new(config.manifest_path(&root));
        let cache = ModuleCache::new(config.cache_path(&root));

        let mut manifest = Manifest::from_file(store.load()?)?;
        annotate(&root, &cache, &mut manifest);
        let mapping = Mapping::build(&manifest.require);

        tracing::info!(
            "📂 Opened workshop {} with {} requirement(s)",
            root.display(),
            manifest.require.len()
        );

        let policy = RetryPolicy {
            attempts: config.remote.retry_attempts,
            delay: config.retry_delay(),
        };

        Ok(Self {
            resolver: VersionResolver::new(Arc::clone(&remote)),
            fetcher: FetchOrchestrator::new(remote, cache, policy),
            root,
            config,
            store,
            state: Mutex::new(State { manifest, mapping }),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Declared requirements, in declaration order.
    pub async fn require(&self) -> Vec<Requirement> {
        self.state.lock().await.manifest.require.clone()
    }

    /// Alias and module address to requirement.
    /// The canonical name is not a key once an alias is set; use [`Workshop::lookup`] for it.
    pub async fn mapping(&self) -> HashMap<String, Requirement> {
        let state = self.state.lock().await;
        state
            .mapping
            .resolve(&state.manifest.require)
            .into_iter()
            .map(|(key, requirement)| (key, requirement.clone()))
            .collect()
    }

    /// Finds a requirement by alias, module address or canonical name.
    pub async fn lookup(&self, key: &str) -> Option<Requirement> {
        let state = self.state.lock().await;
        let require = &state.manifest.require;
        state
            .mapping
            .get(key)
            .and_then(|index| require.get(index))
            .or_else(|| require.iter().rev().find(|r| r.name == key))
            .cloned()
    }

    /// Resolves `address`, records it and, unless skipped, materializes it.
    pub async fn get(
        &self,
        address: &str,
        alias: Option<&str>,
        options: GetOptions,
    ) -> Result<Requirement> {
        let address = address::parse(address)?;
        let addr = address.addr();

        let mut state = self.state.lock().await;
        let siblings = state.manifest.siblings(&addr);
        let requested = self
            .resolver
            .resolve(&address, &siblings, options.force_latest)
            .await?;
        let selected = resolver::select(siblings.into_iter().chain([requested.clone()]))
            .unwrap_or(requested);

        let mut next = state.manifest.clone();
        let previous = next
            .position(&addr, &address.path)
            .map(|i| next.require[i].clone());
        let alias = alias
            .map(str::to_string)
            .or_else(|| previous.as_ref().map(|p| p.alias.clone()));
        let mut requirement = build_requirement(&address, selected.clone(), alias.as_deref());
        requirement.transition(ModuleState::Resolving);
        let index = next.upsert(requirement);
        let module = address.module();

        // 版本屬於整個倉庫，所有子路徑一起升級
        let mut upgraded = Vec::new();
        for sibling in next.require.iter_mut().filter(|r| r.addr == addr) {
            if sibling.version != selected.version || sibling.rel != selected.rel {
                tracing::info!(
                    "⬆️  {} {} -> {}",
                    sibling.module(),
                    sibling.version,
                    selected.version
                );
                upgraded.push((sibling.module(), sibling.version.clone(), sibling.rel.clone()));
                sibling.set_version(selected.version.clone(), selected.rel.clone());
            }
        }

        annotate(&self.root, self.fetcher.cache(), &mut next);
        let created_file = !self.store.path().exists();
        self.store.persist(&next.to_file())?;
        state.mapping = Mapping::build(&next.require);
        state.manifest = next;

        let requirement = state.manifest.require[index].clone();
        tracing::info!("📌 Recorded {}", requirement);

        if options.skip_fetch || requirement.replaced || requirement.downloaded {
            return Ok(requirement);
        }

        let key = requirement.cache_key();
        mark(&mut state.manifest, &key, ModuleState::Fetching);
        drop(state);

        let undo = Undo {
            module,
            rel: selected.rel,
            previous,
            upgraded,
            created_file,
        };

        let outcome = self
            .fetcher
            .fetch(&requirement.repo_ref(), &requirement.rel)
            .await;

        let mut state = self.state.lock().await;
        if let Err(e) = outcome {
            if let Err(rollback) = self.roll_back(&mut state, undo) {
                tracing::error!("❌ Could not restore manifest after failed fetch: {}", rollback);
            }
            mark(&mut state.manifest, &key, ModuleState::Failed);
            return Err(e);
        }
        annotate(&self.root, self.fetcher.cache(), &mut state.manifest);

        let module = undo.module;
        let current = state
            .manifest
            .require
            .iter()
            .find(|r| r.module() == module)
            .cloned();
        Ok(current.unwrap_or_else(|| {
            let mut detached = requirement;
            detached.transition(ModuleState::Downloaded);
            detached
        }))
    }

    /// Takes back the entries a failed `get` recorded. Entries another call
    /// has since moved to a different revision are left alone.
    fn roll_back(&self, state: &mut State, undo: Undo) -> Result<()> {
        let mut next = state.manifest.clone();

        if let Some(index) = next
            .require
            .iter()
            .position(|r| r.module() == undo.module && r.rel == undo.rel)
        {
            match undo.previous {
                Some(previous) => next.require[index] = previous,
                None => {
                    next.require.remove(index);
                }
            }
        }
        for (module, version, rel) in undo.upgraded {
            if let Some(sibling) = next
                .require
                .iter_mut()
                .find(|r| r.module() == module && r.rel == undo.rel)
            {
                sibling.set_version(version, rel);
                sibling.transition(ModuleState::Declared);
            }
        }
        annotate(&self.root, self.fetcher.cache(), &mut next);

        if undo.created_file && next.require.is_empty() && next.replace.is_empty() {
            match std::fs::remove_file(self.store.path()) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        } else {
            self.store.persist(&next.to_file())?;
        }
        state.mapping = Mapping::build(&next.require);
        state.manifest = next;

        tracing::warn!("↩️  Restored manifest after failed fetch of {}", undo.module);
        Ok(())
    }

    /// Removes the requirement(s) matched by alias, canonical name or module address.
    pub async fn remove(&self, key: &str) -> Result<Vec<Requirement>> {
        let mut state = self.state.lock().await;
        let mut next = state.manifest.clone();
        let removed = next.remove(key)?;

        self.store.persist(&next.to_file())?;
        state.mapping = Mapping::build(&next.require);
        state.manifest = next;

        for requirement in &removed {
            tracing::info!("🗑️  Removed {}", requirement);
        }
        Ok(removed)
    }

    /// Adds or changes an override entry. `key` is `Addr` or `Addr/Path`.
    pub async fn replace(&self, key: &str, location: &str) -> Result<()> {
        let module = override_key(key)?;
        crate::utils::validation::validate_path("replace.location", location)?;
        self.edit_overrides(|table| {
            table.insert(module, location.to_string());
            true
        })
        .await
    }

    pub async fn unreplace(&self, key: &str) -> Result<()> {
        let module = override_key(key)?;
        let mut found = false;
        self.edit_overrides(|table| {
            found = table.remove(&module).is_some();
            found
        })
        .await?;
        if !found {
            return Err(WorkshopError::RequirementNotFound(module));
        }
        Ok(())
    }

    async fn edit_overrides<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut std::collections::BTreeMap<String, String>) -> bool,
    {
        let mut state = self.state.lock().await;
        let mut next = state.manifest.clone();
        if !edit(&mut next.replace) {
            return Ok(());
        }
        annotate(&self.root, self.fetcher.cache(), &mut next);

        self.store.persist(&next.to_file())?;
        state.mapping = Mapping::build(&next.require);
        state.manifest = next;
        Ok(())
    }

    /// Materializes every pending, non-replaced requirement.
    /// A failure only affects its own requirement.
    pub async fn download(&self) -> Vec<DownloadOutcome> {
        let pending: Vec<Requirement> = {
            let mut state = self.state.lock().await;
            let pending: Vec<Requirement> = state
                .manifest
                .require
                .iter()
                .filter(|r| !r.replaced && !r.downloaded)
                .cloned()
                .collect();
            for requirement in &pending {
                mark(&mut state.manifest, &requirement.cache_key(), ModuleState::Fetching);
            }
            pending
        };

        if pending.is_empty() {
            return Vec::new();
        }
        tracing::info!("📥 Downloading {} requirement(s)", pending.len());

        let outcomes: Vec<DownloadOutcome> = stream::iter(pending)
            .map(|requirement| async move {
                let result = self
                    .fetcher
                    .fetch(&requirement.repo_ref(), &requirement.rel)
                    .await
                    .map(|dir| requirement.location_in(&dir));
                DownloadOutcome {
                    module: requirement.module(),
                    cache_key: requirement.cache_key(),
                    result,
                }
            })
            .buffer_unordered(self.config.remote.concurrent_downloads.max(1))
            .collect()
            .await;

        let mut state = self.state.lock().await;
        annotate(&self.root, self.fetcher.cache(), &mut state.manifest);
        for outcome in outcomes.iter().filter(|o| o.result.is_err()) {
            mark(&mut state.manifest, &outcome.cache_key, ModuleState::Failed);
        }
        outcomes
    }
}

/// Re-derives `Replaced`, `Downloaded` and the location of every requirement.
fn annotate(root: &Path, cache: &ModuleCache, manifest: &mut Manifest) {
    let replacements = ReplacementResolver::new(&manifest.replace, root);
    for requirement in manifest.require.iter_mut() {
        if replacements.annotate(requirement) {
            continue;
        }
        let repo = requirement.repo_ref();
        requirement.location = requirement.location_in(&cache.entry_dir(&repo, &requirement.rel));
        requirement.downloaded = cache.is_complete(&repo, &requirement.rel);
        if requirement.downloaded {
            requirement.transition(ModuleState::Downloaded);
        } else if requirement.state == ModuleState::Downloaded {
            requirement.transition(ModuleState::Declared);
        }
    }
}

fn mark(manifest: &mut Manifest, cache_key: &str, state: ModuleState) {
    for requirement in manifest
        .require
        .iter_mut()
        .filter(|r| !r.replaced && r.cache_key() == cache_key)
    {
        requirement.transition(state);
    }
}

fn override_key(key: &str) -> Result<String> {
    let parsed = address::parse(key)?;
    if parsed.spec != address::VersionSpec::Latest {
        return Err(WorkshopError::malformed(
            key,
            "override keys must not carry a version",
        ));
    }
    Ok(parsed.module())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{RemoteTag, RepoRef};
    use crate::utils::error::RemoteError;
    use async_trait::async_trait;
    use std::io::{Cursor, Write};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use zip::write::{FileOptions, ZipWriter};

    struct MockRemote {
        tags: Vec<&'static str>,
        downloads: AtomicUsize,
        offline: bool,
        broken_repo: Option<&'static str>,
    }

    impl MockRemote {
        fn with_tags(tags: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                tags,
                downloads: AtomicUsize::new(0),
                offline: false,
                broken_repo: None,
            })
        }

        fn offline() -> Arc<Self> {
            Arc::new(Self {
                tags: Vec::new(),
                downloads: AtomicUsize::new(0),
                offline: true,
                broken_repo: None,
            })
        }

        fn broken(repo: &'static str) -> Arc<Self> {
            Arc::new(Self {
                tags: Vec::new(),
                downloads: AtomicUsize::new(0),
                offline: false,
                broken_repo: Some(repo),
            })
        }
    }

    #[async_trait]
    impl RemoteHost for MockRemote {
        async fn tags(&self, repo: &RepoRef) -> std::result::Result<Vec<RemoteTag>, RemoteError> {
            if self.offline {
                return Err(RemoteError::Status {
                    url: repo.addr(),
                    status: 503,
                });
            }
            Ok(self
                .tags
                .iter()
                .map(|name| RemoteTag {
                    name: name.to_string(),
                })
                .collect())
        }

        async fn head_revision(&self, _repo: &RepoRef) -> std::result::Result<String, RemoteError> {
            Ok("e86eab4c8490aabbccddeeff".to_string())
        }

        async fn download(
            &self,
            repo: &RepoRef,
            _rel: &str,
        ) -> std::result::Result<Vec<u8>, RemoteError> {
            if self.offline || self.broken_repo == Some(repo.repo.as_str()) {
                return Err(RemoteError::NotFound { url: repo.addr() });
            }
            self.downloads.fetch_add(1, Ordering::SeqCst);
            let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
            zip.start_file::<_, ()>("root/cloud/app.yao", FileOptions::default())
                .unwrap();
            zip.write_all(b"{}").unwrap();
            Ok(zip.finish().unwrap().into_inner())
        }
    }

    fn open(root: &TempDir, remote: Arc<MockRemote>) -> Workshop {
        Workshop::open_with(root.path(), WorkshopConfig::default(), remote).unwrap()
    }

    fn skip_fetch() -> GetOptions {
        GetOptions {
            skip_fetch: true,
            ..GetOptions::default()
        }
    }

    #[tokio::test]
    async fn test_open_empty_root() {
        let root = TempDir::new().unwrap();
        let workshop = open(&root, MockRemote::with_tags(vec![]));

        assert!(workshop.require().await.is_empty());
        assert!(workshop.mapping().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_without_releases_pins_head() {
        let root = TempDir::new().unwrap();
        let workshop = open(&root, MockRemote::with_tags(vec![]));

        workshop
            .get("github.com/yaoapp/demo-wms/cloud", Some("wms"), skip_fetch())
            .await
            .unwrap();

        let require = workshop.require().await;
        assert_eq!(require.len(), 1);
        assert_eq!(workshop.mapping().await.len(), 2);

        let wms = &require[0];
        assert_eq!(wms.version.to_string(), "0.0.0-e86eab4c8490");
        assert_eq!(wms.rel, "e86eab4c8490");
        assert_eq!(wms.name, "demo-wms.yaoapp.cloud");
        assert_eq!(wms.alias, "wms");
        assert_eq!(wms.addr, "github.com/yaoapp/demo-wms");
        assert_eq!(wms.path, "/cloud");
        assert_eq!(wms.url, "github.com/yaoapp/demo-wms/cloud@e86eab4c8490");
        assert!(!wms.replaced);
        assert!(!wms.downloaded);
    }

    #[tokio::test]
    async fn test_upgrade_in_place_and_keep_alias() {
        let root = TempDir::new().unwrap();
        let workshop = open(&root, MockRemote::with_tags(vec![]));

        workshop
            .get("github.com/acme/one@0.1.0", Some("one"), skip_fetch())
            .await
            .unwrap();
        workshop
            .get("github.com/acme/two@0.1.0", None, skip_fetch())
            .await
            .unwrap();
        workshop
            .get("github.com/acme/one@0.2.0", None, skip_fetch())
            .await
            .unwrap();

        let require = workshop.require().await;
        assert_eq!(require.len(), 2);
        assert_eq!(require[0].version.to_string(), "0.2.0");
        assert_eq!(require[0].alias, "one");

        // 較低版本的請求不會降級
        let kept = workshop
            .get("github.com/acme/one@0.1.5", None, skip_fetch())
            .await
            .unwrap();
        assert_eq!(kept.version.to_string(), "0.2.0");
    }

    #[tokio::test]
    async fn test_subpaths_share_selected_version() {
        let root = TempDir::new().unwrap();
        let workshop = open(&root, MockRemote::with_tags(vec![]));

        workshop
            .get("github.com/acme/kit/ui@1.0.0", None, skip_fetch())
            .await
            .unwrap();
        workshop
            .get("github.com/acme/kit/api@1.2.0", None, skip_fetch())
            .await
            .unwrap();

        let require = workshop.require().await;
        assert_eq!(require.len(), 2);
        assert!(require.iter().all(|r| r.version.to_string() == "1.2.0"));
        assert_eq!(require[0].url, "github.com/acme/kit/ui@1.2.0");
        assert_eq!(require[0].cache_key(), require[1].cache_key());
    }

    #[tokio::test]
    async fn test_failed_resolution_leaves_manifest_untouched() {
        let root = TempDir::new().unwrap();
        let workshop = open(&root, MockRemote::offline());
        workshop
            .get("github.com/acme/kit@1.0.0", None, skip_fetch())
            .await
            .unwrap();
        let before = std::fs::read_to_string(root.path().join("workshop.json")).unwrap();

        let err = workshop
            .get("github.com/acme/other", None, GetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkshopError::VersionUnavailable { .. }));

        let malformed = workshop.get("github.com/acme", None, skip_fetch()).await;
        assert!(matches!(malformed, Err(WorkshopError::MalformedAddress { .. })));

        let after = std::fs::read_to_string(root.path().join("workshop.json")).unwrap();
        assert_eq!(before, after);
        assert_eq!(workshop.require().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_manifest_untouched() {
        let root = TempDir::new().unwrap();
        let manifest = root.path().join("workshop.json");
        let workshop = open(&root, MockRemote::offline());

        let err = workshop
            .get("github.com/acme/kit@1.0.0", None, GetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkshopError::FetchFailed { attempts: 1, .. }));

        assert!(!manifest.exists());
        assert!(workshop.require().await.is_empty());
        assert!(workshop.mapping().await.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_restores_upgraded_siblings() {
        let root = TempDir::new().unwrap();
        let manifest = root.path().join("workshop.json");
        let workshop = open(&root, MockRemote::broken("kit"));
        workshop
            .get("github.com/acme/kit/ui@1.0.0", Some("ui"), skip_fetch())
            .await
            .unwrap();
        let before = std::fs::read(&manifest).unwrap();

        let err = workshop
            .get("github.com/acme/kit/api@1.2.0", None, GetOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkshopError::FetchFailed { .. }));

        assert_eq!(std::fs::read(&manifest).unwrap(), before);
        let require = workshop.require().await;
        assert_eq!(require.len(), 1);
        assert_eq!(require[0].version.to_string(), "1.0.0");
        assert_eq!(require[0].url, "github.com/acme/kit/ui@1.0.0");
        assert!(!require[0].downloaded);
        assert_eq!(workshop.mapping().await.len(), 2);

        // 失敗後可重新宣告
        let retried = workshop
            .get("github.com/acme/kit/api@1.2.0", None, skip_fetch())
            .await
            .unwrap();
        assert_eq!(retried.version.to_string(), "1.2.0");
        assert_eq!(workshop.require().await.len(), 2);
    }

    #[tokio::test]
    async fn test_pseudo_version_specifier_stays_below_releases() {
        let root = TempDir::new().unwrap();
        let workshop = open(&root, MockRemote::with_tags(vec![]));

        let b = workshop
            .get("github.com/acme/kit/b@0.0.0-aaaaaaaaaaaa", None, skip_fetch())
            .await
            .unwrap();
        assert!(matches!(b.version, Version::Pseudo { .. }));
        assert_eq!(b.rel, "aaaaaaaaaaaa");
        assert_eq!(b.url, "github.com/acme/kit/b@aaaaaaaaaaaa");

        workshop
            .get("github.com/acme/kit/a@ffffffffffff", None, skip_fetch())
            .await
            .unwrap();
        let require = workshop.require().await;
        assert!(require.iter().all(|r| r.rel == "ffffffffffff"));
        assert!(require.iter().all(|r| r.version.to_string() == "0.0.0-ffffffffffff"));

        let release = workshop
            .get("github.com/acme/kit/b@0.1.0", None, skip_fetch())
            .await
            .unwrap();
        assert_eq!(release.version.to_string(), "0.1.0");
        let require = workshop.require().await;
        assert!(require.iter().all(|r| r.rel == "0.1.0"));
    }

    #[tokio::test]
    async fn test_get_downloads_and_sets_location() {
        let root = TempDir::new().unwrap();
        let remote = MockRemote::with_tags(vec!["v0.9.5"]);
        let workshop = open(&root, remote.clone());

        let wms = workshop
            .get("github.com/yaoapp/demo-wms/cloud", Some("wms"), GetOptions::default())
            .await
            .unwrap();

        assert!(wms.downloaded);
        assert_eq!(wms.state, ModuleState::Downloaded);
        assert_eq!(wms.rel, "v0.9.5");
        assert!(wms.location.join("app.yao").is_file());
        assert_eq!(remote.downloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replaced_requirement_never_fetches() {
        let root = TempDir::new().unwrap();
        std::fs::create_dir_all(root.path().join("local/demo-wms/cloud")).unwrap();
        let remote = MockRemote::with_tags(vec![]);
        let workshop = open(&root, remote.clone());

        workshop
            .replace("github.com/yaoapp/demo-wms", "local/demo-wms")
            .await
            .unwrap();
        let wms = workshop
            .get("github.com/yaoapp/demo-wms/cloud@e86eab4c8490", None, GetOptions::default())
            .await
            .unwrap();

        assert!(wms.replaced);
        assert!(wms.downloaded);
        assert_eq!(wms.location, root.path().join("local/demo-wms/cloud"));
        assert_eq!(remote.downloads.load(Ordering::SeqCst), 0);

        workshop.unreplace("github.com/yaoapp/demo-wms").await.unwrap();
        let wms = workshop.lookup("demo-wms.yaoapp.cloud").await.unwrap();
        assert!(!wms.replaced);
        assert!(!wms.downloaded);
    }

    #[tokio::test]
    async fn test_remove_drops_both_mapping_entries() {
        let root = TempDir::new().unwrap();
        let workshop = open(&root, MockRemote::with_tags(vec![]));
        workshop
            .get("github.com/acme/one@1.0.0", Some("one"), skip_fetch())
            .await
            .unwrap();
        workshop
            .get("github.com/acme/two@1.0.0", Some("two"), skip_fetch())
            .await
            .unwrap();

        workshop.remove("one").await.unwrap();

        let mapping = workshop.mapping().await;
        assert_eq!(mapping.len(), 2);
        assert!(!mapping.contains_key("one"));
        assert!(!mapping.contains_key("github.com/acme/one"));
        assert_eq!(mapping["two"].addr, "github.com/acme/two");

        assert!(matches!(
            workshop.remove("one").await,
            Err(WorkshopError::RequirementNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_batch_download_isolates_failures() {
        let root = TempDir::new().unwrap();
        let remote = MockRemote::broken("two");
        let workshop = open(&root, remote.clone());
        for raw in [
            "github.com/acme/one@1.0.0",
            "github.com/acme/two@1.0.0",
            "github.com/acme/three@1.0.0",
        ] {
            workshop.get(raw, None, skip_fetch()).await.unwrap();
        }

        let outcomes = workshop.download().await;

        assert_eq!(outcomes.len(), 3);
        let failed: Vec<&DownloadOutcome> =
            outcomes.iter().filter(|o| o.result.is_err()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].module, "github.com/acme/two");

        let require = workshop.require().await;
        assert!(require[0].downloaded);
        assert!(!require[1].downloaded);
        assert_eq!(require[1].state, ModuleState::Failed);
        assert!(require[2].downloaded);
        assert_eq!(remote.downloads.load(Ordering::SeqCst), 2);

        // 只剩失敗的項目待下載
        assert_eq!(workshop.download().await.len(), 1);
    }
}
