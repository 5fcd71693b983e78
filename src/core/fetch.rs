use crate::adapters::cache::ModuleCache;
use crate::domain::ports::{RemoteHost, RepoRef};
use crate::utils::error::{RemoteError, Result, WorkshopError};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Failure handed to every waiter of a shared fetch.
#[derive(Debug, Clone)]
struct FetchFailure {
    attempts: u32,
    cause: Arc<RemoteError>,
}

type InflightFetch = Shared<BoxFuture<'static, std::result::Result<PathBuf, FetchFailure>>>;

/// Downloads archives into the module cache.
///
/// At most one fetch per `Addr@Rel` is in flight; later callers for the same
/// key await the first caller's future. Distinct keys run in parallel.
pub struct FetchOrchestrator {
    remote: Arc<dyn RemoteHost>,
    cache: ModuleCache,
    policy: RetryPolicy,
    inflight: Mutex<HashMap<String, InflightFetch>>,
}

impl FetchOrchestrator {
    pub fn new(remote: Arc<dyn RemoteHost>, cache: ModuleCache, policy: RetryPolicy) -> Self {
        Self {
            remote,
            cache,
            policy,
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Materializes `repo@rel`, returning the cache entry directory.
    pub async fn fetch(&self, repo: &RepoRef, rel: &str) -> Result<PathBuf> {
        if self.cache.is_complete(repo, rel) {
            return Ok(self.cache.entry_dir(repo, rel));
        }

        let key = format!("{}@{}", repo.addr(), rel);
        let fetch = {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            inflight
                .entry(key.clone())
                .or_insert_with(|| {
                    tracing::info!("📥 Fetching {}", key);
                    self.start(repo.clone(), rel.to_string(), key.clone())
                })
                .clone()
        };

        let outcome = fetch.clone().await;

        {
            let mut inflight = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
            if inflight.get(&key).is_some_and(|current| current.ptr_eq(&fetch)) {
                inflight.remove(&key);
            }
        }

        outcome.map_err(|failure| WorkshopError::FetchFailed {
            key,
            attempts: failure.attempts,
            source: failure.cause,
        })
    }

    fn start(&self, repo: RepoRef, rel: String, key: String) -> InflightFetch {
        let remote = Arc::clone(&self.remote);
        let cache = self.cache.clone();
        let policy = self.policy.clone();

        async move {
            let mut attempt = 0;
            loop {
                attempt += 1;
                let result = match remote.download(&repo, &rel).await {
                    Ok(archive) => cache.publish(&repo, &rel, &archive),
                    Err(e) => Err(e),
                };

                match result {
                    Ok(dir) => {
                        tracing::info!("✅ Fetched {} into {}", key, dir.display());
                        return Ok(dir);
                    }
                    Err(e) if e.is_transient() && attempt < policy.attempts => {
                        tracing::warn!(
                            "🔁 Fetch {} attempt {}/{} failed: {}",
                            key,
                            attempt,
                            policy.attempts,
                            e
                        );
                        tokio::time::sleep(policy.delay * attempt).await;
                    }
                    Err(e) => {
                        tracing::error!(
                            "❌ Fetch {} failed after {} attempt(s): {}",
                            key,
                            attempt,
                            e
                        );
                        return Err(FetchFailure {
                            attempts: attempt,
                            cause: Arc::new(e),
                        });
                    }
                }
            }
        }
        .boxed()
        .shared()
    }
}
