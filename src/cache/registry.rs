use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::git_cache::{CacheInfo, CacheSettings, GitCache};
use super::memo::OnceMap;
use crate::error::Result;
use crate::git::{GitRunner, SystemGit};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    repo: PathBuf,
    ttl: Duration,
}

/// Keyed factory for [`GitCache`] instances
///
/// One instance exists per (repository, ttl); every caller asking for the same
/// key receives the same `Arc`, so all of them share one refresh lock.
pub struct CacheRegistry {
    defaults: CacheSettings,
    runner: Arc<dyn GitRunner>,
    caches: OnceMap<CacheKey, Arc<GitCache>>,
}

impl CacheRegistry {
    pub fn new(defaults: CacheSettings) -> Self {
        Self::with_runner(defaults, Arc::new(SystemGit::new()))
    }

    pub fn with_runner(defaults: CacheSettings, runner: Arc<dyn GitRunner>) -> Self {
        Self {
            defaults,
            runner,
            caches: OnceMap::new(),
        }
    }

    pub fn defaults(&self) -> &CacheSettings {
        &self.defaults
    }

    /// Cache for `repo` using the configured TTL
    pub fn get_default(&self, repo: impl AsRef<Path>) -> Result<Arc<GitCache>> {
        self.get_cache(repo, self.defaults.ttl)
    }

    pub fn get_cache(&self, repo: impl AsRef<Path>, ttl: Duration) -> Result<Arc<GitCache>> {
        let key = CacheKey {
            repo: normalize(repo.as_ref()),
            ttl,
        };

        self.caches.get_or_try_insert_with(key, |key| -> Result<Arc<GitCache>> {
            let settings = CacheSettings {
                ttl: key.ttl,
                ..self.defaults.clone()
            };
            let cache = GitCache::new(key.repo.clone(), settings, Arc::clone(&self.runner))?;
            tracing::debug!(repo = %key.repo.display(), ttl = ?key.ttl, "created status cache");
            Ok(Arc::new(cache))
        })
    }

    pub fn remove(&self, repo: impl AsRef<Path>, ttl: Duration) -> bool {
        let key = CacheKey {
            repo: normalize(repo.as_ref()),
            ttl,
        };
        self.caches.remove(&key).is_some()
    }

    pub fn len(&self) -> usize {
        self.caches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invalidate every cache entry; instances and their fallbacks are kept
    pub fn clear_all(&self) {
        for cache in self.all() {
            cache.invalidate_cache();
        }
    }

    pub fn reset_all_circuit_breakers(&self) {
        for cache in self.all() {
            cache.reset_circuit_breaker();
        }
    }

    pub fn snapshot_all_cache_info(&self) -> Vec<CacheInfo> {
        let mut infos: Vec<CacheInfo> = self.all().iter().map(|cache| cache.cache_info()).collect();
        infos.sort_by(|a, b| {
            a.repo_path
                .cmp(&b.repo_path)
                .then(a.ttl_secs.total_cmp(&b.ttl_secs))
        });
        infos
    }

    // Fan-out runs on a copy so no cache method is called under the map lock
    fn all(&self) -> Vec<Arc<GitCache>> {
        self.caches.values()
    }
}

fn normalize(repo: &Path) -> PathBuf {
    std::fs::canonicalize(repo).unwrap_or_else(|_| repo.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::RawResult;
    use async_trait::async_trait;

    struct NoGit;

    #[async_trait]
    impl GitRunner for NoGit {
        async fn run(&self, _repo: &Path, _args: &[String]) -> RawResult {
            RawResult::failed("git unavailable")
        }
    }

    fn registry() -> CacheRegistry {
        CacheRegistry::with_runner(CacheSettings::default(), Arc::new(NoGit))
    }

    #[test]
    fn test_same_key_same_instance() {
        let registry = registry();
        let a = registry.get_cache("/repo/a", Duration::from_secs(5)).unwrap();
        let b = registry.get_cache("/repo/a", Duration::from_secs(5)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_different_ttl_distinct_instance() {
        let registry = registry();
        let a = registry.get_cache("/repo/a", Duration::from_secs(5)).unwrap();
        let b = registry.get_cache("/repo/a", Duration::from_secs(10)).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.ttl(), Duration::from_secs(10));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_identity_across_threads() {
        let registry = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || registry.get_cache("/repo/shared", Duration::from_secs(5)).unwrap())
            })
            .collect();

        let caches: Vec<Arc<GitCache>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(caches.windows(2).all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_existing_paths_are_canonicalized() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry();
        let direct = registry.get_cache(dir.path(), Duration::from_secs(5)).unwrap();
        let dotted = registry
            .get_cache(dir.path().join("."), Duration::from_secs(5))
            .unwrap();
        assert!(Arc::ptr_eq(&direct, &dotted));
    }

    #[tokio::test]
    async fn test_fan_out_operations() {
        let registry = registry();
        let a = registry.get_cache("/repo/a", Duration::from_secs(5)).unwrap();
        registry.get_cache("/repo/b", Duration::from_secs(5)).unwrap();

        a.get_status(false).await;
        let infos = registry.snapshot_all_cache_info();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].repo_path, PathBuf::from("/repo/a"));
        assert_eq!(infos[0].metrics.fallback_uses, 1);

        registry.clear_all();
        registry.reset_all_circuit_breakers();
        assert!(registry.snapshot_all_cache_info().iter().all(|info| !info.is_valid));
        assert!(registry.remove("/repo/b", Duration::from_secs(5)));
        assert_eq!(registry.len(), 1);
    }
}
