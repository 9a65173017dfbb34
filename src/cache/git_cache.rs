use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use super::circuit::{CircuitBreaker, CircuitConfig, CircuitError, CircuitSnapshot, CircuitState};
use super::memo::{Lookup, Memo};
use crate::error::{HookgateError, Result};
use crate::git::{GitQueryExecutor, GitRunner, StatusSnapshot};

/// Timing and resilience settings for one cache instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    /// Bound on a whole refresh batch
    pub refresh_timeout: Duration,
    /// Bound on each git command inside a batch
    pub command_timeout: Duration,
    pub circuit: CircuitConfig,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5),
            refresh_timeout: Duration::from_secs(30),
            command_timeout: Duration::from_secs(10),
            circuit: CircuitConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheMetrics {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub fallback_uses: u64,
    pub refreshes: u64,
    pub circuit_rejections: u64,
    /// Running mean over `total_requests`, in milliseconds
    pub avg_response_time_ms: f64,
}

enum Served {
    Hit,
    Refreshed,
    Fallback { rejected: bool },
}

impl CacheMetrics {
    fn record(&mut self, served: Served, elapsed: Duration) {
        self.total_requests += 1;
        match served {
            Served::Hit => self.cache_hits += 1,
            Served::Refreshed => {
                self.cache_misses += 1;
                self.refreshes += 1;
            }
            Served::Fallback { rejected } => {
                self.cache_misses += 1;
                self.fallback_uses += 1;
                if rejected {
                    self.circuit_rejections += 1;
                }
            }
        }
        let sample = elapsed.as_secs_f64() * 1_000.0;
        self.avg_response_time_ms += (sample - self.avg_response_time_ms) / self.total_requests as f64;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub repo_path: PathBuf,
    pub ttl_secs: f64,
    pub age_secs: Option<f64>,
    pub is_valid: bool,
    pub has_fallback: bool,
    pub fallback_captured_at: Option<DateTime<Utc>>,
    pub circuit: CircuitSnapshot,
    pub metrics: CacheMetrics,
}

/// Repository status cache for one (repository, ttl) pair
///
/// `get_status` never fails: when git cannot be queried it serves the last
/// known-good snapshot relabelled with `is_fallback`, or a placeholder when
/// nothing has ever been captured.
pub struct GitCache {
    repo: PathBuf,
    memo: Memo<StatusSnapshot>,
    executor: GitQueryExecutor,
    breaker: CircuitBreaker,
    fallback: RwLock<Option<StatusSnapshot>>,
    metrics: Mutex<CacheMetrics>,
    refresh_timeout: Duration,
}

impl GitCache {
    pub fn new(repo: impl Into<PathBuf>, settings: CacheSettings, runner: Arc<dyn GitRunner>) -> Result<Self> {
        let repo = repo.into();
        let breaker = CircuitBreaker::new(settings.circuit)?;
        let executor = GitQueryExecutor::new(runner, repo.clone(), settings.command_timeout);

        Ok(Self {
            repo,
            memo: Memo::new(settings.ttl),
            executor,
            breaker,
            fallback: RwLock::new(None),
            metrics: Mutex::new(CacheMetrics::default()),
            refresh_timeout: settings.refresh_timeout,
        })
    }

    pub fn repo(&self) -> &Path {
        &self.repo
    }

    pub fn ttl(&self) -> Duration {
        self.memo.ttl()
    }

    pub async fn get_status(&self, force_refresh: bool) -> StatusSnapshot {
        let started = Instant::now();

        let (snapshot, served) = match self.memo.get_or_refresh(force_refresh, || self.refresh()).await {
            Ok(Lookup::Hit(snapshot)) | Ok(Lookup::Joined(snapshot)) => {
                tracing::trace!(repo = %self.repo.display(), "status cache hit");
                (snapshot, Served::Hit)
            }
            Ok(Lookup::Refreshed(snapshot)) => (snapshot, Served::Refreshed),
            Err(e) => {
                let rejected = matches!(e, HookgateError::CircuitOpenRejection { .. });
                (self.fallback_for(&e), Served::Fallback { rejected })
            }
        };

        self.metrics.lock().record(served, started.elapsed());
        snapshot
    }

    pub async fn current_branch(&self) -> String {
        self.get_status(false).await.current_branch
    }

    pub async fn staged_files(&self) -> Vec<String> {
        self.get_status(false).await.staged_files
    }

    pub async fn has_uncommitted_changes(&self) -> bool {
        self.get_status(false).await.has_uncommitted_changes
    }

    /// Commit count for a revision range, bypassing the cache
    pub async fn commits_between(&self, range: &str) -> Result<u64> {
        self.executor.count_commits(range).await
    }

    pub fn invalidate_cache(&self) {
        tracing::debug!(repo = %self.repo.display(), "status cache invalidated");
        self.memo.invalidate();
    }

    pub fn reset_circuit_breaker(&self) {
        self.breaker.reset();
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub fn metrics(&self) -> CacheMetrics {
        self.metrics.lock().clone()
    }

    pub fn cache_info(&self) -> CacheInfo {
        let fallback = self.fallback.read();
        CacheInfo {
            repo_path: self.repo.clone(),
            ttl_secs: self.memo.ttl().as_secs_f64(),
            age_secs: self.memo.age().map(|age| age.as_secs_f64()),
            is_valid: self.memo.is_fresh(),
            has_fallback: fallback.is_some(),
            fallback_captured_at: fallback.as_ref().map(|snapshot| snapshot.captured_at),
            circuit: self.breaker.snapshot(),
            metrics: self.metrics(),
        }
    }

    async fn refresh(&self) -> Result<StatusSnapshot> {
        tracing::debug!(repo = %self.repo.display(), "refreshing repository status");
        let limit = self.refresh_timeout;

        let outcome = self
            .breaker
            .call(|| async {
                match tokio::time::timeout(limit, self.executor.fetch_status()).await {
                    Ok(result) => result,
                    Err(_) => Err(HookgateError::refresh(format!(
                        "status batch timed out after {}s",
                        limit.as_secs_f64()
                    ))),
                }
            })
            .await;

        match outcome {
            Ok(snapshot) => {
                *self.fallback.write() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Err(CircuitError::Open { retry_after }) => {
                Err(HookgateError::CircuitOpenRejection { retry_after })
            }
            Err(CircuitError::Inner(e)) => Err(e),
        }
    }

    fn fallback_for(&self, error: &HookgateError) -> StatusSnapshot {
        match self.fallback.read().as_ref() {
            Some(known_good) => {
                tracing::warn!(
                    repo = %self.repo.display(),
                    error = %error,
                    captured_at = %known_good.captured_at,
                    "serving last known-good status"
                );
                known_good.as_fallback()
            }
            None => {
                tracing::warn!(
                    repo = %self.repo.display(),
                    error = %error,
                    "no known-good status, serving placeholder"
                );
                StatusSnapshot::placeholder(format!("error: {error}"))
            }
        }
    }
}

impl std::fmt::Debug for GitCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitCache")
            .field("repo", &self.repo)
            .field("ttl", &self.memo.ttl())
            .field("circuit", &self.breaker.state())
            .finish()
    }
}
