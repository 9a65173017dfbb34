//! Repository status caching
//!
//! A [`GitCache`] owns one repository's cached snapshot, the circuit breaker
//! guarding its refreshes and the last known-good fallback. The
//! [`CacheRegistry`] hands out one shared instance per (repository, ttl).
//!
//! ```text
//! get_status ──▶ Memo (fresh?) ──hit──▶ copy
//!                   │ stale
//!                   ▼
//!             refresh lock ──▶ re-check ──▶ CircuitBreaker ──▶ GitQueryExecutor
//!                                                │ failure / open
//!                                                ▼
//!                                         fallback (is_fallback = true)
//! ```

pub mod circuit;
pub mod git_cache;
pub mod memo;
pub mod registry;

pub use circuit::{CircuitBreaker, CircuitConfig, CircuitError, CircuitSnapshot, CircuitState};
pub use git_cache::{CacheInfo, CacheMetrics, CacheSettings, GitCache};
pub use memo::{Lookup, Memo, OnceMap};
pub use registry::CacheRegistry;
