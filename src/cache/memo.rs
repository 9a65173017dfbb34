//! Memoized value with a TTL and a single refresh lock.
//!
//! Readers take a short, never-awaited read lock on the slot. Refreshers
//! serialize on an async mutex and re-check the slot once they hold it, so a
//! burst of callers against a stale slot produces exactly one refresh.
//!
//! [`OnceMap`] is the keyed, TTL-less form of the same check-then-recheck
//! for values built synchronously.

use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Stamped<T> {
    value: T,
    stored_at: Instant,
}

/// How a value was obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// Fresh on the lock-free path
    Hit(T),
    /// Refreshed by another caller while this one waited for the lock
    Joined(T),
    /// Refreshed by this caller
    Refreshed(T),
}

impl<T> Lookup<T> {
    pub fn into_inner(self) -> T {
        match self {
            Lookup::Hit(v) | Lookup::Joined(v) | Lookup::Refreshed(v) => v,
        }
    }

    pub fn was_refreshed(&self) -> bool {
        matches!(self, Lookup::Refreshed(_))
    }
}

#[derive(Debug)]
pub struct Memo<T> {
    ttl: Duration,
    slot: RwLock<Option<Stamped<T>>>,
    refresh: Mutex<()>,
}

impl<T: Clone> Memo<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
            refresh: Mutex::new(()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The stored value if it is younger than the TTL
    pub fn fresh(&self) -> Option<T> {
        let slot = self.slot.read();
        slot.as_ref()
            .filter(|stamped| stamped.stored_at.elapsed() < self.ttl)
            .map(|stamped| stamped.value.clone())
    }

    pub fn age(&self) -> Option<Duration> {
        self.slot.read().as_ref().map(|stamped| stamped.stored_at.elapsed())
    }

    pub fn is_fresh(&self) -> bool {
        self.age().is_some_and(|age| age < self.ttl)
    }

    pub fn store(&self, value: T) {
        *self.slot.write() = Some(Stamped {
            value,
            stored_at: Instant::now(),
        });
    }

    /// Drop the stored value; a refresh already in flight still stores its result
    pub fn invalidate(&self) {
        *self.slot.write() = None;
    }

    /// Return a fresh value, running `refresh` at most once per stale period
    ///
    /// `force` skips both freshness checks. On error the slot is left as it was.
    pub async fn get_or_refresh<F, Fut, E>(&self, force: bool, refresh: F) -> Result<Lookup<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !force && let Some(value) = self.fresh() {
            return Ok(Lookup::Hit(value));
        }

        let _guard = self.refresh.lock().await;

        if !force && let Some(value) = self.fresh() {
            return Ok(Lookup::Joined(value));
        }

        let value = refresh().await?;
        self.store(value.clone());
        Ok(Lookup::Refreshed(value))
    }
}

/// Keyed values built at most once per key
#[derive(Debug)]
pub struct OnceMap<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for OnceMap<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash, V: Clone> OnceMap<K, V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.read().get(key).cloned()
    }

    /// The value for `key`, running `build` only if no caller has stored one
    ///
    /// `build` runs under the write lock, so it must not call back into the map.
    /// A failed build leaves the key empty.
    pub fn get_or_try_insert_with<E>(&self, key: K, build: impl FnOnce(&K) -> Result<V, E>) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }

        let mut entries = self.entries.write();
        // Another caller may have inserted while we waited for the write lock
        if let Some(value) = entries.get(&key) {
            return Ok(value.clone());
        }

        let value = build(&key)?;
        entries.insert(key, value.clone());
        Ok(value)
    }

    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.write().remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every stored value, taken under one read lock
    pub fn values(&self) -> Vec<V> {
        self.entries.read().values().cloned().collect()
    }
}
