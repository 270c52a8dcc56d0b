//! In-memory store implementations.
//!
//! Both stores are cheap handles over shared state: cloning one yields
//! another client of the same backing store, the way several workers each
//! hold their own connection to one server. They count calls and can be told
//! to fail, which makes them suitable for exercising the lookup engine
//! without a database.

use crate::error::{CacheError, StorageError};
use crate::key::Key;
use crate::scratch::ScratchBuffer;
use crate::store::{CacheStore, DurableConnector, DurableSession, Fetch};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct DurableState {
    rows: DashMap<String, String>,
    unreachable: AtomicBool,
    // Bumped to invalidate every open session.
    generation: AtomicU64,
    connect_attempts: AtomicUsize,
    connects: AtomicUsize,
    pings: AtomicUsize,
    queries: AtomicUsize,
    closes: AtomicUsize,
}

/// An in-memory durable store, usable as a [`DurableConnector`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDurableStore {
    state: Arc<DurableState>,
}

impl MemoryDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the row for `key`.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.rows.insert(key.into(), value.into());
    }

    /// Removes the row for `key`, returning `true` if it existed.
    pub fn remove(&self, key: &str) -> bool {
        self.state.rows.remove(key).is_some()
    }

    /// Makes the store (un)reachable for new connections and open sessions.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Breaks every session opened so far; their next ping fails while new
    /// connections still succeed.
    pub fn sever_connections(&self) {
        self.state.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Number of connection attempts, successful or not.
    pub fn connect_attempts(&self) -> usize {
        self.state.connect_attempts.load(Ordering::SeqCst)
    }

    /// Number of successful connections.
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    pub fn ping_count(&self) -> usize {
        self.state.pings.load(Ordering::SeqCst)
    }

    pub fn query_count(&self) -> usize {
        self.state.queries.load(Ordering::SeqCst)
    }

    /// Number of sessions closed explicitly.
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    fn is_reachable(&self) -> bool {
        !self.state.unreachable.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableConnector for MemoryDurableStore {
    type Session = MemorySession;

    async fn connect(&self) -> Result<MemorySession, StorageError> {
        self.state.connect_attempts.fetch_add(1, Ordering::SeqCst);
        if !self.is_reachable() {
            return Err(StorageError::Unavailable(
                "memory store is unreachable".to_string(),
            ));
        }

        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MemorySession {
            store: self.clone(),
            generation: self.state.generation.load(Ordering::SeqCst),
        })
    }
}

/// A session opened on a [`MemoryDurableStore`].
#[derive(Debug)]
pub struct MemorySession {
    store: MemoryDurableStore,
    generation: u64,
}

#[async_trait]
impl DurableSession for MemorySession {
    async fn ping(&mut self) -> Result<(), StorageError> {
        let state = &self.store.state;
        state.pings.fetch_add(1, Ordering::SeqCst);

        if !self.store.is_reachable() {
            return Err(StorageError::Unavailable(
                "memory store is unreachable".to_string(),
            ));
        }
        if state.generation.load(Ordering::SeqCst) != self.generation {
            return Err(StorageError::Unavailable(
                "connection was severed".to_string(),
            ));
        }
        Ok(())
    }

    async fn fetch(&mut self, key: &Key, value: &mut ScratchBuffer) -> Result<Fetch, StorageError> {
        if !self.store.is_reachable() {
            return Err(StorageError::Unavailable(
                "memory store is unreachable".to_string(),
            ));
        }

        let state = &self.store.state;
        state.queries.fetch_add(1, Ordering::SeqCst);
        match state.rows.get(key.as_str()) {
            Some(row) => {
                value.write(row.value());
                Ok(Fetch::Found)
            }
            None => Ok(Fetch::NotFound),
        }
    }

    async fn close(self) {
        self.store.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// A value held by a [`MemoryCacheStore`], with the TTL it was written with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedEntry {
    pub value: String,
    pub ttl: Option<Duration>,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: DashMap<String, CachedEntry>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    gets: AtomicUsize,
    sets: AtomicUsize,
}

/// An in-memory cache store. Entries never expire; the TTL passed to `set`
/// is only recorded.
#[derive(Debug, Clone, Default)]
pub struct MemoryCacheStore {
    state: Arc<CacheState>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an entry directly, bypassing the call counters.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.entries.insert(
            key.into(),
            CachedEntry {
                value: value.into(),
                ttl: None,
            },
        );
    }

    /// Returns the entry stored under `key`, if any.
    pub fn entry(&self, key: &str) -> Option<CachedEntry> {
        self.state.entries.get(key).map(|e| e.value().clone())
    }

    /// Returns the value stored under `key`, if any.
    pub fn value(&self, key: &str) -> Option<String> {
        self.entry(key).map(|e| e.value)
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    /// Makes every subsequent `get` fail with a transport error.
    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Makes every subsequent `set` fail with a transport error.
    pub fn fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get_count(&self) -> usize {
        self.state.gets.load(Ordering::SeqCst)
    }

    /// Number of `set` calls, including failed ones.
    pub fn set_count(&self) -> usize {
        self.state.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&mut self, key: &Key, value: &mut ScratchBuffer) -> Result<Fetch, CacheError> {
        self.state.gets.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(CacheError::Unavailable(
                "memory cache refused the read".to_string(),
            ));
        }

        // Redis answers an empty string like a missing key.
        match self.entry(key.as_str()) {
            Some(entry) if !entry.value.is_empty() => {
                value.adopt(entry.value);
                Ok(Fetch::Found)
            }
            _ => Ok(Fetch::NotFound),
        }
    }

    async fn set(&mut self, key: &Key, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.state.sets.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Operation(
                "memory cache refused the write".to_string(),
            ));
        }

        self.state.entries.insert(
            key.as_str().to_owned(),
            CachedEntry {
                value: value.to_owned(),
                ttl: Some(ttl),
            },
        );
        Ok(())
    }
}
