use crate::durable::DurableStoreClient;
use crate::error::{CacheError, ResolveError};
use crate::key::Key;
use crate::scratch::ScratchBuffer;
use crate::store::{CacheStore, DurableConnector, Fetch};
use crate::telemetry::{
    CACHE_ERROR_TOTAL, CACHE_HIT_TOTAL, CACHE_MISS_TOTAL, CACHE_WRITE_FAILURE_TOTAL,
};
use metrics::counter;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// The outcome of [`ConnectionHandle::resolve`].
///
/// A found value borrows the handle's scratch buffer and stays valid until
/// the next call on the same handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult<'a> {
    Found(&'a str),
    NotFound,
    Error(ResolveError),
}

impl LookupResult<'_> {
    pub fn is_found(&self) -> bool {
        matches!(self, LookupResult::Found(_))
    }
}

/// Everything one worker needs to answer lookups: a durable-store client, a
/// cache-store connection, a scratch buffer and the last error message.
///
/// A handle is owned by exactly one worker and is never shared, so nothing
/// in here is locked.
pub struct ConnectionHandle<D: DurableConnector, C: CacheStore> {
    durable: DurableStoreClient<D>,
    cache: C,
    scratch: ScratchBuffer,
    ttl: Duration,
    last_error: Option<String>,
}

impl<D: DurableConnector, C: CacheStore> ConnectionHandle<D, C> {
    /// Creates a handle from already-connected clients. `ttl` is applied to
    /// every cache write made through this handle.
    pub fn new(durable: DurableStoreClient<D>, cache: C, ttl: Duration) -> Self {
        Self {
            durable,
            cache,
            scratch: ScratchBuffer::new(),
            ttl,
            last_error: None,
        }
    }

    /// Resolves `key` using the cache-aside sequence:
    ///
    /// 1. ask the cache; a hit is returned without touching the durable store;
    /// 2. on a miss or a cache error, query the durable store;
    /// 3. write a durable hit back to the cache, then return it.
    ///
    /// Cache failures degrade to a miss. Durable-store failures are returned
    /// as [`ResolveError::ConnectFailed`] and leave the cache untouched.
    pub async fn resolve(&mut self, key: &Key) -> LookupResult<'_> {
        match self.cache.get(key, &mut self.scratch).await {
            Ok(Fetch::Found) => {
                counter!(CACHE_HIT_TOTAL).increment(1);
                debug!(key = %key, "cache hit");
                self.last_error = None;
                return LookupResult::Found(self.scratch.as_str());
            }
            Ok(Fetch::NotFound) => {
                counter!(CACHE_MISS_TOTAL).increment(1);
                trace!(key = %key, "cache miss");
            }
            Err(e) => {
                counter!(CACHE_ERROR_TOTAL).increment(1);
                warn!(key = %key, error = %e, "cache read failed, falling back to durable store");
            }
        }

        match self.durable.query(key, &mut self.scratch).await {
            Ok(Fetch::Found) => {
                debug!(key = %key, "durable store hit");
                write_back(&mut self.cache, key, self.scratch.as_str(), self.ttl).await;
                self.last_error = None;
                LookupResult::Found(self.scratch.as_str())
            }
            Ok(Fetch::NotFound) => {
                debug!(key = %key, "key not found in durable store");
                self.last_error = None;
                LookupResult::NotFound
            }
            Err(e) => {
                warn!(key = %key, error = %e, "durable store lookup failed");
                self.last_error = Some(e.to_string());
                LookupResult::Error(ResolveError::from(e))
            }
        }
    }

    /// Caches `value` under `key` with the handle's TTL.
    ///
    /// This is the same fire-and-forget write used for write-back: a failure
    /// is logged and counted, never returned.
    pub async fn remember(&mut self, key: &Key, value: &str) {
        write_back(&mut self.cache, key, value, self.ttl).await;
    }

    /// The message of the most recent durable-store failure, cleared by the
    /// next successful lookup.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Current capacity of the scratch buffer.
    pub fn scratch_capacity(&self) -> usize {
        self.scratch.capacity()
    }

    /// The write TTL applied by this handle.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Releases the durable-store session.
    pub async fn close(self) {
        self.durable.close().await;
    }
}

async fn write_back<C: CacheStore>(cache: &mut C, key: &Key, value: &str, ttl: Duration) {
    if let Err(e) = cache.set(key, value, ttl).await {
        record_write_failure(key, &e);
    } else {
        trace!(key = %key, ttl_secs = ttl.as_secs(), "cached value");
    }
}

fn record_write_failure(key: &Key, error: &CacheError) {
    counter!(CACHE_WRITE_FAILURE_TOTAL).increment(1);
    warn!(key = %key, error = %error, "failed to write value to cache");
}
