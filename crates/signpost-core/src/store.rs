use crate::error::{CacheError, StorageError};
use crate::key::Key;
use crate::scratch::ScratchBuffer;
use async_trait::async_trait;
use std::time::Duration;

/// Outcome of a single-key fetch that writes its value into a
/// [`ScratchBuffer`] supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fetch {
    /// The value was written into the buffer.
    Found,
    /// No value exists for the key; the buffer contents are unspecified.
    NotFound,
}

/// One live connection to the durable store, with the lookup statement
/// already prepared on it.
#[async_trait]
pub trait DurableSession: Send + 'static {
    /// Lightweight round trip confirming the connection is still usable.
    async fn ping(&mut self) -> Result<(), StorageError>;

    /// Runs the prepared lookup with `key` bound as its only parameter.
    ///
    /// Expects zero or one row with one column. The column value is copied
    /// into `value`; a NULL column counts as [`Fetch::NotFound`].
    async fn fetch(&mut self, key: &Key, value: &mut ScratchBuffer) -> Result<Fetch, StorageError>;

    /// Closes the connection. Errors are not reported: a session is only
    /// closed when it is being discarded.
    async fn close(self);
}

/// Opens [`DurableSession`]s from fixed connection parameters.
#[async_trait]
pub trait DurableConnector: Send + Sync + 'static {
    type Session: DurableSession;

    /// Establishes a connection and prepares the lookup statement on it.
    async fn connect(&self) -> Result<Self::Session, StorageError>;
}

/// A connection to the distributed cache.
///
/// Implementations are owned by a single worker and are never shared, hence
/// `&mut self` everywhere.
#[async_trait]
pub trait CacheStore: Send + 'static {
    /// Fetches the value cached for `key` into `value` in one round trip.
    async fn get(&mut self, key: &Key, value: &mut ScratchBuffer) -> Result<Fetch, CacheError>;

    /// Stores `value` under `key`, expiring after `ttl`.
    async fn set(&mut self, key: &Key, value: &str, ttl: Duration) -> Result<(), CacheError>;
}
