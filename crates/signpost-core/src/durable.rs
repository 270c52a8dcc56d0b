use crate::error::StorageError;
use crate::key::Key;
use crate::scratch::ScratchBuffer;
use crate::store::{DurableConnector, DurableSession, Fetch};
use crate::telemetry::DURABLE_RECONNECT_TOTAL;
use metrics::counter;
use tracing::{debug, info, trace, warn};

/// Result type for durable-store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A self-healing client for the durable store.
///
/// Before each query the current session is pinged; a session that fails the
/// ping (or is missing because an earlier reconnect failed) is closed and
/// replaced by a fresh one in place. Reconnection is attempted exactly once
/// per query: if it fails, the query is not attempted and the error is
/// returned. There is no retry loop and no backoff.
pub struct DurableStoreClient<C: DurableConnector> {
    connector: C,
    session: Option<C::Session>,
}

impl<C: DurableConnector> DurableStoreClient<C> {
    /// Connects through `connector` and prepares the lookup statement.
    pub async fn connect(connector: C) -> Result<Self> {
        let session = connector.connect().await?;
        debug!("durable store session established");
        Ok(Self {
            connector,
            session: Some(session),
        })
    }

    /// Looks `key` up, copying the value into `value` on success.
    ///
    /// A row whose value is empty is reported as [`Fetch::NotFound`]: an
    /// empty answer means "no mapping", not a successful empty result.
    pub async fn query(&mut self, key: &Key, value: &mut ScratchBuffer) -> Result<Fetch> {
        let session = self.live_session().await?;

        trace!(key = %key, "querying durable store");
        match session.fetch(key, value).await? {
            Fetch::Found if !value.is_empty() => Ok(Fetch::Found),
            Fetch::Found => {
                debug!(key = %key, "durable store returned an empty value, treating as not found");
                Ok(Fetch::NotFound)
            }
            Fetch::NotFound => Ok(Fetch::NotFound),
        }
    }

    /// Returns `true` if a session is currently held. A `false` here means
    /// the last reconnect failed and the next query will try again.
    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Closes the current session, if any.
    pub async fn close(mut self) {
        if let Some(session) = self.session.take() {
            session.close().await;
        }
    }

    async fn live_session(&mut self) -> Result<&mut C::Session> {
        let alive = match self.session.as_mut() {
            Some(session) => match session.ping().await {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, "durable store ping failed, reconnecting");
                    false
                }
            },
            None => false,
        };

        if !alive {
            self.reconnect().await?;
        }

        self.session
            .as_mut()
            .ok_or_else(|| StorageError::Unavailable("no durable store session".to_string()))
    }

    async fn reconnect(&mut self) -> Result<()> {
        if let Some(stale) = self.session.take() {
            stale.close().await;
        }

        counter!(DURABLE_RECONNECT_TOTAL).increment(1);
        match self.connector.connect().await {
            Ok(session) => {
                info!("durable store session re-established");
                self.session = Some(session);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "durable store reconnect failed");
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDurableStore;

    fn key(s: &str) -> Key {
        Key::new(s).unwrap()
    }

    async fn client(store: &MemoryDurableStore) -> DurableStoreClient<MemoryDurableStore> {
        DurableStoreClient::connect(store.clone()).await.unwrap()
    }

    #[tokio::test]
    async fn connect_fails_when_store_unreachable() {
        let store = MemoryDurableStore::new();
        store.set_reachable(false);

        let result = DurableStoreClient::connect(store.clone()).await;
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn query_found_and_not_found() {
        let store = MemoryDurableStore::new();
        store.insert("alice", "http://example.com/alice");
        let mut client = client(&store).await;
        let mut buf = ScratchBuffer::new();

        let found = client.query(&key("alice"), &mut buf).await.unwrap();
        assert_eq!(found, Fetch::Found);
        assert_eq!(buf.as_str(), "http://example.com/alice");

        let missing = client.query(&key("nobody"), &mut buf).await.unwrap();
        assert_eq!(missing, Fetch::NotFound);
    }

    #[tokio::test]
    async fn empty_value_is_not_found() {
        let store = MemoryDurableStore::new();
        store.insert("blank", "");
        let mut client = client(&store).await;
        let mut buf = ScratchBuffer::new();

        let result = client.query(&key("blank"), &mut buf).await.unwrap();
        assert_eq!(result, Fetch::NotFound);
    }

    #[tokio::test]
    async fn failed_ping_reconnects_once_and_answers() {
        let store = MemoryDurableStore::new();
        store.insert("alice", "http://example.com/alice");
        let mut client = client(&store).await;
        let mut buf = ScratchBuffer::new();
        assert_eq!(store.connect_count(), 1);

        store.sever_connections();

        let result = client.query(&key("alice"), &mut buf).await.unwrap();
        assert_eq!(result, Fetch::Found);
        assert_eq!(buf.as_str(), "http://example.com/alice");
        assert_eq!(store.connect_count(), 2);
        assert_eq!(store.query_count(), 1);
    }

    #[tokio::test]
    async fn failed_reconnect_skips_query() {
        let store = MemoryDurableStore::new();
        store.insert("carol", "http://example.com/carol");
        let mut client = client(&store).await;
        let mut buf = ScratchBuffer::new();

        store.set_reachable(false);

        let result = client.query(&key("carol"), &mut buf).await;
        assert!(result.is_err());
        assert!(!client.is_connected());
        assert_eq!(store.connect_attempts(), 2);
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn every_call_retries_once_until_store_returns() {
        let store = MemoryDurableStore::new();
        store.insert("carol", "http://example.com/carol");
        let mut client = client(&store).await;
        let mut buf = ScratchBuffer::new();

        store.set_reachable(false);
        assert!(client.query(&key("carol"), &mut buf).await.is_err());
        assert!(client.query(&key("carol"), &mut buf).await.is_err());
        assert_eq!(store.connect_attempts(), 3);

        store.set_reachable(true);
        let result = client.query(&key("carol"), &mut buf).await.unwrap();
        assert_eq!(result, Fetch::Found);
        assert!(client.is_connected());
        assert_eq!(store.connect_attempts(), 4);
    }

    #[tokio::test]
    async fn healthy_session_is_reused() {
        let store = MemoryDurableStore::new();
        store.insert("alice", "a");
        let mut client = client(&store).await;
        let mut buf = ScratchBuffer::new();

        for _ in 0..5 {
            client.query(&key("alice"), &mut buf).await.unwrap();
        }
        assert_eq!(store.connect_count(), 1);
        assert_eq!(store.ping_count(), 5);
    }
}
