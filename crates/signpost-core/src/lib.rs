//! Cache-aside lookup engine for the Signpost redirect service.
//!
//! A [`ConnectionHandle`] resolves a [`Key`] by asking a [`CacheStore`]
//! first and falling back to a durable store reached through a
//! self-healing [`DurableStoreClient`]; durable hits are written back to the
//! cache. Concrete stores live in `signpost-storage` (MySQL) and
//! `signpost-cache` (Redis); [`memory`] provides in-process ones.
//!
//! ```rust
//! use std::time::Duration;
//! use signpost_core::memory::{MemoryCacheStore, MemoryDurableStore};
//! use signpost_core::{ConnectionHandle, DurableStoreClient, Key, LookupResult};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let durable = MemoryDurableStore::new();
//! durable.insert("alice", "http://example.com/alice");
//!
//! let client = DurableStoreClient::connect(durable).await?;
//! let mut handle = ConnectionHandle::new(client, MemoryCacheStore::new(), Duration::from_secs(60));
//!
//! let key = Key::new("alice")?;
//! if let LookupResult::Found(url) = handle.resolve(&key).await {
//!     println!("redirect to {url}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod durable;
pub mod error;
pub mod key;
pub mod lookup;
pub mod memory;
pub mod scratch;
pub mod store;
pub mod telemetry;

pub use durable::DurableStoreClient;
pub use error::{CacheError, CoreError, ResolveError, StorageError};
pub use key::Key;
pub use lookup::{ConnectionHandle, LookupResult};
pub use scratch::ScratchBuffer;
pub use store::{CacheStore, DurableConnector, DurableSession, Fetch};
