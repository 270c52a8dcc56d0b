use std::net::SocketAddr;
use std::time::Duration;

use signpost_core::memory::{MemoryCacheStore, MemoryDurableStore};
use signpost_core::{ConnectionHandle, DurableStoreClient};
use signpost_server::http::HttpSettings;
use signpost_server::WorkerPool;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const TTL: Duration = Duration::from_secs(90);
const FALLBACK: &str = "http://fallback.example";

struct Service {
    durable: MemoryDurableStore,
    cache: MemoryCacheStore,
    pool: WorkerPool,
}

impl Service {
    async fn start(workers: usize) -> Self {
        let durable = MemoryDurableStore::new();
        let cache = MemoryCacheStore::new();

        let mut handles = Vec::new();
        for _ in 0..workers {
            let client = DurableStoreClient::connect(durable.clone()).await.unwrap();
            handles.push(ConnectionHandle::new(client, cache.clone(), TTL));
        }
        let pool = WorkerPool::bind("127.0.0.1:0", handles, HttpSettings::default())
            .await
            .unwrap();

        Self {
            durable,
            cache,
            pool,
        }
    }

    async fn redirect(&self, username: &str) -> (u16, Option<String>) {
        request(
            self.pool.local_addr(),
            &format!("/?username={username}&pageUrl={FALLBACK}"),
        )
        .await
    }
}

async fn request(addr: SocketAddr, target: &str) -> (u16, Option<String>) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(format!("GET {target} HTTP/1.1\r\nHost: signpost\r\n\r\n").as_bytes())
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();

    let status = response
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .expect("status code");
    let location = response
        .lines()
        .find_map(|line| line.strip_prefix("Location: "))
        .map(str::to_string);
    (status, location)
}

#[tokio::test]
async fn durable_hit_is_redirected_and_written_back() {
    let service = Service::start(2).await;
    service.durable.insert("alice", "http://example.com/alice");

    let (status, location) = service.redirect("alice").await;

    assert_eq!(status, 302);
    assert_eq!(location.as_deref(), Some("http://example.com/alice"));
    let entry = service.cache.entry("alice").expect("write-back");
    assert_eq!(entry.value, "http://example.com/alice");
    assert_eq!(entry.ttl, Some(TTL));

    // Served from the cache from now on.
    let queries = service.durable.query_count();
    assert_eq!(service.redirect("alice").await.0, 302);
    assert_eq!(service.durable.query_count(), queries);

    service.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn unknown_key_falls_back_and_caches_fallback() {
    let service = Service::start(2).await;

    let (status, location) = service.redirect("bob").await;

    assert_eq!(status, 302);
    assert_eq!(location.as_deref(), Some(FALLBACK));
    assert_eq!(service.cache.value("bob").as_deref(), Some(FALLBACK));

    service.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn unreachable_durable_store_is_reported_without_caching() {
    let service = Service::start(1).await;
    service.cache.insert("zed", "http://example.com/zed");
    service.durable.set_reachable(false);

    let (status, location) = service.redirect("carol").await;

    assert_eq!(status, 502);
    assert_eq!(location, None);
    assert_eq!(service.cache.value("carol"), None);
    assert_eq!(service.cache.len(), 1);

    // Cached keys keep working during the outage.
    assert_eq!(service.redirect("zed").await.1.as_deref(), Some("http://example.com/zed"));

    // And the worker heals once the store is back.
    service.durable.set_reachable(true);
    service.durable.insert("carol", "http://example.com/carol");
    assert_eq!(service.redirect("carol").await.1.as_deref(), Some("http://example.com/carol"));

    service.pool.shutdown().await.unwrap();
}

#[tokio::test]
async fn malformed_queries_are_rejected() {
    let service = Service::start(1).await;
    let addr = service.pool.local_addr();

    assert_eq!(request(addr, "/?username=alice").await.0, 502);
    assert_eq!(request(addr, "/").await.0, 502);
    assert_eq!(request(addr, "/?username=bob&pageUrl=not-a-url").await.0, 502);
    assert!(service.cache.is_empty());

    service.pool.shutdown().await.unwrap();
}
