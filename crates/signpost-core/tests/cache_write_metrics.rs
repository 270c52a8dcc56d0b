use std::collections::HashMap;
use std::time::Duration;

use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use signpost_core::memory::{MemoryCacheStore, MemoryDurableStore};
use signpost_core::telemetry::{
    CACHE_ERROR_TOTAL, CACHE_HIT_TOTAL, CACHE_MISS_TOTAL, CACHE_WRITE_FAILURE_TOTAL,
    DURABLE_RECONNECT_TOTAL,
};
use signpost_core::{ConnectionHandle, DurableStoreClient, Key, LookupResult};

fn counters(recorder_snapshot: Vec<(String, DebugValue)>) -> HashMap<String, u64> {
    recorder_snapshot
        .into_iter()
        .filter_map(|(name, value)| match value {
            DebugValue::Counter(count) => Some((name, count)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn lookup_paths_emit_expected_counters() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let durable = MemoryDurableStore::new();
    let cache = MemoryCacheStore::new();
    durable.insert("alice", "http://example.com/alice");
    cache.insert("bob", "http://example.com/bob");

    let client = DurableStoreClient::connect(durable.clone()).await.unwrap();
    let mut handle = ConnectionHandle::new(client, cache.clone(), Duration::from_secs(30));

    // hit
    let bob = Key::new("bob").unwrap();
    assert!(handle.resolve(&bob).await.is_found());

    // miss, durable hit, failed write-back
    cache.fail_writes(true);
    let alice = Key::new("alice").unwrap();
    assert_eq!(
        handle.resolve(&alice).await,
        LookupResult::Found("http://example.com/alice")
    );
    assert_eq!(cache.value("alice"), None);

    // cache read error, reconnect after a severed session
    cache.fail_reads(true);
    durable.sever_connections();
    assert!(handle.resolve(&alice).await.is_found());

    let snapshot = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| (composite_key.key().name().to_string(), value))
        .collect();
    let counters = counters(snapshot);

    assert_eq!(counters.get(CACHE_HIT_TOTAL), Some(&1));
    assert_eq!(counters.get(CACHE_MISS_TOTAL), Some(&1));
    assert_eq!(counters.get(CACHE_ERROR_TOTAL), Some(&1));
    assert_eq!(counters.get(CACHE_WRITE_FAILURE_TOTAL), Some(&2));
    assert_eq!(counters.get(DURABLE_RECONNECT_TOTAL), Some(&1));
}
