//! Distributed lock behaviour across independent holders sharing one store

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use cacheaside_common::MockClock;
use cacheaside_core::{DistributedLock, KeyValueStore};
use cacheaside_infra::InMemoryStore;
use futures::future::join_all;

const LOCK_TTL: Duration = Duration::from_secs(10);

fn shared_store() -> (Arc<InMemoryStore>, MockClock) {
    let clock = MockClock::starting_at(UNIX_EPOCH + Duration::from_secs(1_700_000_000));
    let store = Arc::new(InMemoryStore::with_clock(Arc::new(clock.clone())));
    (store, clock)
}

fn holder(store: &Arc<InMemoryStore>, owner: &str) -> DistributedLock {
    DistributedLock::with_owner_id(Arc::clone(store) as Arc<dyn KeyValueStore>, owner)
}

#[tokio::test]
async fn test_second_holder_waits_for_release() {
    let (store, _clock) = shared_store();
    let web_1 = holder(&store, "web-1");
    let web_2 = holder(&store, "web-2");

    let lease = web_1.acquire("shop:1", LOCK_TTL).await.unwrap().unwrap();
    assert!(lease.token().starts_with("web-1-"));
    assert!(web_2.acquire("shop:1", LOCK_TTL).await.unwrap().is_none());

    // Other names are independent.
    assert!(web_2.acquire("shop:2", LOCK_TTL).await.unwrap().is_some());

    assert!(web_1.release(lease).await.unwrap());
    let lease = web_2.acquire("shop:1", LOCK_TTL).await.unwrap().unwrap();
    assert_eq!(store.get("lock:shop:1").await.unwrap().as_deref(), Some(lease.token()));
}

#[tokio::test]
async fn test_expired_holder_cannot_release_successor() {
    let (store, clock) = shared_store();
    let slow = holder(&store, "slow");
    let fast = holder(&store, "fast");

    let stale = slow.acquire("shop:1", LOCK_TTL).await.unwrap().unwrap();
    clock.advance(LOCK_TTL);

    let current = fast.acquire("shop:1", LOCK_TTL).await.unwrap().unwrap();

    // The slow holder finishes late: its release must leave the new lease alone.
    assert!(!slow.release(stale).await.unwrap());
    assert_eq!(store.get("lock:shop:1").await.unwrap().as_deref(), Some(current.token()));

    assert!(fast.release(current).await.unwrap());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_extend_keeps_lease_alive() {
    let (store, clock) = shared_store();
    let web_1 = holder(&store, "web-1");
    let web_2 = holder(&store, "web-2");

    let lease = web_1.acquire("shop:1", LOCK_TTL).await.unwrap().unwrap();
    clock.advance(Duration::from_secs(8));
    assert!(web_1.extend(&lease, LOCK_TTL).await.unwrap());

    clock.advance(Duration::from_secs(8));
    assert!(web_2.acquire("shop:1", LOCK_TTL).await.unwrap().is_none());
    assert_eq!(store.ttl("lock:shop:1"), Some(Duration::from_secs(2)));

    clock.advance(Duration::from_secs(2));
    assert!(!web_1.extend(&lease, LOCK_TTL).await.unwrap());
    assert!(web_2.acquire("shop:1", LOCK_TTL).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_has_one_winner() {
    let (store, _clock) = shared_store();
    let winners = Arc::new(AtomicUsize::new(0));

    let attempts = (0..24).map(|n| {
        let lock = holder(&store, &format!("node-{n}"));
        let winners = Arc::clone(&winners);
        tokio::spawn(async move {
            if lock.acquire("shop:7", LOCK_TTL).await.unwrap().is_some() {
                winners.fetch_add(1, Ordering::SeqCst);
            }
        })
    });
    for result in join_all(attempts).await {
        result.unwrap();
    }

    assert_eq!(winners.load(Ordering::SeqCst), 1);
}
