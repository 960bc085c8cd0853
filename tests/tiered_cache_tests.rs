//! Integration Tests for the Tiered Cache
//!
//! Exercises the coordinator against an in-process remote tier that can be
//! switched off, on a paused tokio clock.

mod common;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{config, init_tracing, tiered, FakeRemote};
use tiered_cache::{keys, CacheConfig, ConnectionState, FallbackStrategy, TieredCache};
use tokio::time::Instant;
use tokio_test::assert_ok;

// == Memory-First ==

#[tokio::test(start_paused = true)]
async fn test_remote_hit_is_promoted_into_memory() {
    let remote = FakeRemote::new();
    remote.seed("p", "7", Duration::from_secs(60));
    let cache = tiered(config(10, 60_000), &remote);

    assert_eq!(cache.get::<i32>("p").await.unwrap(), Some(7));

    // Served from memory once the remote tier goes away
    remote.set_down(true);
    assert_eq!(cache.get::<i32>("p").await.unwrap(), Some(7));

    let stats = cache.stats().await;
    assert_eq!(stats.remote.hits, 1);
    assert_eq!(stats.memory.hits, 1);
    assert_eq!(stats.memory.misses, 0);
    assert_eq!(stats.memory.size, 1);
    assert_eq!(stats.combined_hit_rate, 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_promoted_entry_uses_default_ttl() {
    let remote = FakeRemote::new();
    remote.seed("p", "\"v\"", Duration::from_secs(3600));
    let cache = tiered(config(10, 1000), &remote);

    assert_eq!(cache.get::<String>("p").await.unwrap().as_deref(), Some("v"));
    remote.set_down(true);

    tokio::time::advance(Duration::from_millis(1000)).await;
    assert_eq!(cache.get::<String>("p").await.unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn test_overall_miss_counts_on_every_enabled_tier() {
    let remote = FakeRemote::new();
    let cache = tiered(config(10, 60_000), &remote);

    assert_eq!(cache.get::<i32>("missing").await.unwrap(), None);

    let stats = cache.stats().await;
    assert_eq!(stats.memory.misses, 1);
    assert_eq!(stats.remote.misses, 1);
    assert_eq!(stats.memory.hit_rate, 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_set_writes_both_tiers_with_ttl_in_seconds() {
    let remote = FakeRemote::new();
    let cache = tiered(config(10, 60_000), &remote);
    cache.init().await;

    cache
        .set("a", &5, Some(Duration::from_millis(1500)))
        .await
        .unwrap();

    assert_eq!(remote.raw("a").as_deref(), Some("5"));

    // Remote TTL is rounded up to 2s
    tokio::time::advance(Duration::from_millis(1900)).await;
    assert_eq!(remote.raw("a").as_deref(), Some("5"));
    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(remote.raw("a"), None);
}

// == Remote Outage ==

#[tokio::test(start_paused = true)]
async fn test_remote_down_behaves_as_memory_only() {
    init_tracing();
    let remote = FakeRemote::new();
    remote.set_down(true);
    let cache = tiered(config(10, 60_000), &remote);
    cache.init().await;

    assert_ok!(cache.set("x", &42, None).await);
    assert_eq!(cache.get::<i32>("x").await.unwrap(), Some(42));
    assert!(cache.has("x").await.unwrap());
    assert!(!cache.has("y").await.unwrap());
    assert!(cache.delete("x").await.unwrap());
    assert!(!cache.delete("x").await.unwrap());

    let stats = cache.stats().await;
    assert_eq!(stats.remote.hits, 0);
    assert_eq!(stats.memory.hits, 1);

    cache.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_disables_until_explicit_reconnect() {
    init_tracing();
    let remote = FakeRemote::new();
    remote.set_down(true);
    let cache = tiered(config(10, 60_000), &remote);

    cache.init().await;
    for _ in 0..2 {
        tokio::time::advance(Duration::from_secs(5)).await;
        cache.get::<i32>("k").await.unwrap();
    }
    assert_eq!(cache.stats().await.remote.state, ConnectionState::Disabled);

    // Recovery is not noticed while disabled
    remote.set_down(false);
    let connects = remote.connects.load(Ordering::SeqCst);
    tokio::time::advance(Duration::from_secs(60)).await;
    cache.set("k", &1, None).await.unwrap();
    assert_eq!(remote.connects.load(Ordering::SeqCst), connects);
    assert_eq!(remote.raw("k"), None);

    assert!(cache.reconnect().await);
    let health = cache.health().await;
    let status = health.remote.unwrap();
    assert_eq!(status.state, ConnectionState::Connected);
    assert_eq!(status.attempt, 0);

    cache.set("k", &2, None).await.unwrap();
    assert_eq!(remote.raw("k").as_deref(), Some("2"));

    cache.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_recovers_after_backoff() {
    let remote = FakeRemote::new();
    let cache = tiered(config(10, 60_000), &remote);
    cache.init().await;

    remote.set_down(true);
    cache.set("a", &1, None).await.unwrap();
    assert_eq!(cache.stats().await.remote.state, ConnectionState::Disconnected);

    remote.set_down(false);
    tokio::time::advance(Duration::from_millis(100)).await;

    // Writes do not reconnect
    cache.set("b", &2, None).await.unwrap();
    assert_eq!(remote.raw("b"), None);
    assert_eq!(cache.stats().await.remote.state, ConnectionState::Disconnected);

    // Reads do
    assert!(!cache.has("zzz").await.unwrap());
    assert_eq!(cache.stats().await.remote.state, ConnectionState::Connected);

    cache.set("c", &3, None).await.unwrap();
    assert_eq!(remote.raw("c").as_deref(), Some("3"));
    assert_eq!(cache.get::<i32>("a").await.unwrap(), Some(1));
    assert_eq!(cache.get::<i32>("b").await.unwrap(), Some(2));

    cache.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_set_never_waits_on_a_reconnect() {
    let remote = FakeRemote::new();
    let cache = tiered(config(10, 60_000), &remote);
    cache.init().await;

    remote.set_down(true);
    cache.set("a", &1, None).await.unwrap();
    assert_eq!(cache.stats().await.remote.state, ConnectionState::Disconnected);

    // Host comes back but swallows connection attempts; backoff has passed
    remote.set_down(false);
    remote.set_hang_connect(true);
    tokio::time::advance(Duration::from_secs(5)).await;

    let connects = remote.connects.load(Ordering::SeqCst);
    let started = Instant::now();
    cache.set("b", &2, None).await.unwrap();

    assert_eq!(Instant::now(), started);
    assert_eq!(remote.connects.load(Ordering::SeqCst), connects);
    assert_eq!(cache.get::<i32>("b").await.unwrap(), Some(2));

    cache.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_stats_report_remote_size() {
    let remote = FakeRemote::new();
    let cache = tiered(config(10, 60_000), &remote);
    cache.init().await;

    cache.set("a", &1, None).await.unwrap();
    cache.set("b", &2, None).await.unwrap();
    remote.seed("c", "3", Duration::from_secs(60));

    let stats = cache.stats().await;
    assert_eq!(stats.remote.size, Some(3));
    assert_eq!(stats.memory.size, 2);

    remote.set_down(true);
    assert_eq!(cache.get::<i32>("zzz").await.unwrap(), None);
    assert_eq!(cache.stats().await.remote.size, None);

    cache.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_corrupted_remote_payload_is_isolated() {
    let remote = FakeRemote::new();
    remote.seed("bad", "{not json", Duration::from_secs(60));
    remote.seed("good", "1", Duration::from_secs(60));
    let cache = tiered(config(10, 60_000), &remote);

    assert_eq!(cache.get::<i32>("bad").await.unwrap(), None);
    assert_eq!(cache.get::<i32>("good").await.unwrap(), Some(1));
    assert_eq!(cache.stats().await.remote.state, ConnectionState::Connected);
}

// == Strategies ==

#[tokio::test(start_paused = true)]
async fn test_redis_first_prefers_remote_value() {
    let remote = FakeRemote::new();
    let cache = tiered(
        CacheConfig {
            fallback_strategy: FallbackStrategy::RedisFirst,
            ..config(10, 60_000)
        },
        &remote,
    );

    cache.set("k", &1, None).await.unwrap();
    // Another instance overwrites the shared value
    remote.seed("k", "2", Duration::from_secs(60));

    assert_eq!(cache.get::<i32>("k").await.unwrap(), Some(2));

    // Memory is the fallback, and now holds the refreshed value
    remote.set_down(true);
    assert_eq!(cache.get::<i32>("k").await.unwrap(), Some(2));

    let stats = cache.stats().await;
    assert_eq!(stats.remote.hits, 1);
    assert_eq!(stats.memory.hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_memory_only_never_touches_remote() {
    let remote = FakeRemote::new();
    remote.seed("r", "1", Duration::from_secs(60));
    let cache = tiered(
        CacheConfig {
            fallback_strategy: FallbackStrategy::MemoryOnly,
            ..config(10, 60_000)
        },
        &remote,
    );
    cache.init().await;

    assert_eq!(cache.get::<i32>("r").await.unwrap(), None);
    assert!(!cache.has("r").await.unwrap());
    cache.set("m", &1, None).await.unwrap();

    assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    let stats = cache.stats().await;
    assert!(!stats.remote.enabled);
    assert_eq!(stats.remote.size, None);
    assert_eq!(stats.remote.misses, 0);

    cache.dispose().await;
}

// == Has / Delete / Clear ==

#[tokio::test(start_paused = true)]
async fn test_has_and_delete_consult_remote() {
    let remote = FakeRemote::new();
    remote.seed("only-remote", "1", Duration::from_secs(60));
    let cache = tiered(config(10, 60_000), &remote);

    assert!(cache.has("only-remote").await.unwrap());
    assert!(cache.delete("only-remote").await.unwrap());
    assert!(!cache.has("only-remote").await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_clear_drops_both_tiers_and_resets_stats() {
    let remote = FakeRemote::new();
    let cache = tiered(config(10, 60_000), &remote);
    cache.init().await;

    cache.set("a", &1, None).await.unwrap();
    cache.get::<i32>("a").await.unwrap();
    assert_eq!(remote.len(), 1);

    cache.clear().await;

    assert_eq!(remote.len(), 0);
    let stats = cache.stats().await;
    assert_eq!(stats.remote.size, Some(0));
    assert_eq!(stats.memory.size, 0);
    assert_eq!(stats.memory.hits, 0);
    assert_eq!(stats.remote.misses, 0);
    assert_eq!(cache.get::<i32>("a").await.unwrap(), None);
}

// == Remote Counters ==

#[tokio::test(start_paused = true)]
async fn test_increment_and_expire_pass_through() {
    let remote = FakeRemote::new();
    let cache = tiered(config(10, 60_000), &remote);

    assert_eq!(cache.increment("rate:user:1", 1).await.unwrap(), Some(1));
    assert_eq!(cache.increment("rate:user:1", 4).await.unwrap(), Some(5));
    assert!(cache.expire("rate:user:1", Duration::from_secs(1)).await.unwrap());
    assert!(!cache.expire("nope", Duration::from_secs(1)).await.unwrap());

    tokio::time::advance(Duration::from_secs(1)).await;
    assert_eq!(remote.raw("rate:user:1"), None);

    remote.set_down(true);
    assert_eq!(cache.increment("rate:user:1", 1).await.unwrap(), None);
}

// == Composite Operations ==

#[tokio::test(start_paused = true)]
async fn test_get_or_set_shares_values_across_instances() {
    let remote = FakeRemote::new();
    let first = tiered(config(10, 60_000), &remote);
    let second = tiered(config(10, 60_000), &remote);
    let key = keys::price("btcusdt");

    let price: f64 = first
        .get_or_set(&key, || async { Ok(64_000.5) }, None)
        .await
        .unwrap();
    assert_eq!(price, 64_000.5);

    let price: f64 = second
        .get_or_set(
            &key,
            || async { Err(anyhow::anyhow!("fetcher should not run")) },
            None,
        )
        .await
        .unwrap();
    assert_eq!(price, 64_000.5);
    assert_eq!(second.stats().await.remote.hits, 1);
}

#[tokio::test(start_paused = true)]
async fn test_batch_get_merges_tiers_and_fetcher() {
    let remote = FakeRemote::new();
    remote.seed(&keys::user_profile("2"), "\"bob\"", Duration::from_secs(60));
    let cache = tiered(config(10, 60_000), &remote);
    cache
        .set(&keys::user_profile("1"), "alice", None)
        .await
        .unwrap();

    let wanted: Vec<String> = ["1", "2", "3", "4"]
        .into_iter()
        .map(keys::user_profile)
        .collect();
    let results: HashMap<String, String> = cache
        .batch_get(
            &wanted,
            |missing| async move {
                assert_eq!(missing, vec![keys::user_profile("3"), keys::user_profile("4")]);
                Ok(HashMap::from([(keys::user_profile("3"), "carol".to_string())]))
            },
            None,
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[&keys::user_profile("2")], "bob");
    assert_eq!(results[&keys::user_profile("3")], "carol");
    assert!(!results.contains_key(&keys::user_profile("4")));
    assert_eq!(remote.raw(&keys::user_profile("3")).as_deref(), Some("\"carol\""));
}

// == Cleanup Scheduler ==

#[tokio::test(start_paused = true)]
async fn test_scheduler_evicts_least_recently_used() {
    let cache = TieredCache::new(CacheConfig {
        cleanup_interval: Duration::from_millis(100),
        ..config(5, 60_000)
    })
    .unwrap();
    cache.init().await;

    for i in 0..=5 {
        cache.set(&format!("k{}", i), &i, None).await.unwrap();
    }
    cache.get::<i32>("k0").await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(cache.has("k0").await.unwrap());
    assert!(!cache.has("k1").await.unwrap());
    let stats = cache.stats().await;
    assert_eq!(stats.memory.size, 5);
    assert_eq!(stats.memory.evictions, 1);

    cache.dispose().await;
    assert!(!cache.health().await.cleanup_running);
}
