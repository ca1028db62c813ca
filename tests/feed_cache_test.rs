mod common;

use anyhow::Result;
use chrono::Duration;
use common::{local, record, refresh_at, zone};
use partyfinder::app::ports::KeyValueStore;
use partyfinder::app::ManualClock;
use partyfinder::constants::FEED_LAST_GOOD_KEY;
use partyfinder::feed::{FeedCache, RefreshSchedule};
use partyfinder::infra::{InMemoryKvStore, StaticSource};
use partyfinder::pipeline::processing::RecordTransformer;
use std::sync::Arc;

struct Harness {
    source: Arc<StaticSource>,
    clock: Arc<ManualClock>,
    kv: Arc<InMemoryKvStore>,
    cache: FeedCache,
}

fn harness_at(start: chrono::DateTime<chrono::Utc>) -> Harness {
    let source = Arc::new(StaticSource::new(vec![record(
        "a",
        "Dodo Club",
        "2025-10-31",
        "A",
    )]));
    let clock = Arc::new(ManualClock::new(start));
    let kv = Arc::new(InMemoryKvStore::new());
    let cache = FeedCache::new(
        source.clone(),
        RecordTransformer::default(),
        RefreshSchedule::new(refresh_at(), zone()),
        clock.clone(),
    )
    .with_store(kv.clone());
    Harness {
        source,
        clock,
        kv,
        cache,
    }
}

#[tokio::test]
async fn first_call_fetches_even_before_the_boundary() -> Result<()> {
    let h = harness_at(local(2025, 10, 30, 8, 0));
    let data = h.cache.get_data(false).await;
    assert_eq!(data.parties.len(), 1);
    assert_eq!(h.source.fetch_count(), 1);
    Ok(())
}

#[tokio::test]
async fn cache_is_served_until_the_next_boundary() -> Result<()> {
    let h = harness_at(local(2025, 10, 30, 11, 0));
    h.cache.get_data(false).await;

    h.source.set_records(vec![
        record("a", "Dodo Club", "2025-10-31", "A"),
        record("b", "Dodo Club", "2025-10-31", "B"),
    ]);

    // same day, after the boundary: already refreshed today
    h.clock.set(local(2025, 10, 30, 23, 0));
    assert_eq!(h.cache.get_data(false).await.parties.len(), 1);

    // next day before 10:00: still yesterday's data
    h.clock.set(local(2025, 10, 31, 9, 59));
    assert_eq!(h.cache.get_data(false).await.parties.len(), 1);
    assert_eq!(h.source.fetch_count(), 1);

    // boundary passed: exactly one fresh fetch
    h.clock.set(local(2025, 10, 31, 10, 0));
    assert_eq!(h.cache.get_data(false).await.parties.len(), 2);
    h.clock.advance(Duration::hours(3));
    h.cache.get_data(false).await;
    assert_eq!(h.source.fetch_count(), 2);
    Ok(())
}

#[tokio::test]
async fn force_refresh_always_fetches() -> Result<()> {
    let h = harness_at(local(2025, 10, 30, 11, 0));
    h.cache.get_data(false).await;
    h.cache.get_data(true).await;
    h.cache.get_data(true).await;
    assert_eq!(h.source.fetch_count(), 3);
    Ok(())
}

#[tokio::test]
async fn outage_falls_back_to_the_cached_feed() -> Result<()> {
    let h = harness_at(local(2025, 10, 30, 11, 0));
    h.cache.get_data(false).await;

    h.source.set_failing(true);
    h.clock.set(local(2025, 10, 31, 10, 30));
    let data = h.cache.get_data(false).await;
    assert_eq!(data.parties.len(), 1);

    let status = h.cache.status().await;
    assert!(status.stale);
    assert!(status.last_error.is_some());
    assert!(status.has_data);

    let forced = h.cache.get_data(true).await;
    assert_eq!(forced.parties.len(), 1);
    Ok(())
}

#[tokio::test]
async fn outage_without_any_cache_yields_an_empty_feed() -> Result<()> {
    let h = harness_at(local(2025, 10, 30, 11, 0));
    h.source.set_failing(true);
    let data = h.cache.get_data(false).await;
    assert!(data.is_empty());
    Ok(())
}

#[tokio::test]
async fn failed_fetches_are_retried_after_the_retry_interval() -> Result<()> {
    let h = harness_at(local(2025, 10, 30, 11, 0));
    h.source.set_failing(true);
    h.cache.get_data(false).await;
    h.cache.get_data(false).await;
    assert_eq!(h.source.fetch_count(), 1);

    h.source.set_failing(false);
    h.clock.advance(Duration::minutes(5));
    assert_eq!(h.cache.get_data(false).await.parties.len(), 1);
    assert_eq!(h.source.fetch_count(), 2);
    assert!(!h.cache.status().await.stale);
    Ok(())
}

#[tokio::test]
async fn last_good_feed_survives_a_restart() -> Result<()> {
    let h = harness_at(local(2025, 10, 30, 11, 0));
    h.cache.get_data(false).await;
    assert!(h.kv.get(FEED_LAST_GOOD_KEY).await?.is_some());

    // new process, upstream down
    let source = Arc::new(StaticSource::new(Vec::new()));
    source.set_failing(true);
    let restarted = FeedCache::new(
        source,
        RecordTransformer::default(),
        RefreshSchedule::new(refresh_at(), zone()),
        h.clock.clone(),
    )
    .with_store(h.kv.clone());

    let data = restarted.get_data(false).await;
    assert_eq!(data.parties.len(), 1);
    assert_eq!(data.parties[0].id, "a");
    Ok(())
}

#[tokio::test]
async fn clear_drops_memory_and_persisted_copy() -> Result<()> {
    let h = harness_at(local(2025, 10, 30, 11, 0));
    h.cache.get_data(false).await;
    h.cache.clear().await?;

    assert_eq!(h.kv.get(FEED_LAST_GOOD_KEY).await?, None);
    let status = h.cache.status().await;
    assert!(!status.has_data);
    assert_eq!(status.last_update, None);

    h.cache.get_data(false).await;
    assert_eq!(h.source.fetch_count(), 2);
    Ok(())
}
