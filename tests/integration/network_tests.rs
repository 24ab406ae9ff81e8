//! Network tile source behaviour against a mock tile server.

use std::time::{Duration, SystemTime};

use slipmap_tiles::{DiskStore, GeoPoint, TileFormat, TileKey, TileSource};

use super::test_utils::{
    connect, network_config, next_available, png_bytes, shade_of, wait_until, write_tile,
    MockConnector, MockFetcher,
};

// =============================================================================
// Miss then deliver
// =============================================================================

#[tokio::test]
async fn test_miss_returns_pending_then_delivers() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::gated().with_shade(180));
    let source = connect(network_config(dir.path()), &connector).await;
    let mut rx = source.subscribe().await;

    assert!(source.use_level(2).await);
    let tile = source.get_tile(3, 4).await.unwrap();
    assert!(tile.is_pending());
    assert_eq!(source.queued_requests().await, 1);

    connector.fetcher.release(1);
    let available = next_available(&mut rx).await;
    assert_eq!(available.key, TileKey::new(2, 3, 4));
    assert!(!available.was_error);
    assert_eq!(shade_of(&available.image), 180);

    let tile = source.get_tile(3, 4).await.unwrap();
    assert!(!tile.is_pending());
    assert!(tile.ptr_eq(&available.image));
    assert_eq!(connector.fetcher.requests_for("/2/3/4.png").await, 1);
    assert_eq!(source.queued_requests().await, 0);
    assert!(source.tile_on_disk(2, 3, 4).await);
}

#[tokio::test]
async fn test_delivered_tile_is_persisted_as_served() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::new().with_shade(90));
    let source = connect(network_config(dir.path()), &connector).await;
    let mut rx = source.subscribe().await;

    source.use_level(1).await;
    source.get_tile(1, 0).await.unwrap();
    next_available(&mut rx).await;

    let store = DiskStore::new(dir.path(), TileFormat::Png);
    let on_disk = store.read(&TileKey::new(1, 1, 0)).await.unwrap();
    assert_eq!(on_disk.as_ref(), png_bytes(256, 90).as_slice());
}

// =============================================================================
// De-duplication
// =============================================================================

#[tokio::test]
async fn test_repeated_misses_fetch_once() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::gated());
    let source = connect(network_config(dir.path()), &connector).await;
    let mut rx = source.subscribe().await;

    source.use_level(3).await;
    for _ in 0..5 {
        assert!(source.get_tile(2, 2).await.unwrap().is_pending());
    }
    assert_eq!(source.queued_requests().await, 1);

    connector.fetcher.release(1);
    next_available(&mut rx).await;

    assert_eq!(connector.fetcher.requests_for("/3/2/2.png").await, 1);
}

#[tokio::test]
async fn test_in_flight_tile_is_not_requested_again() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::gated());
    let source = connect(network_config(dir.path()), &connector).await;
    let mut rx = source.subscribe().await;

    source.use_level(3).await;
    source.get_tile(1, 1).await.unwrap();

    // Worker has taken the request and is blocked on the server
    wait_until(|| async { source.pending_requests().await == 0 }).await;
    assert!(source.is_queued(3, 1, 1).await);
    source.get_tile(1, 1).await.unwrap();
    assert_eq!(source.pending_requests().await, 0);

    connector.fetcher.release(1);
    next_available(&mut rx).await;
    assert_eq!(connector.fetcher.requests_for("/3/1/1.png").await, 1);
}

// =============================================================================
// Level changes
// =============================================================================

#[tokio::test]
async fn test_level_change_flushes_queue() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::gated());
    let source = connect(network_config(dir.path()), &connector).await;
    let mut rx = source.subscribe().await;

    source.use_level(3).await;
    source.get_tile(0, 1).await.unwrap();
    wait_until(|| async { source.pending_requests().await == 0 }).await;

    source.get_tile(1, 1).await.unwrap();
    source.get_tile(2, 1).await.unwrap();
    assert_eq!(source.pending_requests().await, 2);
    assert_eq!(source.queued_requests().await, 3);

    assert!(source.use_level(4).await);
    assert_eq!(source.pending_requests().await, 0);
    assert_eq!(source.queued_requests().await, 0);

    // The in-flight fetch still lands, for a level no longer in use
    connector.fetcher.release(3);
    let late = next_available(&mut rx).await;
    assert_eq!(late.key, TileKey::new(3, 0, 1));
    assert!(source.tile_on_disk(3, 0, 1).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(connector.fetcher.requests_for("/3/1/1.png").await, 0);
    assert_eq!(connector.fetcher.requests_for("/3/2/1.png").await, 0);
}

#[tokio::test]
async fn test_unsupported_level_changes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::gated());
    let source = connect(network_config(dir.path()), &connector).await;

    source.use_level(2).await;
    source.get_tile(0, 0).await.unwrap();
    source.get_tile(1, 0).await.unwrap();
    let queued = source.queued_requests().await;

    assert!(!source.use_level(9).await);
    assert_eq!(source.level().await, 2);
    assert_eq!(source.current_info().await.num_tiles_x, 4);
    assert_eq!(source.queued_requests().await, queued);
    assert!(source.get_info(9).await.is_none());
}

#[tokio::test]
async fn test_level_info_is_mercator_grid() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::new());
    let source = connect(network_config(dir.path()), &connector).await;

    let info = source.get_info(5).await.unwrap();
    assert_eq!((info.num_tiles_x, info.num_tiles_y), (32, 32));
    assert!(info.ppd_x.is_none());
    assert_eq!(source.levels(), &[0, 1, 2, 3, 4, 5]);
}

// =============================================================================
// Age-based refetch
// =============================================================================

fn age_tile(dir: &std::path::Path, key: TileKey, days: u64) {
    let path = DiskStore::new(dir, TileFormat::Png).tile_path(&key);
    let old = SystemTime::now() - Duration::from_secs(days * 86_400);
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(old)
        .unwrap();
}

#[tokio::test]
async fn test_stale_tile_returned_and_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let key = TileKey::new(2, 1, 1);
    write_tile(dir.path(), key, &png_bytes(256, 40)).await;
    age_tile(dir.path(), key, 90);

    let connector = MockConnector::new(MockFetcher::gated().with_shade(220));
    let source = connect(network_config(dir.path()).with_refetch_days(60), &connector).await;
    let mut rx = source.subscribe().await;

    source.use_level(2).await;
    let stale = source.get_tile(1, 1).await.unwrap();
    assert!(!stale.is_pending());
    assert_eq!(shade_of(&stale), 40);
    assert!(source.is_queued(2, 1, 1).await);

    connector.fetcher.release(1);
    let fresh = next_available(&mut rx).await;
    assert_eq!(shade_of(&fresh.image), 220);

    // Fresh copy in memory and on disk; no further refetch
    let tile = source.get_tile(1, 1).await.unwrap();
    assert_eq!(shade_of(&tile), 220);
    assert!(!source.is_queued(2, 1, 1).await);
}

#[tokio::test]
async fn test_young_tile_is_not_refetched() {
    let dir = tempfile::tempdir().unwrap();
    let key = TileKey::new(2, 0, 0);
    write_tile(dir.path(), key, &png_bytes(256, 40)).await;
    age_tile(dir.path(), key, 10);

    let connector = MockConnector::new(MockFetcher::new());
    let source = connect(network_config(dir.path()).with_refetch_days(60), &connector).await;

    source.use_level(2).await;
    assert_eq!(shade_of(&source.get_tile(0, 0).await.unwrap()), 40);
    assert_eq!(source.queued_requests().await, 0);
}

#[tokio::test]
async fn test_threshold_change_applies_to_next_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let key = TileKey::new(1, 0, 1);
    write_tile(dir.path(), key, &png_bytes(256, 40)).await;
    age_tile(dir.path(), key, 10);

    let connector = MockConnector::new(MockFetcher::gated());
    let source = connect(network_config(dir.path()).with_refetch_days(0), &connector).await;
    source.use_level(1).await;

    // Disabled: never stale
    source.get_tile(0, 1).await.unwrap();
    assert_eq!(source.queued_requests().await, 0);

    source.set_age_threshold_days(5).await;
    assert_eq!(source.age_threshold_days(), 5);
    source.get_tile(0, 1).await.unwrap();
    assert!(source.is_queued(1, 0, 1).await);
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_http_error_gives_error_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let fetcher = MockFetcher::new();
    fetcher.fail_on("/2/1/1.png").await;
    let connector = MockConnector::new(fetcher);
    let source = connect(network_config(dir.path()), &connector).await;
    let mut rx = source.subscribe().await;

    source.use_level(2).await;
    source.get_tile(1, 1).await.unwrap();
    let available = next_available(&mut rx).await;
    assert!(available.was_error);
    assert!(available.image.ptr_eq(&source.placeholders().error));

    assert!(!source.tile_on_disk(2, 1, 1).await);
    assert!(source.get_tile(1, 1).await.unwrap().is_error());
    assert_eq!(connector.fetcher.requests_for("/2/1/1.png").await, 1);
}

#[tokio::test]
async fn test_wrong_content_type_gives_error_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::new().with_content_type("image/jpeg"));
    let source = connect(network_config(dir.path()), &connector).await;
    let mut rx = source.subscribe().await;

    source.use_level(1).await;
    source.get_tile(0, 0).await.unwrap();
    let available = next_available(&mut rx).await;
    assert!(available.was_error);
    assert!(!source.tile_on_disk(1, 0, 0).await);
}

#[tokio::test]
async fn test_corrupt_disk_tile_is_refetched() {
    let dir = tempfile::tempdir().unwrap();
    write_tile(dir.path(), TileKey::new(1, 1, 1), b"garbage").await;

    let connector = MockConnector::new(MockFetcher::new().with_shade(77));
    let source = connect(network_config(dir.path()), &connector).await;
    let mut rx = source.subscribe().await;

    source.use_level(1).await;
    assert!(source.get_tile(1, 1).await.unwrap().is_pending());
    let available = next_available(&mut rx).await;
    assert_eq!(shade_of(&available.image), 77);
}

// =============================================================================
// Listener and cache
// =============================================================================

#[tokio::test]
async fn test_delivery_without_listener_still_caches() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::new());
    let source = connect(network_config(dir.path()), &connector).await;

    source.use_level(1).await;
    assert!(source.get_tile(0, 1).await.unwrap().is_pending());
    wait_until(|| async { source.tile_on_disk(1, 0, 1).await }).await;
    wait_until(|| async { source.queued_requests().await == 0 }).await;

    assert!(!source.get_tile(0, 1).await.unwrap().is_pending());
}

#[tokio::test]
async fn test_subscribe_replaces_listener() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::new());
    let source = connect(network_config(dir.path()), &connector).await;

    let mut first = source.subscribe().await;
    let mut second = source.subscribe().await;
    assert!(first.recv().await.is_none());

    source.use_level(1).await;
    source.get_tile(1, 1).await.unwrap();
    assert_eq!(next_available(&mut second).await.key, TileKey::new(1, 1, 1));
}

#[tokio::test]
async fn test_memory_bound_keeps_disk_copies() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::new());
    let config = network_config(dir.path()).with_max_lru(2);
    let source = connect(config, &connector).await;
    let mut rx = source.subscribe().await;

    source.use_level(2).await;
    for x in 0..3 {
        source.get_tile(x, 0).await.unwrap();
        next_available(&mut rx).await;
    }

    assert_eq!(source.cached_tiles().await, 2);
    for x in 0..3 {
        assert!(source.tile_on_disk(2, x, 0).await);
    }

    // Evicted tile comes back from disk without a new request
    let before = connector.fetcher.request_count();
    assert!(!source.get_tile(0, 0).await.unwrap().is_pending());
    assert_eq!(connector.fetcher.request_count(), before);
}

#[tokio::test]
async fn test_requests_spread_over_servers() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::new());
    let mut config = network_config(dir.path()).with_requests_per_server(2);
    config.servers = vec!["http://a.test".to_string(), "http://b.test".to_string()];
    let source = connect(config, &connector).await;
    let mut rx = source.subscribe().await;
    assert_eq!(source.worker_count(), 4);

    source.use_level(4).await;
    for x in 0..12 {
        source.get_tile(x, 3).await.unwrap();
    }
    for _ in 0..12 {
        next_available(&mut rx).await;
    }

    let urls = connector.fetcher.urls().await;
    assert!(urls.iter().all(|u| u.starts_with("http://a.test/") || u.starts_with("http://b.test/")));
    // Probe goes to the first server only
    assert!(urls[0].starts_with("http://a.test/0/0/0.png"));
}

#[tokio::test]
async fn test_geo_conversion_uses_current_level() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockFetcher::new());
    let source = connect(network_config(dir.path()), &connector).await;

    source.use_level(5).await;
    let tile = source.geo_to_tile(GeoPoint::new(0.0, 0.0)).await.unwrap();
    assert!((tile.x - 16.0).abs() < 1e-9);
    assert!((tile.y - 16.0).abs() < 1e-9);

    let back = source.tile_to_geo(tile).await.unwrap();
    assert!(back.lon.abs() < 1e-9);
    assert!(back.lat.abs() < 1e-9);
}
