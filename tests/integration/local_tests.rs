//! Local tileset behaviour.

use slipmap_tiles::store::{write_level_info, write_tileset_info};
use slipmap_tiles::{
    ConfigError, Extent, GeoPoint, LevelRecord, LocalSourceConfig, LocalTileSource, StoreError,
    TileError, TileKey, TilePoint, TileSource, TileSourceError, TilesetInfo,
};

use super::test_utils::{create_tileset, png_bytes, shade_of, write_tile};

const WORLD: Extent = Extent::new(-180.0, 180.0, -90.0, 90.0);

async fn open(dir: &std::path::Path) -> LocalTileSource {
    LocalTileSource::open(LocalSourceConfig::new(dir)).await.unwrap()
}

#[tokio::test]
async fn test_single_tile_tileset_lookup() {
    let dir = tempfile::tempdir().unwrap();
    write_tileset_info(dir.path(), &TilesetInfo::new(WORLD, 16, 16))
        .await
        .unwrap();
    write_level_info(dir.path(), 0, &LevelRecord::new(1, 1, 16.0 / 360.0, 16.0 / 180.0))
        .await
        .unwrap();
    write_tile(dir.path(), TileKey::new(0, 0, 0), &png_bytes(16, 99)).await;

    let source = open(dir.path()).await;
    assert!(source.use_level(0).await);

    let tile = source.get_tile(0, 0).await.unwrap();
    assert_eq!((tile.width(), tile.height()), (16, 16));
    assert_eq!(shade_of(&tile), 99);

    match source.get_tile(1, 0).await {
        Err(TileError::OutOfBounds {
            level: 0,
            x: 1,
            y: 0,
            num_tiles_x: 1,
            num_tiles_y: 1,
        }) => {}
        other => panic!("expected out of bounds, got {other:?}"),
    }
}

#[tokio::test]
async fn test_repeated_lookup_served_from_memory() {
    let dir = tempfile::tempdir().unwrap();
    create_tileset(dir.path(), WORLD, &[(0, 1, 1), (1, 2, 1)]).await;
    let source = open(dir.path()).await;

    let first = source.get_tile(0, 0).await.unwrap();
    let second = source.get_tile(0, 0).await.unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(source.cached_tiles().await, 1);
}

#[tokio::test]
async fn test_level_switching() {
    let dir = tempfile::tempdir().unwrap();
    create_tileset(dir.path(), WORLD, &[(0, 1, 1), (1, 2, 1), (2, 4, 2)]).await;
    let source = open(dir.path()).await;

    assert_eq!(source.levels(), &[0, 1, 2]);
    assert_eq!((source.min_level(), source.max_level()), (0, 2));

    assert!(source.use_level(2).await);
    assert_eq!(source.level().await, 2);
    assert_eq!(source.current_info().await.num_tiles_x, 4);
    assert_eq!(shade_of(&source.get_tile(3, 1).await.unwrap()), 20);

    // Unknown level: nothing changes
    assert!(!source.use_level(7).await);
    assert_eq!(source.level().await, 2);
    assert_eq!(source.current_info().await.num_tiles_x, 4);
}

#[tokio::test]
async fn test_level_without_metadata_cannot_be_selected() {
    let dir = tempfile::tempdir().unwrap();
    create_tileset(dir.path(), WORLD, &[(0, 1, 1), (1, 2, 1)]).await;
    std::fs::remove_file(dir.path().join("1").join("tile.info")).unwrap();

    let source = open(dir.path()).await;
    assert_eq!(source.levels(), &[0, 1]);

    assert!(!source.use_level(1).await);
    assert_eq!(source.level().await, 0);
    assert_eq!(source.current_info().await.num_tiles_x, 1);
    assert!(source.get_info(1).await.is_none());
}

#[tokio::test]
async fn test_get_info() {
    let dir = tempfile::tempdir().unwrap();
    create_tileset(dir.path(), WORLD, &[(0, 1, 1), (1, 2, 1)]).await;
    let source = open(dir.path()).await;

    let info = source.get_info(1).await.unwrap();
    assert_eq!((info.num_tiles_x, info.num_tiles_y), (2, 1));
    assert!((info.ppd_x.unwrap() - 32.0 / 360.0).abs() < 1e-12);
    assert!(source.get_info(3).await.is_none());
}

#[tokio::test]
async fn test_configured_levels_restrict_discovery() {
    let dir = tempfile::tempdir().unwrap();
    create_tileset(dir.path(), WORLD, &[(0, 1, 1), (1, 2, 1), (2, 4, 2)]).await;

    let config = LocalSourceConfig::new(dir.path()).with_levels([1, 2]);
    let source = LocalTileSource::open(config).await.unwrap();
    assert_eq!(source.levels(), &[1, 2]);
    assert_eq!(source.level().await, 1);
    assert!(!source.use_level(0).await);
}

#[tokio::test]
async fn test_projection_roundtrip_across_levels() {
    let dir = tempfile::tempdir().unwrap();
    let extent = Extent::new(-65.0, 295.0, -66.66, 66.66);
    create_tileset(dir.path(), extent, &[(0, 1, 1), (1, 2, 2), (2, 4, 4)]).await;
    let source = open(dir.path()).await;

    let points = [
        GeoPoint::new(0.0, 0.0),
        GeoPoint::new(151.2, -33.9),
        GeoPoint::new(-64.0, 66.0),
        GeoPoint::new(294.0, -66.0),
    ];
    for level in 0..=2 {
        assert!(source.use_level(level).await);
        for geo in points {
            let tile = source.geo_to_tile(geo).await.unwrap();
            let back = source.tile_to_geo(tile).await.unwrap();
            assert!((back.lon - geo.lon).abs() < 1e-9, "lon at level {level}");
            assert!((back.lat - geo.lat).abs() < 1e-9, "lat at level {level}");
        }
    }

    // Top-left of the extent is tile origin
    let origin = source
        .tile_to_geo(TilePoint::new(0.0, 0.0))
        .await
        .unwrap();
    assert!((origin.lon - extent.min_lon).abs() < 1e-9);
    assert!((origin.lat - extent.max_lat).abs() < 1e-9);
}

#[tokio::test]
async fn test_verify_complete_and_incomplete_levels() {
    let dir = tempfile::tempdir().unwrap();
    create_tileset(dir.path(), WORLD, &[(0, 1, 1), (1, 2, 2)]).await;
    std::fs::remove_file(dir.path().join("1").join("1").join("0.png")).unwrap();

    let source = open(dir.path()).await;
    assert!(source.verify_level(0).await.unwrap().is_complete());

    let report = source.verify_level(1).await.unwrap();
    assert_eq!(report.missing, vec![(1, 0)]);
    assert!(report.outside.is_empty());
    assert_eq!(report.found, 3);

    // Missing inside the grid is a hard error, not a placeholder
    source.use_level(1).await;
    assert!(matches!(
        source.get_tile(1, 0).await,
        Err(TileError::NotFound { level: 1, x: 1, y: 0 })
    ));
    assert!(!source.tile_on_disk(1, 1, 0).await);
    assert!(source.tile_on_disk(1, 1, 1).await);
}

#[tokio::test]
async fn test_unsupported_extension_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    create_tileset(dir.path(), WORLD, &[(0, 1, 1)]).await;

    let config = LocalSourceConfig::new(dir.path()).with_tile_extension("tiff");
    match LocalTileSource::open(config).await {
        Err(TileSourceError::Config(ConfigError::UnsupportedExtension { extension })) => {
            assert_eq!(extension, "tiff");
        }
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_missing_tileset_info_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    write_tile(dir.path(), TileKey::new(0, 0, 0), &png_bytes(16, 1)).await;

    match LocalTileSource::open(LocalSourceConfig::new(dir.path())).await {
        Err(TileSourceError::Store(StoreError::NotFound { path })) => {
            assert!(path.ends_with("tile.info"));
        }
        Err(e) => panic!("unexpected error {e}"),
        Ok(_) => panic!("expected failure"),
    }
}

#[tokio::test]
async fn test_unknown_metadata_version_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    create_tileset(dir.path(), WORLD, &[(0, 1, 1)]).await;
    std::fs::write(
        dir.path().join("0").join("tile.info"),
        r#"{"version": 9, "num_tiles_x": 1, "num_tiles_y": 1, "ppd_x": 1.0, "ppd_y": 1.0}"#,
    )
    .unwrap();

    let result = LocalTileSource::open(LocalSourceConfig::new(dir.path())).await;
    assert!(matches!(
        result,
        Err(TileSourceError::Store(StoreError::UnsupportedSchema { version: 9, .. }))
    ));
}

#[tokio::test]
async fn test_local_source_never_notifies() {
    let dir = tempfile::tempdir().unwrap();
    create_tileset(dir.path(), WORLD, &[(0, 1, 1)]).await;
    let source = open(dir.path()).await;

    let mut rx = source.subscribe().await;
    source.get_tile(0, 0).await.unwrap();
    assert!(rx.recv().await.is_none());
}
