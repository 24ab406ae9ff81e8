//! Test utilities for integration tests.
//!
//! This module provides a mock tile fetcher with request tracking and
//! gating, plus helpers for building tilesets and sources in temporary
//! directories.

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use std::collections::HashSet;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock, Semaphore};

use slipmap_tiles::store::{write_level_info, write_tileset_info};
use slipmap_tiles::{
    encode_png, Connector, DiskStore, Extent, FetchError, HttpResponse, LevelRecord,
    NetworkSourceConfig, NetworkTileSource, TileAvailable, TileFetcher, TileFormat, TileKey,
    TileSourceError, TilesetInfo,
};

/// URL suffix of the startup probe request.
pub const PROBE_SUFFIX: &str = "/0/0/0.png";

/// PNG bytes of a solid tile.
pub fn png_bytes(size: u32, shade: u8) -> Vec<u8> {
    let img = RgbaImage::from_pixel(size, size, Rgba([shade, shade, shade, 255]));
    encode_png(&img).unwrap()
}

/// Red channel of a tile's centre pixel.
pub fn shade_of(image: &slipmap_tiles::TileImage) -> u8 {
    let (w, h) = (image.width(), image.height());
    image.pixels().get_pixel(w / 2, h / 2)[0]
}

// =============================================================================
// Mock Fetcher with Request Tracking
// =============================================================================

/// A mock tile server that tracks every request.
///
/// Tile responses can be held back with [`gated`](Self::gated) until permits
/// are released. The probe request is never gated.
pub struct MockFetcher {
    shade: u8,
    content_type: String,
    request_count: AtomicUsize,
    urls: RwLock<Vec<String>>,
    failing: RwLock<HashSet<String>>,
    gate: Option<Semaphore>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            shade: 200,
            content_type: "image/png".to_string(),
            request_count: AtomicUsize::new(0),
            urls: RwLock::new(Vec::new()),
            failing: RwLock::new(HashSet::new()),
            gate: None,
        }
    }

    /// Hold tile responses until permits are released.
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn with_shade(mut self, shade: u8) -> Self {
        self.shade = shade;
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    /// Let `n` held responses through.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Answer requests whose URL ends with `suffix` with HTTP 404.
    pub async fn fail_on(&self, suffix: &str) {
        self.failing.write().await.insert(suffix.to_string());
    }

    /// Total requests, including the probe.
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Requests whose URL ends with `suffix`.
    pub async fn requests_for(&self, suffix: &str) -> usize {
        self.urls
            .read()
            .await
            .iter()
            .filter(|u| u.ends_with(suffix))
            .count()
    }

    pub async fn urls(&self) -> Vec<String> {
        self.urls.read().await.clone()
    }
}

#[async_trait]
impl TileFetcher for MockFetcher {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.urls.write().await.push(url.to_string());

        if !url.ends_with(PROBE_SUFFIX) {
            if let Some(gate) = &self.gate {
                gate.acquire()
                    .await
                    .map_err(|e| FetchError::Transport(e.to_string()))?
                    .forget();
            }
        }

        let failing = self.failing.read().await;
        if failing.iter().any(|suffix| url.ends_with(suffix.as_str())) {
            return Ok(HttpResponse {
                status: 404,
                content_type: Some("text/html".to_string()),
                body: Bytes::from_static(b"not found"),
            });
        }

        Ok(HttpResponse {
            status: 200,
            content_type: Some(self.content_type.clone()),
            body: Bytes::from(png_bytes(256, self.shade)),
        })
    }
}

/// Connector handing out one shared mock fetcher, direct or proxied.
pub struct MockConnector {
    pub fetcher: Arc<MockFetcher>,
}

impl MockConnector {
    pub fn new(fetcher: MockFetcher) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
        }
    }
}

impl Connector for MockConnector {
    fn connect(&self, _proxy: Option<&str>) -> Result<Arc<dyn TileFetcher>, TileSourceError> {
        Ok(Arc::clone(&self.fetcher) as Arc<dyn TileFetcher>)
    }
}

// =============================================================================
// Source helpers
// =============================================================================

/// Network config with one server and one worker, cached under `dir`.
pub fn network_config(dir: &Path) -> NetworkSourceConfig {
    NetworkSourceConfig::new(
        "mock tiles",
        vec!["http://tiles.test".to_string()],
        "/{Z}/{X}/{Y}.png",
    )
    .with_levels(0..=5)
    .with_tiles_dir(dir)
    .with_requests_per_server(1)
    .with_max_lru(100)
}

pub async fn connect(config: NetworkSourceConfig, connector: &MockConnector) -> NetworkTileSource {
    NetworkTileSource::connect_with(config, connector)
        .await
        .unwrap()
}

/// Receive the next notification, failing the test after two seconds.
pub async fn next_available(rx: &mut mpsc::UnboundedReceiver<TileAvailable>) -> TileAvailable {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for tile")
        .expect("listener closed")
}

/// Wait until `check` holds, polling every few milliseconds.
pub async fn wait_until<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

/// Write a PNG tile straight into a store directory.
pub async fn write_tile(dir: &Path, key: TileKey, data: &[u8]) {
    DiskStore::new(dir, TileFormat::Png)
        .write(&key, data)
        .await
        .unwrap();
}

// =============================================================================
// Local tileset helpers
// =============================================================================

/// Build a local tileset: `levels` gives `(level, num_tiles_x, num_tiles_y)`
/// and every grid position gets a 16x16 tile shaded by its level.
pub async fn create_tileset(dir: &Path, extent: Extent, levels: &[(u8, u32, u32)]) {
    write_tileset_info(dir, &TilesetInfo::new(extent, 16, 16))
        .await
        .unwrap();

    for &(level, nx, ny) in levels {
        let ppd_x = f64::from(16 * nx) / (extent.max_lon - extent.min_lon);
        let ppd_y = f64::from(16 * ny) / (extent.max_lat - extent.min_lat);
        write_level_info(dir, level, &LevelRecord::new(nx, ny, ppd_x, ppd_y))
            .await
            .unwrap();

        let png = png_bytes(16, level * 10);
        for x in 0..nx {
            for y in 0..ny {
                write_tile(dir, TileKey::new(level, x, y), &png).await;
            }
        }
    }
}
