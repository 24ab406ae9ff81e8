//! Internet tile servers with an on-disk cache.
//!
//! # Request Flow
//!
//! 1. `get_tile` checks the memory cache, which falls through to disk
//! 2. A hit is returned at once; if the disk copy is older than the refetch
//!    threshold a background refetch is queued as well
//! 3. A miss queues a fetch (once per key) and returns the pending placeholder
//! 4. A worker fetches the tile and delivers it: memory, disk (real tiles
//!    only), queued set, then the listener
//!
//! `get_tile` never waits on the network. Coordinates are not checked
//! against the level grid; the server decides, and a request it rejects
//! shows the error placeholder.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, warn};

use crate::error::{ConfigError, TileError, TileSourceError};
use crate::fetch::{
    probe, Connector, Delivery, FetchOutcome, ReqwestConnector, RequestQueue, WorkerContext,
    WorkerPool,
};
use crate::projection::Projection;
use crate::store::DiskStore;
use crate::tile::{LevelInfo, MemoryCache, Placeholders, TileImage, TileKey};

use super::config::NetworkSourceConfig;
use super::level::LevelState;
use super::{TileAvailable, TileSource};

const SECONDS_PER_DAY: u64 = 86_400;

// =============================================================================
// Shared state
// =============================================================================

/// State touched by both `get_tile` callers and fetch workers.
struct Shared {
    name: String,
    cache: MemoryCache,
    queue: Arc<RequestQueue>,
    placeholders: Placeholders,
    listener: RwLock<Option<mpsc::UnboundedSender<TileAvailable>>>,
}

impl Shared {
    async fn notify(&self, available: TileAvailable) {
        let mut listener = self.listener.write().await;
        match listener.as_ref() {
            None => {
                error!(
                    source = %self.name,
                    key = %available.key,
                    "tile available but no listener is installed"
                );
            }
            Some(tx) => {
                if tx.send(available).is_err() {
                    warn!(source = %self.name, "tile listener dropped its receiver");
                    *listener = None;
                }
            }
        }
    }
}

#[async_trait]
impl Delivery for Shared {
    async fn deliver(&self, key: TileKey, outcome: FetchOutcome) {
        let (image, was_error) = match outcome {
            FetchOutcome::Fetched { image, data } => {
                self.cache.put(key, image.clone()).await;
                if let Err(e) = self.cache.store().write(&key, &data).await {
                    warn!(%key, error = %e, "failed to persist fetched tile");
                }
                (image, false)
            }
            FetchOutcome::Failed { .. } => {
                let image = self.placeholders.error.clone();
                self.cache.put(key, image.clone()).await;
                (image, true)
            }
        };

        self.queue.complete(&key).await;
        self.notify(TileAvailable {
            key,
            image,
            was_error,
        })
        .await;
    }
}

// =============================================================================
// Network Tile Source
// =============================================================================

/// Tile source backed by one or more HTTP tile servers.
///
/// Workers are spawned on construction and aborted when the source is
/// dropped.
pub struct NetworkTileSource {
    shared: Arc<Shared>,
    levels: LevelState,
    servers: Vec<String>,
    tile_width: u32,
    tile_height: u32,
    refetch_days: AtomicU32,
    pool: WorkerPool,
}

impl NetworkTileSource {
    /// Build a source using `reqwest` for HTTP.
    ///
    /// Runs the startup probe against the first server; see
    /// [`connect_with`](Self::connect_with).
    pub async fn connect(config: NetworkSourceConfig) -> Result<Self, TileSourceError> {
        let connector = ReqwestConnector::new(config.http_settings());
        Self::connect_with(config, &connector).await
    }

    /// Build a source with a custom HTTP connector.
    ///
    /// Validates the configuration, creates a cache directory for every
    /// level, probes tile `(0, 0, 0)` on the first server (retrying through
    /// `http_proxy` if the server cannot be reached) and starts
    /// `max_requests_per_server` workers per server.
    pub async fn connect_with(
        config: NetworkSourceConfig,
        connector: &dyn Connector,
    ) -> Result<Self, TileSourceError> {
        config.validate()?;
        let format = config.format()?;
        let levels = config.sorted_levels();
        let Some(&min_level) = levels.first() else {
            return Err(ConfigError::NoLevels.into());
        };

        let store = Arc::new(DiskStore::new(&config.tiles_dir, format));
        store.prepare_levels(&levels).await?;

        let fetcher = match probe(
            connector,
            &config.servers[0],
            &config.url_path,
            config.http_proxy.as_deref(),
        )
        .await
        {
            Ok(fetcher) => fetcher,
            Err(e) => {
                error!(source = %config.name, error = %e, "tile server probe failed");
                return Err(e);
            }
        };

        let queue = Arc::new(RequestQueue::new());
        let shared = Arc::new(Shared {
            name: config.name.clone(),
            cache: MemoryCache::with_capacity(store, config.max_lru),
            queue: Arc::clone(&queue),
            placeholders: Placeholders::new(config.tile_width, config.tile_height),
            listener: RwLock::new(None),
        });

        let ctx = WorkerContext {
            queue,
            fetcher,
            url_path: Arc::from(config.url_path.as_str()),
            format,
            delivery: Arc::clone(&shared) as Arc<dyn Delivery>,
        };
        let pool = WorkerPool::spawn(&config.servers, config.max_requests_per_server, ctx);

        info!(
            name = %config.name,
            servers = config.servers.len(),
            workers = pool.len(),
            tiles_dir = %config.tiles_dir.display(),
            "network tile source ready"
        );

        Ok(Self {
            shared,
            levels: LevelState::new(levels, min_level, LevelInfo::mercator(min_level)),
            servers: config.servers,
            tile_width: config.tile_width,
            tile_height: config.tile_height,
            refetch_days: AtomicU32::new(config.refetch_days),
            pool,
        })
    }

    /// Drop all requests not yet taken by a worker.
    ///
    /// Returns the number of requests dropped.
    pub async fn flush_requests(&self) -> usize {
        let dropped = self.shared.queue.flush().await;
        if dropped > 0 {
            debug!(source = %self.shared.name, dropped, "flushed tile requests");
        }
        dropped
    }

    /// Number of tiles queued or being fetched.
    pub async fn queued_requests(&self) -> usize {
        self.shared.queue.queued_len().await
    }

    /// Number of requests waiting for a worker.
    pub async fn pending_requests(&self) -> usize {
        self.shared.queue.pending_len().await
    }

    /// Whether a fetch for the tile is queued or in flight.
    pub async fn is_queued(&self, level: u8, x: u32, y: u32) -> bool {
        self.shared.queue.is_queued(&TileKey::new(level, x, y)).await
    }

    /// Install a listener for tile-available notifications.
    pub async fn set_listener(&self, sender: mpsc::UnboundedSender<TileAvailable>) {
        *self.shared.listener.write().await = Some(sender);
    }

    pub fn age_threshold_days(&self) -> u32 {
        self.refetch_days.load(Ordering::Relaxed)
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn worker_count(&self) -> usize {
        self.pool.len()
    }

    pub fn tiles_dir(&self) -> &Path {
        self.shared.cache.store().root()
    }

    pub fn placeholders(&self) -> &Placeholders {
        &self.shared.placeholders
    }

    /// Number of decoded tiles held in memory.
    pub async fn cached_tiles(&self) -> usize {
        self.shared.cache.len().await
    }

    async fn request(&self, key: TileKey) {
        if self.shared.queue.enqueue(key).await {
            debug!(%key, "tile fetch queued");
        }
    }

    /// Whether the disk copy of a tile is older than the refetch threshold.
    async fn is_stale(&self, key: &TileKey) -> bool {
        let days = self.age_threshold_days();
        if days == 0 {
            return false;
        }
        let Ok(modified) = self.shared.cache.store().modified_time(key).await else {
            return false;
        };
        let max_age = Duration::from_secs(u64::from(days) * SECONDS_PER_DAY);
        match SystemTime::now().checked_sub(max_age) {
            Some(cutoff) => modified < cutoff,
            None => false,
        }
    }
}

#[async_trait]
impl TileSource for NetworkTileSource {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn levels(&self) -> &[u8] {
        self.levels.levels()
    }

    fn tile_width(&self) -> u32 {
        self.tile_width
    }

    fn tile_height(&self) -> u32 {
        self.tile_height
    }

    fn projection(&self) -> Projection {
        Projection::Spherical
    }

    async fn level(&self) -> u8 {
        self.levels.current().await.0
    }

    async fn current_info(&self) -> LevelInfo {
        self.levels.current().await.1
    }

    async fn use_level(&self, level: u8) -> bool {
        if !self.levels.supports(level) {
            return false;
        }
        self.levels.set(level, LevelInfo::mercator(level)).await;
        let dropped = self.flush_requests().await;
        info!(source = %self.shared.name, level, dropped, "level changed");
        true
    }

    async fn get_tile(&self, x: u32, y: u32) -> Result<TileImage, TileError> {
        let level = self.level().await;
        let key = TileKey::new(level, x, y);

        match self.shared.cache.get(&key).await {
            Ok(Some(tile)) => {
                if self.is_stale(&key).await {
                    debug!(%key, "disk tile is stale, refetching");
                    self.request(key).await;
                }
                Ok(tile)
            }
            Ok(None) => {
                self.request(key).await;
                Ok(self.shared.placeholders.pending.clone())
            }
            Err(e) => {
                warn!(%key, error = %e, "unreadable disk tile, refetching");
                self.request(key).await;
                Ok(self.shared.placeholders.pending.clone())
            }
        }
    }

    async fn get_info(&self, level: u8) -> Option<LevelInfo> {
        self.levels
            .supports(level)
            .then(|| LevelInfo::mercator(level))
    }

    async fn tile_on_disk(&self, level: u8, x: u32, y: u32) -> bool {
        self.shared
            .cache
            .store()
            .exists(&TileKey::new(level, x, y))
            .await
    }

    async fn set_age_threshold_days(&self, days: u32) {
        self.refetch_days.store(days, Ordering::Relaxed);
        debug!(source = %self.shared.name, days, "refetch threshold changed");
    }

    async fn subscribe(&self) -> mpsc::UnboundedReceiver<TileAvailable> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.set_listener(tx).await;
        rx
    }
}
