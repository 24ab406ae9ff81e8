//! Tile sources: the façade a map view talks to.
//!
//! A tile source combines a [`MemoryCache`](crate::tile::MemoryCache), its
//! [`DiskStore`](crate::store::DiskStore), a [`Projection`] and, for internet
//! servers, a pool of fetch workers. Two implementations exist:
//!
//! - [`LocalTileSource`]: a pre-rendered tileset on disk with `tile.info`
//!   metadata and a linear projection. A missing tile is an error.
//! - [`NetworkTileSource`]: Web Mercator tiles fetched from HTTP servers and
//!   cached on disk. A miss returns the pending placeholder and queues a
//!   fetch; the real tile arrives later as a [`TileAvailable`] message.
//!
//! # Notifications
//!
//! ```text
//! worker ──▶ memory + disk ──▶ mpsc::UnboundedSender<TileAvailable> ──▶ view
//! ```
//!
//! The view drains the receiver returned by [`TileSource::subscribe`] on its
//! own schedule. It must tolerate notifications for levels it has already
//! left.

mod config;
mod level;
mod local;
mod network;
pub mod providers;

pub use config::{
    LocalSourceConfig, NetworkSourceConfig, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REFETCH_DAYS,
    DEFAULT_REQUESTS_PER_SERVER, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SOURCE_LRU,
};
pub use local::{GridReport, LocalTileSource};
pub use network::NetworkTileSource;
pub use providers::Provider;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ProjectionError, TileError};
use crate::projection::Projection;
use crate::tile::{Extent, GeoPoint, LevelInfo, TileImage, TileKey, TilePoint};

/// A tile newly placed in the cache by a fetch worker.
#[derive(Debug, Clone)]
pub struct TileAvailable {
    pub key: TileKey,
    pub image: TileImage,
    /// `image` is the error placeholder
    pub was_error: bool,
}

/// Operations a map view needs from a tile source.
#[async_trait]
pub trait TileSource: Send + Sync {
    /// Human-readable source name.
    fn name(&self) -> &str;

    /// Supported levels, ascending. Never empty.
    fn levels(&self) -> &[u8];

    fn min_level(&self) -> u8 {
        self.levels().first().copied().unwrap_or(0)
    }

    fn max_level(&self) -> u8 {
        self.levels().last().copied().unwrap_or(0)
    }

    fn tile_width(&self) -> u32;

    fn tile_height(&self) -> u32;

    fn projection(&self) -> Projection;

    /// Geographic extent covered by the tiles.
    fn extent(&self) -> Extent {
        self.projection().extent()
    }

    /// Level currently in use.
    async fn level(&self) -> u8;

    /// Grid of the level currently in use.
    async fn current_info(&self) -> LevelInfo;

    /// Switch to `level`.
    ///
    /// Returns `false`, changing nothing, if the level is unsupported or has
    /// no metadata.
    async fn use_level(&self, level: u8) -> bool;

    /// Get tile `(x, y)` of the current level.
    async fn get_tile(&self, x: u32, y: u32) -> Result<TileImage, TileError>;

    /// Grid information for `level`, if supported.
    async fn get_info(&self, level: u8) -> Option<LevelInfo>;

    /// Whether the backing store holds a tile.
    async fn tile_on_disk(&self, level: u8, x: u32, y: u32) -> bool;

    /// Set the age in days after which disk tiles are refetched; 0 disables.
    ///
    /// Sources without a network backend ignore this.
    async fn set_age_threshold_days(&self, _days: u32) {}

    /// Install a new listener for tile-available notifications, replacing
    /// any previous one.
    ///
    /// Sources that never fetch return a receiver that yields nothing.
    async fn subscribe(&self) -> mpsc::UnboundedReceiver<TileAvailable> {
        let (_tx, rx) = mpsc::unbounded_channel();
        rx
    }

    /// Convert a geographic point to fractional tile coordinates at the
    /// current level.
    async fn geo_to_tile(&self, geo: GeoPoint) -> Result<TilePoint, ProjectionError> {
        let level = self.level().await;
        let info = self.current_info().await;
        self.projection()
            .geo_to_tile(level, &info, (self.tile_width(), self.tile_height()), geo)
    }

    /// Convert fractional tile coordinates at the current level to a
    /// geographic point.
    async fn tile_to_geo(&self, tile: TilePoint) -> Result<GeoPoint, ProjectionError> {
        let level = self.level().await;
        let info = self.current_info().await;
        self.projection()
            .tile_to_geo(level, &info, (self.tile_width(), self.tile_height()), tile)
    }
}

/// Reject coordinates outside a level's grid.
pub(crate) fn check_bounds(level: u8, info: &LevelInfo, x: u32, y: u32) -> Result<(), TileError> {
    if info.contains(x, y) {
        Ok(())
    } else {
        Err(TileError::OutOfBounds {
            level,
            x,
            y,
            num_tiles_x: info.num_tiles_x,
            num_tiles_y: info.num_tiles_y,
        })
    }
}
