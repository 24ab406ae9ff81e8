//! # slipmap-tiles
//!
//! Tile cache and tile sources for slippy-map views.
//!
//! A map view asks a [`TileSource`] for tiles addressed by `(level, x, y)`.
//! The source answers from a bounded in-memory LRU cache, falls back to an
//! on-disk store laid out as `<dir>/<level>/<x>/<y>.<ext>`, and for internet
//! tile servers queues a background fetch and hands back a placeholder.
//! Fetched tiles are announced on a channel so the view can repaint.
//!
//! ## Features
//!
//! - **Two-tier cache**: decoded tiles in memory, raw tile files on disk
//! - **Concurrent fetching**: worker tasks per server with request de-duplication
//! - **Age-based refetch**: disk tiles older than a threshold are refreshed in
//!   the background
//! - **Projections**: Web Mercator for internet tiles, linear for local tilesets
//!
//! ## Architecture
//!
//! - [`tile`] - tile keys, level grids, images and the memory cache
//! - [`store`] - on-disk tile store and `tile.info` metadata
//! - [`projection`] - geographic ↔ tile coordinate conversion
//! - [`fetch`] - HTTP fetcher, request queue, workers and startup probe
//! - [`source`] - the [`TileSource`] trait with local and network sources
//! - [`config`] - CLI configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use slipmap_tiles::{NetworkTileSource, Provider, TileSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let source = NetworkTileSource::connect(Provider::OpenStreetMap.config()).await?;
//!     let mut available = source.subscribe().await;
//!
//!     source.use_level(3).await;
//!     let tile = source.get_tile(4, 2).await?;
//!     if tile.is_pending() {
//!         // Repaint once the real tile arrives
//!         let msg = available.recv().await;
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fetch;
pub mod projection;
pub mod source;
pub mod store;
pub mod tile;

// Re-export commonly used types
pub use error::{ConfigError, FetchError, ProjectionError, StoreError, TileError, TileSourceError};
pub use fetch::{Connector, HttpResponse, HttpSettings, ReqwestConnector, TileFetcher};
pub use projection::Projection;
pub use source::{
    GridReport, LocalSourceConfig, LocalTileSource, NetworkSourceConfig, NetworkTileSource,
    Provider, TileAvailable, TileSource,
};
pub use store::{DiskStore, LevelRecord, TilesetInfo};
pub use tile::{
    encode_png, Extent, GeoPoint, LevelInfo, MemoryCache, Placeholders, TileFormat, TileImage,
    TileKey, TileKind, TilePoint,
};
