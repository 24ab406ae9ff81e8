//! Tile model and in-memory cache.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │               TileSource                │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              MemoryCache                │
//! │  (LRU of decoded TileImages)            │
//! └────────────────────┬────────────────────┘
//!                      │ miss
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │               DiskStore                 │
//! │  (<dir>/<level>/<x>/<y>.<ext>)          │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileKey`]: `(level, x, y)` identity of one tile
//! - [`LevelInfo`]: grid dimensions and pixels-per-degree of a level
//! - [`TileImage`]: decoded raster, real or placeholder
//! - [`TileFormat`]: `png`/`jpg` file type with its content type
//! - [`MemoryCache`]: bounded LRU with cache-aside to the backing store

mod cache;
mod key;
mod raster;

pub use cache::{MemoryCache, DEFAULT_MAX_LRU};
pub use key::{Extent, GeoPoint, LevelInfo, TileKey, TilePoint, MERCATOR_MAX_LAT};
pub use raster::{encode_png, Placeholders, TileFormat, TileImage, TileKind, DEFAULT_TILE_SIZE};
