//! Tile addressing: keys, per-level grid information and extents.

use serde::{Deserialize, Serialize};

// =============================================================================
// Tile Key
// =============================================================================

/// Identity of one tile image at one zoom level.
///
/// Coordinates are grid indices with the origin at the map's top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    /// Zoom level
    pub level: u8,

    /// Tile X coordinate (0-indexed from left)
    pub x: u32,

    /// Tile Y coordinate (0-indexed from top)
    pub y: u32,
}

impl TileKey {
    /// Create a new tile key.
    pub const fn new(level: u8, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.level, self.x, self.y)
    }
}

// =============================================================================
// Level Information
// =============================================================================

/// Grid information for one level.
///
/// Network sources always have a `2^level` square grid and no
/// pixels-per-degree; local sources read all four values from the level's
/// `tile.info` record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelInfo {
    /// Number of tiles in X direction
    pub num_tiles_x: u32,

    /// Number of tiles in Y direction
    pub num_tiles_y: u32,

    /// Pixels per degree of longitude
    pub ppd_x: Option<f64>,

    /// Pixels per degree of latitude
    pub ppd_y: Option<f64>,
}

impl LevelInfo {
    /// Grid for a Web Mercator level: `2^level` tiles on each side.
    pub fn mercator(level: u8) -> Self {
        let n = 1u32 << level.min(31);
        Self {
            num_tiles_x: n,
            num_tiles_y: n,
            ppd_x: None,
            ppd_y: None,
        }
    }

    /// Whether `(x, y)` lies inside this grid.
    #[inline]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x < self.num_tiles_x && y < self.num_tiles_y
    }
}

// =============================================================================
// Extent and geo points
// =============================================================================

/// Geographic bounding box covered by a tileset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

/// Latitude limit of the Web Mercator projection.
pub const MERCATOR_MAX_LAT: f64 = 85.0511;

impl Extent {
    /// Create a new extent.
    pub const fn new(min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            max_lon,
            min_lat,
            max_lat,
        }
    }

    /// Whole-world bounds used by Web Mercator tile servers.
    pub const fn mercator() -> Self {
        Self::new(-180.0, 180.0, -MERCATOR_MAX_LAT, MERCATOR_MAX_LAT)
    }

    /// Whether the point lies within the extent (edges inclusive).
    pub fn contains(&self, geo: GeoPoint) -> bool {
        (self.min_lon..=self.max_lon).contains(&geo.lon)
            && (self.min_lat..=self.max_lat).contains(&geo.lat)
    }
}

/// A geographic position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A position in fractional tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TilePoint {
    pub x: f64,
    pub y: f64,
}

impl TilePoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The tile containing this point.
    pub fn tile(&self) -> (u32, u32) {
        (self.x.max(0.0).floor() as u32, self.y.max(0.0).floor() as u32)
    }
}
