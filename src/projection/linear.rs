//! Linear (Cartesian) projection for locally rendered tilesets.
//!
//! Geographic coordinates map linearly onto the tileset's extent with the
//! origin at the top-left corner. One tile spans `tile_width / ppd_x`
//! degrees of longitude and `tile_height / ppd_y` degrees of latitude.

use crate::error::ProjectionError;
use crate::tile::{Extent, GeoPoint, LevelInfo, TilePoint};

/// Linear mapping for one level of a tileset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearGrid {
    extent: Extent,
    /// Degrees of longitude covered by one tile
    tile_deg_x: f64,
    /// Degrees of latitude covered by one tile
    tile_deg_y: f64,
}

impl LinearGrid {
    /// Build the mapping for `level` from its metadata.
    ///
    /// Fails when the level lacks pixels-per-degree or either value is zero.
    pub fn new(
        level: u8,
        extent: Extent,
        info: &LevelInfo,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, ProjectionError> {
        let (ppd_x, ppd_y) = match (info.ppd_x, info.ppd_y) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(ProjectionError::MissingPixelsPerDegree { level }),
        };
        if ppd_x == 0.0 || ppd_y == 0.0 || !ppd_x.is_finite() || !ppd_y.is_finite() {
            return Err(ProjectionError::ZeroPixelsPerDegree { level });
        }

        Ok(Self {
            extent,
            tile_deg_x: tile_width as f64 / ppd_x,
            tile_deg_y: tile_height as f64 / ppd_y,
        })
    }

    pub fn geo_to_tile(&self, geo: GeoPoint) -> TilePoint {
        TilePoint::new(
            (geo.lon - self.extent.min_lon) / self.tile_deg_x,
            (self.extent.max_lat - geo.lat) / self.tile_deg_y,
        )
    }

    pub fn tile_to_geo(&self, tile: TilePoint) -> GeoPoint {
        GeoPoint::new(
            tile.x * self.tile_deg_x + self.extent.min_lon,
            self.extent.max_lat - tile.y * self.tile_deg_y,
        )
    }
}
