//! Geographic ↔ tile coordinate projections.
//!
//! Two strategies are supported:
//!
//! - [`Projection::Spherical`]: Web Mercator, used by internet tile servers.
//!   The grid at level `n` is `2^n × 2^n` tiles covering the whole world.
//! - [`Projection::Linear`]: a linear mapping onto a fixed extent, used by
//!   locally rendered tilesets whose levels carry pixels-per-degree metadata.

pub mod linear;
pub mod spherical;

pub use linear::LinearGrid;

use crate::error::ProjectionError;
use crate::tile::{Extent, GeoPoint, LevelInfo, TilePoint};

/// Projection used by a tile source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Web Mercator over the whole world
    Spherical,
    /// Linear mapping onto the given extent
    Linear { extent: Extent },
}

impl Projection {
    /// Geographic extent covered by tiles under this projection.
    pub fn extent(&self) -> Extent {
        match self {
            Projection::Spherical => Extent::mercator(),
            Projection::Linear { extent } => *extent,
        }
    }

    /// Convert a geographic point to fractional tile coordinates.
    pub fn geo_to_tile(
        &self,
        level: u8,
        info: &LevelInfo,
        tile_size: (u32, u32),
        geo: GeoPoint,
    ) -> Result<TilePoint, ProjectionError> {
        match self {
            Projection::Spherical => spherical::geo_to_tile(level, geo),
            Projection::Linear { extent } => {
                Ok(LinearGrid::new(level, *extent, info, tile_size.0, tile_size.1)?.geo_to_tile(geo))
            }
        }
    }

    /// Convert fractional tile coordinates to a geographic point.
    pub fn tile_to_geo(
        &self,
        level: u8,
        info: &LevelInfo,
        tile_size: (u32, u32),
        tile: TilePoint,
    ) -> Result<GeoPoint, ProjectionError> {
        match self {
            Projection::Spherical => Ok(spherical::tile_to_geo(level, tile)),
            Projection::Linear { extent } => {
                Ok(LinearGrid::new(level, *extent, info, tile_size.0, tile_size.1)?.tile_to_geo(tile))
            }
        }
    }
}
