//! Web Mercator (spherical) slippy-map tile math.
//!
//! See <https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames>.

use std::f64::consts::PI;

use crate::error::ProjectionError;
use crate::tile::{GeoPoint, TilePoint, MERCATOR_MAX_LAT};

/// Convert a geographic point to fractional tile coordinates at `level`.
///
/// Latitudes outside `(-85.0511, 85.0511)` are rejected.
#[inline]
pub fn geo_to_tile(level: u8, geo: GeoPoint) -> Result<TilePoint, ProjectionError> {
    if !(geo.lat > -MERCATOR_MAX_LAT && geo.lat < MERCATOR_MAX_LAT) {
        return Err(ProjectionError::LatitudeOutOfRange(geo.lat));
    }

    let n = 2.0_f64.powi(level as i32);
    let x = (geo.lon + 180.0) / 360.0 * n;

    let lat_rad = geo.lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;

    Ok(TilePoint::new(x, y))
}

/// Convert fractional tile coordinates at `level` back to a geographic point.
#[inline]
pub fn tile_to_geo(level: u8, tile: TilePoint) -> GeoPoint {
    let n = 2.0_f64.powi(level as i32);
    let lon = tile.x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * tile.y / n)).sinh().atan().to_degrees();
    GeoPoint::new(lon, lat)
}
