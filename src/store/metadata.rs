//! `tile.info` records for local tilesets.
//!
//! Each tileset has a top-level record with the geographic extent and tile
//! size, and one record per level with the grid dimensions and
//! pixels-per-degree. Both are small versioned JSON documents:
//!
//! ```text
//! <tiles_dir>/tile.info          {"version":1,"extent":{...},"tile_width":256,"tile_height":256}
//! <tiles_dir>/<level>/tile.info  {"version":1,"num_tiles_x":2,"num_tiles_y":1,"ppd_x":1.42,"ppd_y":1.92}
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::StoreError;
use crate::tile::{Extent, LevelInfo};

/// File name of metadata records.
pub const TILE_INFO_FILENAME: &str = "tile.info";

/// Schema version written and accepted.
pub const TILE_INFO_VERSION: u32 = 1;

/// Top-level record describing a whole tileset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TilesetInfo {
    pub version: u32,
    pub extent: Extent,
    pub tile_width: u32,
    pub tile_height: u32,
}

impl TilesetInfo {
    pub fn new(extent: Extent, tile_width: u32, tile_height: u32) -> Self {
        Self {
            version: TILE_INFO_VERSION,
            extent,
            tile_width,
            tile_height,
        }
    }
}

/// Per-level record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelRecord {
    pub version: u32,
    pub num_tiles_x: u32,
    pub num_tiles_y: u32,
    pub ppd_x: f64,
    pub ppd_y: f64,
}

impl LevelRecord {
    pub fn new(num_tiles_x: u32, num_tiles_y: u32, ppd_x: f64, ppd_y: f64) -> Self {
        Self {
            version: TILE_INFO_VERSION,
            num_tiles_x,
            num_tiles_y,
            ppd_x,
            ppd_y,
        }
    }
}

impl From<LevelRecord> for LevelInfo {
    fn from(record: LevelRecord) -> Self {
        LevelInfo {
            num_tiles_x: record.num_tiles_x,
            num_tiles_y: record.num_tiles_y,
            ppd_x: Some(record.ppd_x),
            ppd_y: Some(record.ppd_y),
        }
    }
}

/// Path of the top-level record.
pub fn tileset_info_path(root: &Path) -> PathBuf {
    root.join(TILE_INFO_FILENAME)
}

/// Path of a level's record.
pub fn level_info_path(root: &Path, level: u8) -> PathBuf {
    root.join(level.to_string()).join(TILE_INFO_FILENAME)
}

/// Read the top-level record of a tileset.
pub async fn read_tileset_info(root: &Path) -> Result<TilesetInfo, StoreError> {
    let path = tileset_info_path(root);
    let info: TilesetInfo = read_record(&path).await?;
    check_version(&path, info.version)?;
    if info.tile_width == 0 || info.tile_height == 0 {
        return Err(StoreError::Metadata {
            path,
            message: "tile size must be non-zero".to_string(),
        });
    }
    Ok(info)
}

/// Read a level's record.
pub async fn read_level_info(root: &Path, level: u8) -> Result<LevelInfo, StoreError> {
    let path = level_info_path(root, level);
    let record: LevelRecord = read_record(&path).await?;
    check_version(&path, record.version)?;
    if record.num_tiles_x == 0 || record.num_tiles_y == 0 {
        return Err(StoreError::Metadata {
            path,
            message: format!(
                "grid must be at least 1x1, got {}x{}",
                record.num_tiles_x, record.num_tiles_y
            ),
        });
    }
    Ok(record.into())
}

/// Write the top-level record of a tileset.
pub async fn write_tileset_info(root: &Path, info: &TilesetInfo) -> Result<(), StoreError> {
    write_record(&tileset_info_path(root), info).await
}

/// Write a level's record.
pub async fn write_level_info(
    root: &Path,
    level: u8,
    record: &LevelRecord,
) -> Result<(), StoreError> {
    write_record(&level_info_path(root, level), record).await
}

async fn read_record<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StoreError> {
    let data = fs::read(path).await.map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&data).map_err(|e| StoreError::Metadata {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

async fn write_record<T: Serialize>(path: &Path, record: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e))?;
    }
    let data = serde_json::to_vec_pretty(record).map_err(|e| StoreError::Metadata {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    fs::write(path, data)
        .await
        .map_err(|e| StoreError::io(path, e))
}

fn check_version(path: &Path, version: u32) -> Result<(), StoreError> {
    if version != TILE_INFO_VERSION {
        return Err(StoreError::UnsupportedSchema {
            path: path.to_path_buf(),
            version,
        });
    }
    Ok(())
}
