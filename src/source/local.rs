//! Pre-rendered local tilesets.
//!
//! A tileset directory looks like:
//!
//! ```text
//! <tiles_dir>/tile.info            extent and tile size
//! <tiles_dir>/<level>/tile.info    grid and pixels-per-degree
//! <tiles_dir>/<level>/<x>/<y>.png
//! ```
//!
//! All metadata is read once when the source is opened. Tiles are served
//! through the memory cache; a tile missing from disk is an error since
//! there is nothing to fetch it from.

use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{ConfigError, StoreError, TileError, TileSourceError};
use crate::projection::Projection;
use crate::store::{read_level_info, read_tileset_info, DiskStore, TilesetInfo};
use crate::tile::{LevelInfo, MemoryCache, TileImage, TileKey};

use super::config::LocalSourceConfig;
use super::level::LevelState;
use super::{check_bounds, TileSource};

/// Result of comparing a level's declared grid with the files on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridReport {
    pub level: u8,
    pub num_tiles_x: u32,
    pub num_tiles_y: u32,
    /// Tile files found under the level directory
    pub found: usize,
    /// Grid positions with no tile file
    pub missing: Vec<(u32, u32)>,
    /// Tile files outside the declared grid
    pub outside: Vec<(u32, u32)>,
}

impl GridReport {
    /// Every grid position has a file and no file lies outside the grid.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.outside.is_empty()
    }
}

/// Tile source over a pre-rendered tileset directory.
pub struct LocalTileSource {
    name: String,
    tileset: TilesetInfo,
    infos: BTreeMap<u8, LevelInfo>,
    levels: LevelState,
    cache: MemoryCache,
}

impl LocalTileSource {
    /// Open a tileset.
    ///
    /// Fails if the directory is missing, the top-level `tile.info` is
    /// unreadable, or the lowest level has no metadata. Other levels without
    /// metadata are kept in the level list but cannot be selected.
    pub async fn open(config: LocalSourceConfig) -> Result<Self, TileSourceError> {
        config.validate()?;
        let format = config.format()?;
        let root = config.tiles_dir.clone();

        match tokio::fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(TileSourceError::NotADirectory(root)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TileSourceError::MissingDirectory(root))
            }
            Err(e) => return Err(StoreError::io(&root, e).into()),
        }

        let tileset = read_tileset_info(&root).await?;
        let store = Arc::new(DiskStore::new(&root, format));

        let mut levels = match &config.levels {
            Some(levels) => levels.clone(),
            None => store.discover_levels().await?,
        };
        levels.sort_unstable();
        levels.dedup();
        let Some(&min_level) = levels.first() else {
            return Err(ConfigError::NoLevels.into());
        };

        let min_info = read_level_info(&root, min_level).await?;
        let mut infos = BTreeMap::from([(min_level, min_info)]);
        for &level in &levels[1..] {
            match read_level_info(&root, level).await {
                Ok(info) => {
                    infos.insert(level, info);
                }
                Err(e) => warn!(level, error = %e, "level has no usable metadata"),
            }
        }

        let name = config.display_name();
        info!(
            name = %name,
            root = %root.display(),
            levels = ?levels,
            tile_width = tileset.tile_width,
            tile_height = tileset.tile_height,
            "opened local tileset"
        );

        Ok(Self {
            name,
            tileset,
            infos,
            levels: LevelState::new(levels, min_level, min_info),
            cache: MemoryCache::with_capacity(store, config.max_lru),
        })
    }

    /// Tileset root directory.
    pub fn tiles_dir(&self) -> PathBuf {
        self.cache.store().root().to_path_buf()
    }

    pub fn tileset_info(&self) -> &TilesetInfo {
        &self.tileset
    }

    /// Number of decoded tiles held in memory.
    pub async fn cached_tiles(&self) -> usize {
        self.cache.len().await
    }

    /// Compare a level's declared grid with the tile files on disk.
    pub async fn verify_level(&self, level: u8) -> Result<GridReport, TileError> {
        let info = self
            .infos
            .get(&level)
            .copied()
            .ok_or(TileError::InvalidLevel { level })?;

        let found = self.cache.store().scan_level(level).await?;
        let present: HashSet<(u32, u32)> = found.iter().copied().collect();

        let mut missing = Vec::new();
        for x in 0..info.num_tiles_x {
            for y in 0..info.num_tiles_y {
                if !present.contains(&(x, y)) {
                    missing.push((x, y));
                }
            }
        }
        let outside = found
            .iter()
            .copied()
            .filter(|&(x, y)| !info.contains(x, y))
            .collect();

        Ok(GridReport {
            level,
            num_tiles_x: info.num_tiles_x,
            num_tiles_y: info.num_tiles_y,
            found: found.len(),
            missing,
            outside,
        })
    }
}

#[async_trait]
impl TileSource for LocalTileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn levels(&self) -> &[u8] {
        self.levels.levels()
    }

    fn tile_width(&self) -> u32 {
        self.tileset.tile_width
    }

    fn tile_height(&self) -> u32 {
        self.tileset.tile_height
    }

    fn projection(&self) -> Projection {
        Projection::Linear {
            extent: self.tileset.extent,
        }
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
        let Some(info) = self.infos.get(&level).copied() else {
            return false;
        };
        self.levels.set(level, info).await;
        info!(name = %self.name, level, "level changed");
        true
    }

    async fn get_tile(&self, x: u32, y: u32) -> Result<TileImage, TileError> {
        let (level, info) = self.levels.current().await;
        check_bounds(level, &info, x, y)?;

        let key = TileKey::new(level, x, y);
        self.cache
            .get(&key)
            .await?
            .ok_or(TileError::NotFound { level, x, y })
    }

    async fn get_info(&self, level: u8) -> Option<LevelInfo> {
        if !self.levels.supports(level) {
            return None;
        }
        self.infos.get(&level).copied()
    }

    async fn tile_on_disk(&self, level: u8, x: u32, y: u32) -> bool {
        self.cache.store().exists(&TileKey::new(level, x, y)).await
    }
}
