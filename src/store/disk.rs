use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use bytes::Bytes;
use tokio::fs;

use crate::error::StoreError;
use crate::tile::{TileFormat, TileKey};

/// Counter making temporary file names unique within the process.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// On-disk tile store laid out as `<root>/<level>/<x>/<y>.<ext>`.
///
/// Writes go to a temporary sibling file first and are renamed into place, so
/// concurrent readers see either the old tile or the new one, never a
/// partially written file. Directory creation tolerates other workers
/// creating the same directories at the same time.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
    format: TileFormat,
}

impl DiskStore {
    /// Create a store rooted at `root` holding tiles of `format`.
    ///
    /// Nothing is created on disk until the first write.
    pub fn new(root: impl Into<PathBuf>, format: TileFormat) -> Self {
        Self {
            root: root.into(),
            format,
        }
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File format of stored tiles.
    pub fn format(&self) -> TileFormat {
        self.format
    }

    /// Directory holding one level's tiles and its `tile.info`.
    pub fn level_dir(&self, level: u8) -> PathBuf {
        self.root.join(level.to_string())
    }

    /// Path of the file for a tile.
    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        self.level_dir(key.level)
            .join(key.x.to_string())
            .join(format!("{}.{}", key.y, self.format.extension()))
    }

    /// Read the raw bytes of a tile.
    pub async fn read(&self, key: &TileKey) -> Result<Bytes, StoreError> {
        let path = self.tile_path(key);
        fs::read(&path)
            .await
            .map(Bytes::from)
            .map_err(|e| StoreError::io(path, e))
    }

    /// Write the raw bytes of a tile, replacing any existing file.
    pub async fn write(&self, key: &TileKey, data: &[u8]) -> Result<(), StoreError> {
        let path = self.tile_path(key);
        if let Some(parent) = path.parent() {
            // create_dir_all succeeds if another worker got there first
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(parent, e))?;
        }

        let tmp = path.with_extension(format!(
            "{}.tmp{}-{}",
            self.format.extension(),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&tmp, data)
            .await
            .map_err(|e| StoreError::io(&tmp, e))?;

        if let Err(e) = fs::rename(&tmp, &path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(StoreError::io(path, e));
        }
        Ok(())
    }

    /// Whether a tile file exists.
    pub async fn exists(&self, key: &TileKey) -> bool {
        fs::metadata(self.tile_path(key))
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Last modification time of a tile file.
    pub async fn modified_time(&self, key: &TileKey) -> Result<SystemTime, StoreError> {
        let path = self.tile_path(key);
        let metadata = fs::metadata(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?;
        metadata.modified().map_err(|e| StoreError::io(path, e))
    }

    /// Create the directory for each level.
    pub async fn prepare_levels(&self, levels: &[u8]) -> Result<(), StoreError> {
        for &level in levels {
            let dir = self.level_dir(level);
            fs::create_dir_all(&dir)
                .await
                .map_err(|e| StoreError::io(dir, e))?;
        }
        Ok(())
    }

    /// List the `(x, y)` coordinates of every tile file present for a level.
    ///
    /// Entries that do not follow the `<x>/<y>.<ext>` naming are ignored.
    pub async fn scan_level(&self, level: u8) -> Result<Vec<(u32, u32)>, StoreError> {
        let level_dir = self.level_dir(level);
        let mut found = Vec::new();

        let mut columns = fs::read_dir(&level_dir)
            .await
            .map_err(|e| StoreError::io(&level_dir, e))?;
        while let Some(column) = columns
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&level_dir, e))?
        {
            let Some(x) = parse_index(&column.file_name().to_string_lossy()) else {
                continue;
            };
            let column_path = column.path();
            if !column_path.is_dir() {
                continue;
            }

            let mut rows = fs::read_dir(&column_path)
                .await
                .map_err(|e| StoreError::io(&column_path, e))?;
            while let Some(row) = rows
                .next_entry()
                .await
                .map_err(|e| StoreError::io(&column_path, e))?
            {
                let name = row.file_name().to_string_lossy().into_owned();
                let Some(stem) = name.strip_suffix(&format!(".{}", self.format.extension())) else {
                    continue;
                };
                if let Some(y) = parse_index(stem) {
                    found.push((x, y));
                }
            }
        }

        found.sort_unstable();
        Ok(found)
    }

    /// List numeric level directories under the root.
    pub async fn discover_levels(&self) -> Result<Vec<u8>, StoreError> {
        let mut levels = Vec::new();
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| StoreError::io(&self.root, e))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.root, e))?
        {
            if !entry.path().is_dir() {
                continue;
            }
            if let Ok(level) = entry.file_name().to_string_lossy().parse::<u8>() {
                levels.push(level);
            }
        }
        levels.sort_unstable();
        Ok(levels)
    }
}

fn parse_index(name: &str) -> Option<u32> {
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.parse().ok()
}
