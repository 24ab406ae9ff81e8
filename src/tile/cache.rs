//! In-memory tile cache backed by the on-disk store.
//!
//! This module provides an LRU cache of decoded tiles. A miss in memory falls
//! through to the [`DiskStore`]; a tile found there is decoded, inserted into
//! memory and returned, so callers never deal with the backing store on the
//! read path.
//!
//! # Eviction
//!
//! The cache is bounded by entry count. `get` and `put` both refresh recency;
//! inserting past the bound drops the least-recently-used entry. Eviction
//! never touches the on-disk copy.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{StoreError, TileError};
use crate::store::DiskStore;

use super::key::TileKey;
use super::raster::TileImage;

/// Default maximum number of in-memory tiles.
pub const DEFAULT_MAX_LRU: usize = 1000;

// =============================================================================
// Memory Cache
// =============================================================================

/// LRU cache of decoded tiles with cache-aside to the backing store.
///
/// # Thread Safety
///
/// The cache is shared between fetch workers delivering tiles and callers of
/// `get_tile`; all state sits behind one lock so LRU order stays consistent.
pub struct MemoryCache {
    /// The underlying LRU cache
    cache: RwLock<LruCache<TileKey, TileImage>>,

    /// Backing store consulted on a memory miss
    store: Arc<DiskStore>,

    /// Maximum number of entries
    max_entries: NonZeroUsize,
}

impl MemoryCache {
    /// Create a cache with the default bound.
    pub fn new(store: Arc<DiskStore>) -> Self {
        Self::with_capacity(store, DEFAULT_MAX_LRU)
    }

    /// Create a cache holding at most `max_entries` tiles.
    ///
    /// A zero bound is treated as one.
    pub fn with_capacity(store: Arc<DiskStore>, max_entries: usize) -> Self {
        let max_entries = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(max_entries)),
            store,
            max_entries,
        }
    }

    /// Get a tile, falling back to the backing store on a memory miss.
    ///
    /// Returns `Ok(None)` when neither tier has the tile. A file that exists
    /// but cannot be decoded is reported as [`TileError::Decode`].
    pub async fn get(&self, key: &TileKey) -> Result<Option<TileImage>, TileError> {
        if let Some(tile) = self.get_cached(key).await {
            return Ok(Some(tile));
        }

        let data = match self.store.read(key).await {
            Ok(data) => data,
            Err(StoreError::NotFound { .. }) => {
                debug!(%key, "tile miss");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let tile = TileImage::decode(self.store.format(), &data).map_err(|e| {
            warn!(%key, error = %e, "corrupt tile in backing store");
            TileError::Decode {
                message: e.to_string(),
            }
        })?;

        debug!(%key, "tile loaded from backing store");
        self.put(*key, tile.clone()).await;
        Ok(Some(tile))
    }

    /// Get a tile from memory only. Marks the entry as recently used.
    pub async fn get_cached(&self, key: &TileKey) -> Option<TileImage> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check if a tile is in memory without updating LRU order.
    pub async fn contains(&self, key: &TileKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a tile in memory, replacing any existing entry.
    ///
    /// Returns the key evicted to make room, if any.
    pub async fn put(&self, key: TileKey, tile: TileImage) -> Option<TileKey> {
        let mut cache = self.cache.write().await;
        match cache.push(key, tile) {
            Some((evicted, _)) if evicted != key => {
                debug!(key = %evicted, "evicted tile from memory cache");
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Remove a tile from memory. The on-disk copy is untouched.
    pub async fn remove(&self, key: &TileKey) -> Option<TileImage> {
        let mut cache = self.cache.write().await;
        cache.pop(key)
    }

    /// Clear all entries from memory.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Get the current number of in-memory tiles.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Maximum number of in-memory tiles.
    pub fn capacity(&self) -> usize {
        self.max_entries.get()
    }

    /// The backing store behind this cache.
    pub fn store(&self) -> &Arc<DiskStore> {
        &self.store
    }
}

// =============================================================================
// Tests
// =============================================================================
