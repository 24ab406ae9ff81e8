//! Backing store for tiles and tileset metadata.

mod disk;
pub mod metadata;

pub use disk::DiskStore;
pub use metadata::{
    read_level_info, read_tileset_info, write_level_info, write_tileset_info, LevelRecord,
    TilesetInfo, TILE_INFO_FILENAME, TILE_INFO_VERSION,
};
