use tokio::sync::RwLock;

use crate::tile::LevelInfo;

/// The levels a source serves and the one currently in use.
pub(crate) struct LevelState {
    /// Supported levels, ascending, never empty
    levels: Vec<u8>,
    current: RwLock<(u8, LevelInfo)>,
}

impl LevelState {
    /// `levels` must be sorted, de-duplicated and non-empty, and `info` must
    /// describe `level`.
    pub(crate) fn new(levels: Vec<u8>, level: u8, info: LevelInfo) -> Self {
        Self {
            levels,
            current: RwLock::new((level, info)),
        }
    }

    pub(crate) fn levels(&self) -> &[u8] {
        &self.levels
    }

    pub(crate) fn supports(&self, level: u8) -> bool {
        self.levels.binary_search(&level).is_ok()
    }

    pub(crate) async fn current(&self) -> (u8, LevelInfo) {
        *self.current.read().await
    }

    pub(crate) async fn set(&self, level: u8, info: LevelInfo) {
        *self.current.write().await = (level, info);
    }
}
