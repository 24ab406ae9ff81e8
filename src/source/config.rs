//! Tile source configuration.
//!
//! Both configs deserialize from JSON with serde so sources can be described
//! in a file; unset optional fields take the defaults below. Call
//! `validate()` before building a source (the source constructors do).
//!
//! # Example
//!
//! ```ignore
//! use slipmap_tiles::source::NetworkSourceConfig;
//!
//! let config = NetworkSourceConfig::new(
//!     "My tiles",
//!     vec!["https://tiles.example.com".to_string()],
//!     "/{Z}/{X}/{Y}.png",
//! )
//! .with_levels(0..=12)
//! .with_tiles_dir("/var/cache/my_tiles");
//! config.validate()?;
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::fetch::HttpSettings;
use crate::tile::{TileFormat, DEFAULT_TILE_SIZE};

// =============================================================================
// Default Values
// =============================================================================

/// Default number of concurrent requests per server.
pub const DEFAULT_REQUESTS_PER_SERVER: usize = 2;

/// Default in-memory cache bound for configured sources.
pub const DEFAULT_SOURCE_LRU: usize = 10_000;

/// Default age in days after which a disk tile is refetched.
pub const DEFAULT_REFETCH_DAYS: u32 = 60;

/// Default request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

fn default_tile_size() -> u32 {
    DEFAULT_TILE_SIZE
}

fn default_requests_per_server() -> usize {
    DEFAULT_REQUESTS_PER_SERVER
}

fn default_lru() -> usize {
    DEFAULT_SOURCE_LRU
}

fn default_refetch_days() -> u32 {
    DEFAULT_REFETCH_DAYS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_extension() -> String {
    TileFormat::Png.extension().to_string()
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ConfigError> {
    let file_error = |message: String| ConfigError::File {
        path: path.display().to_string(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|e| file_error(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| file_error(e.to_string()))
}

// =============================================================================
// Network source
// =============================================================================

/// Configuration of an internet tile source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSourceConfig {
    /// Display name
    pub name: String,

    /// Server base URLs; each gets its own workers
    pub servers: Vec<String>,

    /// Path template with `{Z}`, `{X}` and `{Y}` placeholders
    pub url_path: String,

    /// Supported zoom levels
    pub levels: Vec<u8>,

    #[serde(default = "default_tile_size")]
    pub tile_width: u32,

    #[serde(default = "default_tile_size")]
    pub tile_height: u32,

    /// Concurrent requests per server
    #[serde(default = "default_requests_per_server")]
    pub max_requests_per_server: usize,

    /// In-memory cache bound
    #[serde(default = "default_lru")]
    pub max_lru: usize,

    /// Root of the on-disk cache
    pub tiles_dir: PathBuf,

    /// `png` or `jpg`; derived from `url_path` when absent
    #[serde(default)]
    pub tile_extension: Option<String>,

    /// Proxy tried when the direct startup probe cannot connect
    #[serde(default)]
    pub http_proxy: Option<String>,

    #[serde(default)]
    pub user_agent: Option<String>,

    /// Refetch disk tiles older than this many days; 0 disables
    #[serde(default = "default_refetch_days")]
    pub refetch_days: u32,

    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
}

impl NetworkSourceConfig {
    /// Create a config with default settings for everything but the
    /// servers. Levels default to `0..=16` and the cache directory to
    /// `./tiles`.
    pub fn new(name: impl Into<String>, servers: Vec<String>, url_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            servers,
            url_path: url_path.into(),
            levels: (0..=16).collect(),
            tile_width: DEFAULT_TILE_SIZE,
            tile_height: DEFAULT_TILE_SIZE,
            max_requests_per_server: DEFAULT_REQUESTS_PER_SERVER,
            max_lru: DEFAULT_SOURCE_LRU,
            tiles_dir: PathBuf::from("tiles"),
            tile_extension: None,
            http_proxy: None,
            user_agent: None,
            refetch_days: DEFAULT_REFETCH_DAYS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Load a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        read_json(path.as_ref())
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = u8>) -> Self {
        self.levels = levels.into_iter().collect();
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_requests_per_server(mut self, n: usize) -> Self {
        self.max_requests_per_server = n;
        self
    }

    pub fn with_max_lru(mut self, n: usize) -> Self {
        self.max_lru = n;
        self
    }

    pub fn with_tiles_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.tiles_dir = dir.into();
        self
    }

    pub fn with_tile_extension(mut self, extension: impl Into<String>) -> Self {
        self.tile_extension = Some(extension.into());
        self
    }

    pub fn with_http_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.http_proxy = Some(proxy.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_refetch_days(mut self, days: u32) -> Self {
        self.refetch_days = days;
        self
    }

    pub fn with_timeouts(mut self, request_secs: u64, connect_secs: u64) -> Self {
        self.request_timeout = request_secs;
        self.connect_timeout = connect_secs;
        self
    }

    /// Tile file format, from `tile_extension` or else the `url_path` suffix.
    pub fn format(&self) -> Result<TileFormat, ConfigError> {
        match &self.tile_extension {
            Some(ext) => TileFormat::from_extension(ext),
            None => TileFormat::from_url_path(&self.url_path),
        }
    }

    /// HTTP settings for this source's fetchers.
    pub fn http_settings(&self) -> HttpSettings {
        HttpSettings {
            user_agent: self.user_agent.clone(),
            request_timeout: Duration::from_secs(self.request_timeout),
            connect_timeout: Duration::from_secs(self.connect_timeout),
        }
    }

    /// Levels sorted ascending without duplicates.
    pub fn sorted_levels(&self) -> Vec<u8> {
        let mut levels = self.levels.clone();
        levels.sort_unstable();
        levels.dedup();
        levels
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        for server in &self.servers {
            url::Url::parse(server).map_err(|e| ConfigError::InvalidServerUrl {
                url: server.clone(),
                message: e.to_string(),
            })?;
        }

        if !["{Z}", "{X}", "{Y}"]
            .iter()
            .all(|p| self.url_path.contains(p))
        {
            return Err(ConfigError::InvalidUrlPath(self.url_path.clone()));
        }

        if self.levels.is_empty() {
            return Err(ConfigError::NoLevels);
        }

        if self.max_requests_per_server == 0 {
            return Err(ConfigError::Zero {
                field: "max_requests_per_server",
            });
        }
        if self.max_lru == 0 {
            return Err(ConfigError::Zero { field: "max_lru" });
        }
        if self.tile_width == 0 {
            return Err(ConfigError::Zero { field: "tile_width" });
        }
        if self.tile_height == 0 {
            return Err(ConfigError::Zero {
                field: "tile_height",
            });
        }
        if self.request_timeout == 0 {
            return Err(ConfigError::Zero {
                field: "request_timeout",
            });
        }
        if self.connect_timeout == 0 {
            return Err(ConfigError::Zero {
                field: "connect_timeout",
            });
        }

        self.format()?;
        Ok(())
    }
}

// =============================================================================
// Local source
// =============================================================================

/// Configuration of a pre-rendered local tileset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSourceConfig {
    /// Display name; defaults to the directory name
    #[serde(default)]
    pub name: Option<String>,

    /// Tileset root containing `tile.info` and one directory per level
    pub tiles_dir: PathBuf,

    /// Levels to serve; `None` discovers numeric level directories
    #[serde(default)]
    pub levels: Option<Vec<u8>>,

    #[serde(default = "default_lru")]
    pub max_lru: usize,

    #[serde(default = "default_extension")]
    pub tile_extension: String,
}

impl LocalSourceConfig {
    pub fn new(tiles_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: None,
            tiles_dir: tiles_dir.into(),
            levels: None,
            max_lru: DEFAULT_SOURCE_LRU,
            tile_extension: default_extension(),
        }
    }

    /// Load a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        read_json(path.as_ref())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_levels(mut self, levels: impl IntoIterator<Item = u8>) -> Self {
        self.levels = Some(levels.into_iter().collect());
        self
    }

    pub fn with_max_lru(mut self, n: usize) -> Self {
        self.max_lru = n;
        self
    }

    pub fn with_tile_extension(mut self, extension: impl Into<String>) -> Self {
        self.tile_extension = extension.into();
        self
    }

    pub fn format(&self) -> Result<TileFormat, ConfigError> {
        TileFormat::from_extension(&self.tile_extension)
    }

    /// Display name, falling back to the directory name.
    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_else(|| {
            self.tiles_dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.tiles_dir.display().to_string())
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(levels) = &self.levels {
            if levels.is_empty() {
                return Err(ConfigError::NoLevels);
            }
        }
        if self.max_lru == 0 {
            return Err(ConfigError::Zero { field: "max_lru" });
        }
        self.format()?;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
