use std::path::PathBuf;

use thiserror::Error;

/// Errors from the on-disk backing store
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Requested file does not exist
    #[error("Not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Filesystem error while reading or writing
    #[error("I/O error on {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// A `tile.info` record could not be parsed
    #[error("Invalid metadata in {}: {message}", path.display())]
    Metadata { path: PathBuf, message: String },

    /// A `tile.info` record declares a schema version we do not understand
    #[error("Unsupported metadata version {version} in {}", path.display())]
    UnsupportedSchema { path: PathBuf, version: u32 },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound { path }
        } else {
            StoreError::Io {
                path,
                message: err.to_string(),
            }
        }
    }
}

/// Errors converting between geographic and tile coordinates
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    /// Latitude outside the band Web Mercator can represent
    #[error("Latitude {0} is outside the Web Mercator range (-85.0511, 85.0511)")]
    LatitudeOutOfRange(f64),

    /// Linear projection needs pixels-per-degree and the level has none
    #[error("Level {level} has no pixels-per-degree information")]
    MissingPixelsPerDegree { level: u8 },

    /// Linear projection with a zero pixels-per-degree would divide by zero
    #[error("Level {level} has a zero pixels-per-degree value")]
    ZeroPixelsPerDegree { level: u8 },
}

/// Errors fetching a single tile from a server.
///
/// These never reach `get_tile` callers; workers turn them into the error
/// placeholder.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Network or connection error
    #[error("Transport error: {0}")]
    Transport(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// Server answered with something other than the expected image type
    #[error("Unexpected content type: expected {expected}, got {actual}")]
    ContentType { expected: String, actual: String },

    /// Body could not be decoded as an image
    #[error("Decode error: {0}")]
    Decode(String),
}

/// Errors returned from a single `get_tile` call
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// Level is not served by this source
    #[error("Invalid level {level}")]
    InvalidLevel { level: u8 },

    /// Tile coordinates lie outside the current level's grid
    #[error(
        "Tile ({x}, {y}) out of bounds for level {level} (grid is {num_tiles_x}x{num_tiles_y})"
    )]
    OutOfBounds {
        level: u8,
        x: u32,
        y: u32,
        num_tiles_x: u32,
        num_tiles_y: u32,
    },

    /// Local source has no file for this tile
    #[error("Can't find tile for key ({level}, {x}, {y})")]
    NotFound { level: u8, x: u32, y: u32 },

    /// Tile file exists but is not a decodable image
    #[error("Failed to decode tile: {message}")]
    Decode { message: String },

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("At least one tile server is required")]
    NoServers,

    #[error("Invalid server URL '{url}': {message}")]
    InvalidServerUrl { url: String, message: String },

    #[error("URL path '{0}' must contain {{Z}}, {{X}} and {{Y}} placeholders")]
    InvalidUrlPath(String),

    #[error("At least one level is required")]
    NoLevels,

    #[error("{field} must be greater than 0")]
    Zero { field: &'static str },

    #[error("Bad tile extension '{extension}', expected one of png, jpg")]
    UnsupportedExtension { extension: String },

    #[error("Failed to read config file {path}: {message}")]
    File { path: String, message: String },
}

/// Fatal errors constructing a tile source
#[derive(Debug, Clone, Error)]
pub enum TileSourceError {
    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tile directory does not exist
    #[error("The tiles directory {} doesn't exist", .0.display())]
    MissingDirectory(PathBuf),

    /// Tile directory path is a file
    #[error("{} doesn't appear to be a tile cache directory", .0.display())]
    NotADirectory(PathBuf),

    /// Startup probe got an HTTP error status
    #[error("You got a {status} error from: {url}\n{hint}")]
    ServerStatus {
        status: u16,
        url: String,
        hint: String,
    },

    /// Startup probe failed and no proxy was configured
    #[error("Can't reach {url} ({message}); there may be a firewall and no HTTP proxy was given")]
    Unreachable { url: String, message: String },

    /// Startup probe failed through the configured proxy too
    #[error("Using HTTP proxy {proxy}, but still can't reach {url}: {message}")]
    ProxyFailed {
        proxy: String,
        url: String,
        message: String,
    },

    /// HTTP client could not be built
    #[error("Failed to create HTTP client: {0}")]
    Client(String),

    /// Backing store or metadata failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
