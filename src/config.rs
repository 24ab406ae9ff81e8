//! Command-line configuration for the `slipmap-tiles` tool.
//!
//! The tool exercises tile sources outside a map view:
//!
//! - `check`   - build a network source (runs the connectivity probe)
//! - `fetch`   - fetch one tile through the cache and write it to a file
//! - `inspect` - open a local tileset and verify its levels against disk
//! - `project` - convert a geographic point to tile coordinates and back
//!
//! # Environment Variables
//!
//! Source options can be set via environment variables with the `SLIPMAP_`
//! prefix:
//!
//! - `SLIPMAP_PROVIDER` - Preset provider (default: osm)
//! - `SLIPMAP_SOURCE_CONFIG` - JSON network source config, overrides the preset
//! - `SLIPMAP_TILES_DIR` - On-disk cache directory
//! - `SLIPMAP_HTTP_PROXY` - Proxy tried when the servers can't be reached
//! - `SLIPMAP_USER_AGENT` - User-Agent header for tile requests
//! - `SLIPMAP_REFETCH_DAYS` - Refetch disk tiles older than this (0 disables)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::error::ConfigError;
use crate::source::{LocalSourceConfig, NetworkSourceConfig, Provider, DEFAULT_SOURCE_LRU};

/// Default seconds `fetch` waits for a tile to be delivered.
pub const DEFAULT_FETCH_WAIT_SECS: u64 = 30;

// =============================================================================
// CLI Arguments
// =============================================================================

/// slipmap-tiles - Slippy-map tile cache and tile sources.
#[derive(Parser, Debug, Clone)]
#[command(name = "slipmap-tiles")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    pub fn into_command(self) -> Command {
        self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build a network tile source and report whether its servers respond.
    Check(CheckConfig),

    /// Fetch one tile through the memory and disk cache.
    Fetch(FetchConfig),

    /// Open a local tileset and verify its levels.
    Inspect(InspectConfig),

    /// Convert a geographic point to tile coordinates and back.
    Project(ProjectConfig),
}

// =============================================================================
// Network source selection
// =============================================================================

/// Options selecting and adjusting a network tile source.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Preset tile provider.
    #[arg(long, value_enum, default_value = "osm", env = "SLIPMAP_PROVIDER")]
    pub provider: Provider,

    /// JSON file with a full network source config; replaces the preset.
    #[arg(long = "source-config", env = "SLIPMAP_SOURCE_CONFIG")]
    pub source_config: Option<PathBuf>,

    /// On-disk cache directory.
    ///
    /// Defaults to the provider's own directory.
    #[arg(long, env = "SLIPMAP_TILES_DIR")]
    pub tiles_dir: Option<PathBuf>,

    /// HTTP proxy tried when the servers can't be reached directly.
    #[arg(long, env = "SLIPMAP_HTTP_PROXY")]
    pub http_proxy: Option<String>,

    /// User-Agent header sent with every request.
    #[arg(long, env = "SLIPMAP_USER_AGENT")]
    pub user_agent: Option<String>,

    /// Refetch disk tiles older than this many days (0 disables).
    #[arg(long, env = "SLIPMAP_REFETCH_DAYS")]
    pub refetch_days: Option<u32>,
}

impl SourceArgs {
    /// Resolve the network source configuration.
    ///
    /// Loads the config file if given, otherwise the preset, then applies
    /// the command-line overrides and validates the result.
    pub fn resolve(&self) -> Result<NetworkSourceConfig, ConfigError> {
        let mut config = match &self.source_config {
            Some(path) => NetworkSourceConfig::load(path)?,
            None => self.provider.config(),
        };

        if let Some(dir) = &self.tiles_dir {
            config.tiles_dir = dir.clone();
        }
        if let Some(proxy) = &self.http_proxy {
            config.http_proxy = Some(proxy.clone());
        }
        if let Some(user_agent) = &self.user_agent {
            config.user_agent = Some(user_agent.clone());
        }
        if let Some(days) = self.refetch_days {
            config.refetch_days = days;
        }

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Commands
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CheckConfig {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FetchConfig {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Zoom level.
    #[arg(long)]
    pub level: u8,

    /// Tile column.
    #[arg(short)]
    pub x: u32,

    /// Tile row.
    #[arg(short)]
    pub y: u32,

    /// Where to write the tile as PNG.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Seconds to wait for the tile to arrive.
    #[arg(long, default_value_t = DEFAULT_FETCH_WAIT_SECS)]
    pub wait: u64,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.wait == 0 {
            return Err(ConfigError::Zero { field: "wait" });
        }
        Ok(())
    }
}

#[derive(Args, Debug, Clone)]
pub struct InspectConfig {
    /// Tileset directory containing `tile.info`.
    pub tiles_dir: PathBuf,

    /// Levels to open (comma-separated); discovered when omitted.
    #[arg(long, value_delimiter = ',')]
    pub levels: Option<Vec<u8>>,

    /// Tile file extension.
    #[arg(long, default_value = "png")]
    pub extension: String,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl InspectConfig {
    pub fn source_config(&self) -> LocalSourceConfig {
        let mut config = LocalSourceConfig::new(&self.tiles_dir)
            .with_max_lru(DEFAULT_SOURCE_LRU)
            .with_tile_extension(&self.extension);
        if let Some(levels) = &self.levels {
            config = config.with_levels(levels.iter().copied());
        }
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct ProjectConfig {
    /// Longitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Latitude in degrees.
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Zoom level.
    #[arg(long, default_value_t = 0)]
    pub level: u8,

    /// Use the linear projection of this local tileset instead of Web Mercator.
    #[arg(long)]
    pub local: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

// =============================================================================
// Tests
// =============================================================================
