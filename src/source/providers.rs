//! Preset configurations for well-known tile servers.

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;

use super::config::{NetworkSourceConfig, DEFAULT_REQUESTS_PER_SERVER, DEFAULT_SOURCE_LRU};

/// A known public tile provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// OpenStreetMap standard tiles
    #[value(name = "osm")]
    OpenStreetMap,
    /// Modest Maps example tiles hosted by Mapbox
    #[value(name = "modest-maps")]
    ModestMaps,
    /// Stamen/Thunderforest transport tiles
    #[value(name = "stamen-transport")]
    StamenTransport,
}

impl Provider {
    pub const ALL: [Provider; 3] = [
        Provider::OpenStreetMap,
        Provider::ModestMaps,
        Provider::StamenTransport,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenStreetMap => "OpenStreetMap Tiles",
            Provider::ModestMaps => "ModestMaps Tiles",
            Provider::StamenTransport => "Stamen Transport Tiles",
        }
    }

    fn servers(&self) -> Vec<String> {
        let hosts: &[&str] = match self {
            Provider::OpenStreetMap => &[
                "http://a.tile.openstreetmap.org",
                "http://b.tile.openstreetmap.org",
                "http://c.tile.openstreetmap.org",
            ],
            Provider::ModestMaps => &["http://c.tiles.mapbox.com"],
            Provider::StamenTransport => &[
                "http://a.tile2.opencyclemap.org",
                "http://b.tile2.opencyclemap.org",
                "http://c.tile2.opencyclemap.org",
            ],
        };
        hosts.iter().map(|h| h.to_string()).collect()
    }

    fn url_path(&self) -> &'static str {
        match self {
            Provider::OpenStreetMap => "/{Z}/{X}/{Y}.png",
            Provider::ModestMaps => "/v3/examples.map-szwdot65/{Z}/{X}/{Y}.png",
            Provider::StamenTransport => "/transport/{Z}/{X}/{Y}.png",
        }
    }

    fn max_level(&self) -> u8 {
        match self {
            Provider::OpenStreetMap | Provider::ModestMaps => 16,
            Provider::StamenTransport => 15,
        }
    }

    /// Default on-disk cache directory, relative to the working directory.
    pub fn default_tiles_dir(&self) -> PathBuf {
        PathBuf::from(match self {
            Provider::OpenStreetMap => "open_street_map_tiles",
            Provider::ModestMaps => "modest_maps_tiles",
            Provider::StamenTransport => "stamen_transport_tiles",
        })
    }

    /// Full source configuration for this provider.
    pub fn config(&self) -> NetworkSourceConfig {
        NetworkSourceConfig::new(self.name(), self.servers(), self.url_path())
            .with_levels(0..=self.max_level())
            .with_requests_per_server(DEFAULT_REQUESTS_PER_SERVER)
            .with_max_lru(DEFAULT_SOURCE_LRU)
            .with_tile_size(256, 256)
            .with_tiles_dir(self.default_tiles_dir())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
