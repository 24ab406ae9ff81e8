//! slipmap-tiles - command-line front end for the tile sources.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use slipmap_tiles::{
    config::{CheckConfig, Cli, Command, FetchConfig, InspectConfig, ProjectConfig},
    encode_png, GeoPoint, LocalSourceConfig, LocalTileSource, NetworkTileSource, Projection,
    TileKey, TileSource,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Check(config) => run_check(config).await,
        Command::Fetch(config) => run_fetch(config).await,
        Command::Inspect(config) => run_inspect(config).await,
        Command::Project(config) => run_project(config).await,
    }
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("slipmap-tiles Source Check");
    println!("══════════════════════════");
    println!();

    let source_config = match config.source.resolve() {
        Ok(c) => {
            println!("✓ Source: {}", c.name);
            c
        }
        Err(e) => {
            println!("✗ Source: {}", e);
            return ExitCode::FAILURE;
        }
    };

    for server in &source_config.servers {
        println!("  server   {}", server);
    }
    println!("  path     {}", source_config.url_path);
    println!("  cache    {}", source_config.tiles_dir.display());
    if let Some(ref proxy) = source_config.http_proxy {
        println!("  proxy    {}", proxy);
    }
    println!();

    print!("Probing tile (0, 0, 0)... ");
    match NetworkTileSource::connect(source_config).await {
        Ok(source) => {
            println!("✓ success");
            println!();
            println!(
                "Levels {}-{}, {} worker(s), refetch after {} day(s)",
                source.min_level(),
                source.max_level(),
                source.worker_count(),
                source.age_threshold_days()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Fetch Command
// =============================================================================

async fn run_fetch(config: FetchConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }
    let source_config = match config.source.resolve() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let source = match NetworkTileSource::connect(source_config).await {
        Ok(s) => s,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if !source.use_level(config.level).await {
        error!(
            "Level {} is not served by {} (levels {}-{})",
            config.level,
            source.name(),
            source.min_level(),
            source.max_level()
        );
        return ExitCode::FAILURE;
    }

    let mut available = source.subscribe().await;
    let key = TileKey::new(config.level, config.x, config.y);

    let mut tile = match source.get_tile(config.x, config.y).await {
        Ok(t) => t,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if tile.is_pending() {
        info!(%key, "waiting for tile");
        let wait = Duration::from_secs(config.wait);
        let delivered = tokio::time::timeout(wait, async {
            while let Some(msg) = available.recv().await {
                if msg.key == key {
                    return Some(msg.image);
                }
            }
            None
        })
        .await;

        tile = match delivered {
            Ok(Some(image)) => image,
            Ok(None) => {
                error!("Tile listener closed before {} arrived", key);
                return ExitCode::FAILURE;
            }
            Err(_) => {
                error!("Timed out after {}s waiting for {}", config.wait, key);
                return ExitCode::FAILURE;
            }
        };
    } else {
        info!(%key, "tile served from cache");
    }

    if tile.is_error() {
        error!("Fetching {} failed; see the log above", key);
        return ExitCode::FAILURE;
    }

    let png = match encode_png(tile.pixels()) {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = tokio::fs::write(&config.output, png).await {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "Wrote {} ({}x{}) to {}",
        key,
        tile.width(),
        tile.height(),
        config.output.display()
    );
    ExitCode::SUCCESS
}

// =============================================================================
// Inspect Command
// =============================================================================

async fn run_inspect(config: InspectConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    let source = match LocalTileSource::open(config.source_config()).await {
        Ok(s) => s,
        Err(e) => {
            println!("✗ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let extent = source.extent();
    println!("Tileset: {}", source.name());
    println!("─────────────────");
    println!(
        "  extent  lon {} to {}, lat {} to {}",
        extent.min_lon, extent.max_lon, extent.min_lat, extent.max_lat
    );
    println!(
        "  tiles   {}x{} px",
        source.tile_width(),
        source.tile_height()
    );
    println!();

    let mut complete = true;
    for &level in source.levels() {
        let Some(info) = source.get_info(level).await else {
            println!("  level {:>2}  ✗ no metadata", level);
            complete = false;
            continue;
        };

        match source.verify_level(level).await {
            Ok(report) if report.is_complete() => {
                println!(
                    "  level {:>2}  ✓ {}x{} tiles, {} file(s)",
                    level, info.num_tiles_x, info.num_tiles_y, report.found
                );
            }
            Ok(report) => {
                complete = false;
                println!(
                    "  level {:>2}  ✗ {}x{} tiles, {} missing, {} outside the grid",
                    level,
                    info.num_tiles_x,
                    info.num_tiles_y,
                    report.missing.len(),
                    report.outside.len()
                );
            }
            Err(e) => {
                complete = false;
                println!("  level {:>2}  ✗ {}", level, e);
            }
        }
    }

    if complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

// =============================================================================
// Project Command
// =============================================================================

async fn run_project(config: ProjectConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    let geo = GeoPoint::new(config.lon, config.lat);

    let result = match &config.local {
        Some(dir) => {
            let source = match LocalTileSource::open(LocalSourceConfig::new(dir)).await {
                Ok(s) => s,
                Err(e) => {
                    println!("✗ {}", e);
                    return ExitCode::FAILURE;
                }
            };
            if !source.use_level(config.level).await {
                println!("✗ Level {} is not available in {}", config.level, source.name());
                return ExitCode::FAILURE;
            }
            match source.geo_to_tile(geo).await {
                Ok(tile) => source.tile_to_geo(tile).await.map(|back| (tile, back)),
                Err(e) => Err(e),
            }
        }
        None => {
            let info = slipmap_tiles::LevelInfo::mercator(config.level);
            let projection = Projection::Spherical;
            projection
                .geo_to_tile(config.level, &info, (256, 256), geo)
                .and_then(|tile| {
                    projection
                        .tile_to_geo(config.level, &info, (256, 256), tile)
                        .map(|back| (tile, back))
                })
        }
    };

    match result {
        Ok((tile, back)) => {
            let (x, y) = tile.tile();
            println!("level {}: ({}, {})", config.level, geo.lon, geo.lat);
            println!("  tile      ({:.6}, {:.6})  -> tile {}, {}", tile.x, tile.y, x, y);
            println!("  inverse   ({:.6}, {:.6})", back.lon, back.lat);
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("✗ {}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "slipmap_tiles=debug"
    } else {
        "slipmap_tiles=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
