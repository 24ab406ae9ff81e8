//! Tile images, file formats and placeholder tiles.
//!
//! # Design Decisions
//!
//! - **Decoded once**: tiles are decoded to RGBA when they enter the memory
//!   cache, so repaint passes never pay for decoding again.
//!
//! - **Raw bytes on disk**: the backing store keeps exactly the bytes the
//!   server sent; nothing is re-encoded on the way to disk.
//!
//! - **Placeholders are shared**: the pending and error images are built
//!   once per source and handed out by `Arc`.

use std::sync::Arc;

use image::{ImageFormat, Rgba, RgbaImage};

use crate::error::{ConfigError, FetchError};

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Fill colour of the pending placeholder.
const PENDING_FILL: Rgba<u8> = Rgba([0xE0, 0xE0, 0xE0, 0xFF]);

/// Fill colour of the error placeholder.
const ERROR_FILL: Rgba<u8> = Rgba([0xF4, 0xC2, 0xC2, 0xFF]);

/// Border colour shared by both placeholders.
const PLACEHOLDER_BORDER: Rgba<u8> = Rgba([0x80, 0x80, 0x80, 0xFF]);

// =============================================================================
// Tile Format
// =============================================================================

/// File type of the tiles served by a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TileFormat {
    Png,
    Jpeg,
}

impl TileFormat {
    /// Parse a file extension (`png`, `jpg`), case-insensitively.
    pub fn from_extension(extension: &str) -> Result<Self, ConfigError> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Ok(TileFormat::Png),
            "jpg" => Ok(TileFormat::Jpeg),
            _ => Err(ConfigError::UnsupportedExtension {
                extension: extension.to_string(),
            }),
        }
    }

    /// Derive the format from the extension of a URL path template.
    pub fn from_url_path(url_path: &str) -> Result<Self, ConfigError> {
        let last = url_path.rsplit('/').next().unwrap_or(url_path);
        let extension = match last.rsplit_once('.') {
            Some((_, ext)) => ext,
            None => "",
        };
        Self::from_extension(extension)
    }

    /// File extension used in the backing store.
    pub fn extension(&self) -> &'static str {
        match self {
            TileFormat::Png => "png",
            TileFormat::Jpeg => "jpg",
        }
    }

    /// Content type a server must declare for tiles of this format.
    pub fn content_type(&self) -> &'static str {
        match self {
            TileFormat::Png => "image/png",
            TileFormat::Jpeg => "image/jpeg",
        }
    }

    fn image_format(&self) -> ImageFormat {
        match self {
            TileFormat::Png => ImageFormat::Png,
            TileFormat::Jpeg => ImageFormat::Jpeg,
        }
    }

    /// Decode raw tile bytes into an RGBA raster.
    pub fn decode(&self, data: &[u8]) -> Result<RgbaImage, FetchError> {
        image::load_from_memory_with_format(data, self.image_format())
            .map(|img| img.to_rgba8())
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}

// =============================================================================
// Tile Image
// =============================================================================

/// What a [`TileImage`] actually shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    /// Real map data
    Tile,
    /// Stand-in while a fetch is outstanding
    Pending,
    /// Stand-in after a fetch failed
    Error,
}

/// A decoded tile raster, cheap to clone.
#[derive(Debug, Clone)]
pub struct TileImage {
    pixels: Arc<RgbaImage>,
    kind: TileKind,
}

impl TileImage {
    /// Wrap a decoded raster of real map data.
    pub fn new(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            kind: TileKind::Tile,
        }
    }

    /// Decode raw bytes of the given format.
    pub fn decode(format: TileFormat, data: &[u8]) -> Result<Self, FetchError> {
        format.decode(data).map(Self::new)
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn kind(&self) -> TileKind {
        self.kind
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn is_pending(&self) -> bool {
        self.kind == TileKind::Pending
    }

    pub fn is_error(&self) -> bool {
        self.kind == TileKind::Error
    }

    /// Whether two handles share the same raster allocation.
    pub fn ptr_eq(&self, other: &TileImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

// =============================================================================
// Placeholders
// =============================================================================

/// The pending and error placeholder images for one source.
#[derive(Debug, Clone)]
pub struct Placeholders {
    pub pending: TileImage,
    pub error: TileImage,
}

impl Placeholders {
    /// Build both placeholders at the given tile size.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pending: placeholder(width, height, PENDING_FILL, TileKind::Pending),
            error: placeholder(width, height, ERROR_FILL, TileKind::Error),
        }
    }
}

fn placeholder(width: u32, height: u32, fill: Rgba<u8>, kind: TileKind) -> TileImage {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
            PLACEHOLDER_BORDER
        } else {
            fill
        }
    });
    TileImage {
        pixels: Arc::new(img),
        kind,
    }
}

/// Encode a raster as PNG bytes.
///
/// Used by the CLI to write fetched tiles and placeholders to disk.
pub fn encode_png(pixels: &RgbaImage) -> Result<Vec<u8>, FetchError> {
    let mut out = std::io::Cursor::new(Vec::new());
    pixels
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| FetchError::Decode(e.to_string()))?;
    Ok(out.into_inner())
}
