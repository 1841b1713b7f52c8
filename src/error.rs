use thiserror::Error;

/// Errors raised by a byte-level tile store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Object not found
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Local filesystem error
    #[error("I/O error: {0}")]
    Io(String),

    /// Error from S3 or S3-compatible storage
    #[error("S3 error: {0}")]
    S3(String),

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),
}

impl StoreError {
    /// Whether this error means the object is absent (as opposed to unreachable).
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Error returned by an injected pixel transform.
#[derive(Debug, Clone, Error)]
#[error("Transform failed: {message}")]
pub struct TransformError {
    pub message: String,
}

impl TransformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors that can occur while reading, decoding, rendering or writing a tile.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// The tile does not exist in the store
    #[error("Tile not found: {location}")]
    NotFound { location: String },

    /// The stored bytes could not be decoded
    #[error("Failed to decode tile {location}: {message}")]
    Decode { location: String, message: String },

    /// The raster could not be encoded
    #[error("Failed to encode tile: {message}")]
    Encode { message: String },

    /// A pixel lookup fell outside the raster. Indicates a coordinate bug.
    #[error(
        "Pixel access out of bounds: ({x}, {y}) band {band} in {width}x{height}x{bands} raster"
    )]
    PixelAccess {
        x: usize,
        y: usize,
        band: usize,
        width: usize,
        height: usize,
        bands: usize,
    },

    /// The injected transform failed for this tile
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// Store failure other than not-found
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl TileError {
    /// Missing and undecodable tiles are handled identically: both trigger fallback.
    pub fn is_missing(&self) -> bool {
        matches!(self, TileError::NotFound { .. } | TileError::Decode { .. })
    }
}

impl From<StoreError> for TileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(location) => TileError::NotFound { location },
            other => TileError::Store(other),
        }
    }
}

/// Coarse-grained outcome of a layer operation.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// Some tiles of the layer failed; the rest were stored
    #[error("Layer {level} incomplete: {failed} of {total} tiles failed")]
    LayerIncomplete {
        level: u32,
        failed: usize,
        total: usize,
    },

    /// The requested level cannot be built
    #[error("Invalid level {level}: {reason}")]
    InvalidLevel { level: u32, reason: String },

    /// The level renders a different number of bands than the codec stores
    #[error("Level {level} has {level_bands} bands but the tile codec stores {codec_bands}")]
    BandMismatch {
        level: u32,
        level_bands: usize,
        codec_bands: usize,
    },

    /// A worker task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Join(String),
}
