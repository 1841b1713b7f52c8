//! Configuration management for the pyramid tool.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `PYRAMID_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use tile_pyramid::config::Cli;
//!
//! let cli = Cli::parse();
//! cli.validate()?;
//! println!("Tile size: {}", cli.pyramid.tile_size);
//! ```
//!
//! # Environment Variables
//!
//! - `PYRAMID_ROOT` - Local directory holding the tiles
//! - `PYRAMID_S3_BUCKET` - S3 bucket holding the tiles (instead of a local root)
//! - `PYRAMID_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `PYRAMID_S3_REGION` - AWS region (default: us-east-1)
//! - `PYRAMID_PREFIX` - Location prefix of the pyramid's tiles (default: empty)
//! - `PYRAMID_TILE_SIZE` - Tile edge in pixels (default: 256)
//! - `PYRAMID_ASPECT` - Height / width of the full image (default: 1.0)
//! - `PYRAMID_FORMAT` - Tile format, `jpg` or `png` (default: jpg)
//! - `PYRAMID_JPEG_QUALITY` - JPEG quality (default: 90)
//! - `PYRAMID_CACHE_TILES` - Decoded tiles cached per sampler (default: 1024)
//! - `PYRAMID_WORKERS` - Rows rendered concurrently (default: available parallelism)

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::pyramid::{PyramidLevel, TileScheduler, MAX_LEVEL};
use crate::tile::{TileCodec, DEFAULT_JPEG_QUALITY, DEFAULT_TILE_CACHE_CAPACITY};

// =============================================================================
// Default Values
// =============================================================================

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default tile edge in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

pub const MIN_TILE_SIZE: u32 = 16;
pub const MAX_TILE_SIZE: u32 = 4096;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile Pyramid - build and resample multiresolution image pyramids.
///
/// Tiles live in a local directory or an S3 bucket, named
/// `{prefix}{level}_{row}_{col}.{ext}`.
#[derive(Parser, Debug, Clone)]
#[command(name = "tile-pyramid")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub store: StoreArgs,

    #[command(flatten)]
    pub pyramid: PyramidArgs,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Slice an image file into every tile of one level.
    Import(ImportArgs),

    /// Regenerate coarser levels from a fully populated top level.
    Rebuild(RebuildArgs),

    /// Generate finer levels from an existing one by enlarging each tile.
    Enlarge(EnlargeArgs),

    /// Print the tile-source descriptor for a viewer as JSON.
    Describe(DescribeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ImportArgs {
    /// Image file to slice.
    #[arg(long)]
    pub image: PathBuf,

    /// Level to write.
    #[arg(long)]
    pub level: u32,
}

#[derive(Args, Debug, Clone)]
pub struct RebuildArgs {
    /// Fully populated level to reduce from.
    #[arg(long)]
    pub level: u32,

    /// Coarsest level to regenerate.
    #[arg(long, default_value_t = 0)]
    pub min_level: u32,
}

#[derive(Args, Debug, Clone)]
pub struct EnlargeArgs {
    /// Source level.
    #[arg(long)]
    pub level: u32,

    /// Number of finer levels to generate.
    #[arg(long, default_value_t = 1)]
    pub scale_jump: u32,

    /// Halo in pixels around each source tile.
    #[arg(long, default_value_t = 0)]
    pub padding: u32,

    /// Prefix for the generated levels (default: the source prefix).
    #[arg(long)]
    pub output_prefix: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DescribeArgs {
    #[arg(long, default_value_t = 0)]
    pub min_level: u32,

    #[arg(long)]
    pub max_level: u32,

    /// URL prefix the viewer fetches tiles from.
    #[arg(long, default_value = "")]
    pub url_prefix: String,
}

// =============================================================================
// Store Configuration
// =============================================================================

#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Local directory holding the tiles.
    #[arg(long, global = true, env = "PYRAMID_ROOT")]
    pub root: Option<PathBuf>,

    /// S3 bucket holding the tiles.
    #[arg(long, global = true, env = "PYRAMID_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    #[arg(long, global = true, env = "PYRAMID_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, global = true, default_value = DEFAULT_REGION, env = "PYRAMID_S3_REGION")]
    pub s3_region: String,

    /// Location prefix of the pyramid's tiles.
    #[arg(long, global = true, default_value = "", env = "PYRAMID_PREFIX")]
    pub prefix: String,
}

/// Where tiles are read from and written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreTarget {
    Local(PathBuf),
    S3 {
        bucket: String,
        endpoint: Option<String>,
        region: String,
    },
}

impl StoreArgs {
    /// Resolve the configured backend. Exactly one of `--root` and
    /// `--s3-bucket` must be set.
    pub fn target(&self) -> Result<StoreTarget, String> {
        match (&self.root, &self.s3_bucket) {
            (Some(_), Some(_)) => {
                Err("Set either --root or --s3-bucket, not both".to_string())
            }
            (None, None) => Err(
                "A tile store is required. Set --root (PYRAMID_ROOT) or --s3-bucket (PYRAMID_S3_BUCKET)"
                    .to_string(),
            ),
            (Some(root), None) => Ok(StoreTarget::Local(root.clone())),
            (None, Some(bucket)) if bucket.is_empty() => {
                Err("S3 bucket name must not be empty".to_string())
            }
            (None, Some(bucket)) => Ok(StoreTarget::S3 {
                bucket: bucket.clone(),
                endpoint: self.s3_endpoint.clone(),
                region: self.s3_region.clone(),
            }),
        }
    }
}

// =============================================================================
// Pyramid Configuration
// =============================================================================

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatArg {
    #[default]
    Jpg,
    Png,
}

#[derive(Args, Debug, Clone)]
pub struct PyramidArgs {
    /// Tile edge in pixels (power of two).
    #[arg(long, global = true, default_value_t = DEFAULT_TILE_SIZE, env = "PYRAMID_TILE_SIZE")]
    pub tile_size: u32,

    /// Height / width of the full image.
    #[arg(long, global = true, default_value_t = 1.0, env = "PYRAMID_ASPECT")]
    pub aspect: f64,

    /// Tile encoding.
    #[arg(long, global = true, value_enum, default_value_t = FormatArg::Jpg, env = "PYRAMID_FORMAT")]
    pub format: FormatArg,

    /// JPEG quality for written tiles (1-100).
    #[arg(long, global = true, default_value_t = DEFAULT_JPEG_QUALITY, env = "PYRAMID_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// Decoded tiles kept per sampler.
    #[arg(long, global = true, default_value_t = DEFAULT_TILE_CACHE_CAPACITY, env = "PYRAMID_CACHE_TILES")]
    pub cache_tiles: usize,

    /// Maximum rows rendered concurrently.
    #[arg(long, global = true, env = "PYRAMID_WORKERS")]
    pub workers: Option<usize>,

    /// Render tiles one at a time.
    #[arg(long, global = true, default_value_t = false)]
    pub sequential: bool,
}

impl Default for PyramidArgs {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            aspect: 1.0,
            format: FormatArg::Jpg,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            cache_tiles: DEFAULT_TILE_CACHE_CAPACITY,
            workers: None,
            sequential: false,
        }
    }
}

impl PyramidArgs {
    pub fn validate(&self) -> Result<(), String> {
        if !self.tile_size.is_power_of_two()
            || !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.tile_size)
        {
            return Err(format!(
                "tile_size must be a power of two between {MIN_TILE_SIZE} and {MAX_TILE_SIZE}"
            ));
        }

        if !self.aspect.is_finite() || self.aspect <= 0.0 {
            return Err("aspect must be a positive number".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if self.cache_tiles == 0 {
            return Err("cache_tiles must be greater than 0".to_string());
        }

        if self.workers == Some(0) {
            return Err("workers must be greater than 0".to_string());
        }

        Ok(())
    }

    pub fn codec(&self) -> TileCodec {
        match self.format {
            FormatArg::Jpg => TileCodec::jpeg(self.jpeg_quality),
            FormatArg::Png => TileCodec::png(),
        }
    }

    pub fn scheduler(&self) -> TileScheduler {
        match self.workers {
            Some(n) => TileScheduler::new(n),
            None => TileScheduler::default(),
        }
    }

    pub fn parallel(&self) -> bool {
        !self.sequential
    }

    /// The pyramid level `level` under `prefix`.
    pub fn level(&self, level: u32, prefix: &str) -> PyramidLevel {
        PyramidLevel::new(self.tile_size, level, self.aspect, prefix)
    }
}

impl Cli {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        self.pyramid.validate()?;

        let deepest = match &self.command {
            Command::Import(args) => args.level,
            Command::Rebuild(args) => {
                if args.min_level > args.level {
                    return Err("min_level must not exceed level".to_string());
                }
                args.level
            }
            Command::Enlarge(args) => {
                if args.scale_jump == 0 {
                    return Err("scale_jump must be at least 1".to_string());
                }
                args.level.saturating_add(args.scale_jump)
            }
            Command::Describe(args) => {
                if args.min_level > args.max_level {
                    return Err("min_level must not exceed max_level".to_string());
                }
                args.max_level
            }
        };
        if deepest > MAX_LEVEL {
            return Err(format!("levels deeper than {MAX_LEVEL} are not supported"));
        }

        // Describing a pyramid does not touch the store
        if !matches!(self.command, Command::Describe(_)) {
            self.store.target()?;
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
