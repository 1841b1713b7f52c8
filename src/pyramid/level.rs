//! One zoom level of a tile pyramid and the layer operations built on it.
//!
//! A [`PyramidLevel`] is a plain value: tile size, level index, aspect ratio
//! and the location prefix its tiles live under. Constructing one does no I/O.
//! "Moving" to another level or prefix produces a new value.
//!
//! Layer operations fan out over the level's tiles through a
//! [`TileScheduler`] and report a coarse outcome: either a [`LayerReport`] or
//! [`BuildError::LayerIncomplete`]. Individual tile failures are logged by the
//! scheduler and never stop sibling tiles.

use std::ops::Range;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{BuildError, TileError, TransformError};
use crate::sampler::{PyramidSampler, RasterSampler, ValueSampler};
use crate::tile::{Raster, TileRepository, DEFAULT_BANDS};

use super::coords::{pixel_to_uv, tile_name, tiles_high, tiles_wide, to_tile_address, wrap, TileAddress};
use super::scheduler::{BatchReport, TileScheduler};
use super::transform::{BoxFilter, PixelTransform};

/// Deepest level the pyramid addresses. Keeps `tile_size << level` inside `u64`
/// and column indices inside `u32`. Deeper levels are clamped to it.
pub const MAX_LEVEL: u32 = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct PyramidLevel {
    tile_size: u32,
    level: u32,
    /// Height / width of the full image
    aspect: f64,
    location_prefix: Arc<str>,
    bands: usize,
}

/// Successful outcome of a layer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerReport {
    /// Level whose tiles the operation iterated over
    pub level: u32,
    /// Tiles processed
    pub tiles: usize,
}

/// Options for [`PyramidLevel::build_new_layer`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Number of finer levels generated from each source tile
    pub scale_jump: u32,
    /// Halo in source pixels around each tile handed to the transform
    pub padding: u32,
    pub parallel: bool,
    /// Prefix of the generated levels; `None` writes next to the source level
    pub output_prefix: Option<String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            scale_jump: 1,
            padding: 0,
            parallel: true,
            output_prefix: None,
        }
    }
}

impl PyramidLevel {
    /// Describe a pyramid level. `level` is clamped to [`MAX_LEVEL`].
    pub fn new(tile_size: u32, level: u32, aspect: f64, location_prefix: impl Into<Arc<str>>) -> Self {
        Self {
            tile_size,
            level: clamp_level(level),
            aspect,
            location_prefix: location_prefix.into(),
            bands: DEFAULT_BANDS,
        }
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn aspect(&self) -> f64 {
        self.aspect
    }

    pub fn location_prefix(&self) -> &str {
        &self.location_prefix
    }

    pub fn bands(&self) -> usize {
        self.bands
    }

    /// The same pyramid at another level, clamped to [`MAX_LEVEL`].
    pub fn with_level(&self, level: u32) -> Self {
        Self {
            level: clamp_level(level),
            ..self.clone()
        }
    }

    /// The same level stored under another prefix.
    pub fn with_prefix(&self, location_prefix: impl Into<Arc<str>>) -> Self {
        Self {
            location_prefix: location_prefix.into(),
            ..self.clone()
        }
    }

    /// Set the number of bands rendered per tile. Layer operations require it
    /// to match the repository codec's band count.
    pub fn with_bands(mut self, bands: usize) -> Self {
        self.bands = bands.max(1);
        self
    }

    /// Full image width in pixels at this level.
    pub fn width_px(&self) -> u64 {
        (self.tile_size as u64) << self.level
    }

    /// Full image height in pixels at this level, rounded up.
    pub fn height_px(&self) -> u64 {
        (self.width_px() as f64 * self.aspect).ceil() as u64
    }

    pub fn width_tiles(&self) -> u32 {
        tiles_wide(self.level)
    }

    pub fn height_tiles(&self) -> u32 {
        tiles_high(self.level, self.aspect)
    }

    /// Every `(row, col)` of this level, row by row.
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32)> {
        let cols = self.width_tiles();
        (0..self.height_tiles()).flat_map(move |row| (0..cols).map(move |col| (row, col)))
    }

    pub fn tile_name(&self, row: u32, col: u32, ext: &str) -> String {
        tile_name(self.level, row, col, ext)
    }

    /// `location_prefix + tile_name`: the store key of a tile.
    pub fn tile_location(&self, row: u32, col: u32, ext: &str) -> String {
        format!("{}{}", self.location_prefix, self.tile_name(row, col, ext))
    }

    /// Owning tile and pixel of `(u, v)`, with `padding` added to the pixel offset.
    pub fn address(&self, u: f64, v: f64, padding: u32) -> TileAddress {
        to_tile_address(u, v, self.level, self.aspect, self.tile_size, padding)
    }

    /// A tile-backed sampler for this level with a fresh cache.
    pub fn sampler(&self, repo: &TileRepository) -> PyramidSampler {
        PyramidSampler::new(self.clone(), repo.clone())
    }

    /// Render tile `(row, col)` of this level from `sampler`.
    pub async fn render_tile(&self, row: u32, col: u32, sampler: &ValueSampler) -> Raster {
        self.sample_grid(row, col, self.tile_size, 1.0, 0.0, false, sampler)
            .await
    }

    /// Render tile `(row, col)` with a halo of `padding` pixels on every side.
    ///
    /// Halo pixels can fall outside the image plane, so every coordinate is
    /// wrapped before sampling.
    pub async fn tile_image(
        &self,
        row: u32,
        col: u32,
        sampler: &ValueSampler,
        padding: u32,
    ) -> Raster {
        self.sample_grid(
            row,
            col,
            self.tile_size + 2 * padding,
            1.0,
            -(padding as f64),
            true,
            sampler,
        )
        .await
    }

    /// Sample a `pixels²` grid over tile `(row, col)`.
    ///
    /// Grid pixel `i` sits at tile-local pixel `offset + i * step`.
    #[allow(clippy::too_many_arguments)]
    async fn sample_grid(
        &self,
        row: u32,
        col: u32,
        pixels: u32,
        step: f64,
        offset: f64,
        wrap_plane: bool,
        sampler: &ValueSampler,
    ) -> Raster {
        let size = pixels as usize;
        let mut raster = Raster::new(size, size, self.bands);

        for y in 0..size {
            for x in 0..size {
                let local_x = offset + x as f64 * step;
                let local_y = offset + y as f64 * step;
                let (mut u, mut v) =
                    pixel_to_uv(row, col, local_x, local_y, self.level, self.tile_size);
                if wrap_plane {
                    u = wrap(u, 1.0);
                    v = wrap(v, self.aspect);
                }

                for band in 0..self.bands {
                    let value = sampler.sample(u, v, band).await;
                    if let Err(e) = raster.set(x, y, band, value) {
                        warn!(level = self.level, row, col, x, y, error = %e, "pixel write failed");
                    }
                }
            }
        }
        raster
    }

    /// Render and store every tile of this level from `sampler`.
    ///
    /// This is how a pyramid is seeded from an in-memory image.
    pub async fn render_layer(
        &self,
        repo: &TileRepository,
        scheduler: &TileScheduler,
        sampler: Arc<ValueSampler>,
        parallel: bool,
    ) -> Result<LayerReport, BuildError> {
        self.check_bands(repo)?;

        let level = self.clone();
        let repo = repo.clone();
        let report = scheduler
            .run(self.height_tiles(), self.width_tiles(), parallel, move |row, col| {
                let level = level.clone();
                let repo = repo.clone();
                let sampler = sampler.clone();
                async move {
                    let tile = level.render_tile(row, col, &sampler).await;
                    let location = level.tile_location(row, col, repo.extension());
                    repo.write_tile(&location, &tile).await
                }
            })
            .await?;

        finish_layer(self.level, "render", report)
    }

    /// Generate levels `level + 1 ..= level + scale_jump` from this one.
    ///
    /// Each tile of this level is rendered with a `padding` halo, handed to
    /// `transform` once, and the output is cut into every child tile it covers
    /// at each of the generated levels. Child tiles sample the transformed
    /// raster only, so the expensive transform runs once per source tile.
    pub async fn build_new_layer(
        &self,
        repo: &TileRepository,
        scheduler: &TileScheduler,
        options: &BuildOptions,
        transform: Arc<dyn PixelTransform>,
    ) -> Result<LayerReport, BuildError> {
        if options.scale_jump == 0 {
            return Err(BuildError::InvalidLevel {
                level: self.level,
                reason: "scale jump must be at least 1".to_string(),
            });
        }
        self.check_level(self.level.saturating_add(options.scale_jump))?;
        self.check_bands(repo)?;

        let source = self.clone();
        let target = match &options.output_prefix {
            Some(prefix) => self.with_prefix(prefix.as_str()),
            None => self.clone(),
        };
        let sampler = Arc::new(ValueSampler::from(self.sampler(repo)));
        let repo = repo.clone();
        let scale_jump = options.scale_jump;
        let padding = options.padding;

        let report = scheduler
            .run(self.height_tiles(), self.width_tiles(), options.parallel, move |row, col| {
                let source = source.clone();
                let target = target.clone();
                let repo = repo.clone();
                let sampler = sampler.clone();
                let transform = transform.clone();
                async move {
                    let image = source.tile_image(row, col, &sampler, padding).await;
                    let transformed = Arc::new(run_transform(transform, image).await?);
                    let tile_sampler = ValueSampler::from(RasterSampler::for_transformed_tile(
                        transformed,
                        &source,
                        row,
                        col,
                        padding,
                    ));
                    write_children(&source, &target, &repo, &tile_sampler, row, col, scale_jump)
                        .await
                }
            })
            .await?;

        finish_layer(self.level, "enlarge", report)
    }

    /// Rebuild this level from the next-finer one.
    ///
    /// Every tile samples a `2 · tile_size` square from level `level + 1` over
    /// its own footprint and hands it to `transform`, which must return a
    /// `tile_size` square. [`BoxFilter`] is the usual reducer.
    pub async fn reduce_layer(
        &self,
        repo: &TileRepository,
        scheduler: &TileScheduler,
        parallel: bool,
        transform: Arc<dyn PixelTransform>,
    ) -> Result<LayerReport, BuildError> {
        self.check_level(self.level.saturating_add(1))?;
        self.check_bands(repo)?;

        let level = self.clone();
        let finer = Arc::new(ValueSampler::from(self.with_level(self.level + 1).sampler(repo)));
        let repo = repo.clone();

        let report = scheduler
            .run(self.height_tiles(), self.width_tiles(), parallel, move |row, col| {
                let level = level.clone();
                let repo = repo.clone();
                let finer = finer.clone();
                let transform = transform.clone();
                async move {
                    let ts = level.tile_size;
                    let block = level
                        .sample_grid(row, col, 2 * ts, 0.5, 0.0, false, &finer)
                        .await;
                    let reduced = run_transform(transform, block).await?;
                    if reduced.width() != ts as usize || reduced.height() != ts as usize {
                        return Err(TileError::from(TransformError::new(format!(
                            "reducer returned {}x{}, expected {ts}x{ts}",
                            reduced.width(),
                            reduced.height()
                        ))));
                    }
                    let location = level.tile_location(row, col, repo.extension());
                    repo.write_tile(&location, &reduced).await
                }
            })
            .await?;

        finish_layer(self.level, "reduce", report)
    }

    /// Regenerate every level from `level - 1` down to `min_level` by box
    /// filtering, starting from this (fully populated) level.
    ///
    /// An incomplete layer does not stop the pass: coarser layers are still
    /// built from whatever the finer one holds, and the first error is
    /// returned once every layer has been attempted.
    pub async fn rebuild(
        &self,
        repo: &TileRepository,
        scheduler: &TileScheduler,
        min_level: u32,
        parallel: bool,
    ) -> Result<Vec<LayerReport>, BuildError> {
        if min_level > self.level {
            return Err(BuildError::InvalidLevel {
                level: min_level,
                reason: format!("min level is above the top level {}", self.level),
            });
        }
        self.check_bands(repo)?;

        let reducer: Arc<dyn PixelTransform> = Arc::new(BoxFilter);
        let mut reports = Vec::new();
        let mut first_error = None;

        for level in (min_level..self.level).rev() {
            match self
                .with_level(level)
                .reduce_layer(repo, scheduler, parallel, reducer.clone())
                .await
            {
                Ok(report) => reports.push(report),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(reports),
        }
    }

    fn check_level(&self, level: u32) -> Result<(), BuildError> {
        if level > MAX_LEVEL {
            return Err(BuildError::InvalidLevel {
                level,
                reason: format!("deepest supported level is {MAX_LEVEL}"),
            });
        }
        Ok(())
    }

    fn check_bands(&self, repo: &TileRepository) -> Result<(), BuildError> {
        let codec_bands = repo.codec().bands();
        if self.bands != codec_bands {
            return Err(BuildError::BandMismatch {
                level: self.level,
                level_bands: self.bands,
                codec_bands,
            });
        }
        Ok(())
    }
}

fn clamp_level(level: u32) -> u32 {
    if level > MAX_LEVEL {
        warn!(level, max = MAX_LEVEL, "level too deep, clamping");
    }
    level.min(MAX_LEVEL)
}

/// Render and store every child of source tile `(row, col)` at each of the
/// `scale_jump` finer levels. Keeps going past a failed write and returns the
/// first error.
async fn write_children(
    source: &PyramidLevel,
    target: &PyramidLevel,
    repo: &TileRepository,
    tile_sampler: &ValueSampler,
    row: u32,
    col: u32,
    scale_jump: u32,
) -> Result<(), TileError> {
    let mut first_error = None;

    for jump in 1..=scale_jump {
        let child = target.with_level(source.level() + jump);
        let (rows, cols) = child_tiles(row, col, jump, child.height_tiles());

        for child_row in rows {
            for child_col in cols.clone() {
                let tile = child.render_tile(child_row, child_col, tile_sampler).await;
                let location = child.tile_location(child_row, child_col, repo.extension());
                if let Err(e) = repo.write_tile(&location, &tile).await {
                    warn!(tile = %location, error = %e, "failed to store child tile");
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Rows and columns of the tiles `jump` levels finer that cover tile
/// `(row, col)`, with rows clipped to `child_rows`. Saturates rather than
/// overflowing for very tall images.
fn child_tiles(row: u32, col: u32, jump: u32, child_rows: u32) -> (Range<u32>, Range<u32>) {
    let span = 1u32.checked_shl(jump).unwrap_or(u32::MAX);
    let rows = row.saturating_mul(span)..row.saturating_add(1).saturating_mul(span).min(child_rows);
    let cols = col.saturating_mul(span)..col.saturating_add(1).saturating_mul(span);
    (rows, cols)
}

async fn run_transform(
    transform: Arc<dyn PixelTransform>,
    input: Raster,
) -> Result<Raster, TileError> {
    let output = tokio::task::spawn_blocking(move || transform.apply(input))
        .await
        .map_err(|e| TransformError::new(format!("transform panicked: {e}")))??;
    Ok(output)
}

fn finish_layer(level: u32, action: &str, report: BatchReport) -> Result<LayerReport, BuildError> {
    if report.is_complete() {
        info!(level, action, tiles = report.succeeded, "layer complete");
        return Ok(LayerReport {
            level,
            tiles: report.succeeded,
        });
    }

    warn!(
        level,
        action,
        succeeded = report.succeeded,
        failed = report.failures.len(),
        "layer incomplete"
    );
    Err(BuildError::LayerIncomplete {
        level,
        failed: report.failures.len(),
        total: report.total,
    })
}
