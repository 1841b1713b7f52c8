//! Quadtree-coded tile addressing.
//!
//! Some tile services name tiles by a path of quadrant letters instead of
//! `(level, row, col)`. Each letter picks one quadrant of the parent tile from
//! one bit of the column and one bit of the row, most significant bit first:
//!
//! ```text
//!              col bit 0   col bit 1
//! row bit 0       q           r
//! row bit 1       t           s
//! ```
//!
//! The empty code addresses the single root tile. The quadtree covers the
//! unit square; both `u` and `v` wrap modulo 1.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::pyramid::coords::{level_scale, wrap};
use crate::tile::{CachedTile, TileCache, TileRepository};

/// Deepest supported code.
pub const MAX_QUADTREE_DEPTH: u32 = 30;

/// Quadrant letters indexed by `[row_bit][col_bit]`.
const QUADRANTS: [[char; 2]; 2] = [['q', 'r'], ['t', 's']];

/// Encode a tile address as a quadrant-letter code of `depth` characters.
pub fn encode(row: u32, col: u32, depth: u32) -> String {
    (0..depth)
        .rev()
        .map(|bit| {
            let row_bit = ((row >> bit) & 1) as usize;
            let col_bit = ((col >> bit) & 1) as usize;
            QUADRANTS[row_bit][col_bit]
        })
        .collect()
}

/// Decode a quadrant-letter code back into `(row, col, depth)`.
///
/// Returns `None` for any character outside `q`, `r`, `s`, `t`, or for codes
/// deeper than [`MAX_QUADTREE_DEPTH`].
pub fn decode(code: &str) -> Option<(u32, u32, u32)> {
    let depth = code.chars().count() as u32;
    if depth > MAX_QUADTREE_DEPTH {
        return None;
    }

    let mut row = 0u32;
    let mut col = 0u32;
    for c in code.chars() {
        let (row_bit, col_bit) = match c {
            'q' => (0, 0),
            'r' => (0, 1),
            't' => (1, 0),
            's' => (1, 1),
            _ => return None,
        };
        row = (row << 1) | row_bit;
        col = (col << 1) | col_bit;
    }
    Some((row, col, depth))
}

/// Sampler over a quadtree-coded tile service, with parent fallback.
///
/// Tiles live at `prefix + code + "." + ext`. A lookup starts at `depth` and
/// steps one quadrant up (dropping the last letter) per missing tile.
#[derive(Debug, Clone)]
pub struct QuadtreeSampler {
    prefix: String,
    depth: u32,
    tile_size: u32,
    repo: TileRepository,
    cache: Arc<TileCache>,
}

impl QuadtreeSampler {
    pub fn new(prefix: impl Into<String>, depth: u32, tile_size: u32, repo: TileRepository) -> Self {
        let cache = repo.new_cache();
        Self {
            prefix: prefix.into(),
            depth: depth.min(MAX_QUADTREE_DEPTH),
            tile_size,
            repo,
            cache,
        }
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    /// Location of the tile with the given code.
    pub fn tile_location(&self, code: &str) -> String {
        format!("{}{}.{}", self.prefix, code, self.repo.extension())
    }

    pub async fn sample(&self, u: f64, v: f64, band: usize) -> f32 {
        let u = wrap(u, 1.0);
        let v = wrap(v, 1.0);
        let ts = self.tile_size as f64;

        for depth in (0..=self.depth).rev() {
            let scale = level_scale(depth);
            let (tu, tv) = (u * scale, v * scale);
            let max_index = (1u32 << depth) - 1;
            let col = (tu.floor() as u32).min(max_index);
            let row = (tv.floor() as u32).min(max_index);

            let location = self.tile_location(&encode(row, col, depth));
            let entry = self
                .cache
                .get_or_load(&location, || self.repo.read_tile(&location))
                .await;

            if let CachedTile::Loaded(raster) = entry {
                if depth < self.depth {
                    debug!(requested = self.depth, answered = depth, "sampled from parent quadrant");
                }
                let x = ((tu - col as f64) * ts).floor() as i64;
                let y = ((tv - row as f64) * ts).floor() as i64;
                return match raster.get_wrapped(x, y, band) {
                    Ok(value) => value,
                    Err(e) => {
                        warn!(tile = %location, x, y, error = %e, "pixel access failed, using default");
                        0.0
                    }
                };
            }
        }
        0.0
    }
}
