//! Continuous ↔ discrete coordinate mapping.
//!
//! The full image occupies `u ∈ [0, 1)` horizontally and `v ∈ [0, aspect)`
//! vertically, independent of level. At level `L` the plane is cut into
//! `2^L` tile columns and `ceil(2^L · aspect)` tile rows, each tile
//! `tile_size` pixels square. Both axes wrap, so a panorama is seamless
//! left-to-right and top-to-bottom.

/// Integer address of a sample within a pyramid level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileAddress {
    pub row: u32,
    pub col: u32,
    /// Pixel column inside the tile raster, padding included
    pub x: i64,
    /// Pixel row inside the tile raster, padding included
    pub y: i64,
}

/// Normalize `value` into `[0, period)`.
///
/// Works for inputs arbitrarily far outside the range. Non-finite inputs (or
/// a non-positive period) map to 0.
#[inline]
pub fn wrap(value: f64, period: f64) -> f64 {
    if !value.is_finite() || period.is_nan() || period <= 0.0 {
        return 0.0;
    }
    let wrapped = value.rem_euclid(period);
    // rem_euclid can round up to `period` for tiny negative inputs
    if wrapped >= period {
        0.0
    } else {
        wrapped
    }
}

/// `2^level` as a float scale factor.
#[inline]
pub fn level_scale(level: u32) -> f64 {
    (level as f64).exp2()
}

/// Number of tile columns at `level`, saturating at `u32::MAX`.
#[inline]
pub fn tiles_wide(level: u32) -> u32 {
    1u32.checked_shl(level).unwrap_or(u32::MAX)
}

/// Number of tile rows at `level` for an image of the given aspect ratio.
#[inline]
pub fn tiles_high(level: u32, aspect: f64) -> u32 {
    ((level_scale(level) * aspect).ceil() as u32).max(1)
}

/// Map continuous coordinates to the owning tile and pixel at `level`.
///
/// `u` wraps modulo 1 and `v` modulo `aspect`. `padding` is added to the
/// in-tile pixel offset, for rasters that carry a halo around the tile.
pub fn to_tile_address(
    u: f64,
    v: f64,
    level: u32,
    aspect: f64,
    tile_size: u32,
    padding: u32,
) -> TileAddress {
    let scale = level_scale(level);
    let tu = wrap(u, 1.0) * scale;
    let tv = wrap(v, aspect) * scale;

    let col = (tu.floor() as u32).min(tiles_wide(level) - 1);
    let row = (tv.floor() as u32).min(tiles_high(level, aspect) - 1);

    let ts = tile_size as f64;
    let x = ((tu - col as f64) * ts).floor() as i64 + padding as i64;
    let y = ((tv - row as f64) * ts).floor() as i64 + padding as i64;

    TileAddress { row, col, x, y }
}

/// Continuous coordinate of pixel `(x, y)` of tile `(row, col)` at `level`.
///
/// `x` and `y` are relative to the tile's top-left corner and may be negative
/// or beyond `tile_size` when sampling a padding halo.
#[inline]
pub fn pixel_to_uv(row: u32, col: u32, x: f64, y: f64, level: u32, tile_size: u32) -> (f64, f64) {
    let scale = level_scale(level);
    let ts = tile_size as f64;
    let u = (x / ts + col as f64) / scale;
    let v = (y / ts + row as f64) / scale;
    (u, v)
}

/// Deterministic tile name: `"{level}_{row}_{col}.{ext}"`.
pub fn tile_name(level: u32, row: u32, col: u32, ext: &str) -> String {
    format!("{level}_{row}_{col}.{ext}")
}

/// Parse a tile name produced by [`tile_name`] back into `(level, row, col)`.
///
/// Any extension is accepted; a name without one is accepted too.
pub fn parse_tile_name(name: &str) -> Option<(u32, u32, u32)> {
    let stem = match name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => name,
    };

    let mut parts = stem.split('_');
    let level = parts.next()?.parse().ok()?;
    let row = parts.next()?.parse().ok()?;
    let col = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((level, row, col))
}
