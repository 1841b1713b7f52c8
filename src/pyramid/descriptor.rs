//! Tile-source descriptor for external viewers.
//!
//! This is the one contract the pyramid honours towards a viewer: the image
//! size at the finest level, the tile size, the level range, and the rule that
//! turns `(level, x, y)` into a tile URL. Note the viewer convention puts the
//! column (`x`) last in the name, matching `{level}_{row}_{col}`.
//!
//! # Example Output
//!
//! ```json
//! {
//!   "height": 1024,
//!   "width": 2048,
//!   "tileSize": 256,
//!   "minLevel": 0,
//!   "maxLevel": 3,
//!   "urlPrefix": "https://tiles.example.com/pano/"
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::level::PyramidLevel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileSourceDescriptor {
    pub height: u64,
    pub width: u64,
    pub tile_size: u32,
    pub min_level: u32,
    pub max_level: u32,
    pub url_prefix: String,
}

impl TileSourceDescriptor {
    /// Describe levels `min_level..=max_level` of a pyramid.
    ///
    /// Width and height are those of the image at `max_level`, which is
    /// clamped to [`MAX_LEVEL`](super::MAX_LEVEL).
    pub fn for_levels(
        tile_size: u32,
        aspect: f64,
        min_level: u32,
        max_level: u32,
        url_prefix: impl Into<String>,
    ) -> Self {
        let finest = PyramidLevel::new(tile_size, max_level, aspect, "");
        let max_level = finest.level();
        Self {
            height: finest.height_px(),
            width: finest.width_px(),
            tile_size,
            min_level: min_level.min(max_level),
            max_level,
            url_prefix: url_prefix.into(),
        }
    }

    /// URL of tile column `x`, row `y` at `level`.
    pub fn tile_url(&self, level: u32, x: u32, y: u32) -> String {
        format!("{}{}_{}_{}.jpg", self.url_prefix, level, y, x)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
