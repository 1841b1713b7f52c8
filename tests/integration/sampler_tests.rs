//! Sampling integration tests.
//!
//! Tests verify:
//! - Samples outside the image plane equal their wrapped equivalents
//! - A fully populated level answers every sample itself
//! - Fallback chains correctly across several missing levels
//! - Corrupt tiles are treated like missing ones
//! - Quadtree-coded tiles sample like the equivalent pyramid level

use std::sync::Arc;

use bytes::Bytes;

use tile_pyramid::sampler::quadtree;
use tile_pyramid::{PyramidLevel, QuadtreeSampler, TileStore, ValueSampler};

use super::test_utils::{gradient, png_repo, seed_level, tile_id, tile_id_image};

/// Pixel-centre coordinates of a `width × height` pixel grid over `[0,1) × [0,aspect)`.
fn pixel_centres(width: usize, height: usize) -> Vec<(f64, f64)> {
    let mut points = Vec::new();
    for j in 0..height {
        for i in 0..width {
            points.push(((i as f64 + 0.5) / width as f64, (j as f64 + 0.5) / width as f64));
        }
    }
    points
}

// =============================================================================
// Wraparound
// =============================================================================

#[tokio::test]
async fn test_wraparound_idempotence() {
    let (_, repo) = png_repo();
    // 16 x 8 pixels at level 2 with 4-pixel tiles
    let level = PyramidLevel::new(4, 2, 0.5, "pano/");
    seed_level(&repo, &level, gradient(16, 8)).await;

    let sampler = level.sampler(&repo);
    for (u, v) in pixel_centres(16, 8) {
        for band in 0..3 {
            let inside = sampler.sample(u, v, band).await;
            for (du, dv) in [(1.0, 0.0), (-1.0, 0.5), (3.0, -1.5), (-7.0, 2.0)] {
                assert_eq!(
                    sampler.sample(u + du, v + dv, band).await,
                    inside,
                    "({u}, {v}) shifted by ({du}, {dv})"
                );
            }
        }
    }
}

#[tokio::test]
async fn test_non_finite_coordinates_are_total() {
    let (_, repo) = png_repo();
    let level = PyramidLevel::new(4, 1, 1.0, "");
    let image = gradient(8, 8);
    seed_level(&repo, &level, image.clone()).await;

    let sampler = level.sampler(&repo);
    // Non-finite coordinates map to the origin
    assert_eq!(
        sampler.sample(f64::NAN, f64::INFINITY, 0).await,
        image.get(0, 0, 0).unwrap()
    );
}

// =============================================================================
// Fallback
// =============================================================================

#[tokio::test]
async fn test_full_level_never_falls_back() {
    let (_, repo) = png_repo();
    let image = gradient(16, 16);
    let level = PyramidLevel::new(4, 2, 1.0, "");
    seed_level(&repo, &level, image.clone()).await;
    // A coarser level with different content must never be consulted
    seed_level(&repo, &level.with_level(1), gradient(8, 8)).await;

    let sampler = level.sampler(&repo);
    for j in 0..16 {
        for i in 0..16 {
            let (u, v) = ((i as f64 + 0.5) / 16.0, (j as f64 + 0.5) / 16.0);
            assert_eq!(sampler.source_level(u, v).await, Some(2));
            assert_eq!(sampler.sample(u, v, 1).await, image.get(i, j, 1).unwrap());
        }
    }
}

#[tokio::test]
async fn test_fallback_across_multiple_missing_levels() {
    let (_, repo) = png_repo();
    let top = PyramidLevel::new(4, 4, 1.0, "");

    // Only level 1 is populated, plus a single tile of level 3
    let coarse = top.with_level(1);
    seed_level(&repo, &coarse, tile_id_image(&coarse)).await;

    let level3 = top.with_level(3);
    let fine_tile = tile_pyramid::Raster::from_fn(4, 4, 3, |_, _, _| 200.0);
    repo.write_tile(&level3.tile_location(2, 5, "png"), &fine_tile)
        .await
        .unwrap();

    let sampler = top.sampler(&repo);

    // Inside level-3 tile (2, 5): levels 4 missing, 3 present
    let (u, v) = ((5.0 + 0.5) / 8.0, (2.0 + 0.5) / 8.0);
    assert_eq!(sampler.source_level(u, v).await, Some(3));
    assert_eq!(sampler.sample(u, v, 0).await, 200.0);

    // Elsewhere: levels 4, 3 and 2 missing, level 1 answers
    for (u, v, row, col) in [(0.1, 0.1, 0, 0), (0.9, 0.2, 0, 1), (0.3, 0.8, 1, 0), (0.6, 0.6, 1, 1)] {
        assert_eq!(sampler.source_level(u, v).await, Some(1));
        assert_eq!(sampler.sample(u, v, 2).await, tile_id(row, col));
    }
}

#[tokio::test]
async fn test_empty_pyramid_samples_zero_everywhere() {
    let (_, repo) = png_repo();
    let sampler = ValueSampler::from(PyramidLevel::new(8, 3, 0.5, "void/").sampler(&repo));
    for (u, v) in [(0.0, 0.0), (0.5, 0.25), (-3.2, 9.9)] {
        assert_eq!(sampler.sample(u, v, 0).await, 0.0);
    }
}

#[tokio::test]
async fn test_corrupt_tile_falls_back() {
    let (store, repo) = png_repo();
    let coarse = PyramidLevel::new(4, 0, 1.0, "");
    seed_level(&repo, &coarse, tile_id_image(&coarse)).await;

    let fine = coarse.with_level(1);
    store
        .put(&fine.tile_location(0, 0, "png"), Bytes::from_static(b"\x89PNG truncated"))
        .await
        .unwrap();

    let sampler = fine.sampler(&repo);
    assert_eq!(sampler.source_level(0.1, 0.1).await, Some(0));
    assert_eq!(sampler.sample(0.1, 0.1, 0).await, tile_id(0, 0));
}

// =============================================================================
// Quadtree-Coded Tiles
// =============================================================================

#[tokio::test]
async fn test_quadtree_sampler_matches_pyramid_level() {
    let (_, repo) = png_repo();
    let image = gradient(16, 16);
    let level = PyramidLevel::new(4, 2, 1.0, "grid/");
    seed_level(&repo, &level, image.clone()).await;

    // Re-store the same tiles under quadrant-letter names
    let direct = ValueSampler::from(tile_pyramid::RasterSampler::direct(image));
    for (row, col) in level.tiles() {
        let tile = level.render_tile(row, col, &direct).await;
        let location = format!("quad/{}.png", quadtree::encode(row, col, 2));
        repo.write_tile(&location, &tile).await.unwrap();
    }

    let pyramid = level.sampler(&repo);
    let coded = QuadtreeSampler::new("quad/", 2, 4, repo.clone());
    for (u, v) in pixel_centres(16, 16) {
        assert_eq!(coded.sample(u, v, 0).await, pyramid.sample(u, v, 0).await);
    }
}

#[tokio::test]
async fn test_quadtree_sampler_falls_back_to_parent_quadrants() {
    let (_, repo) = png_repo();
    let solid = |value: f32| tile_pyramid::Raster::from_fn(4, 4, 3, move |_, _, _| value);

    repo.write_tile("qt/.png", &solid(1.0)).await.unwrap();
    repo.write_tile("qt/r.png", &solid(2.0)).await.unwrap();
    repo.write_tile("qt/rt.png", &solid(3.0)).await.unwrap();

    let sampler = Arc::new(QuadtreeSampler::new("qt/", 3, 4, repo));
    // Quadrant "rt": top-right, then its bottom-left
    assert_eq!(sampler.sample(0.6, 0.3, 0).await, 3.0);
    // Elsewhere in "r"
    assert_eq!(sampler.sample(0.9, 0.1, 0).await, 2.0);
    // Outside "r"
    assert_eq!(sampler.sample(0.2, 0.7, 0).await, 1.0);
}
