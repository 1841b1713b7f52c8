//! Layer build integration tests.
//!
//! Tests verify:
//! - Reducing a level approximates the 2x2 average of the finer level
//! - Rebuild populates every level down to the requested minimum
//! - Parallel and sequential builds store identical tiles
//! - One failing tile does not stop its siblings

use std::sync::Arc;

use tile_pyramid::error::{BuildError, TransformError};
use tile_pyramid::{
    BoxFilter, BuildOptions, NearestUpscale, PixelTransform, PyramidLevel, Raster,
    TileRepository, TileScheduler, TileStore,
};

use super::test_utils::{
    blobs_under, gradient, png_repo, seed_level, tile_id, tile_id_image, FlakyStore,
};

// =============================================================================
// Reduce and Rebuild
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reduce_approximates_block_average() {
    let (_, repo) = png_repo();
    let image = gradient(16, 16);
    let fine = PyramidLevel::new(4, 2, 1.0, "");
    seed_level(&repo, &fine, image.clone()).await;

    let coarse = fine.with_level(1);
    coarse
        .reduce_layer(&repo, &TileScheduler::new(4), true, Arc::new(BoxFilter))
        .await
        .unwrap();

    // Sample the reduced level at its pixel centres
    let sampler = coarse.sampler(&repo);
    for y in 0..8 {
        for x in 0..8 {
            let (u, v) = ((x as f64 + 0.5) / 8.0, (y as f64 + 0.5) / 8.0);
            assert_eq!(sampler.source_level(u, v).await, Some(1));
            for band in 0..3 {
                let expected = (image.get(2 * x, 2 * y, band).unwrap()
                    + image.get(2 * x + 1, 2 * y, band).unwrap()
                    + image.get(2 * x, 2 * y + 1, band).unwrap()
                    + image.get(2 * x + 1, 2 * y + 1, band).unwrap())
                    / 4.0;
                let actual = sampler.sample(u, v, band).await;
                assert!(
                    (actual - expected).abs() <= 0.5,
                    "pixel ({x}, {y}) band {band}: {actual} vs {expected}"
                );
            }
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_rebuild_populates_every_level() {
    let (store, repo) = png_repo();
    // 32 x 16 pixels at level 3: 8 x 4 tiles
    let top = PyramidLevel::new(4, 3, 0.5, "pano/");
    seed_level(&repo, &top, gradient(32, 16)).await;

    let reports = top
        .rebuild(&repo, &TileScheduler::new(3), 0, true)
        .await
        .unwrap();
    let levels: Vec<u32> = reports.iter().map(|r| r.level).collect();
    assert_eq!(levels, vec![2, 1, 0]);

    for level in 0..=3 {
        let level = top.with_level(level);
        for (row, col) in level.tiles() {
            let location = level.tile_location(row, col, "png");
            assert!(store.exists(&location).await.unwrap(), "missing {location}");
        }
    }
    // 32 + 8 + 2 + 1 tiles
    assert_eq!(store.len().await, 43);
}

#[tokio::test]
async fn test_rebuild_continues_past_incomplete_layer() {
    let store = Arc::new(FlakyStore::new());
    let repo = TileRepository::new(store.clone()).with_codec(tile_pyramid::TileCodec::png());
    let top = PyramidLevel::new(4, 2, 1.0, "");
    seed_level(&repo, &top, gradient(16, 16)).await;

    store.fail_put("1_0_0.png");
    let err = top
        .rebuild(&repo, &TileScheduler::new(2), 0, false)
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::LayerIncomplete { level: 1, failed: 1, total: 4 }));

    // Level 0 was still built
    assert!(store.inner().exists("0_0_0.png").await.unwrap());
    assert!(store.inner().exists("1_1_1.png").await.unwrap());
}

// =============================================================================
// Parallel vs Sequential
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_and_sequential_builds_match() {
    let (store, repo) = png_repo();
    let base = PyramidLevel::new(4, 1, 1.0, "base/");
    seed_level(&repo, &base, gradient(8, 8)).await;

    let transform: Arc<dyn PixelTransform> = Arc::new(NearestUpscale::new(4));
    for (prefix, parallel) in [("seq/", false), ("par/", true)] {
        let options = BuildOptions {
            scale_jump: 2,
            padding: 2,
            parallel,
            output_prefix: Some(prefix.to_string()),
        };
        let report = base
            .build_new_layer(&repo, &TileScheduler::new(4), &options, transform.clone())
            .await
            .unwrap();
        assert_eq!(report.tiles, 4);
    }

    let sequential = blobs_under(&store, "seq/").await;
    let parallel = blobs_under(&store, "par/").await;
    // Levels 2 and 3: 16 + 64 tiles
    assert_eq!(sequential.len(), 80);
    assert_eq!(sequential, parallel);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_and_sequential_render_match() {
    let (store, repo) = png_repo();
    let fine = PyramidLevel::new(4, 3, 1.0, "");
    seed_level(&repo, &fine, gradient(32, 32)).await;

    let sequential = fine.with_level(2).with_prefix("seq/");
    let parallel = fine.with_level(2).with_prefix("par/");
    for (target, flag) in [(&sequential, false), (&parallel, true)] {
        // Nearest-neighbour resampling of the finer level
        let sampler = Arc::new(tile_pyramid::ValueSampler::from(fine.sampler(&repo)));
        target
            .render_layer(&repo, &TileScheduler::new(4), sampler, flag)
            .await
            .unwrap();
    }

    assert_eq!(blobs_under(&store, "seq/").await, blobs_under(&store, "par/").await);
}

// =============================================================================
// Failure Isolation
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_transform_failure_is_isolated() {
    let (store, repo) = png_repo();
    let base = PyramidLevel::new(4, 1, 1.0, "");
    seed_level(&repo, &base, tile_id_image(&base)).await;

    let poisoned = tile_id(1, 0);
    let transform = move |input: Raster| -> Result<Raster, TransformError> {
        if input.get(0, 0, 0).map_err(|e| TransformError::new(e.to_string()))? == poisoned {
            return Err(TransformError::new("diverged"));
        }
        NearestUpscale::new(2).apply(input)
    };

    let options = BuildOptions {
        scale_jump: 1,
        output_prefix: Some("out/".to_string()),
        ..BuildOptions::default()
    };
    let err = base
        .build_new_layer(&repo, &TileScheduler::new(4), &options, Arc::new(transform))
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::LayerIncomplete { level: 1, failed: 1, total: 4 }));

    let children = base.with_prefix("out/").with_level(2);
    for (row, col) in children.tiles() {
        let stored = store
            .exists(&children.tile_location(row, col, "png"))
            .await
            .unwrap();
        let from_poisoned = (row / 2, col / 2) == (1, 0);
        assert_eq!(stored, !from_poisoned, "child ({row}, {col})");
    }
}

#[tokio::test]
async fn test_failed_child_write_keeps_siblings() {
    let store = Arc::new(FlakyStore::new());
    let repo = TileRepository::new(store.clone()).with_codec(tile_pyramid::TileCodec::png());
    let base = PyramidLevel::new(4, 0, 1.0, "");
    seed_level(&repo, &base, gradient(4, 4)).await;

    store.fail_put("1_0_1.png");
    let err = base
        .build_new_layer(
            &repo,
            &TileScheduler::new(1),
            &BuildOptions {
                scale_jump: 1,
                parallel: false,
                ..BuildOptions::default()
            },
            Arc::new(NearestUpscale::new(2)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, BuildError::LayerIncomplete { level: 0, failed: 1, total: 1 }));

    // The other three children of the same source tile were stored
    let inner = store.inner();
    assert!(inner.exists("1_0_0.png").await.unwrap());
    assert!(!inner.exists("1_0_1.png").await.unwrap());
    assert!(inner.exists("1_1_0.png").await.unwrap());
    assert!(inner.exists("1_1_1.png").await.unwrap());
}

// =============================================================================
// Enlarge
// =============================================================================

#[tokio::test]
async fn test_enlarged_levels_resample_sources() {
    let (_, repo) = png_repo();
    let base = PyramidLevel::new(4, 1, 1.0, "");
    let image = gradient(8, 8);
    seed_level(&repo, &base, image.clone()).await;

    let options = BuildOptions {
        scale_jump: 2,
        padding: 1,
        parallel: false,
        output_prefix: None,
    };
    base.build_new_layer(&repo, &TileScheduler::new(1), &options, Arc::new(NearestUpscale::new(4)))
        .await
        .unwrap();

    // Every level-3 pixel maps back to the base pixel it was enlarged from
    let level3 = base.with_level(3).sampler(&repo);
    for y in 0..32 {
        for x in 0..32 {
            let (u, v) = ((x as f64 + 0.5) / 32.0, (y as f64 + 0.5) / 32.0);
            assert_eq!(level3.source_level(u, v).await, Some(3));
            assert_eq!(level3.sample(u, v, 0).await, image.get(x / 4, y / 4, 0).unwrap());
        }
    }
}
