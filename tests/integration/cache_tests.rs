//! Cache effectiveness integration tests.
//!
//! Tests verify:
//! - Concurrent samples of one tile fetch and decode it once
//! - Missing tiles are looked up once, then answered from the sentinel
//! - Transient store failures are retried rather than remembered
//! - Samplers can share one cache across levels

use std::sync::Arc;

use tokio::task::JoinSet;

use tile_pyramid::{CacheLookup, PyramidLevel, PyramidSampler, TileCodec, TileRepository};

use super::test_utils::{gradient, png_repo, seed_level, tile_id, tile_id_image, FlakyStore};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_samples_load_each_tile_once() {
    let (store, repo) = png_repo();
    let level = PyramidLevel::new(4, 1, 1.0, "");
    let image = gradient(8, 8);
    seed_level(&repo, &level, image.clone()).await;
    assert_eq!(store.read_count(), 0);

    let sampler = Arc::new(level.sampler(&repo));
    let mut tasks = JoinSet::new();
    for _ in 0..32 {
        let sampler = sampler.clone();
        let image = image.clone();
        tasks.spawn(async move {
            for y in 0..8 {
                for x in 0..8 {
                    let (u, v) = ((x as f64 + 0.5) / 8.0, (y as f64 + 0.5) / 8.0);
                    assert_eq!(sampler.sample(u, v, 2).await, image.get(x, y, 2).unwrap());
                }
            }
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.unwrap();
    }

    assert_eq!(store.read_count(), 4);
    assert_eq!(sampler.cache().len().await, 4);
}

#[tokio::test]
async fn test_missing_tiles_are_read_once() {
    let (store, repo) = png_repo();
    let top = PyramidLevel::new(4, 3, 1.0, "");
    let coarse = top.with_level(1);
    seed_level(&repo, &coarse, tile_id_image(&coarse)).await;

    let sampler = top.sampler(&repo);
    for _ in 0..2 {
        for row in 0..8 {
            for col in 0..8 {
                let (u, v) = ((col as f64 + 0.5) / 8.0, (row as f64 + 0.5) / 8.0);
                assert_eq!(sampler.sample(u, v, 0).await, tile_id(row / 4, col / 4));
            }
        }
    }

    // 64 misses at level 3, 16 at level 2, 4 hits at level 1
    assert_eq!(store.read_count(), 84);
    assert!(matches!(
        sampler.cache().lookup(&top.tile_location(0, 0, "png")).await,
        CacheLookup::NotFound
    ));
    assert!(matches!(
        sampler.cache().lookup(&coarse.tile_location(0, 0, "png")).await,
        CacheLookup::Hit(_)
    ));
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let store = Arc::new(FlakyStore::new());
    let repo = TileRepository::new(store.clone()).with_codec(TileCodec::png());
    let fine = PyramidLevel::new(4, 1, 1.0, "");
    let coarse = fine.with_level(0);
    seed_level(&repo, &fine, tile_id_image(&fine)).await;
    seed_level(&repo, &coarse, gradient(4, 4)).await;

    store.fail_get("1_0_0.png");
    let sampler = fine.sampler(&repo);

    // Unreachable tile: the coarser level answers for now
    assert_eq!(sampler.source_level(0.1, 0.1).await, Some(0));
    assert!(store.get_failures() >= 1);
    assert!(matches!(
        sampler.cache().lookup("1_0_0.png").await,
        CacheLookup::Miss
    ));

    store.heal("1_0_0.png");
    assert_eq!(sampler.source_level(0.1, 0.1).await, Some(1));
    assert_eq!(sampler.sample(0.1, 0.1, 0).await, tile_id(0, 0));
}

#[tokio::test]
async fn test_samplers_share_a_cache_across_levels() {
    let (store, repo) = png_repo();
    let top = PyramidLevel::new(4, 2, 1.0, "");
    let coarse = top.with_level(1);
    seed_level(&repo, &coarse, tile_id_image(&coarse)).await;

    let cache = repo.new_cache();
    let fine_sampler = PyramidSampler::with_cache(top.clone(), repo.clone(), cache.clone());
    let coarse_sampler = PyramidSampler::with_cache(coarse.clone(), repo.clone(), cache.clone());

    // Level 2 miss, level 1 hit
    fine_sampler.sample(0.1, 0.1, 0).await;
    assert_eq!(store.read_count(), 2);

    // Already cached by the level-2 sampler's fallback
    assert_eq!(coarse_sampler.sample(0.1, 0.1, 0).await, tile_id(0, 0));
    assert_eq!(store.read_count(), 2);
    assert_eq!(cache.len().await, 2);

    cache.clear().await;
    assert!(cache.is_empty().await);
    coarse_sampler.sample(0.1, 0.1, 0).await;
    assert_eq!(store.read_count(), 3);
}
