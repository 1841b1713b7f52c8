//! Tile Pyramid - build and resample multiresolution image pyramids.
//!
//! This binary wires a tile store, codec and scheduler together and runs one
//! pyramid operation.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_pyramid::{
    config::{Cli, Command, DescribeArgs, EnlargeArgs, ImportArgs, RebuildArgs, StoreTarget},
    create_s3_client, BuildOptions, FsStore, NearestUpscale, PixelTransform, Raster,
    RasterSampler, S3Store, TileRepository, TileSourceDescriptor, TileStore, ValueSampler,
    DEFAULT_BANDS,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    if let Err(e) = cli.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match &cli.command {
        Command::Describe(args) => run_describe(&cli, args),
        Command::Import(args) => match open_repository(&cli).await {
            Ok(repo) => run_import(&cli, &repo, args).await,
            Err(e) => Err(e),
        },
        Command::Rebuild(args) => match open_repository(&cli).await {
            Ok(repo) => run_rebuild(&cli, &repo, args).await,
            Err(e) => Err(e),
        },
        Command::Enlarge(args) => match open_repository(&cli).await {
            Ok(repo) => run_enlarge(&cli, &repo, args).await,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Store Setup
// =============================================================================

async fn open_repository(cli: &Cli) -> Result<TileRepository, String> {
    let store: Arc<dyn TileStore> = match cli.store.target()? {
        StoreTarget::Local(root) => {
            info!("Tile store: {}", root.display());
            Arc::new(FsStore::new(root))
        }
        StoreTarget::S3 {
            bucket,
            endpoint,
            region,
        } => {
            info!("Tile store: s3://{}", bucket);
            if let Some(ref endpoint) = endpoint {
                info!("  S3 endpoint: {}", endpoint);
            }
            info!("  S3 region: {}", region);
            let client = create_s3_client(endpoint.as_deref(), &region).await;
            Arc::new(S3Store::new(client, bucket))
        }
    };

    info!("  Prefix: {:?}", cli.store.prefix);
    info!("  Tile size: {}", cli.pyramid.tile_size);
    info!("  Format: {}", cli.pyramid.codec().extension());

    Ok(TileRepository::new(store)
        .with_codec(cli.pyramid.codec())
        .with_cache_capacity(cli.pyramid.cache_tiles))
}

// =============================================================================
// Commands
// =============================================================================

fn run_describe(cli: &Cli, args: &DescribeArgs) -> Result<(), String> {
    let descriptor = TileSourceDescriptor::for_levels(
        cli.pyramid.tile_size,
        cli.pyramid.aspect,
        args.min_level,
        args.max_level,
        args.url_prefix.clone(),
    );
    let json = descriptor.to_json().map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

async fn run_import(cli: &Cli, repo: &TileRepository, args: &ImportArgs) -> Result<(), String> {
    let raster = load_image(args.image.clone()).await?;
    let image_aspect = raster.height() as f64 / raster.width().max(1) as f64;
    if (image_aspect - cli.pyramid.aspect).abs() > 1e-3 {
        warn!(
            image_aspect,
            configured = cli.pyramid.aspect,
            "image aspect differs from the pyramid aspect, tiles will be resampled"
        );
    }

    let level = cli.pyramid.level(args.level, &cli.store.prefix);
    info!(
        "Importing {} into level {} ({} x {} tiles)",
        args.image.display(),
        args.level,
        level.width_tiles(),
        level.height_tiles()
    );

    let sampler = Arc::new(ValueSampler::from(RasterSampler::direct(Arc::new(raster))));
    let report = level
        .render_layer(repo, &cli.pyramid.scheduler(), sampler, cli.pyramid.parallel())
        .await
        .map_err(|e| e.to_string())?;

    info!("Wrote {} tiles", report.tiles);
    Ok(())
}

async fn run_rebuild(cli: &Cli, repo: &TileRepository, args: &RebuildArgs) -> Result<(), String> {
    let top = cli.pyramid.level(args.level, &cli.store.prefix);
    info!("Rebuilding levels {}..{} from level {}", args.min_level, args.level, args.level);

    let reports = top
        .rebuild(repo, &cli.pyramid.scheduler(), args.min_level, cli.pyramid.parallel())
        .await
        .map_err(|e| e.to_string())?;

    for report in reports {
        info!("  Level {}: {} tiles", report.level, report.tiles);
    }
    Ok(())
}

async fn run_enlarge(cli: &Cli, repo: &TileRepository, args: &EnlargeArgs) -> Result<(), String> {
    let source = cli.pyramid.level(args.level, &cli.store.prefix);
    let options = BuildOptions {
        scale_jump: args.scale_jump,
        padding: args.padding,
        parallel: cli.pyramid.parallel(),
        output_prefix: args.output_prefix.clone(),
    };
    // One source tile covers 2^jump child tiles per axis at the finest level
    let transform: Arc<dyn PixelTransform> = Arc::new(NearestUpscale::new(1 << args.scale_jump));

    info!(
        "Enlarging level {} into levels {}..={}",
        args.level,
        args.level + 1,
        args.level + args.scale_jump
    );

    let report = source
        .build_new_layer(repo, &cli.pyramid.scheduler(), &options, transform)
        .await
        .map_err(|e| e.to_string())?;

    info!("Enlarged {} source tiles", report.tiles);
    Ok(())
}

async fn load_image(path: PathBuf) -> Result<Raster, String> {
    let display = path.display().to_string();
    let img = tokio::task::spawn_blocking(move || image::open(&path))
        .await
        .map_err(|e| format!("Image loader failed: {}", e))?
        .map_err(|e| format!("Failed to open {}: {}", display, e))?;
    Ok(Raster::from_dynamic_image(&img, DEFAULT_BANDS))
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tile_pyramid=debug"
    } else {
        "tile_pyramid=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
