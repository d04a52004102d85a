//! pyramid-tiff - Inspect, build and crop pyramidal TIFF images.

use clap::Parser;
use image::{ImageBuffer, Luma};
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pyramid_tiff::{
    config::{BuildConfig, Cli, Command, CropConfig, InfoConfig},
    CropStrategy, Layout, PixelBuffer, PyramidBuilder, PyramidLevel, SubfileKind, TagSet,
    TiffContainer, TiffVersion, COMPRESSION_NONE,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Info(config) => run_info(config),
        Command::Pyramid(config) => run_pyramid(config),
        Command::Crop(config) => run_crop(config),
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pyramid_tiff=debug"
    } else {
        "pyramid_tiff=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

// =============================================================================
// Info Command
// =============================================================================

#[derive(Serialize)]
struct InfoReport<'a> {
    path: &'a Path,
    version: TiffVersion,
    subfiles: &'a [TagSet],
    levels: Vec<PyramidLevel>,
}

fn run_info(config: InfoConfig) -> ExitCode {
    if !config.path.is_file() {
        error!("No such file: {}", config.path.display());
        return ExitCode::FAILURE;
    }

    let container = match TiffContainer::open(&config.path, TiffVersion::Classic) {
        Ok(container) => container,
        Err(e) => {
            error!("Failed to open {}: {}", config.path.display(), e);
            return ExitCode::FAILURE;
        }
    };
    let levels: Vec<PyramidLevel> = container.pyramid_levels().iter().cloned().collect();

    if config.json {
        let report = InfoReport {
            path: &config.path,
            version: container.version(),
            subfiles: container.directory().entries(),
            levels,
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    println!("{} ({:?} TIFF)", config.path.display(), container.version());
    println!();
    println!(
        "{:>4}  {:<18} {:>12}  {:>4}  {:<18} {:>6}",
        "#", "kind", "size", "bits", "layout", "level"
    );
    for (index, tags) in container.directory().iter().enumerate() {
        let level = levels
            .iter()
            .find(|l| l.subfile == index)
            .map(|l| l.level_index.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>4}  {:<18} {:>12}  {:>4}  {:<18} {:>6}",
            index,
            kind_label(tags.subfile_kind),
            format!("{}x{}", tags.image_width, tags.image_height),
            tags.bits_per_sample,
            layout_label(tags),
            level
        );
    }
    if container.directory().is_empty() {
        println!("  (no subfiles)");
    }

    ExitCode::SUCCESS
}

fn kind_label(kind: SubfileKind) -> &'static str {
    match kind {
        SubfileKind::Undefined => "full resolution",
        SubfileKind::ReducedResolution => "reduced",
        SubfileKind::Page => "page",
    }
}

fn layout_label(tags: &TagSet) -> String {
    match tags.layout() {
        Ok(Layout::Tiled {
            tile_width,
            tile_height,
        }) => format!("tiles {}x{}", tile_width, tile_height),
        Ok(Layout::Strips { rows_per_strip }) => {
            format!("strips of {}", rows_per_strip.min(tags.image_height))
        }
        Err(_) => "invalid".to_string(),
    }
}

// =============================================================================
// Pyramid Command
// =============================================================================

fn run_pyramid(config: BuildConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match build_pyramid(&config) {
        Ok(levels) => {
            info!(
                "Wrote {} level(s) to {}",
                levels,
                config.output.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Pyramid build failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_pyramid(config: &BuildConfig) -> Result<usize, pyramid_tiff::TiffError> {
    let mut source =
        TiffContainer::open_with_cache(&config.input, TiffVersion::Classic, config.cache_chunks)?;
    let mut template = source.tags(config.subfile)?.clone();
    let base = source.read_subfile(config.subfile)?;
    source.close()?;

    info!(
        input = %config.input.display(),
        subfile = config.subfile,
        width = base.width(),
        height = base.height(),
        bits = base.depth().bits(),
        "Read source image"
    );

    template.compression = COMPRESSION_NONE;
    template.subfile_kind = SubfileKind::Undefined;
    template.page = None;

    let builder = PyramidBuilder::new(config.pyramid_config()).with_template(template);
    let mut output = TiffContainer::open(&config.output, config.version())?;
    let range = output.build_pyramid_any(&base, &builder)?;
    output.close()?;
    Ok(range.len())
}

// =============================================================================
// Crop Command
// =============================================================================

fn run_crop(config: CropConfig) -> ExitCode {
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let buffer = match crop(&config) {
        Ok(buffer) => buffer,
        Err(e) => {
            error!("Crop failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let (width, height) = (buffer.width(), buffer.height());
    if let Err(e) = save_png(buffer, &config.output) {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    info!(
        "Wrote {}x{} crop to {}",
        width,
        height,
        config.output.display()
    );
    ExitCode::SUCCESS
}

fn crop(config: &CropConfig) -> Result<PixelBuffer, pyramid_tiff::TiffError> {
    let mut container =
        TiffContainer::open_with_cache(&config.path, TiffVersion::Classic, config.cache_chunks)?;
    let buffer = match config.page {
        Some(page) => container.crop(config.region(), page)?.into_buffer(),
        None => container.multi_page_crop(config.region(), CropStrategy::FitPageTile)?,
    };
    container.close()?;
    Ok(buffer)
}

/// Save a grayscale buffer as PNG, keeping its bit depth.
fn save_png(buffer: PixelBuffer, path: &Path) -> Result<(), String> {
    let (width, height) = (buffer.width(), buffer.height());
    match buffer {
        PixelBuffer::U8(raster) => {
            let img: ImageBuffer<Luma<u8>, Vec<u8>> =
                ImageBuffer::from_raw(width, height, raster.into_vec())
                    .ok_or_else(|| "buffer does not match its dimensions".to_string())?;
            img.save(path).map_err(|e| e.to_string())
        }
        PixelBuffer::U16(raster) => {
            let img: ImageBuffer<Luma<u16>, Vec<u16>> =
                ImageBuffer::from_raw(width, height, raster.into_vec())
                    .ok_or_else(|| "buffer does not match its dimensions".to_string())?;
            img.save(path).map_err(|e| e.to_string())
        }
    }
}
