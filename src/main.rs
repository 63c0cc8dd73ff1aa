//! Replay host: renders an eyewear overlay onto a still frame from recorded
//! detection cycles and writes the composite as PNG.

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{info, warn};
use std::{
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tryon_overlay::{
    compositor::flatten,
    config::{Config, EXAMPLE_CONFIG},
    replay::{FileAssetLoader, ReplayDetector, StillCamera},
    session::{Collaborators, FrameOutcome, TryOnSession},
    settings::{SettingsCatalog, TargetSettings},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Still video frame (PNG or JPEG)
    #[arg(short, long, required_unless_present = "example_config")]
    frame: Option<PathBuf>,

    /// YAML script of detection cycles
    #[arg(short = 'D', long, required_unless_present = "example_config")]
    detections: Option<PathBuf>,

    /// Overlay image, used when no catalog is given
    #[arg(short, long)]
    overlay: Option<PathBuf>,

    /// YAML catalog of try-on targets keyed by id
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Directory overlay sources in the catalog are relative to
    #[arg(long, default_value = ".")]
    assets: PathBuf,

    /// Try-on target id
    #[arg(short, long, default_value = "default")]
    target: String,

    /// Filter type override (exponential, exponential:<factor>, none)
    #[arg(long)]
    filter: Option<String>,

    /// Simulated time between detection cycles in milliseconds
    #[arg(long, default_value = "33")]
    frame_interval_ms: u64,

    /// Output PNG path
    #[arg(long, default_value = "tryon.png")]
    output: PathBuf,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Print an example configuration and exit
    #[arg(long)]
    example_config: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    if args.example_config {
        print!("{EXAMPLE_CONFIG}");
        return Ok(());
    }

    info!("Virtual try-on overlay replay");

    let mut config = if let Some(config_path) = &args.config {
        info!("Loading configuration from: {}", config_path.display());
        match Config::from_file(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("Failed to load config file: {e}. Using defaults.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };
    if let Some(filter) = args.filter.clone() {
        config.smoothing.filter = filter;
    }

    let (Some(frame_path), Some(detections_path)) = (&args.frame, &args.detections) else {
        bail!("--frame and --detections are required");
    };

    let camera = StillCamera::from_file(frame_path)
        .with_context(|| format!("Failed to load frame {}", frame_path.display()))?;
    let frame = camera.frame().clone();

    let detector = ReplayDetector::from_file(detections_path)
        .with_context(|| format!("Failed to load detections {}", detections_path.display()))?;
    let cycles = detector.remaining();

    let (settings, asset_root) = build_catalog(&args)?;

    let mut session = TryOnSession::new(
        config,
        Collaborators {
            camera: Box::new(camera),
            detector: Box::new(detector),
            settings: Box::new(settings),
            assets: Box::new(FileAssetLoader::new(asset_root)),
        },
    )?;

    if let Err(e) = session.open(&args.target).await {
        if let Some(view) = session.error_view() {
            warn!("{} [{}]", view.message, view.retry_text);
        }
        return Err(e).context("Failed to open try-on session");
    }
    if let Some(warning) = session.asset_warning() {
        warn!("{warning}");
    }
    if let Some(name) = session.target_name() {
        info!("Trying on {name}");
    }

    let start = Instant::now();
    let interval = Duration::from_millis(args.frame_interval_ms);
    let mut tracked = 0usize;
    for cycle in 0..cycles {
        let now = start + interval * u32::try_from(cycle).unwrap_or(u32::MAX);
        if let FrameOutcome::Rendered(_) = session.process_frame(&frame, now).await? {
            tracked += 1;
        }
    }
    info!("Replayed {cycles} cycles, face tracked in {tracked}");

    let guidance = session.guidance();
    info!("Guidance ({:?}, opacity {}): {}", guidance.style, guidance.opacity, guidance.text);

    let composite = match session.surface() {
        Some(surface) => flatten(&frame, surface)?,
        None => frame,
    };
    composite
        .save(&args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!("Wrote {}", args.output.display());

    session.close().await;
    Ok(())
}

/// Catalog from `--catalog`, or a single-target catalog for `--overlay`
fn build_catalog(args: &Args) -> Result<(SettingsCatalog, PathBuf)> {
    if let Some(catalog_path) = &args.catalog {
        let catalog = SettingsCatalog::from_file(catalog_path)
            .with_context(|| format!("Failed to load catalog {}", catalog_path.display()))?;
        info!("Loaded {} try-on targets", catalog.len());
        return Ok((catalog, args.assets.clone()));
    }

    let Some(overlay) = &args.overlay else {
        bail!("Either --catalog or --overlay is required");
    };
    let root = overlay.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file_name = overlay
        .file_name()
        .with_context(|| format!("Invalid overlay path {}", overlay.display()))?
        .to_string_lossy()
        .into_owned();

    let mut catalog = SettingsCatalog::new();
    catalog.insert(
        args.target.clone(),
        TargetSettings {
            name: file_name.clone(),
            overlay_source: file_name,
            appearance: None,
        },
    );
    Ok((catalog, root))
}
