mod app;
mod scene;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use batch2d::BatchConfig;
use clap::Parser;
use log::info;
use winit::event_loop::EventLoop;

use app::{DemoApp, DemoSettings};

#[derive(Parser, Debug)]
#[command(name = "batch2d-demo", about = "Sprite batching stress test")]
struct Args {
    /// Number of sprites drawn each frame.
    #[arg(long, default_value_t = 20_000)]
    quads: usize,

    /// Distinct textures spread over the sprites. More than the slot
    /// limit forces texture-slot flushes.
    #[arg(long, default_value_t = 8)]
    textures: usize,

    /// Batch configuration JSON. Missing file means defaults.
    #[arg(long, env = "BATCH2D_CONFIG")]
    config: Option<PathBuf>,

    /// Write the effective batch configuration to this path and exit.
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Image used as the first sprite texture.
    #[arg(long)]
    texture: Option<PathBuf>,

    #[arg(long, default_value_t = 1280)]
    width: u32,

    #[arg(long, default_value_t = 720)]
    height: u32,

    /// Seed for sprite placement.
    #[arg(long, default_value_t = 1)]
    seed: u64,
}

/// Decode an image file into tightly packed RGBA8.
fn load_rgba(path: &Path) -> Result<(u32, u32, Vec<u8>)> {
    let img = image::open(path)
        .with_context(|| format!("failed to load texture {}", path.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok((width, height, img.into_raw()))
}

fn load_batch_config(path: Option<&Path>) -> Result<BatchConfig> {
    let config = match path {
        Some(path) => BatchConfig::load_from(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => BatchConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let batch = load_batch_config(args.config.as_deref())?;

    if let Some(path) = &args.save_config {
        batch.save_to(path)?;
        info!("wrote batch config to {}", path.display());
        return Ok(());
    }

    if args.textures >= batch.max_texture_slots {
        info!(
            "{} textures exceed {} free slots per draw; expect slot flushes",
            args.textures,
            batch.max_texture_slots - 1
        );
    }

    let sprite_image = args.texture.as_deref().map(load_rgba).transpose()?;
    let settings = DemoSettings {
        width: args.width,
        height: args.height,
        quads: args.quads,
        textures: args.textures,
        seed: args.seed,
        batch,
        sprite_image,
    };

    let event_loop = EventLoop::new().map_err(|e| anyhow!("failed to create event loop: {e}"))?;
    let mut app = DemoApp::new(settings);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("event loop error: {e}"))?;

    match app.take_failure() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
