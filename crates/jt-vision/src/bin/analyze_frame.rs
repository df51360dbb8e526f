//! CLI tool to run the icon matcher against a saved capture.
//! Usage: cargo run -p jt-vision --features cli --bin analyze_frame -- <frame.png> <champion> <team> [overlay_scale] [options]
//!
//! With `overlay_scale`, the image is treated as a full game-window screenshot
//! and the minimap region is cropped out first. Without it, the image is
//! assumed to be an already-cropped minimap capture.
//!
//! `--config` replays against the matcher and alias sections of a tracker
//! config file. `--assets`, `--method` and `--threshold` override single fields.

use anyhow::{Context, Result};
use jt_capture::{crop_frame, CaptureGeometry};
use jt_vision::{replay, ReplayOptions, TemplateMatcher};
use std::sync::Arc;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| "analyze_frame".to_string());
    let opts = match ReplayOptions::parse(args) {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("{}\nUsage: {} {}", e, program, replay::USAGE);
            std::process::exit(1);
        }
    };
    let (settings, aliases) = opts.resolve()?;
    let input_path = &opts.frame;
    let champion = &opts.champion;
    let team = opts.team;

    println!("Loading image: {}", input_path.display());
    let img = image::open(&input_path)
        .with_context(|| format!("Failed to open {}", input_path.display()))?
        .to_rgba8();
    println!("Image size: {}x{}", img.width(), img.height());

    let frame = match opts.overlay_scale {
        Some(scale) => {
            let geometry = CaptureGeometry::from_scale(scale);
            println!(
                "Cropping minimap: region {} capture {}",
                geometry.region_size, geometry.capture_size
            );
            crop_frame(&img, geometry)?
        }
        None => img,
    };

    println!(
        "Matcher: {} threshold {} assets {}",
        settings.method,
        settings.threshold,
        settings.assets_dir.display()
    );
    let mut matcher = TemplateMatcher::new(&settings, Arc::new(aliases));
    if !matcher.set_template(champion, team) {
        anyhow::bail!(
            "No template for {} ({}) under {}",
            champion,
            team,
            settings.assets_dir.display()
        );
    }
    println!("{}", matcher.template_info());

    println!("\n=== Match ===");
    match matcher.evaluate(&frame) {
        Some(result) => println!(
            "best score {:.4} at ({}, {}) threshold {} -> {}",
            result.score,
            result.location.x,
            result.location.y,
            matcher.threshold(),
            if result.found { "FOUND" } else { "not found" }
        ),
        None => println!("Frame smaller than template, nothing scanned"),
    }
    Ok(())
}
