use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, RgbImage};
use jt_data::{ChampionAliases, Team};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// One template pixel that takes part in matching (mask weight > 0)
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tap {
    pub dx: u32,
    pub dy: u32,
    pub weight: f64,
    pub value: [f64; 3],
    /// `value` minus the weighted per-channel template mean
    pub centered: [f64; 3],
}

/// Champion icon prepared for matching: RGB pixels plus an optional opacity mask.
///
/// Immutable once built. Weighted statistics used by the normalized metrics
/// are computed here once rather than on every scan.
#[derive(Debug, Clone)]
pub struct Template {
    rgb: RgbImage,
    mask: Option<GrayImage>,
    pub(crate) taps: Vec<Tap>,
    pub(crate) weight_sum: f64,
    /// Σ w·T² over all channels
    pub(crate) energy: f64,
    /// Σ w·(T - mean)² over all channels
    pub(crate) centered_energy: f64,
}

impl Template {
    /// Build from decoded art. An alpha channel, if present, becomes the mask.
    pub fn from_image(img: DynamicImage) -> Result<Self> {
        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            let (w, h) = rgba.dimensions();
            let rgb = RgbImage::from_fn(w, h, |x, y| {
                let p = rgba.get_pixel(x, y);
                image::Rgb([p[0], p[1], p[2]])
            });
            let mask = GrayImage::from_fn(w, h, |x, y| image::Luma([rgba.get_pixel(x, y)[3]]));
            Self::from_parts(rgb, Some(mask))
        } else {
            Self::from_parts(img.to_rgb8(), None)
        }
    }

    pub fn from_parts(rgb: RgbImage, mask: Option<GrayImage>) -> Result<Self> {
        if let Some(m) = &mask {
            anyhow::ensure!(
                m.dimensions() == rgb.dimensions(),
                "Mask {}x{} does not match template {}x{}",
                m.width(),
                m.height(),
                rgb.width(),
                rgb.height()
            );
        }

        let (w, h) = rgb.dimensions();
        let mut taps = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                let weight = mask
                    .as_ref()
                    .map(|m| m.get_pixel(x, y)[0] as f64 / 255.0)
                    .unwrap_or(1.0);
                if weight <= 0.0 {
                    continue;
                }
                let p = rgb.get_pixel(x, y);
                taps.push(Tap {
                    dx: x,
                    dy: y,
                    weight,
                    value: [p[0] as f64, p[1] as f64, p[2] as f64],
                    centered: [0.0; 3],
                });
            }
        }

        let weight_sum: f64 = taps.iter().map(|t| t.weight).sum();
        let mut mean = [0.0f64; 3];
        if weight_sum > 0.0 {
            for (c, m) in mean.iter_mut().enumerate() {
                *m = taps.iter().map(|t| t.weight * t.value[c]).sum::<f64>() / weight_sum;
            }
        }

        let mut energy = 0.0;
        let mut centered_energy = 0.0;
        for tap in &mut taps {
            for c in 0..3 {
                tap.centered[c] = tap.value[c] - mean[c];
                energy += tap.weight * tap.value[c] * tap.value[c];
                centered_energy += tap.weight * tap.centered[c] * tap.centered[c];
            }
        }

        Ok(Self {
            rgb,
            mask,
            taps,
            weight_sum,
            energy,
            centered_energy,
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let img = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        Self::from_image(img)
    }

    pub fn width(&self) -> u32 {
        self.rgb.width()
    }

    pub fn height(&self) -> u32 {
        self.rgb.height()
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.rgb
    }

    pub fn mask(&self) -> Option<&GrayImage> {
        self.mask.as_ref()
    }

    /// No pixels to compare: zero-sized art, or a mask that hides everything
    pub fn is_degenerate(&self) -> bool {
        self.width() == 0 || self.height() == 0 || self.weight_sum <= 0.0
    }
}

/// Resolves champion art on disk by (normalized name, team variant).
///
/// Layout: `<root>/champions_altered_red/<Name>.png` for CHAOS,
/// `<root>/champions_altered_blue/<Name>.png` for ORDER.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    root: PathBuf,
    aliases: Arc<ChampionAliases>,
}

impl TemplateStore {
    pub fn new(root: impl Into<PathBuf>, aliases: Arc<ChampionAliases>) -> Self {
        Self {
            root: root.into(),
            aliases,
        }
    }

    pub fn variant_dir(team: Team) -> &'static str {
        match team {
            Team::Chaos => "champions_altered_red",
            Team::Order => "champions_altered_blue",
        }
    }

    pub fn normalize(&self, champion: &str) -> String {
        self.aliases.normalize(champion)
    }

    pub fn asset_path(&self, champion: &str, team: Team) -> PathBuf {
        self.root
            .join(Self::variant_dir(team))
            .join(format!("{}.png", self.normalize(champion)))
    }

    pub fn load(&self, champion: &str, team: Team) -> Result<(PathBuf, Template)> {
        let path = self.asset_path(champion, team);
        anyhow::ensure!(path.exists(), "No template asset at {}", path.display());
        let template = Template::load(&path)?;
        debug!(
            "Loaded template {} ({}x{}, mask: {})",
            path.display(),
            template.width(),
            template.height(),
            template.mask().is_some()
        );
        Ok((path, template))
    }
}
