use anyhow::{Context, Result};
use chrono::Local;
use image::RgbaImage;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes a timestamped PNG of every capture into a per-session folder,
/// for replaying matcher behaviour offline.
#[derive(Debug, Clone)]
pub struct ScreenshotSink {
    dir: PathBuf,
}

impl ScreenshotSink {
    /// Create `<base>/<session timestamp>/`
    pub fn create(base: &Path) -> Result<Self> {
        let dir = base.join(Local::now().format("%Y-%m-%d_%H-%M-%S").to_string());
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create screenshot folder {}", dir.display()))?;
        info!("Saving captures to {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn save(&self, frame: &RgbaImage) -> Result<PathBuf> {
        let path = self.dir.join(format!(
            "minimap_{}.png",
            Local::now().format("%Y%m%d_%H%M%S_%3f")
        ));
        frame
            .save(&path)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        Ok(path)
    }
}
