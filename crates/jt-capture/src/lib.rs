pub mod screenshots;
pub mod window;

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use screenshots::ScreenshotSink;
pub use window::{list_windows, WindowBackend, WindowInfo, XcapBackend};

/// Overlay (reserved region) size range in pixels, indexed by scale 0..100
const MIN_REGION_SIZE: f64 = 280.0;
const MAX_REGION_SIZE: f64 = 560.0;
/// Minimap capture size range in pixels, indexed by scale 0..100
const MIN_CAPTURE_SIZE: f64 = 254.0;
const MAX_CAPTURE_SIZE: f64 = 510.0;

/// Size of the square region reserved in the bottom-right corner of the game
/// window, and the size of the square actually captured inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureGeometry {
    pub region_size: u32,
    pub capture_size: u32,
}

impl CaptureGeometry {
    pub fn new(region_size: u32, capture_size: u32) -> Self {
        Self {
            region_size,
            capture_size,
        }
    }

    /// Geometry for the in-game minimap scale setting (0-100)
    pub fn from_scale(percent: f64) -> Self {
        let t = percent.clamp(0.0, 100.0) / 100.0;
        Self {
            region_size: (MIN_REGION_SIZE + t * (MAX_REGION_SIZE - MIN_REGION_SIZE)) as u32,
            capture_size: (MIN_CAPTURE_SIZE + t * (MAX_CAPTURE_SIZE - MIN_CAPTURE_SIZE)) as u32,
        }
    }

    /// Offset that centers the capture square inside the reserved region
    pub fn padding(&self) -> u32 {
        if self.region_size > self.capture_size && self.capture_size > 0 {
            (self.region_size - self.capture_size) / 2
        } else {
            0
        }
    }
}

impl Default for CaptureGeometry {
    fn default() -> Self {
        Self::from_scale(50.0)
    }
}

/// Pixel rectangle inside the full window capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GeometryError {
    #[error("window has no area ({width}x{height})")]
    EmptyWindow { width: u32, height: u32 },
    #[error("window {width}x{height} is smaller than the {region}px reserved region")]
    WindowTooSmall { width: u32, height: u32, region: u32 },
    #[error("capture size must be positive")]
    EmptyCapture,
    #[error("crop at ({x}, {y}) size {size} falls outside the {width}x{height} window")]
    OutOfBounds {
        x: i64,
        y: i64,
        size: i64,
        width: u32,
        height: u32,
    },
}

/// Compute the crop rectangle for a window of `width` x `height`.
///
/// The region is anchored at `window - region_size` and the capture square is
/// centered inside it. Any rectangle that does not fit entirely inside the
/// window is rejected, never clamped.
pub fn crop_rect(width: u32, height: u32, geometry: CaptureGeometry) -> Result<CropRect, GeometryError> {
    if width == 0 || height == 0 {
        return Err(GeometryError::EmptyWindow { width, height });
    }
    if width < geometry.region_size || height < geometry.region_size {
        return Err(GeometryError::WindowTooSmall {
            width,
            height,
            region: geometry.region_size,
        });
    }
    if geometry.capture_size == 0 {
        return Err(GeometryError::EmptyCapture);
    }

    let (w, h) = (width as i64, height as i64);
    let region = geometry.region_size as i64;
    let padding = geometry.padding() as i64;
    let size = geometry.capture_size as i64;
    let x = w - region + padding;
    let y = h - region + padding;

    if x < 0 || y < 0 || x + size > w || y + size > h {
        return Err(GeometryError::OutOfBounds {
            x,
            y,
            size,
            width,
            height,
        });
    }

    Ok(CropRect {
        x: x as u32,
        y: y as u32,
        width: size as u32,
        height: size as u32,
    })
}

/// Crop the minimap square out of a full window capture
pub fn crop_frame(frame: &RgbaImage, geometry: CaptureGeometry) -> Result<RgbaImage, GeometryError> {
    let rect = crop_rect(frame.width(), frame.height(), geometry)?;
    Ok(image::imageops::crop_imm(frame, rect.x, rect.y, rect.width, rect.height).to_image())
}

/// Why a capture produced no frame this tick
#[derive(Debug, Error)]
pub enum CaptureSkip {
    #[error("no target window found")]
    NoWindow,
    #[error("target window does not hold input focus")]
    NotFocused,
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error("capture failed: {0}")]
    Failed(String),
}

/// Frame Source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Matched case-insensitively against application name and window title
    pub process_names: Vec<String>,
    /// Use any visible window when the game is not running (development aid)
    pub allow_fallback_window: bool,
    /// In-game minimap scale, 0-100
    pub overlay_scale: f64,
    /// Explicit sizes override `overlay_scale` when both are set
    pub region_size: Option<u32>,
    pub capture_size: Option<u32>,
    /// Persist every capture under this folder when set
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            process_names: vec!["League of Legends".to_string()],
            allow_fallback_window: true,
            overlay_scale: 50.0,
            region_size: None,
            capture_size: None,
            screenshot_dir: None,
        }
    }
}

impl CaptureSettings {
    pub fn geometry(&self) -> CaptureGeometry {
        match (self.region_size, self.capture_size) {
            (Some(region), Some(capture)) => CaptureGeometry::new(region, capture),
            _ => CaptureGeometry::from_scale(self.overlay_scale),
        }
    }
}

/// Grabs the minimap square from the game window, only while the game holds focus
pub struct FrameSource<B: WindowBackend = XcapBackend> {
    backend: B,
    process_names: Vec<String>,
    allow_fallback: bool,
    geometry: CaptureGeometry,
    target: Option<WindowInfo>,
    screenshots: Option<ScreenshotSink>,
}

impl FrameSource<XcapBackend> {
    pub fn new(settings: &CaptureSettings) -> Self {
        Self::with_backend(XcapBackend, settings)
    }
}

impl<B: WindowBackend> FrameSource<B> {
    pub fn with_backend(backend: B, settings: &CaptureSettings) -> Self {
        let screenshots = settings.screenshot_dir.as_ref().and_then(|dir| {
            ScreenshotSink::create(dir)
                .map_err(|e| warn!("Capture persistence disabled: {:#}", e))
                .ok()
        });

        Self {
            backend,
            process_names: settings
                .process_names
                .iter()
                .map(|n| n.to_lowercase())
                .collect(),
            allow_fallback: settings.allow_fallback_window,
            geometry: settings.geometry(),
            target: None,
            screenshots,
        }
    }

    pub fn configure(&mut self, region_size: u32, capture_size: u32) {
        self.geometry = CaptureGeometry::new(region_size, capture_size);
        debug!(
            "Capture geometry: region={} capture={}",
            region_size, capture_size
        );
    }

    pub fn geometry(&self) -> CaptureGeometry {
        self.geometry
    }

    /// Currently resolved target window, if any
    pub fn target(&self) -> Option<&WindowInfo> {
        self.target.as_ref()
    }

    /// Capture one minimap frame, or `None` when this tick has nothing usable
    pub fn capture_once(&mut self) -> Option<RgbaImage> {
        match self.capture() {
            Ok(frame) => Some(frame),
            Err(skip) => {
                debug!("Capture skipped: {}", skip);
                None
            }
        }
    }

    /// Like `capture_once`, but reports why no frame was produced
    pub fn capture(&mut self) -> Result<RgbaImage, CaptureSkip> {
        let windows = self
            .backend
            .windows()
            .map_err(|e| CaptureSkip::Failed(format!("{:#}", e)))?;

        let target = self.refresh_target(&windows).ok_or(CaptureSkip::NoWindow)?;

        let focused = windows.iter().find(|w| w.is_focused);
        if !window::is_focused(&target, focused) {
            return Err(CaptureSkip::NotFocused);
        }

        // Cheap size check before asking the window to repaint
        crop_rect(target.width, target.height, self.geometry)?;

        let full = match self.backend.capture(&target) {
            Ok(img) => img,
            Err(e) => {
                // Handle may be stale (game restarted); re-resolve next tick
                self.target = None;
                return Err(CaptureSkip::Failed(format!("{:#}", e)));
            }
        };

        let frame = crop_frame(&full, self.geometry)?;

        if let Some(sink) = &self.screenshots {
            if let Err(e) = sink.save(&frame) {
                warn!("Failed to persist capture: {:#}", e);
            }
        }

        Ok(frame)
    }

    /// Keep the cached target in sync with the current window list,
    /// re-resolving by process name when the handle has disappeared.
    fn refresh_target(&mut self, windows: &[WindowInfo]) -> Option<WindowInfo> {
        let current = self
            .target
            .as_ref()
            .and_then(|t| windows.iter().find(|w| w.id == t.id))
            .cloned();

        let resolved = match current {
            Some(w) => Some(w),
            None => {
                if self.target.take().is_some() {
                    info!("Target window lost, re-resolving");
                }
                self.resolve_target(windows)
            }
        };
        self.target = resolved.clone();
        resolved
    }

    fn resolve_target(&self, windows: &[WindowInfo]) -> Option<WindowInfo> {
        if let Some(w) = windows.iter().find(|w| self.is_game_window(w)) {
            info!(
                "Found game window '{}' ({}), pid {}",
                w.title, w.app_name, w.pid
            );
            return Some(w.clone());
        }

        if !self.allow_fallback {
            debug!("Game window not found");
            return None;
        }

        let own_pid = std::process::id();
        let fallback = windows.iter().find(|w| {
            w.pid != own_pid
                && !w.is_minimized
                && !w.title.trim().is_empty()
                && w.width > 0
                && w.height > 0
        })?;
        warn!(
            "Game process not found, using fallback window '{}' (pid {}) for testing",
            fallback.title, fallback.pid
        );
        Some(fallback.clone())
    }

    fn is_game_window(&self, w: &WindowInfo) -> bool {
        let app = w.app_name.to_lowercase();
        let title = w.title.to_lowercase();
        self.process_names
            .iter()
            .any(|name| app.contains(name.as_str()) || title.contains(name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::cell::{Cell, RefCell};

    struct FakeDesktop {
        windows: RefCell<Vec<WindowInfo>>,
        fail_capture: Cell<bool>,
        captures: Cell<u32>,
    }

    impl FakeDesktop {
        fn new(windows: Vec<WindowInfo>) -> Self {
            Self {
                windows: RefCell::new(windows),
                fail_capture: Cell::new(false),
                captures: Cell::new(0),
            }
        }
    }

    impl WindowBackend for &FakeDesktop {
        fn windows(&self) -> Result<Vec<WindowInfo>> {
            Ok(self.windows.borrow().clone())
        }

        fn capture(&self, window: &WindowInfo) -> Result<RgbaImage> {
            self.captures.set(self.captures.get() + 1);
            if self.fail_capture.get() {
                anyhow::bail!("window vanished");
            }
            // Bottom-right pixel is marked so crops can be checked
            Ok(RgbaImage::from_fn(window.width, window.height, |x, y| {
                if x == window.width - 1 && y == window.height - 1 {
                    image::Rgba([255, 0, 0, 255])
                } else {
                    image::Rgba([0, 0, 0, 255])
                }
            }))
        }
    }

    fn game_window(focused: bool) -> WindowInfo {
        WindowInfo {
            id: 1,
            pid: 4242,
            app_name: "League of Legends.exe".into(),
            title: "League of Legends (TM) Client".into(),
            is_focused: focused,
            is_minimized: false,
            width: 1920,
            height: 1080,
        }
    }

    fn other_window(id: u32, pid: u32, focused: bool) -> WindowInfo {
        WindowInfo {
            id,
            pid,
            app_name: "editor".into(),
            title: "notes.txt".into(),
            is_focused: focused,
            is_minimized: false,
            width: 1280,
            height: 720,
        }
    }

    fn settings() -> CaptureSettings {
        CaptureSettings {
            allow_fallback_window: false,
            region_size: Some(300),
            capture_size: Some(280),
            ..CaptureSettings::default()
        }
    }

    #[test]
    fn test_from_scale_bounds() {
        assert_eq!(CaptureGeometry::from_scale(0.0), CaptureGeometry::new(280, 254));
        assert_eq!(CaptureGeometry::from_scale(100.0), CaptureGeometry::new(560, 510));
        assert_eq!(CaptureGeometry::from_scale(250.0), CaptureGeometry::new(560, 510));
    }

    #[test]
    fn test_crop_rect_anchored_bottom_right_with_padding() {
        let rect = crop_rect(1920, 1080, CaptureGeometry::new(300, 280)).unwrap();
        assert_eq!(
            rect,
            CropRect {
                x: 1920 - 300 + 10,
                y: 1080 - 300 + 10,
                width: 280,
                height: 280
            }
        );
    }

    #[test]
    fn test_crop_rect_rejects_invalid_geometry() {
        assert!(matches!(
            crop_rect(0, 100, CaptureGeometry::new(50, 40)),
            Err(GeometryError::EmptyWindow { .. })
        ));
        assert!(matches!(
            crop_rect(200, 1080, CaptureGeometry::new(300, 280)),
            Err(GeometryError::WindowTooSmall { .. })
        ));
        assert!(matches!(
            crop_rect(800, 600, CaptureGeometry::new(300, 0)),
            Err(GeometryError::EmptyCapture)
        ));
        // Capture larger than the reserved region spills past the window edge
        assert!(matches!(
            crop_rect(800, 600, CaptureGeometry::new(300, 320)),
            Err(GeometryError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_crop_never_partial() {
        let frame = RgbaImage::new(400, 300);
        for region in (0..=450).step_by(25) {
            for capture in (0..=450).step_by(25) {
                let geometry = CaptureGeometry::new(region, capture);
                if let Ok(cropped) = crop_frame(&frame, geometry) {
                    assert_eq!(cropped.dimensions(), (capture, capture));
                    let rect = crop_rect(400, 300, geometry).unwrap();
                    assert!(rect.x + rect.width <= 400 && rect.y + rect.height <= 300);
                }
            }
        }
    }

    #[test]
    fn test_capture_when_game_focused() {
        let desktop = FakeDesktop::new(vec![other_window(2, 7, false), game_window(true)]);
        let mut source = FrameSource::with_backend(&desktop, &settings());
        let frame = source.capture_once().expect("frame");
        assert_eq!(frame.dimensions(), (280, 280));
        // Region is flush with the bottom-right corner, capture is padded 10px inside it
        assert_eq!(frame.get_pixel(279, 279)[0], 0);
        assert_eq!(source.target().map(|t| t.pid), Some(4242));
    }

    #[test]
    fn test_capture_skipped_when_unfocused() {
        let desktop = FakeDesktop::new(vec![other_window(2, 7, true), game_window(false)]);
        let mut source = FrameSource::with_backend(&desktop, &settings());
        assert!(matches!(source.capture(), Err(CaptureSkip::NotFocused)));
        assert_eq!(desktop.captures.get(), 0);
    }

    #[test]
    fn test_capture_when_same_process_dialog_focused() {
        let mut dialog = other_window(9, 4242, true);
        dialog.title = "Settings".into();
        let desktop = FakeDesktop::new(vec![game_window(false), dialog]);
        let mut source = FrameSource::with_backend(&desktop, &settings());
        assert!(source.capture_once().is_some());
    }

    #[test]
    fn test_no_window_without_fallback() {
        let desktop = FakeDesktop::new(vec![other_window(2, 7, true)]);
        let mut source = FrameSource::with_backend(&desktop, &settings());
        assert!(matches!(source.capture(), Err(CaptureSkip::NoWindow)));
    }

    #[test]
    fn test_fallback_window_used_when_allowed() {
        let desktop = FakeDesktop::new(vec![other_window(2, 7, true)]);
        let mut cfg = settings();
        cfg.allow_fallback_window = true;
        let mut source = FrameSource::with_backend(&desktop, &cfg);
        assert!(source.capture_once().is_some());
        assert_eq!(source.target().map(|t| t.id), Some(2));
    }

    #[test]
    fn test_small_window_skipped_before_capture() {
        let mut small = game_window(true);
        small.width = 200;
        let desktop = FakeDesktop::new(vec![small]);
        let mut source = FrameSource::with_backend(&desktop, &settings());
        assert!(matches!(source.capture(), Err(CaptureSkip::Geometry(_))));
        assert_eq!(desktop.captures.get(), 0);
    }

    #[test]
    fn test_capture_failure_drops_target_and_re_resolves() {
        let desktop = FakeDesktop::new(vec![game_window(true)]);
        let mut source = FrameSource::with_backend(&desktop, &settings());
        desktop.fail_capture.set(true);
        assert!(source.capture_once().is_none());
        assert!(source.target().is_none());

        desktop.fail_capture.set(false);
        let mut restarted = game_window(true);
        restarted.id = 77;
        *desktop.windows.borrow_mut() = vec![restarted];
        assert!(source.capture_once().is_some());
        assert_eq!(source.target().map(|t| t.id), Some(77));
    }

    #[test]
    fn test_persistence_failure_does_not_fail_capture() {
        let base = tempfile::tempdir().unwrap();
        let desktop = FakeDesktop::new(vec![game_window(true)]);
        let mut cfg = settings();
        cfg.screenshot_dir = Some(base.path().to_path_buf());
        let mut source = FrameSource::with_backend(&desktop, &cfg);

        assert!(source.capture_once().is_some());
        let session = std::fs::read_dir(base.path()).unwrap().next().unwrap().unwrap().path();
        assert_eq!(std::fs::read_dir(&session).unwrap().count(), 1);

        std::fs::remove_dir_all(&session).unwrap();
        assert!(source.capture_once().is_some());
    }

    #[test]
    fn test_configure_changes_crop_size() {
        let desktop = FakeDesktop::new(vec![game_window(true)]);
        let mut source = FrameSource::with_backend(&desktop, &settings());
        source.configure(200, 150);
        let frame = source.capture_once().unwrap();
        assert_eq!(frame.dimensions(), (150, 150));
    }
}
