use anyhow::{Context, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use xcap::Window;

/// Snapshot of one top-level window as reported by the OS
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowInfo {
    /// Opaque OS window handle
    pub id: u32,
    /// Owning process id
    pub pid: u32,
    pub app_name: String,
    pub title: String,
    pub is_focused: bool,
    pub is_minimized: bool,
    pub width: u32,
    pub height: u32,
}

/// Access to the desktop's window list and per-window capture.
///
/// `XcapBackend` is the real implementation; tests substitute an in-memory one.
pub trait WindowBackend {
    /// Enumerate all top-level windows, including which one holds input focus
    fn windows(&self) -> Result<Vec<WindowInfo>>;

    /// Capture the full content of `window`.
    ///
    /// Implementations must ask the window to repaint its full content rather
    /// than copying screen pixels, since the game may render through a path
    /// that ordinary blits cannot see.
    fn capture(&self, window: &WindowInfo) -> Result<RgbaImage>;
}

/// Window backend built on xcap
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapBackend;

impl WindowBackend for XcapBackend {
    fn windows(&self) -> Result<Vec<WindowInfo>> {
        let windows = Window::all().context("Failed to enumerate windows")?;
        Ok(windows
            .iter()
            .filter_map(|w| match describe(w) {
                Ok(info) => Some(info),
                Err(e) => {
                    debug!("Skipping window: {}", e);
                    None
                }
            })
            .collect())
    }

    fn capture(&self, target: &WindowInfo) -> Result<RgbaImage> {
        let windows = Window::all().context("Failed to enumerate windows")?;
        let window = windows
            .into_iter()
            .find(|w| w.id().ok() == Some(target.id))
            .with_context(|| format!("Window {} (pid {}) no longer exists", target.id, target.pid))?;
        // On Windows xcap renders through PrintWindow with PW_RENDERFULLCONTENT
        window
            .capture_image()
            .context("Failed to capture window image")
    }
}

fn describe(window: &Window) -> Result<WindowInfo> {
    Ok(WindowInfo {
        id: window.id()?,
        pid: window.pid()?,
        app_name: window.app_name().unwrap_or_default(),
        title: window.title().unwrap_or_default(),
        is_focused: window.is_focused().unwrap_or(false),
        is_minimized: window.is_minimized().unwrap_or(false),
        width: window.width()?,
        height: window.height()?,
    })
}

/// List visible windows, for diagnosing which process name to configure
pub fn list_windows() -> Vec<WindowInfo> {
    match XcapBackend.windows() {
        Ok(windows) => windows.into_iter().filter(|w| !w.is_minimized).collect(),
        Err(e) => {
            warn!("Failed to enumerate windows: {}", e);
            Vec::new()
        }
    }
}

/// True when `target` holds input focus: either it is the focused window, or
/// the focused window belongs to the same process (e.g. an in-game dialog).
pub fn is_focused(target: &WindowInfo, focused: Option<&WindowInfo>) -> bool {
    match focused {
        Some(f) => f.id == target.id || f.pid == target.pid,
        None => false,
    }
}
