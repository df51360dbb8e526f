use anyhow::{Context, Result};
use jt_capture::CaptureSettings;
use jt_client::ClientSettings;
use jt_data::ChampionAliases;
use jt_state::{DecaySettings, ZoneLayout, ZoneSpec};
use jt_vision::MatcherSettings;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Top-level tracker configuration. Every field has a default, so an empty
/// JSON object (or no file at all) is a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub tick_interval_ms: u64,
    pub capture: CaptureSettings,
    pub matcher: MatcherSettings,
    pub client: ClientSettings,
    pub decay: DecaySettings,
    /// Custom zone layout on the 510x510 reference plane
    pub zones: Option<Vec<ZoneSpec>>,
    /// Extra champion -> asset-name entries, layered over the built-in table
    pub aliases: HashMap<String, String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            capture: CaptureSettings::default(),
            matcher: MatcherSettings::default(),
            client: ClientSettings::default(),
            decay: DecaySettings::default(),
            zones: None,
            aliases: HashMap::new(),
        }
    }
}

impl TrackerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        // Surface layout errors at load time rather than on first classification
        config.zone_layout()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// `path` if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn zone_layout(&self) -> Result<ZoneLayout> {
        match &self.zones {
            Some(specs) => ZoneLayout::new(specs.clone()).context("Invalid zone layout"),
            None => Ok(ZoneLayout::standard()),
        }
    }

    pub fn aliases(&self) -> ChampionAliases {
        ChampionAliases::with_overrides(&self.aliases)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jt_vision::MatchMethod;

    #[test]
    fn test_defaults() {
        let config = TrackerConfig::default();
        assert_eq!(config.tick_interval(), Duration::from_secs(1));
        assert_eq!(config.matcher.method, MatchMethod::CCoeffNormed);
        assert!((config.matcher.threshold - 0.67).abs() < f64::EPSILON);
        assert_eq!(config.client.init_retries, 10);
        assert_eq!(config.client.init_retry_delay_ms, 5000);
        assert_eq!(config.decay.duration_ms, 10_000);
        assert_eq!(config.capture.geometry().region_size, 420);
        assert_eq!(config.capture.geometry().capture_size, 382);
        assert_eq!(config.zone_layout().unwrap().len(), 11);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(
            &path,
            r#"{
                "tick_interval_ms": 500,
                "matcher": { "method": "sq_diff_normed", "threshold": 0.1 },
                "capture": { "overlay_scale": 100 },
                "aliases": { "Nunu & Willump": "Nunu" }
            }"#,
        )
        .unwrap();

        let config = TrackerConfig::load(&path).unwrap();
        assert_eq!(config.tick_interval_ms, 500);
        assert_eq!(config.matcher.method, MatchMethod::SqDiffNormed);
        assert_eq!(config.matcher.assets_dir, Path::new("assets/champions"));
        assert_eq!(config.capture.geometry().capture_size, 510);
        assert_eq!(config.client.tick_retries, 1);

        let aliases = config.aliases();
        assert_eq!(aliases.normalize("Nunu & Willump"), "Nunu");
        assert_eq!(aliases.normalize("Wukong"), "MonkeyKing");
    }

    #[test]
    fn test_overlapping_zones_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(
            &path,
            r#"{ "zones": [
                { "zone": "Top", "points": [[0, 0], [100, 0], [100, 100], [0, 100]] },
                { "zone": "Mid", "points": [[50, 50], [150, 50], [150, 150], [50, 150]] }
            ] }"#,
        )
        .unwrap();
        assert!(TrackerConfig::load(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(TrackerConfig::load(Path::new("/nonexistent/tracker.json")).is_err());
        assert!(TrackerConfig::load_or_default(None).is_ok());
    }
}
