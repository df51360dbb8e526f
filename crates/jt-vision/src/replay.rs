//! Command-line options for replaying saved captures through the matcher.
//!
//! Matcher settings come from, in order: the built-in defaults, the
//! `matcher` and `aliases` sections of a tracker config file (`--config`),
//! then the individual `--assets`, `--method` and `--threshold` flags.

use crate::matcher::{MatchMethod, MatcherSettings};
use anyhow::{Context, Result};
use jt_data::{ChampionAliases, Team};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const USAGE: &str = "<frame.png> <champion> <ORDER|CHAOS> [overlay_scale] \
[--config tracker.json] [--assets DIR] [--method NAME] [--threshold X]";

/// The parts of the tracker config file the matcher cares about
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ReplayConfigFile {
    matcher: MatcherSettings,
    aliases: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    pub frame: PathBuf,
    pub champion: String,
    pub team: Team,
    /// Set when the input is a full window screenshot
    pub overlay_scale: Option<f64>,
    pub config: Option<PathBuf>,
    pub assets_dir: Option<PathBuf>,
    pub method: Option<MatchMethod>,
    pub threshold: Option<f64>,
}

impl ReplayOptions {
    /// Parse arguments, not including the program name
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut positional = Vec::new();
        let mut config = None;
        let mut assets_dir = None;
        let mut method = None;
        let mut threshold = None;

        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .with_context(|| format!("{} needs a value", flag))
            };
            match arg.as_str() {
                "--config" => config = Some(PathBuf::from(value("--config")?)),
                "--assets" => assets_dir = Some(PathBuf::from(value("--assets")?)),
                "--method" => method = Some(value("--method")?.parse::<MatchMethod>()?),
                "--threshold" => {
                    let raw = value("--threshold")?;
                    threshold = Some(
                        raw.parse::<f64>()
                            .with_context(|| format!("Bad threshold '{}'", raw))?,
                    );
                }
                flag if flag.starts_with("--") => anyhow::bail!("Unknown option {}", flag),
                _ => positional.push(arg.clone()),
            }
        }

        if positional.len() < 3 || positional.len() > 4 {
            anyhow::bail!("Expected 3 or 4 positional arguments, got {}", positional.len());
        }
        let mut positional = positional.into_iter();
        let frame = PathBuf::from(positional.next().unwrap_or_default());
        let champion = positional.next().unwrap_or_default();
        let team: Team = positional.next().unwrap_or_default().parse()?;
        let overlay_scale = positional
            .next()
            .map(|s| s.parse::<f64>().context("overlay_scale must be a number 0-100"))
            .transpose()?;

        Ok(Self {
            frame,
            champion,
            team,
            overlay_scale,
            config,
            assets_dir,
            method,
            threshold,
        })
    }

    /// Matcher settings and alias table after layering config and flags
    pub fn resolve(&self) -> Result<(MatcherSettings, ChampionAliases)> {
        let file = match &self.config {
            Some(path) => load_config(path)?,
            None => ReplayConfigFile::default(),
        };
        let mut settings = file.matcher;
        if let Some(dir) = &self.assets_dir {
            settings.assets_dir = dir.clone();
        }
        if let Some(method) = self.method {
            settings.method = method;
        }
        if let Some(threshold) = self.threshold {
            settings.threshold = threshold;
        }
        Ok((settings, ChampionAliases::with_overrides(&file.aliases)))
    }
}

fn load_config(path: &Path) -> Result<ReplayConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}
