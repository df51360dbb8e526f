pub mod live;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Side of the map a player belongs to, as reported by the live client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Team {
    /// Blue side, base in the bottom-left corner of the minimap
    Order,
    /// Red side, base in the top-right corner of the minimap
    Chaos,
}

impl Team {
    pub fn opponent(self) -> Team {
        match self {
            Team::Order => Team::Chaos,
            Team::Chaos => Team::Order,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Team::Order => "ORDER",
            Team::Chaos => "CHAOS",
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Team {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ORDER" | "BLUE" => Ok(Team::Order),
            "CHAOS" | "RED" => Ok(Team::Chaos),
            other => anyhow::bail!("Unknown team '{}'", other),
        }
    }
}

/// Pixel position inside a captured minimap frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: u32,
    pub y: u32,
}

impl Point {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// What one successful poll of the live client tells us about the enemy jungler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyJungler {
    /// Champion name, already normalized through the alias table
    pub champion: String,
    pub team: Team,
    /// Team of the local (observing) player
    pub observer_team: Team,
    pub is_dead: bool,
    /// Seconds until respawn, 0 while alive
    pub respawn_timer: f64,
}

/// Champion names whose asset file name differs from the name the live client reports
const DEFAULT_ALIASES: &[(&str, &str)] = &[("Wukong", "MonkeyKing"), ("Kha'Zix", "Khazix")];

/// Immutable identity -> asset-name table.
///
/// Built once at startup and shared (behind an `Arc`) by the poller and the
/// template matcher. Lookups ignore case; unknown names pass through unchanged.
#[derive(Debug, Clone)]
pub struct ChampionAliases {
    by_lower: HashMap<String, String>,
}

impl ChampionAliases {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let by_lower = entries
            .into_iter()
            .map(|(k, v)| (k.as_ref().to_lowercase(), v.into()))
            .collect();
        Self { by_lower }
    }

    /// Built-in table with `overrides` layered on top
    pub fn with_overrides(overrides: &HashMap<String, String>) -> Self {
        let mut aliases = Self::default();
        for (from, to) in overrides {
            aliases.by_lower.insert(from.to_lowercase(), to.clone());
        }
        aliases
    }

    /// Load extra entries from a JSON object file (`{"Wukong": "MonkeyKing"}`)
    /// and layer them over the built-in table.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let overrides: HashMap<String, String> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded {} champion aliases from {}", overrides.len(), path.display());
        Ok(Self::with_overrides(&overrides))
    }

    pub fn normalize(&self, champion: &str) -> String {
        if champion.is_empty() {
            return String::new();
        }
        self.by_lower
            .get(&champion.to_lowercase())
            .cloned()
            .unwrap_or_else(|| champion.to_string())
    }

    pub fn len(&self) -> usize {
        self.by_lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_lower.is_empty()
    }
}

impl Default for ChampionAliases {
    fn default() -> Self {
        Self::new(DEFAULT_ALIASES.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wukong_maps_to_monkey_king() {
        let aliases = ChampionAliases::default();
        assert_eq!(aliases.normalize("Wukong"), "MonkeyKing");
        assert_eq!(aliases.normalize("wukong"), "MonkeyKing");
        assert_eq!(aliases.normalize("Kha'Zix"), "Khazix");
    }

    #[test]
    fn test_unknown_name_passes_through() {
        let aliases = ChampionAliases::default();
        assert_eq!(aliases.normalize("Vi"), "Vi");
        assert_eq!(aliases.normalize(""), "");
    }

    #[test]
    fn test_overrides_layer_on_defaults() {
        let mut extra = HashMap::new();
        extra.insert("Fiddlesticks".to_string(), "FiddleSticks".to_string());
        let aliases = ChampionAliases::with_overrides(&extra);
        assert_eq!(aliases.normalize("Fiddlesticks"), "FiddleSticks");
        assert_eq!(aliases.normalize("Wukong"), "MonkeyKing");
        assert_eq!(aliases.len(), 3);
    }

    #[test]
    fn test_load_nonexistent() {
        assert!(ChampionAliases::load(Path::new("/nonexistent/aliases.json")).is_err());
    }

    #[test]
    fn test_team_parsing() {
        assert_eq!("chaos".parse::<Team>().unwrap(), Team::Chaos);
        assert_eq!("ORDER".parse::<Team>().unwrap(), Team::Order);
        assert!("purple".parse::<Team>().is_err());
        assert_eq!(Team::Order.opponent(), Team::Chaos);
        assert_eq!(Team::Chaos.to_string(), "CHAOS");
    }
}
