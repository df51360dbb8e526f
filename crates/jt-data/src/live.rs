//! Serde model of the live client `allgamedata` document.
//!
//! Only the fields the tracker reads are modelled; everything else in the
//! document is ignored.

use crate::Team;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllGameData {
    pub active_player: ActivePlayer,
    #[serde(default)]
    pub all_players: Vec<PlayerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivePlayer {
    #[serde(alias = "summonerName")]
    pub riot_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEntry {
    #[serde(alias = "summonerName")]
    pub riot_id: String,
    pub team: Team,
    pub champion_name: String,
    #[serde(default)]
    pub is_dead: bool,
    #[serde(default)]
    pub respawn_timer: f64,
    #[serde(default)]
    pub summoner_spells: SummonerSpells,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerSpells {
    #[serde(default)]
    pub summoner_spell_one: Option<SpellEntry>,
    #[serde(default)]
    pub summoner_spell_two: Option<SpellEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpellEntry {
    pub display_name: String,
}

impl SummonerSpells {
    pub fn display_names(&self) -> impl Iterator<Item = &str> {
        self.summoner_spell_one
            .iter()
            .chain(self.summoner_spell_two.iter())
            .map(|s| s.display_name.as_str())
    }
}

impl PlayerEntry {
    /// True when either summoner spell is a Smite variant
    /// ("Smite", "Unleashed Smite", "Primal Smite", ...).
    pub fn carries_smite(&self) -> bool {
        self.summoner_spells
            .display_names()
            .any(|name| name.to_lowercase().contains("smite"))
    }
}
