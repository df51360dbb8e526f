//! Match Data Poller: reads the local live client document and works out
//! who the enemy jungler is.

use anyhow::{Context, Result};
use jt_data::live::AllGameData;
use jt_data::{ChampionAliases, EnemyJungler};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Live client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub base_url: String,
    pub timeout_ms: u64,
    /// Attempts for the initial poll before the cadence starts
    pub init_retries: u32,
    pub init_retry_delay_ms: u64,
    /// Attempts per tick once running (no delay between them)
    pub tick_retries: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "https://127.0.0.1:2999/liveclientdata".to_string(),
            timeout_ms: 2000,
            init_retries: 10,
            init_retry_delay_ms: 5000,
            tick_retries: 1,
        }
    }
}

/// Something that can hand out one parsed live-match document.
///
/// Any error means "not ready yet" (loading screen, client not running,
/// half-written document) and is retried by the [`Poller`].
pub trait SnapshotSource {
    fn fetch(&self) -> impl Future<Output = Result<AllGameData>> + Send;
}

/// HTTP source for the game's local live client API
pub struct LiveClient {
    http_client: reqwest::Client,
    url: String,
}

impl LiveClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        // The local endpoint serves a self-signed certificate
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .danger_accept_invalid_certs(true)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            url: format!("{}/allgamedata", settings.base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SnapshotSource for LiveClient {
    fn fetch(&self) -> impl Future<Output = Result<AllGameData>> + Send {
        async move {
            let resp = self
                .http_client
                .get(&self.url)
                .send()
                .await
                .with_context(|| format!("Failed to reach {}", self.url))?;

            let status = resp.status();
            if !status.is_success() {
                anyhow::bail!("Live client not ready (HTTP {})", status);
            }

            let body = resp.text().await.context("Failed to read live client body")?;
            serde_json::from_str(&body).context("Failed to parse live client document")
        }
    }
}

/// Identify the enemy jungler in one live document.
///
/// The observer's team comes from the active player's roster entry; the enemy
/// team is its complement. The jungler is the enemy carrying a Smite variant.
/// If several enemies do, the first in roster order is taken.
pub fn find_enemy_jungler(data: &AllGameData, aliases: &ChampionAliases) -> Option<EnemyJungler> {
    let me = data
        .all_players
        .iter()
        .find(|p| p.riot_id == data.active_player.riot_id);
    let observer_team = match me {
        Some(p) => p.team,
        None => {
            debug!(
                "Active player '{}' not in roster",
                data.active_player.riot_id
            );
            return None;
        }
    };
    let enemy_team = observer_team.opponent();

    let mut candidates = data
        .all_players
        .iter()
        .filter(|p| p.team == enemy_team && p.carries_smite());

    let Some(jungler) = candidates.next() else {
        debug!("No enemy Smite carrier on {}", enemy_team);
        return None;
    };

    let extra: Vec<&str> = candidates.map(|p| p.champion_name.as_str()).collect();
    if !extra.is_empty() {
        warn!(
            "Several enemy Smite carriers, tracking {} and ignoring {:?}",
            jungler.champion_name, extra
        );
    }

    Some(EnemyJungler {
        champion: aliases.normalize(&jungler.champion_name),
        team: enemy_team,
        observer_team,
        is_dead: jungler.is_dead,
        respawn_timer: if jungler.is_dead {
            jungler.respawn_timer.max(0.0)
        } else {
            0.0
        },
    })
}

/// Bounded-retry reader over a [`SnapshotSource`]
pub struct Poller<S> {
    source: S,
    aliases: Arc<ChampionAliases>,
}

impl<S: SnapshotSource> Poller<S> {
    pub fn new(source: S, aliases: Arc<ChampionAliases>) -> Self {
        Self { source, aliases }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Up to `max_retries` attempts (at least one), sleeping `delay` between
    /// them. `None` once attempts are exhausted; never an error.
    pub async fn poll(&self, max_retries: u32, delay: Duration) -> Option<EnemyJungler> {
        let attempts = max_retries.max(1);
        for attempt in 1..=attempts {
            match self.source.fetch().await {
                Ok(data) => {
                    if let Some(jungler) = find_enemy_jungler(&data, &self.aliases) {
                        return Some(jungler);
                    }
                }
                Err(e) => debug!("Poll attempt {}/{}: {:#}", attempt, attempts, e),
            }

            if attempt < attempts && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        debug!("Poll gave up after {} attempts", attempts);
        None
    }

    /// Initial poll with the configured retry budget. Logs the outcome.
    pub async fn initialize(&self, settings: &ClientSettings) -> Option<EnemyJungler> {
        let found = self
            .poll(
                settings.init_retries,
                Duration::from_millis(settings.init_retry_delay_ms),
            )
            .await;
        match &found {
            Some(j) => info!(
                "Enemy jungler: {} ({}), observing as {}",
                j.champion, j.team, j.observer_team
            ),
            None => warn!(
                "Enemy jungler not identified after {} attempts",
                settings.init_retries.max(1)
            ),
        }
        found
    }
}
