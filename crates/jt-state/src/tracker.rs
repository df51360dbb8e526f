use crate::decay::{DecaySettings, DecayState};
use jt_data::{EnemyJungler, Point, Team};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Life/visibility state of the tracked unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifeState {
    Dead,
    AliveVisible,
    AliveHidden,
}

/// Everything currently believed about the enemy jungler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedUnitState {
    pub identity: String,
    pub team: Team,
    pub is_dead: bool,
    /// Seconds until respawn, 0 while alive
    pub respawn_eta: f64,
    /// Capture-space point of the last confirmed sighting in the current life
    pub last_seen: Option<Point>,
    pub visible_now: bool,
    pub observer_team: Team,
}

impl TrackedUnitState {
    fn from_poll(jungler: &EnemyJungler) -> Self {
        Self {
            identity: jungler.champion.clone(),
            team: jungler.team,
            is_dead: jungler.is_dead,
            respawn_eta: if jungler.is_dead { jungler.respawn_timer } else { 0.0 },
            last_seen: None,
            visible_now: false,
            observer_team: jungler.observer_team,
        }
    }

    pub fn life_state(&self) -> LifeState {
        if self.is_dead {
            LifeState::Dead
        } else if self.visible_now {
            LifeState::AliveVisible
        } else {
            LifeState::AliveHidden
        }
    }
}

/// Result of one capture+match cycle, as seen by the tracker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanOutcome {
    Found(Point),
    NotFound,
    /// No frame or no template this tick. The unit is no longer confirmed
    /// on-screen, so it is treated like a miss; the last-seen location stays.
    Skipped,
}

/// Notable change caused by a poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollTransition {
    /// First identification, or a different unit than before
    Identified,
    Died,
    Respawned,
}

/// Immutable copy of the tracker handed to observers after every tick
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingSnapshot {
    pub state: Option<TrackedUnitState>,
    pub decay: DecayState,
    /// Completed fusion ticks so far
    pub tick: u64,
}

/// Fuses poll results and match results into one evolving belief.
///
/// All mutation goes through `apply_poll` and `apply_scan`, called once each
/// per tick by the owner of the cadence.
#[derive(Debug)]
pub struct Tracker {
    state: Option<TrackedUnitState>,
    decay: DecayState,
    ticks: u64,
}

impl Tracker {
    pub fn new(decay: DecaySettings) -> Self {
        Self {
            state: None,
            decay: DecayState::new(decay),
            ticks: 0,
        }
    }

    pub fn state(&self) -> Option<&TrackedUnitState> {
        self.state.as_ref()
    }

    pub fn decay(&self) -> &DecayState {
        &self.decay
    }

    /// Merge this tick's poll. `None` (failed poll) leaves everything as is.
    pub fn apply_poll(&mut self, poll: Option<&EnemyJungler>) -> Option<PollTransition> {
        let jungler = poll?;

        let same_unit = self
            .state
            .as_ref()
            .is_some_and(|s| s.identity == jungler.champion && s.team == jungler.team);
        if !same_unit {
            info!(
                "Tracking {} ({}), {}",
                jungler.champion,
                jungler.team,
                if jungler.is_dead { "dead" } else { "alive" }
            );
            self.state = Some(TrackedUnitState::from_poll(jungler));
            self.decay.cancel();
            return Some(PollTransition::Identified);
        }
        let state = self.state.as_mut()?;

        state.observer_team = jungler.observer_team;
        let was_dead = state.is_dead;
        state.is_dead = jungler.is_dead;
        state.respawn_eta = if jungler.is_dead { jungler.respawn_timer } else { 0.0 };

        if jungler.is_dead {
            state.last_seen = None;
            state.visible_now = false;
            self.decay.cancel();
            if !was_dead {
                info!("{} died, respawn in {:.0}s", state.identity, state.respawn_eta);
                return Some(PollTransition::Died);
            }
        } else if was_dead {
            state.last_seen = None;
            state.visible_now = false;
            info!("{} respawned", state.identity);
            return Some(PollTransition::Respawned);
        }
        None
    }

    /// A capture+match cycle should run this tick
    pub fn wants_scan(&self) -> bool {
        self.state.as_ref().is_some_and(|s| !s.is_dead)
    }

    /// Merge this tick's match result. Ignored unless alive.
    pub fn apply_scan(&mut self, outcome: ScanOutcome, now: Instant) {
        let Some(state) = self.state.as_mut().filter(|s| !s.is_dead) else {
            return;
        };

        match outcome {
            ScanOutcome::Found(point) => {
                if !state.visible_now {
                    debug!("{} sighted at ({}, {})", state.identity, point.x, point.y);
                }
                state.visible_now = true;
                state.last_seen = Some(point);
                self.decay.cancel();
            }
            ScanOutcome::NotFound | ScanOutcome::Skipped => {
                if state.visible_now {
                    debug!("{} lost from view", state.identity);
                }
                state.visible_now = false;
                if state.last_seen.is_some() {
                    self.decay.start(now);
                }
            }
        }
    }

    /// Close the tick and hand out an immutable snapshot
    pub fn finish_tick(&mut self) -> TrackingSnapshot {
        self.ticks += 1;
        self.snapshot()
    }

    pub fn snapshot(&self) -> TrackingSnapshot {
        TrackingSnapshot {
            state: self.state.clone(),
            decay: self.decay,
            tick: self.ticks,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new(DecaySettings::default())
    }
}
