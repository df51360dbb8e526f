use crate::tracker::{LifeState, TrackingSnapshot};
use crate::zones::{ZoneId, ZoneLayout};
use jt_data::Point;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// What the overlay should show for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Indicator {
    /// Dead: count down on the unit's fountain
    Dead { respawn_in: f64, base: ZoneId },
    /// Alive but out of sight, last seen at `location`
    LastSeen {
        location: Point,
        zone: Option<ZoneId>,
        confidence: f64,
    },
}

impl TrackingSnapshot {
    /// Zone of the last-seen location while the unit is alive and hidden
    pub fn zone(&self, layout: &ZoneLayout, capture_size: u32) -> Option<ZoneId> {
        let state = self.state.as_ref()?;
        if state.life_state() != LifeState::AliveHidden {
            return None;
        }
        layout.classify(state.last_seen?, capture_size)
    }

    /// Decayed display confidence at `now`, `None` when no decay is running
    pub fn confidence(&self, now: Instant) -> Option<f64> {
        self.decay.confidence(now)
    }

    /// Derive the indicator at `now`. `None` while visible, before the unit is
    /// identified, or when it is hidden with no known location.
    pub fn indicator(&self, layout: &ZoneLayout, capture_size: u32, now: Instant) -> Option<Indicator> {
        let state = self.state.as_ref()?;
        match state.life_state() {
            LifeState::Dead => Some(Indicator::Dead {
                respawn_in: state.respawn_eta,
                base: ZoneId::base_of(state.team),
            }),
            LifeState::AliveVisible => None,
            LifeState::AliveHidden => {
                let location = state.last_seen?;
                Some(Indicator::LastSeen {
                    location,
                    zone: layout.classify(location, capture_size),
                    confidence: self.confidence(now).unwrap_or(1.0),
                })
            }
        }
    }
}
