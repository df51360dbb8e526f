use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Confidence decay settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DecaySettings {
    pub duration_ms: u64,
    /// Confidence held once the decay has run its course
    pub floor: f64,
}

impl Default for DecaySettings {
    fn default() -> Self {
        Self {
            duration_ms: 10_000,
            floor: 0.3,
        }
    }
}

/// Display confidence for a stale last-seen location.
///
/// Not a timer: confidence is recomputed from the start instant whenever it
/// is sampled. Linear from 1.0 down to `floor` over `duration`, then held at
/// `floor` until cancelled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayState {
    started_at: Option<Instant>,
    floor: f64,
    duration: Duration,
}

impl DecayState {
    pub fn new(settings: DecaySettings) -> Self {
        Self {
            started_at: None,
            floor: settings.floor.clamp(0.0, 1.0),
            duration: Duration::from_millis(settings.duration_ms),
        }
    }

    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn floor(&self) -> f64 {
        self.floor
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Start decaying at `now`. An active decay keeps its original start.
    /// Returns true if this call started it.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.started_at.is_some() {
            return false;
        }
        self.started_at = Some(now);
        true
    }

    /// Returns true if a decay was active
    pub fn cancel(&mut self) -> bool {
        self.started_at.take().is_some()
    }

    /// Confidence at `now`, `None` while inactive
    pub fn confidence(&self, now: Instant) -> Option<f64> {
        let start = self.started_at?;
        let elapsed = now.saturating_duration_since(start);
        if elapsed >= self.duration {
            return Some(self.floor);
        }
        let t = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        Some(1.0 - (1.0 - self.floor) * t)
    }

    /// Active and at the floor
    pub fn is_complete(&self, now: Instant) -> bool {
        self.started_at
            .is_some_and(|start| now.saturating_duration_since(start) >= self.duration)
    }
}

impl Default for DecayState {
    fn default() -> Self {
        Self::new(DecaySettings::default())
    }
}
