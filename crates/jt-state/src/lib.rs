//! Tracking core for the enemy jungler: the fusion state machine, zone
//! classification and confidence decay.

pub mod decay;
pub mod indicator;
pub mod tracker;
pub mod zones;

pub use decay::{DecaySettings, DecayState};
pub use indicator::Indicator;
pub use tracker::{LifeState, PollTransition, ScanOutcome, TrackedUnitState, Tracker, TrackingSnapshot};
pub use zones::{standard_specs, ZoneId, ZoneLayout, ZoneLayoutError, ZoneSpec, REFERENCE_SIZE};
