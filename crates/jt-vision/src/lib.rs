//! Locating a champion icon in minimap captures.
//!
//! [`TemplateMatcher`] holds the icon of the tracked champion and scans
//! frames for it with a weighted, optionally masked, similarity metric.

pub mod matcher;
pub mod replay;
pub mod template;

pub use matcher::{
    score_map, MatchFamily, MatchMethod, MatchResult, MatcherSettings, ScoreMap, TemplateMatcher,
};
pub use replay::ReplayOptions;
pub use template::{Template, TemplateStore};
