use crate::template::{Template, TemplateStore};
use image::RgbaImage;
use jt_data::{ChampionAliases, Point, Team};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default acceptance threshold for `CCoeffNormed`
const DEFAULT_THRESHOLD: f64 = 0.67;

/// Denominators below this are treated as zero
const EPSILON: f64 = 1e-10;

/// Similarity metric used to compare the template against each frame window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    SqDiff,
    SqDiffNormed,
    CCorr,
    CCorrNormed,
    CCoeff,
    CCoeffNormed,
}

/// Whether the best score is the minimum or the maximum of the score map
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchFamily {
    LowerIsBetter,
    HigherIsBetter,
}

impl MatchMethod {
    pub fn family(self) -> MatchFamily {
        match self {
            MatchMethod::SqDiff | MatchMethod::SqDiffNormed => MatchFamily::LowerIsBetter,
            _ => MatchFamily::HigherIsBetter,
        }
    }
}

impl fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MatchMethod::SqDiff => "sq_diff",
            MatchMethod::SqDiffNormed => "sq_diff_normed",
            MatchMethod::CCorr => "ccorr",
            MatchMethod::CCorrNormed => "ccorr_normed",
            MatchMethod::CCoeff => "ccoeff",
            MatchMethod::CCoeffNormed => "ccoeff_normed",
        };
        f.write_str(name)
    }
}

impl FromStr for MatchMethod {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sq_diff" | "sqdiff" => Ok(MatchMethod::SqDiff),
            "sq_diff_normed" | "sqdiff_normed" => Ok(MatchMethod::SqDiffNormed),
            "ccorr" => Ok(MatchMethod::CCorr),
            "ccorr_normed" => Ok(MatchMethod::CCorrNormed),
            "ccoeff" => Ok(MatchMethod::CCoeff),
            "ccoeff_normed" => Ok(MatchMethod::CCoeffNormed),
            other => anyhow::bail!("Unknown match method '{}'", other),
        }
    }
}

impl MatchFamily {
    /// `a` is a strictly better score than `b`
    pub fn is_better(self, a: f64, b: f64) -> bool {
        match self {
            MatchFamily::LowerIsBetter => a < b,
            MatchFamily::HigherIsBetter => a > b,
        }
    }

    /// Strict comparison against the threshold in the family's direction
    pub fn accepts(self, score: f64, threshold: f64) -> bool {
        self.is_better(score, threshold)
    }

    fn symbol(self) -> &'static str {
        match self {
            MatchFamily::LowerIsBetter => "<",
            MatchFamily::HigherIsBetter => ">",
        }
    }
}

/// Best match of one scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Score cleared the threshold
    pub found: bool,
    /// Center of the best-scoring window, in frame coordinates
    pub location: Point,
    pub score: f64,
}

/// Scores for every admissible template offset, row-major
#[derive(Debug, Clone)]
pub struct ScoreMap {
    pub cols: u32,
    pub rows: u32,
    pub scores: Vec<f64>,
}

impl ScoreMap {
    /// First offset holding the family's extreme, with its score.
    /// NaN scores never win.
    pub fn best(&self, family: MatchFamily) -> Option<(u32, u32, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, &score) in self.scores.iter().enumerate() {
            if score.is_nan() {
                continue;
            }
            match best {
                Some((_, b)) if !family.is_better(score, b) => {}
                _ => best = Some((i, score)),
            }
        }
        best.map(|(i, score)| {
            let i = i as u32;
            (i % self.cols, i / self.cols, score)
        })
    }
}

/// Template Matcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
    pub assets_dir: PathBuf,
    pub method: MatchMethod,
    pub threshold: f64,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets/champions"),
            method: MatchMethod::CCoeffNormed,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

struct ActiveTemplate {
    champion: String,
    team: Team,
    asset: PathBuf,
    template: Template,
}

/// Finds the tracked champion's icon in a minimap frame.
///
/// Holds at most one template. Changing the (champion, team) pair drops the
/// previous template before the new one is built, and the new one only
/// becomes live once fully constructed.
pub struct TemplateMatcher {
    store: TemplateStore,
    method: MatchMethod,
    threshold: f64,
    active: Option<ActiveTemplate>,
}

impl TemplateMatcher {
    pub fn new(settings: &MatcherSettings, aliases: Arc<ChampionAliases>) -> Self {
        Self {
            store: TemplateStore::new(settings.assets_dir.clone(), aliases),
            method: settings.method,
            threshold: settings.threshold,
            active: None,
        }
    }

    /// Make (champion, team) the live template. Returns false when no art
    /// can be loaded for it, in which case no template is live.
    pub fn set_template(&mut self, champion: &str, team: Team) -> bool {
        if champion.trim().is_empty() {
            return false;
        }
        let champion = self.store.normalize(champion);

        if let Some(active) = &self.active {
            if active.champion == champion && active.team == team {
                return true;
            }
        }

        // Release the old template before building the replacement
        self.active = None;

        match self.store.load(&champion, team) {
            Ok((asset, template)) => {
                if template.is_degenerate() {
                    warn!("Template {} has no usable pixels", asset.display());
                    return false;
                }
                info!(
                    "Template set: {} ({}), {}x{}, mask: {}",
                    champion,
                    team,
                    template.width(),
                    template.height(),
                    template.mask().is_some()
                );
                self.active = Some(ActiveTemplate {
                    champion,
                    team,
                    asset,
                    template,
                });
                true
            }
            Err(e) => {
                debug!("Cannot set template for {} ({}): {:#}", champion, team, e);
                false
            }
        }
    }

    /// Drop the live template, if any
    pub fn clear_template(&mut self) {
        self.active = None;
    }

    pub fn has_template(&self) -> bool {
        self.active.is_some()
    }

    /// Best match in `frame`, whether or not it clears the threshold.
    ///
    /// `None` when there is no live template, the template is degenerate, or
    /// the frame is smaller than the template in either axis.
    pub fn evaluate(&self, frame: &RgbaImage) -> Option<MatchResult> {
        let active = self.active.as_ref()?;
        let template = &active.template;
        if template.is_degenerate() {
            debug!("Scan declined: degenerate template");
            return None;
        }
        if frame.width() < template.width() || frame.height() < template.height() {
            debug!(
                "Scan declined: frame {}x{} smaller than template {}x{}",
                frame.width(),
                frame.height(),
                template.width(),
                template.height()
            );
            return None;
        }

        let map = score_map(frame, template, self.method);
        let family = self.method.family();
        let (x, y, score) = map.best(family)?;
        let found = family.accepts(score, self.threshold);
        let location = Point::new(x + template.width() / 2, y + template.height() / 2);

        debug!(
            "Best {} score {:.4} at ({}, {}), need {} {}: {}",
            self.method,
            score,
            location.x,
            location.y,
            family.symbol(),
            self.threshold,
            if found { "match" } else { "no match" }
        );

        Some(MatchResult {
            found,
            location,
            score,
        })
    }

    /// The match, only when it clears the threshold
    pub fn scan(&self, frame: &RgbaImage) -> Option<MatchResult> {
        self.evaluate(frame).filter(|m| m.found)
    }

    pub fn update_configuration(&mut self, threshold: f64, method: MatchMethod) {
        self.threshold = threshold;
        self.method = method;
        info!("Matcher configuration: method={} threshold={}", method, threshold);
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn method(&self) -> MatchMethod {
        self.method
    }

    pub fn template_size(&self) -> Option<(u32, u32)> {
        self.active
            .as_ref()
            .map(|a| (a.template.width(), a.template.height()))
    }

    pub fn template_info(&self) -> String {
        match &self.active {
            Some(a) => format!(
                "Template: {} ({}) from {}, size {}x{}, mask: {}",
                a.champion,
                a.team,
                a.asset.display(),
                a.template.width(),
                a.template.height(),
                if a.template.mask().is_some() { "yes" } else { "no" }
            ),
            None => "No template loaded".to_string(),
        }
    }
}

/// Score `template` against every window of `frame`. Rows are scored in parallel.
pub fn score_map(frame: &RgbaImage, template: &Template, method: MatchMethod) -> ScoreMap {
    let cols = frame.width() - template.width() + 1;
    let rows = frame.height() - template.height() + 1;

    let scores: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map_iter(|y| (0..cols).map(move |x| score_at(frame, template, method, x, y)))
        .collect();

    ScoreMap { cols, rows, scores }
}

/// Weighted similarity between `template` and the frame window at (ox, oy)
fn score_at(frame: &RgbaImage, template: &Template, method: MatchMethod, ox: u32, oy: u32) -> f64 {
    let mut sum_i = [0.0f64; 3];
    let mut sum_ii = [0.0f64; 3];
    let mut cross = 0.0;
    let mut centered_cross = 0.0;
    let mut sq_diff = 0.0;

    for tap in &template.taps {
        let p = frame.get_pixel(ox + tap.dx, oy + tap.dy);
        for c in 0..3 {
            let i = p[c] as f64;
            let w = tap.weight;
            sum_i[c] += w * i;
            sum_ii[c] += w * i * i;
            cross += w * tap.value[c] * i;
            centered_cross += w * tap.centered[c] * i;
            let d = tap.value[c] - i;
            sq_diff += w * d * d;
        }
    }

    let frame_energy: f64 = sum_ii.iter().sum();

    match method {
        MatchMethod::SqDiff => sq_diff,
        MatchMethod::SqDiffNormed => {
            let denom = (template.energy * frame_energy).sqrt();
            if denom < EPSILON {
                if sq_diff < EPSILON {
                    0.0
                } else {
                    1.0
                }
            } else {
                sq_diff / denom
            }
        }
        MatchMethod::CCorr => cross,
        MatchMethod::CCorrNormed => {
            let denom = (template.energy * frame_energy).sqrt();
            if denom < EPSILON {
                0.0
            } else {
                cross / denom
            }
        }
        // Σ w·(T - T̄)·(I - Ī) == Σ w·(T - T̄)·I since Σ w·(T - T̄) == 0
        MatchMethod::CCoeff => centered_cross,
        MatchMethod::CCoeffNormed => {
            let frame_var: f64 = (0..3)
                .map(|c| (sum_ii[c] - sum_i[c] * sum_i[c] / template.weight_sum).max(0.0))
                .sum();
            let denom = (template.centered_energy * frame_var).sqrt();
            if denom < EPSILON {
                0.0
            } else {
                centered_cross / denom
            }
        }
    }
}
