use anyhow::{Context, Result};
use jt_data::{Point, Team};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Side length of the square reference plane the zone polygons live on
pub const REFERENCE_SIZE: f64 = 510.0;

/// Named map regions, in classification order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ZoneId {
    Top,
    RedTopJungle,
    RedBase,
    RedBotJungle,
    Bot,
    BlueBotJungle,
    BlueBase,
    BlueTopJungle,
    TopRiver,
    Mid,
    BotRiver,
}

impl ZoneId {
    pub const ALL: [ZoneId; 11] = [
        ZoneId::Top,
        ZoneId::RedTopJungle,
        ZoneId::RedBase,
        ZoneId::RedBotJungle,
        ZoneId::Bot,
        ZoneId::BlueBotJungle,
        ZoneId::BlueBase,
        ZoneId::BlueTopJungle,
        ZoneId::TopRiver,
        ZoneId::Mid,
        ZoneId::BotRiver,
    ];

    /// Fountain zone of `team` (ORDER is blue side, CHAOS red side)
    pub fn base_of(team: Team) -> ZoneId {
        match team {
            Team::Order => ZoneId::BlueBase,
            Team::Chaos => ZoneId::RedBase,
        }
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ZoneLayoutError {
    #[error("zone {zone} needs at least 3 points, got {count}")]
    TooFewPoints { zone: ZoneId, count: usize },
    #[error("zone {0} is defined more than once")]
    Duplicate(ZoneId),
    #[error("zone {zone} has a non-finite coordinate")]
    NonFinite { zone: ZoneId },
    #[error("zones {a} and {b} overlap")]
    Overlap { a: ZoneId, b: ZoneId },
}

/// Simple polygon on the reference plane
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    points: Vec<(f64, f64)>,
}

impl Polygon {
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// Even-odd ray cast
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.points.len();
        let mut inside = false;
        for i in 0..n {
            let (x1, y1) = self.points[i];
            let (x2, y2) = self.points[(i + 1) % n];
            if (y1 > y) != (y2 > y) {
                let xi = x1 + (y - y1) * (x2 - x1) / (y2 - y1);
                if x < xi {
                    inside = !inside;
                }
            }
        }
        inside
    }

    fn edges(&self) -> impl Iterator<Item = ((f64, f64), (f64, f64))> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }

    fn bounds(&self) -> (f64, f64, f64, f64) {
        self.points.iter().fold(
            (f64::MAX, f64::MAX, f64::MIN, f64::MIN),
            |(x0, y0, x1, y1), &(x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        )
    }
}

/// One zone as written in a layout file: `{"zone": "Mid", "points": [[x, y], ...]}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneSpec {
    pub zone: ZoneId,
    pub points: Vec<[f64; 2]>,
}

/// Fixed set of zone polygons, checked disjoint at construction
#[derive(Debug, Clone)]
pub struct ZoneLayout {
    zones: Vec<(ZoneId, Polygon)>,
}

impl ZoneLayout {
    /// Validate and order `specs`. Zones may share edges but not interior area.
    pub fn new(specs: Vec<ZoneSpec>) -> Result<Self, ZoneLayoutError> {
        let mut seen = HashSet::new();
        let mut zones = Vec::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.zone) {
                return Err(ZoneLayoutError::Duplicate(spec.zone));
            }
            if spec.points.len() < 3 {
                return Err(ZoneLayoutError::TooFewPoints {
                    zone: spec.zone,
                    count: spec.points.len(),
                });
            }
            if spec.points.iter().flatten().any(|v| !v.is_finite()) {
                return Err(ZoneLayoutError::NonFinite { zone: spec.zone });
            }
            let points = spec.points.iter().map(|p| (p[0], p[1])).collect();
            zones.push((spec.zone, Polygon::new(points)));
        }
        zones.sort_by_key(|(id, _)| *id);

        for i in 0..zones.len() {
            for j in (i + 1)..zones.len() {
                if overlaps(&zones[i].1, &zones[j].1) {
                    return Err(ZoneLayoutError::Overlap {
                        a: zones[i].0,
                        b: zones[j].0,
                    });
                }
            }
        }

        Ok(Self { zones })
    }

    /// The built-in Summoner's Rift layout
    pub fn standard() -> Self {
        let zones = standard_specs()
            .into_iter()
            .map(|s| (s.zone, Polygon::new(s.points.iter().map(|p| (p[0], p[1])).collect())))
            .collect();
        Self { zones }
    }

    /// Load a JSON list of [`ZoneSpec`]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let specs: Vec<ZoneSpec> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        let layout = Self::new(specs).with_context(|| format!("Invalid zone layout {}", path.display()))?;
        info!("Loaded {} zones from {}", layout.len(), path.display());
        Ok(layout)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn polygon(&self, zone: ZoneId) -> Option<&Polygon> {
        self.zones.iter().find(|(id, _)| *id == zone).map(|(_, p)| p)
    }

    /// Zone containing a point given in reference-plane coordinates
    pub fn zone_at(&self, x: f64, y: f64) -> Option<ZoneId> {
        self.zones
            .iter()
            .find(|(_, poly)| poly.contains(x, y))
            .map(|(id, _)| *id)
    }

    /// Zone containing `location`, a point in a `capture_size` square capture
    pub fn classify(&self, location: Point, capture_size: u32) -> Option<ZoneId> {
        if capture_size == 0 {
            return None;
        }
        let scale = capture_size as f64 / REFERENCE_SIZE;
        self.zone_at(location.x as f64 / scale, location.y as f64 / scale)
    }
}

impl Default for ZoneLayout {
    fn default() -> Self {
        Self::standard()
    }
}

fn overlaps(a: &Polygon, b: &Polygon) -> bool {
    if a.edges().any(|ea| b.edges().any(|eb| segments_cross(ea, eb))) {
        return true;
    }

    // Sample pixel centers over the shared bounding box; catches nesting and
    // coincident polygons, which have no proper edge crossings
    let (ax0, ay0, ax1, ay1) = a.bounds();
    let (bx0, by0, bx1, by1) = b.bounds();
    let (x0, y0) = (ax0.max(bx0).floor(), ay0.max(by0).floor());
    let (x1, y1) = (ax1.min(bx1).ceil(), ay1.min(by1).ceil());
    if x0 >= x1 || y0 >= y1 {
        return false;
    }
    let mut y = y0 + 0.5;
    while y < y1 {
        let mut x = x0 + 0.5;
        while x < x1 {
            if a.contains(x, y) && b.contains(x, y) {
                return true;
            }
            x += 1.0;
        }
        y += 1.0;
    }
    false
}

/// The segments' interiors cross at a single point (touching or collinear does not count)
fn segments_cross(a: ((f64, f64), (f64, f64)), b: ((f64, f64), (f64, f64))) -> bool {
    fn orient(p: (f64, f64), q: (f64, f64), r: (f64, f64)) -> f64 {
        (q.0 - p.0) * (r.1 - p.1) - (q.1 - p.1) * (r.0 - p.0)
    }
    let d1 = orient(b.0, b.1, a.0);
    let d2 = orient(b.0, b.1, a.1);
    let d3 = orient(a.0, a.1, b.0);
    let d4 = orient(a.0, a.1, b.1);
    d1 * d2 < 0.0 && d3 * d4 < 0.0
}

fn spec(zone: ZoneId, points: &[(f64, f64)]) -> ZoneSpec {
    ZoneSpec {
        zone,
        points: points.iter().map(|&(x, y)| [x, y]).collect(),
    }
}

/// Default tessellation of the 510x510 minimap: lanes along the edges and the
/// diagonal, bases in the corners, four jungle quadrants split by the river.
pub fn standard_specs() -> Vec<ZoneSpec> {
    vec![
        spec(
            ZoneId::Top,
            &[(0.0, 0.0), (360.0, 0.0), (360.0, 60.0), (60.0, 60.0), (60.0, 360.0), (0.0, 360.0)],
        ),
        spec(
            ZoneId::RedTopJungle,
            &[(90.0, 60.0), (360.0, 60.0), (360.0, 150.0), (330.0, 150.0), (255.0, 225.0)],
        ),
        spec(
            ZoneId::RedBase,
            &[(360.0, 0.0), (510.0, 0.0), (510.0, 150.0), (360.0, 150.0)],
        ),
        spec(
            ZoneId::RedBotJungle,
            &[(360.0, 150.0), (450.0, 150.0), (450.0, 420.0), (285.0, 255.0), (360.0, 180.0)],
        ),
        spec(
            ZoneId::Bot,
            &[(150.0, 450.0), (450.0, 450.0), (450.0, 150.0), (510.0, 150.0), (510.0, 510.0), (150.0, 510.0)],
        ),
        spec(
            ZoneId::BlueBotJungle,
            &[(255.0, 285.0), (420.0, 450.0), (150.0, 450.0), (150.0, 360.0), (180.0, 360.0)],
        ),
        spec(
            ZoneId::BlueBase,
            &[(0.0, 360.0), (150.0, 360.0), (150.0, 510.0), (0.0, 510.0)],
        ),
        spec(
            ZoneId::BlueTopJungle,
            &[(60.0, 90.0), (225.0, 255.0), (150.0, 330.0), (150.0, 360.0), (60.0, 360.0)],
        ),
        spec(
            ZoneId::TopRiver,
            &[(60.0, 60.0), (90.0, 60.0), (255.0, 225.0), (225.0, 255.0), (60.0, 90.0)],
        ),
        spec(
            ZoneId::Mid,
            &[(150.0, 330.0), (330.0, 150.0), (360.0, 150.0), (360.0, 180.0), (180.0, 360.0), (150.0, 360.0)],
        ),
        spec(
            ZoneId::BotRiver,
            &[(285.0, 255.0), (450.0, 420.0), (450.0, 450.0), (420.0, 450.0), (255.0, 285.0)],
        ),
    ]
}
