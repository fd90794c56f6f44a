//! Identify a constellation from the pattern of its brightest stars.
//!
//! Each constellation template is the gnomonic projection of its brightest
//! catalog members about their mean direction, laid out like a photo of the
//! sky (north up, east left, +y down). Templates and detections are both
//! reduced to a canonical frame: centred on their mean and scaled to unit RMS
//! radius. What remains unknown is the camera roll, so every template is tried
//! over a full turn of rotations and scored by the symmetric mean
//! nearest-neighbour distance. The lowest score under `max_score` wins.

use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::extraction::Centroid;
use crate::StarCatalog;

/// Fewer points than this fit any pattern after normalization.
const MIN_PATTERN_POINTS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Brightest catalog members per template, and brightest detections compared.
    /// Default: 5
    pub stars_per_template: usize,
    /// Default: 1.0
    pub rotation_step_deg: f64,
    /// Scores at or above this are not a match. Units are the unit-RMS frame.
    /// Default: 0.1
    pub max_score: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            stars_per_template: 5,
            rotation_step_deg: 1.0,
            max_score: 0.1,
        }
    }
}

/// Normalized star pattern of one constellation.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstellationTemplate {
    pub constellation: String,
    pub points: Vec<Vector2<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstellationMatch {
    pub constellation: String,
    pub score: f64,
    /// Roll that best aligned the template with the detections.
    pub rotation_deg: f64,
}

/// Centre on the mean and scale to unit RMS radius. `None` for coincident points.
pub fn normalize(points: &[Vector2<f64>]) -> Option<Vec<Vector2<f64>>> {
    if points.is_empty() {
        return None;
    }
    let mean = points.iter().sum::<Vector2<f64>>() / points.len() as f64;
    let rms = (points.iter().map(|p| (p - mean).norm_squared()).sum::<f64>()
        / points.len() as f64)
        .sqrt();
    if !rms.is_finite() || rms < 1e-12 {
        return None;
    }
    Some(points.iter().map(|p| (p - mean) / rms).collect())
}

/// Mean over `a` of the distance to the nearest point of `b`, averaged both ways.
pub fn symmetric_mean_nn_distance(a: &[Vector2<f64>], b: &[Vector2<f64>]) -> f64 {
    fn one_way(from: &[Vector2<f64>], to: &[Vector2<f64>]) -> f64 {
        from.iter()
            .map(|p| {
                to.iter()
                    .map(|q| (p - q).norm())
                    .fold(f64::INFINITY, f64::min)
            })
            .sum::<f64>()
            / from.len() as f64
    }
    if a.is_empty() || b.is_empty() {
        return f64::INFINITY;
    }
    0.5 * (one_way(a, b) + one_way(b, a))
}

/// Project the brightest `stars_per_template` members of each constellation.
///
/// Constellations with fewer than three members are skipped.
pub fn build_templates(
    catalog: &StarCatalog,
    stars_per_template: usize,
) -> Vec<ConstellationTemplate> {
    let mut templates = Vec::new();
    for label in catalog.constellations() {
        let mut members: Vec<_> = catalog.members(label).collect();
        if members.len() < MIN_PATTERN_POINTS {
            continue;
        }
        members.sort_by(|a, b| a.mag.total_cmp(&b.mag));
        members.truncate(stars_per_template.max(MIN_PATTERN_POINTS));

        let center = members.iter().map(|s| s.uvec()).sum::<nalgebra::Vector3<f64>>();
        let Some(center) = center.try_normalize(1e-12) else {
            continue;
        };
        let projected: Vec<Vector2<f64>> = members
            .iter()
            .filter_map(|s| gnomonic(&center, &s.uvec()))
            .map(|p| Vector2::new(-p.x, -p.y))
            .collect();
        if let Some(points) = normalize(&projected) {
            templates.push(ConstellationTemplate {
                constellation: label.clone(),
                points,
            });
        }
    }
    templates
}

/// Tangent-plane coordinates (east, north) of `v` about `center`.
fn gnomonic(center: &nalgebra::Vector3<f64>, v: &nalgebra::Vector3<f64>) -> Option<Vector2<f64>> {
    let cos_c = center.dot(v);
    if cos_c <= 0.0 {
        return None;
    }
    let pole = nalgebra::Vector3::z();
    let east = pole.cross(center);
    // A template centred on a celestial pole has no unique east; pick +x.
    let east = east.try_normalize(1e-12).unwrap_or_else(nalgebra::Vector3::x);
    let north = center.cross(&east);
    Some(Vector2::new(east.dot(v) / cos_c, north.dot(v) / cos_c))
}

pub struct ConstellationMatcher {
    templates: Vec<ConstellationTemplate>,
    config: MatchConfig,
}

impl ConstellationMatcher {
    pub fn from_catalog(catalog: &StarCatalog, config: MatchConfig) -> Self {
        let templates = build_templates(catalog, config.stars_per_template);
        debug!("Built {} constellation templates", templates.len());
        Self { templates, config }
    }

    pub fn templates(&self) -> &[ConstellationTemplate] {
        &self.templates
    }

    /// Best-matching constellation for detections sorted brightest first.
    pub fn identify(&self, centroids: &[Centroid]) -> Option<ConstellationMatch> {
        let observed: Vec<Vector2<f64>> = centroids
            .iter()
            .take(self.config.stars_per_template.max(MIN_PATTERN_POINTS))
            .map(|c| Vector2::new(c.x as f64, c.y as f64))
            .collect();
        if observed.len() < MIN_PATTERN_POINTS {
            debug!("Only {} detections; not enough to match", observed.len());
            return None;
        }
        let observed = normalize(&observed)?;

        let step = self.config.rotation_step_deg.max(1e-3);
        let num_steps = (360.0 / step).ceil() as usize;

        let mut best: Option<ConstellationMatch> = None;
        for template in &self.templates {
            for k in 0..num_steps {
                let angle = k as f64 * step;
                let rot = Rotation2::new(angle.to_radians());
                let rotated: Vec<Vector2<f64>> = template.points.iter().map(|p| rot * p).collect();
                let score = symmetric_mean_nn_distance(&observed, &rotated);
                if best.as_ref().map_or(true, |b| score < b.score) {
                    best = Some(ConstellationMatch {
                        constellation: template.constellation.clone(),
                        score,
                        rotation_deg: angle,
                    });
                }
            }
        }

        match best {
            Some(m) if m.score < self.config.max_score => {
                debug!(
                    "Matched {} (score {:.4}, roll {:.1} deg)",
                    m.constellation, m.score, m.rotation_deg
                );
                Some(m)
            }
            other => {
                debug!("No constellation matched (best {:?})", other.map(|m| m.score));
                None
            }
        }
    }

    /// Whether the photo shows `claimed`. False when nothing matches.
    pub fn verify_claim(&self, centroids: &[Centroid], claimed: &str) -> bool {
        self.identify(centroids)
            .is_some_and(|m| m.constellation == claimed)
    }
}
