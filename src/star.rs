use serde::{Deserialize, Serialize};

/// One row of the star catalog.
///
/// RA & Dec are in degrees and assume proper motion (if any) has already been
/// applied. Magnitude follows the usual convention: lower is brighter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStar {
    pub id: u64,
    pub name: Option<String>,
    pub ra_deg: f64,
    pub dec_deg: f64,
    pub mag: f32,
    pub parallax_mas: Option<f64>,
    pub constellation: String,
}

impl CatalogStar {
    /// Unit vector pointing to the star's position on the celestial sphere.
    pub fn uvec(&self) -> nalgebra::Vector3<f64> {
        let (rasin, racos) = self.ra_deg.to_radians().sin_cos();
        let (decsin, deccos) = self.dec_deg.to_radians().sin_cos();
        nalgebra::Vector3::new(deccos * racos, deccos * rasin, decsin)
    }

    /// Display label: the proper name when known, otherwise the catalog id.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("HIP {}", self.id),
        }
    }
}

/// Hipparcos reference epoch (J1991.25), the epoch of the catalog positions.
pub const HIPPARCOS_EPOCH_YEAR: f64 = 1991.25;

/// Propagate a catalog position by its proper motion.
///
/// `pm_ra_mas_yr` is mu_alpha * cos(delta) as published by Hipparcos.
/// Returns `(ra_deg, dec_deg)` at `target_year`.
///
/// Proper motion near the celestial poles (|dec| > ~87 degrees) is ignored
/// because the cos(dec) divisor becomes numerically unstable.
pub fn propagate_proper_motion(
    ra_deg: f64,
    dec_deg: f64,
    pm_ra_mas_yr: f64,
    pm_dec_mas_yr: f64,
    target_year: f64,
) -> (f64, f64) {
    const MAS_PER_DEG: f64 = 3600.0 * 1000.0;

    let dt_years = target_year - HIPPARCOS_EPOCH_YEAR;
    let cos_dec = dec_deg.to_radians().cos();
    if cos_dec.abs() <= 0.05 {
        return (ra_deg, dec_deg);
    }

    let ra = ra_deg + pm_ra_mas_yr / cos_dec / MAS_PER_DEG * dt_years;
    let dec = dec_deg + pm_dec_mas_yr / MAS_PER_DEG * dt_years;
    (ra.rem_euclid(360.0), dec.clamp(-90.0, 90.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_leaves_position_unchanged() {
        let (ra, dec) = propagate_proper_motion(101.287, -16.716, -546.0, -1223.0, 1991.25);
        assert_eq!(ra, 101.287);
        assert_eq!(dec, -16.716);
    }

    #[test]
    fn sirius_moves_south_over_a_century() {
        // Sirius: pm_dec = -1223 mas/yr -> ~0.034 deg per century
        let (_, dec) = propagate_proper_motion(101.287, -16.716, -546.0, -1223.0, 2091.25);
        assert!((dec - (-16.716 - 0.03397)).abs() < 1e-4, "dec = {dec}");
    }

    #[test]
    fn polar_star_is_not_propagated() {
        let (ra, dec) = propagate_proper_motion(37.95, 88.0, 44.0, -11.0, 2025.0);
        assert_eq!((ra, dec), (37.95, 88.0));
    }

    #[test]
    fn label_prefers_name() {
        let mut star = CatalogStar {
            id: 11767,
            name: Some("Polaris".into()),
            ra_deg: 37.95,
            dec_deg: 89.26,
            mag: 1.97,
            parallax_mas: None,
            constellation: "UMi".into(),
        };
        assert_eq!(star.label(), "Polaris");
        star.name = None;
        assert_eq!(star.label(), "HIP 11767");
    }
}
