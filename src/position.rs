//! Apparent horizontal position of catalog stars.
//!
//! The selector only needs "where is this star in the observer's sky right
//! now", so that capability sits behind [`ApparentPositionProvider`]. Tests use
//! stub providers with fixed altitudes; production code uses [`AltAzProvider`].
//!
//! `AltAzProvider` pipeline:
//! 1. Julian date of 0h UT on the civil date, and Greenwich mean sidereal time
//!    at that instant advanced by elapsed UT times the sidereal rate
//! 2. Optional IAU 1976 precession of the J2000 position to the date
//! 3. Local hour angle `H = GMST + east_longitude - RA`
//! 4. Altitude and azimuth from `H`, declination, and latitude
//!
//! Nutation, aberration, and refraction are not applied; together they move a
//! star by well under a degree, far below the 45 degree visibility cut.

use std::f64::consts::PI;

use astro::angle::limit_to_two_PI;
use astro::coords::{alt_frm_eq, az_frm_eq};
use astro::time::{julian_day, mn_sidr, CalType, Date};
use chrono::{DateTime, Datelike, Timelike, Utc};
use nalgebra::{Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SkyguideError};
use crate::{CatalogStar, Observer};

/// Sidereal time advances this much faster than UT.
const SIDEREAL_RATE: f64 = 1.002_737_909_35;
const J2000_JD: f64 = 2_451_545.0;
const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;
const AU_PER_PARSEC: f64 = 206_264.806_247;
/// Distance assigned to stars without a usable parallax.
const GIGAPARSEC_AU: f64 = 1.0e9 * AU_PER_PARSEC;

/// Position of an object in the observer's local sky.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalPosition {
    /// Degrees above the horizon; negative when below it.
    pub altitude_deg: f64,
    /// Degrees clockwise from north, in `[0, 360)`.
    pub azimuth_deg: f64,
    /// Distance to the object in astronomical units.
    pub distance_au: f64,
}

/// Computes where a catalog star appears for an observer at a given time.
///
/// Implementations must be pure: the same inputs give bit-identical outputs.
pub trait ApparentPositionProvider {
    fn apparent_position(
        &self,
        star: &CatalogStar,
        observer: &Observer,
        time: &DateTime<Utc>,
    ) -> Result<HorizontalPosition>;
}

impl<P: ApparentPositionProvider + ?Sized> ApparentPositionProvider for &P {
    fn apparent_position(
        &self,
        star: &CatalogStar,
        observer: &Observer,
        time: &DateTime<Utc>,
    ) -> Result<HorizontalPosition> {
        (**self).apparent_position(star, observer, time)
    }
}

impl<P: ApparentPositionProvider + ?Sized> ApparentPositionProvider for std::sync::Arc<P> {
    fn apparent_position(
        &self,
        star: &CatalogStar,
        observer: &Observer,
        time: &DateTime<Utc>,
    ) -> Result<HorizontalPosition> {
        (**self).apparent_position(star, observer, time)
    }
}

/// Equatorial-to-horizontal conversion using mean sidereal time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AltAzProvider {
    /// Precess J2000 catalog positions to the query date.
    /// Default: true
    pub precess: bool,
}

impl Default for AltAzProvider {
    fn default() -> Self {
        Self { precess: true }
    }
}

impl ApparentPositionProvider for AltAzProvider {
    fn apparent_position(
        &self,
        star: &CatalogStar,
        observer: &Observer,
        time: &DateTime<Utc>,
    ) -> Result<HorizontalPosition> {
        let (jd_midnight, ut_hours) = julian_day_parts(time)?;
        let jd = jd_midnight + ut_hours / 24.0;

        let (ra, dec) = if self.precess {
            precess_from_j2000(star.uvec(), jd)
        } else {
            (star.ra_deg.to_radians(), star.dec_deg.to_radians())
        };

        let gmst = greenwich_mean_sidereal_time(jd_midnight, ut_hours);
        let lat = observer.latitude_deg().to_radians();
        let long = observer.longitude_deg().to_radians();
        let hour_angle = gmst + long - ra;

        let altitude = alt_frm_eq(hour_angle, dec, lat);
        // Meeus measures azimuth westward from south.
        let azimuth = limit_to_two_PI(az_frm_eq(hour_angle, dec, lat) + PI);

        let position = HorizontalPosition {
            altitude_deg: altitude.to_degrees(),
            azimuth_deg: azimuth.to_degrees().rem_euclid(360.0),
            distance_au: distance_au(star.parallax_mas),
        };
        if !position.altitude_deg.is_finite() || !position.azimuth_deg.is_finite() {
            return Err(SkyguideError::invalid(format!(
                "position of {} is not finite for the given observer and time",
                star.label()
            )));
        }
        Ok(position)
    }
}

/// Julian day at 0h UT of the civil date, plus the UT hours since then.
fn julian_day_parts(time: &DateTime<Utc>) -> Result<(f64, f64)> {
    let date = time.date_naive();
    let year = i16::try_from(date.year())
        .map_err(|_| SkyguideError::invalid(format!("year {} is out of range", date.year())))?;
    let jd_midnight = julian_day(&Date {
        year,
        month: date.month() as u8,
        decimal_day: date.day() as f64,
        cal_type: CalType::Gregorian,
    });
    let clock = time.time();
    let seconds =
        clock.num_seconds_from_midnight() as f64 + clock.nanosecond() as f64 * 1e-9;
    Ok((jd_midnight, seconds / 3600.0))
}

/// GMST in radians, `[0, 2pi)`.
fn greenwich_mean_sidereal_time(jd_midnight: f64, ut_hours: f64) -> f64 {
    let gmst_hours = mn_sidr(jd_midnight).to_degrees() / 15.0 + ut_hours * SIDEREAL_RATE;
    limit_to_two_PI((gmst_hours * 15.0).to_radians())
}

/// Rotate a J2000 unit vector to the mean equator and equinox of `jd`.
///
/// IAU 1976 angles (Meeus, ch. 21): `P = Rz(z) * Ry(-theta) * Rz(zeta)`.
/// Returns `(ra, dec)` in radians, RA in `[0, 2pi)`.
fn precess_from_j2000(uvec: Vector3<f64>, jd: f64) -> (f64, f64) {
    let t = (jd - J2000_JD) / DAYS_PER_JULIAN_CENTURY;
    let arcsec = |x: f64| (x / 3600.0).to_radians();
    let zeta = arcsec(2306.2181 * t + 0.30188 * t * t + 0.017998 * t * t * t);
    let z = arcsec(2306.2181 * t + 1.09468 * t * t + 0.018203 * t * t * t);
    let theta = arcsec(2004.3109 * t - 0.42665 * t * t - 0.041833 * t * t * t);

    let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), z)
        * Rotation3::from_axis_angle(&Vector3::y_axis(), -theta)
        * Rotation3::from_axis_angle(&Vector3::z_axis(), zeta);
    let v = rotation * uvec;

    let ra = limit_to_two_PI(v.y.atan2(v.x));
    let dec = v.z.clamp(-1.0, 1.0).asin();
    (ra, dec)
}

fn distance_au(parallax_mas: Option<f64>) -> f64 {
    match parallax_mas {
        Some(plx) if plx > 0.0 => 1000.0 / plx * AU_PER_PARSEC,
        _ => GIGAPARSEC_AU,
    }
}
