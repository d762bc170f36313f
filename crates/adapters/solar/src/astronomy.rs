//! NOAA solar position equations.
//!
//! Accurate to about a minute for sunrise/sunset between ±72° latitude,
//! which is far below the resolution at which covers are scheduled.

use chrono::{Duration, NaiveDate};

use shutterctl_domain::time::Timestamp;

/// Zenith of the sun's upper limb at sunrise/sunset, including refraction.
const SUNRISE_ZENITH: f64 = 90.833;

const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;
const J2000: f64 = 2_451_545.0;

/// Declination and equation of time at one instant.
#[derive(Debug, Clone, Copy)]
struct SolarTerms {
    /// Degrees.
    declination: f64,
    /// Minutes.
    equation_of_time: f64,
}

#[allow(clippy::cast_precision_loss)]
fn julian_century(at: Timestamp) -> f64 {
    let julian_day = at.timestamp() as f64 / 86_400.0 + UNIX_EPOCH_JULIAN_DAY;
    (julian_day - J2000) / 36_525.0
}

fn solar_terms(at: Timestamp) -> SolarTerms {
    let t = julian_century(at);

    let mean_longitude = (280.466_46 + t * (36_000.769_83 + t * 0.000_303_2)).rem_euclid(360.0);
    let mean_anomaly = 357.529_11 + t * (35_999.050_29 - 0.000_153_7 * t);
    let eccentricity = 0.016_708_634 - t * (0.000_042_037 + 0.000_000_126_7 * t);

    let m = mean_anomaly.to_radians();
    let center = m.sin() * (1.914_602 - t * (0.004_817 + 0.000_014 * t))
        + (2.0 * m).sin() * (0.019_993 - 0.000_101 * t)
        + (3.0 * m).sin() * 0.000_289;
    let true_longitude = mean_longitude + center;

    let omega = (125.04 - 1_934.136 * t).to_radians();
    let apparent_longitude = true_longitude - 0.005_69 - 0.004_78 * omega.sin();

    let mean_obliquity =
        23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.000_59 - t * 0.001_813))) / 60.0) / 60.0;
    let obliquity = (mean_obliquity + 0.002_56 * omega.cos()).to_radians();

    let declination = (obliquity.sin() * apparent_longitude.to_radians().sin())
        .asin()
        .to_degrees();

    let y = (obliquity / 2.0).tan().powi(2);
    let l0 = mean_longitude.to_radians();
    let equation_of_time = 4.0
        * (y * (2.0 * l0).sin() - 2.0 * eccentricity * m.sin()
            + 4.0 * eccentricity * y * m.sin() * (2.0 * l0).cos()
            - 0.5 * y * y * (4.0 * l0).sin()
            - 1.25 * eccentricity * eccentricity * (2.0 * m).sin())
        .to_degrees();

    SolarTerms {
        declination,
        equation_of_time,
    }
}

/// Sun elevation and azimuth in degrees at `at`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sun_position(latitude: f64, longitude: f64, at: Timestamp) -> (f64, f64) {
    let terms = solar_terms(at);

    let seconds_of_day = at.timestamp().rem_euclid(86_400) as f64;
    let true_solar_time =
        (seconds_of_day / 60.0 + terms.equation_of_time + 4.0 * longitude).rem_euclid(1_440.0);
    let hour_angle = true_solar_time / 4.0 - 180.0;

    let lat = latitude.to_radians();
    let dec = terms.declination.to_radians();
    let cos_zenith =
        (lat.sin() * dec.sin() + lat.cos() * dec.cos() * hour_angle.to_radians().cos())
            .clamp(-1.0, 1.0);
    let zenith = cos_zenith.acos();
    let elevation = 90.0 - zenith.to_degrees();

    let denominator = lat.cos() * zenith.sin();
    let azimuth = if denominator.abs() < 1e-9 {
        // sun at zenith or observer at a pole
        180.0
    } else {
        let cos_azimuth = ((lat.sin() * cos_zenith - dec.sin()) / denominator).clamp(-1.0, 1.0);
        let angle = cos_azimuth.acos().to_degrees();
        if hour_angle > 0.0 {
            (angle + 180.0).rem_euclid(360.0)
        } else {
            (540.0 - angle).rem_euclid(360.0)
        }
    };

    (elevation, azimuth)
}

/// Which crossing of the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    Rise,
    Set,
}

/// Instant of sunrise or sunset on the UTC day `date`, or `None` during polar
/// day or polar night.
#[must_use]
pub fn horizon_crossing(
    latitude: f64,
    longitude: f64,
    date: NaiveDate,
    crossing: Crossing,
) -> Option<Timestamp> {
    let midnight = date.and_hms_opt(0, 0, 0)?.and_utc();
    // first guess at solar noon, refined once at the event itself
    let mut estimate = midnight + minutes_f64(720.0 - 4.0 * longitude);
    for _ in 0..2 {
        let terms = solar_terms(estimate);
        let hour_angle = sunrise_hour_angle(latitude, terms.declination)?;
        let noon = 720.0 - 4.0 * longitude - terms.equation_of_time;
        let offset = match crossing {
            Crossing::Rise => noon - 4.0 * hour_angle,
            Crossing::Set => noon + 4.0 * hour_angle,
        };
        estimate = midnight + minutes_f64(offset);
    }
    Some(estimate)
}

fn sunrise_hour_angle(latitude: f64, declination: f64) -> Option<f64> {
    let lat = latitude.to_radians();
    let dec = declination.to_radians();
    let cos_hour_angle =
        SUNRISE_ZENITH.to_radians().cos() / (lat.cos() * dec.cos()) - lat.tan() * dec.tan();
    if !(-1.0..=1.0).contains(&cos_hour_angle) {
        return None;
    }
    Some(cos_hour_angle.acos().to_degrees())
}

#[allow(clippy::cast_possible_truncation)]
fn minutes_f64(value: f64) -> Duration {
    Duration::seconds((value * 60.0).round() as i64)
}
