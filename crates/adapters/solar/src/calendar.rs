//! [`SolarCalendar`] implementation for a fixed location.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use shutterctl_app::ports::{SolarCalendar, SunPosition};
use shutterctl_domain::error::SchedulingError;
use shutterctl_domain::schedule::SunTimes;
use shutterctl_domain::time::Timestamp;

use crate::astronomy::{self, Crossing};
use crate::config::LocationConfig;
use crate::error::SolarError;

/// Sun events and wall-clock resolution for one location.
#[derive(Debug, Clone, Copy)]
pub struct NoaaCalendar {
    latitude: f64,
    longitude: f64,
    timezone: Tz,
}

impl NoaaCalendar {
    /// # Errors
    ///
    /// Returns [`SolarError`] when a coordinate is out of range.
    pub fn new(latitude: f64, longitude: f64, timezone: Tz) -> Result<Self, SolarError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(SolarError::LatitudeOutOfRange(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(SolarError::LongitudeOutOfRange(longitude));
        }
        Ok(Self {
            latitude,
            longitude,
            timezone,
        })
    }

    /// # Errors
    ///
    /// Returns [`SolarError`] for an unknown timezone or out-of-range coordinates.
    pub fn from_config(config: &LocationConfig) -> Result<Self, SolarError> {
        let timezone = config
            .timezone
            .parse::<Tz>()
            .map_err(|_| SolarError::UnknownTimezone(config.timezone.clone()))?;
        Self::new(config.latitude, config.longitude, timezone)
    }

    #[must_use]
    pub fn timezone(&self) -> Tz {
        self.timezone
    }
}

impl SolarCalendar for NoaaCalendar {
    fn local_date(&self, at: Timestamp) -> NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }

    fn sun_times(&self, date: NaiveDate) -> Result<SunTimes, SchedulingError> {
        let rise = astronomy::horizon_crossing(self.latitude, self.longitude, date, Crossing::Rise);
        let set = astronomy::horizon_crossing(self.latitude, self.longitude, date, Crossing::Set);
        match (rise, set) {
            (Some(sunrise), Some(sunset)) => Ok(SunTimes { sunrise, sunset }),
            _ => {
                tracing::debug!(%date, latitude = self.latitude, "sun does not rise or set");
                Err(SchedulingError::NoSunEvent(date))
            }
        }
    }

    fn local_time(&self, date: NaiveDate, time: NaiveTime) -> Result<Timestamp, SchedulingError> {
        self.timezone
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .ok_or(SchedulingError::NonexistentLocalTime(date))
    }

    fn sun_position(&self, at: Timestamp) -> SunPosition {
        let (elevation, azimuth) = astronomy::sun_position(self.latitude, self.longitude, at);
        SunPosition { elevation, azimuth }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn berlin() -> NoaaCalendar {
        NoaaCalendar::from_config(&LocationConfig {
            latitude: 52.52,
            longitude: 13.405,
            timezone: "Europe/Berlin".to_string(),
        })
        .unwrap()
    }

    fn date(value: &str) -> NaiveDate {
        value.parse().unwrap()
    }

    fn time(value: &str) -> NaiveTime {
        value.parse().unwrap()
    }

    #[test]
    fn should_reject_unknown_timezone() {
        let config = LocationConfig {
            timezone: "Nowhere/Special".to_string(),
            ..LocationConfig::default()
        };
        assert_eq!(
            NoaaCalendar::from_config(&config).unwrap_err(),
            SolarError::UnknownTimezone("Nowhere/Special".to_string())
        );
    }

    #[test]
    fn should_reject_latitude_out_of_range() {
        let result = NoaaCalendar::new(95.0, 0.0, Tz::UTC);
        assert_eq!(result.unwrap_err(), SolarError::LatitudeOutOfRange(95.0));
    }

    #[test]
    fn should_use_local_date_of_timezone() {
        let calendar = berlin();
        let late_evening: Timestamp = "2026-06-21T22:30:00Z".parse().unwrap();
        assert_eq!(calendar.local_date(late_evening), date("2026-06-22"));
    }

    #[test]
    fn should_order_sunrise_before_sunset() {
        let times = berlin().sun_times(date("2026-04-01")).unwrap();
        assert!(times.sunrise < times.sunset);
    }

    #[test]
    fn should_fail_with_no_sun_event_in_polar_night() {
        let calendar = NoaaCalendar::new(78.22, 15.65, Tz::UTC).unwrap();
        assert_eq!(
            calendar.sun_times(date("2026-12-21")).unwrap_err(),
            SchedulingError::NoSunEvent(date("2026-12-21"))
        );
    }

    #[test]
    fn should_resolve_local_time_with_daylight_saving() {
        let at = berlin()
            .local_time(date("2026-07-01"), time("07:30:00"))
            .unwrap();
        assert_eq!(at, "2026-07-01T05:30:00Z".parse::<Timestamp>().unwrap());
    }

    #[test]
    fn should_fail_for_local_time_inside_spring_forward_gap() {
        assert_eq!(
            berlin()
                .local_time(date("2026-03-29"), time("02:30:00"))
                .unwrap_err(),
            SchedulingError::NonexistentLocalTime(date("2026-03-29"))
        );
    }

    #[test]
    fn should_pick_earliest_instant_for_ambiguous_local_time() {
        let at = berlin()
            .local_time(date("2026-10-25"), time("02:30:00"))
            .unwrap();
        assert_eq!(at, "2026-10-25T00:30:00Z".parse::<Timestamp>().unwrap());
    }

    #[test]
    fn should_expose_sun_position() {
        let noon: Timestamp = "2026-06-21T11:07:00Z".parse().unwrap();
        let position = berlin().sun_position(noon);
        assert!(position.elevation > 55.0);
        assert!((150.0..210.0).contains(&position.azimuth));
    }
}
