//! Solar calendar port: astronomy and local time for the configured location.

use chrono::{NaiveDate, NaiveTime};

use shutterctl_domain::error::SchedulingError;
use shutterctl_domain::schedule::SunTimes;
use shutterctl_domain::time::Timestamp;

/// Sun position in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunPosition {
    /// Degrees above the horizon; negative below.
    pub elevation: f64,
    /// Degrees clockwise from north.
    pub azimuth: f64,
}

/// Computes sun events and resolves local wall-clock times.
///
/// All methods are pure computations, hence synchronous.
pub trait SolarCalendar: Send + Sync {
    /// Local calendar date containing `at`.
    fn local_date(&self, at: Timestamp) -> NaiveDate;

    /// Sunrise and sunset for a local date.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::NoSunEvent`] when the sun does not rise or set.
    fn sun_times(&self, date: NaiveDate) -> Result<SunTimes, SchedulingError>;

    /// Resolve a local wall-clock time on `date`; the earlier instant wins
    /// when ambiguous.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::NonexistentLocalTime`] inside a DST gap.
    fn local_time(&self, date: NaiveDate, time: NaiveTime) -> Result<Timestamp, SchedulingError>;

    /// Sun position at an instant.
    fn sun_position(&self, at: Timestamp) -> SunPosition;
}

impl<T: SolarCalendar> SolarCalendar for std::sync::Arc<T> {
    fn local_date(&self, at: Timestamp) -> NaiveDate {
        (**self).local_date(at)
    }

    fn sun_times(&self, date: NaiveDate) -> Result<SunTimes, SchedulingError> {
        (**self).sun_times(date)
    }

    fn local_time(&self, date: NaiveDate, time: NaiveTime) -> Result<Timestamp, SchedulingError> {
        (**self).local_time(date, time)
    }

    fn sun_position(&self, at: Timestamp) -> SunPosition {
        (**self).sun_position(at)
    }
}
