// Calendar decomposition and composition
//
// A `CalendarPoint` is the broken-down view of one instant that recurrence
// rules are matched against. The `Calendar` trait converts between epoch
// seconds and points for a fixed time zone.

use super::constraint::{DayOfMonth, DayOfWeek, MonthOfYear, WeekOfMonth, WeekOfYear};
use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

/// Zero-based day of year of the last day of each month, non-leap then leap
const LAST_DAY_OF_MONTH: [[u32; 12]; 2] = [
    [30, 58, 89, 119, 150, 180, 211, 242, 272, 303, 333, 364],
    [30, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334, 365],
];

const CLAMP_MARGIN_SECONDS: i64 = 86_400;

/// Gregorian leap year test
pub fn is_leap_year(year: i32) -> bool {
    year % 4 == 0 && (year % 100 != 0 || year % 400 == 0)
}

/// Zero-based day of year of the last day of `month` (January = 0)
pub fn last_day_of_month(year: i32, month: MonthOfYear) -> u32 {
    let table = &LAST_DAY_OF_MONTH[usize::from(is_leap_year(year))];
    table[(month.0 as usize).min(11)]
}

/// Decomposed instant
///
/// Every field is a projection of `epoch` in the calendar's time zone.
/// Points are values: probing another time of day goes through
/// [`CalendarPoint::with_time`], which returns a fresh point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarPoint {
    epoch: i64,
    year: i32,
    month: u32,
    day_of_month: u32,
    day_of_week: u32,
    day_of_year: u32,
    week_of_year: u32,
    week_of_month: u32,
    hour: u32,
    minute: u32,
}

impl CalendarPoint {
    /// Build a point from a local wall-clock time and the instant it came from.
    ///
    /// The week of the month is `day_of_month / 7` on the zero-based day,
    /// so the 1st–7th are the first week and the 29th–31st the fifth. The
    /// week of the year is the ISO week number.
    pub fn from_local(local: NaiveDateTime, epoch: i64) -> Self {
        let day_of_month = local.day0();
        Self {
            epoch,
            year: local.year(),
            month: local.month0(),
            day_of_month,
            day_of_week: local.weekday().num_days_from_sunday(),
            day_of_year: local.ordinal0(),
            week_of_year: local.iso_week().week(),
            week_of_month: day_of_month / 7,
            hour: local.hour(),
            minute: local.minute(),
        }
    }

    /// Same calendar day at another time of day.
    ///
    /// The returned point still carries the original epoch; use
    /// [`Calendar::compose`] to obtain the instant of the new time.
    #[must_use]
    pub fn with_time(&self, hour: u32, minute: u32) -> Self {
        Self {
            hour,
            minute,
            ..*self
        }
    }

    pub fn epoch(&self) -> i64 {
        self.epoch
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> MonthOfYear {
        MonthOfYear(self.month)
    }

    pub fn day_of_month(&self) -> DayOfMonth {
        DayOfMonth(self.day_of_month)
    }

    pub fn day_of_week(&self) -> DayOfWeek {
        DayOfWeek(self.day_of_week)
    }

    pub fn day_of_year(&self) -> u32 {
        self.day_of_year
    }

    pub fn week_of_year(&self) -> WeekOfYear {
        WeekOfYear(self.week_of_year)
    }

    pub fn week_of_month(&self) -> WeekOfMonth {
        WeekOfMonth(self.week_of_month)
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    /// Whether the day falls within the final seven days of its month.
    ///
    /// This is how "last week of the month" is honored: months differ in
    /// length, so the last week is taken to be the last seven days.
    pub fn on_last_7_days_of_month(&self) -> bool {
        last_day_of_month(self.year, self.month()) - 7 < self.day_of_year
    }

    /// Local wall-clock time described by the point
    pub fn local_date_time(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year, self.month + 1, self.day_of_month + 1)?
            .and_hms_opt(self.hour, self.minute, 0)
    }
}

/// Conversion between epoch seconds and calendar points
pub trait Calendar: Send + Sync {
    /// Break an instant down into calendar fields
    fn decompose(&self, epoch: i64) -> CalendarPoint;

    /// Instant of a point's wall-clock time.
    ///
    /// Returns `None` when the local time does not exist (a DST gap).
    /// Ambiguous local times resolve to the earliest instant.
    fn compose(&self, point: &CalendarPoint) -> Option<i64>;
}

/// Calendar in a fixed IANA time zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedCalendar {
    tz: Tz,
}

impl ZonedCalendar {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    pub fn utc() -> Self {
        Self::new(chrono_tz::UTC)
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }
}

impl Default for ZonedCalendar {
    fn default() -> Self {
        Self::utc()
    }
}

impl Calendar for ZonedCalendar {
    fn decompose(&self, epoch: i64) -> CalendarPoint {
        // Keep a day of margin so the local time stays representable
        // after the zone offset is applied
        let clamped = epoch.clamp(
            DateTime::<Utc>::MIN_UTC.timestamp() + CLAMP_MARGIN_SECONDS,
            DateTime::<Utc>::MAX_UTC.timestamp() - CLAMP_MARGIN_SECONDS,
        );
        let utc = DateTime::from_timestamp(clamped, 0).unwrap_or_default();
        CalendarPoint::from_local(utc.with_timezone(&self.tz).naive_local(), epoch)
    }

    fn compose(&self, point: &CalendarPoint) -> Option<i64> {
        let local = point.local_date_time()?;
        match self.tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => Some(dt.timestamp()),
            LocalResult::Ambiguous(earliest, _) => Some(earliest.timestamp()),
            LocalResult::None => None,
        }
    }
}
