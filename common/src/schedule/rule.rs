// Recurrence rules: day matching and fire time enumeration

use super::calendar::{Calendar, CalendarPoint};
use super::constraint::{
    Constraint, DayOfMonth, DayOfWeek, DimensionFilter, MonthOfYear, WeekOfMonth, WeekOfYear,
};
use crate::errors::ScheduleError;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

pub const SECONDS_PER_DAY: i64 = 86_400;

/// Wall-clock time within a day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u32,
    minute: u32,
}

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        if hour > 23 || minute > 59 {
            return Err(ScheduleError::InvalidFireTime(format!(
                "{hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// When a rule fires on a day it triggers on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FireTimeSpec {
    /// Fixed times of day
    Discrete(BTreeSet<TimeOfDay>),
    /// Every hour, once per listed minute
    Hourly(BTreeSet<u32>),
}

impl Default for FireTimeSpec {
    fn default() -> Self {
        FireTimeSpec::Discrete(BTreeSet::new())
    }
}

impl FireTimeSpec {
    /// A spec without times never fires. This is a valid, disabled state.
    pub fn is_empty(&self) -> bool {
        match self {
            FireTimeSpec::Discrete(times) => times.is_empty(),
            FireTimeSpec::Hourly(minutes) => minutes.is_empty(),
        }
    }

    /// Times of day in ascending order
    pub fn times_of_day(&self) -> impl Iterator<Item = TimeOfDay> + '_ {
        let discrete = match self {
            FireTimeSpec::Discrete(times) => Some(times),
            FireTimeSpec::Hourly(_) => None,
        };
        let hourly = match self {
            FireTimeSpec::Hourly(minutes) => Some(minutes),
            FireTimeSpec::Discrete(_) => None,
        };

        discrete.into_iter().flatten().copied().chain(
            hourly.into_iter().flat_map(|minutes| {
                (0..24u32).flat_map(move |hour| {
                    minutes.iter().map(move |&minute| TimeOfDay { hour, minute })
                })
            }),
        )
    }

    fn validate(&self) -> Result<(), ScheduleError> {
        if let FireTimeSpec::Hourly(minutes) = self {
            if let Some(bad) = minutes.iter().find(|&&m| m > 59) {
                return Err(ScheduleError::InvalidFireTime(format!(
                    "hourly minute {bad} is outside 0..=59"
                )));
            }
        }
        Ok(())
    }
}

/// Recurrence rule of a job
///
/// Five dimension filters, combined with AND, decide whether a day
/// triggers; the fire time spec decides when on that day the job runs.
/// Rules are immutable once built and safe to share between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    months: DimensionFilter<MonthOfYear>,
    weeks_of_year: DimensionFilter<WeekOfYear>,
    weeks_of_month: DimensionFilter<WeekOfMonth>,
    days_of_month: DimensionFilter<DayOfMonth>,
    days_of_week: DimensionFilter<DayOfWeek>,
    fire_times: FireTimeSpec,
}

impl RecurrenceRule {
    pub fn builder() -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder::default()
    }

    pub fn months(&self) -> &DimensionFilter<MonthOfYear> {
        &self.months
    }

    pub fn weeks_of_year(&self) -> &DimensionFilter<WeekOfYear> {
        &self.weeks_of_year
    }

    pub fn weeks_of_month(&self) -> &DimensionFilter<WeekOfMonth> {
        &self.weeks_of_month
    }

    pub fn days_of_month(&self) -> &DimensionFilter<DayOfMonth> {
        &self.days_of_month
    }

    pub fn days_of_week(&self) -> &DimensionFilter<DayOfWeek> {
        &self.days_of_week
    }

    pub fn fire_times(&self) -> &FireTimeSpec {
        &self.fire_times
    }

    /// Whether the rule runs on the day of `point`
    pub fn triggers_on_day(&self, point: &CalendarPoint) -> bool {
        self.months.satisfied(point.month())
            && self.weeks_of_year.satisfied(point.week_of_year())
            && self.days_of_month.satisfied(point.day_of_month())
            && self.days_of_week.satisfied(point.day_of_week())
            && (self.weeks_of_month.satisfied(point.week_of_month())
                || (point.on_last_7_days_of_month() && self.weeks_of_month.requests_last()))
    }

    /// Every fire time in `[from, to]`, in ascending order.
    ///
    /// Days are visited one at a time starting with the day of `from`. The
    /// step is one day of elapsed seconds taken from local noon, so days
    /// that are 23 or 25 hours long are neither skipped nor visited twice.
    /// Local times that do not exist on a day (DST gap) are skipped.
    pub fn enumerate_fire_times(&self, calendar: &dyn Calendar, from: i64, to: i64) -> Vec<i64> {
        let mut runs = Vec::new();
        if from > to || self.fire_times.is_empty() {
            return runs;
        }

        let end = to.saturating_add(SECONDS_PER_DAY);
        let mut cursor = from;
        while cursor <= end {
            let day = calendar.decompose(cursor);

            if self.triggers_on_day(&day) {
                for time in self.fire_times.times_of_day() {
                    let probe = day.with_time(time.hour(), time.minute());
                    if let Some(runtime) = calendar.compose(&probe) {
                        if (from..=to).contains(&runtime) {
                            runs.push(runtime);
                        }
                    }
                }
            }

            let noon = calendar.compose(&day.with_time(12, 0)).unwrap_or(cursor);
            let next = noon.saturating_add(SECONDS_PER_DAY);
            if next <= cursor {
                break;
            }
            cursor = next;
        }

        runs
    }

    /// Earliest fire time strictly after `after`, looking at most
    /// `horizon_days` ahead
    pub fn next_fire_time(&self, calendar: &dyn Calendar, after: i64, horizon_days: u32) -> Option<i64> {
        let from = after.saturating_add(1);
        let to = after.saturating_add(i64::from(horizon_days) * SECONDS_PER_DAY);
        self.enumerate_fire_times(calendar, from, to).first().copied()
    }
}

/// Builder for [`RecurrenceRule`]; all validation happens in [`build`].
///
/// [`build`]: RecurrenceRuleBuilder::build
#[derive(Debug, Clone, Default)]
pub struct RecurrenceRuleBuilder {
    months: DimensionFilter<MonthOfYear>,
    weeks_of_year: DimensionFilter<WeekOfYear>,
    weeks_of_month: DimensionFilter<WeekOfMonth>,
    days_of_month: DimensionFilter<DayOfMonth>,
    days_of_week: DimensionFilter<DayOfWeek>,
    fire_times: FireTimeSpec,
}

impl RecurrenceRuleBuilder {
    pub fn month(mut self, constraint: Constraint<MonthOfYear>) -> Self {
        self.months.push(constraint);
        self
    }

    pub fn week_of_year(mut self, constraint: Constraint<WeekOfYear>) -> Self {
        self.weeks_of_year.push(constraint);
        self
    }

    pub fn week_of_month(mut self, constraint: Constraint<WeekOfMonth>) -> Self {
        self.weeks_of_month.push(constraint);
        self
    }

    pub fn day_of_month(mut self, constraint: Constraint<DayOfMonth>) -> Self {
        self.days_of_month.push(constraint);
        self
    }

    pub fn day_of_week(mut self, constraint: Constraint<DayOfWeek>) -> Self {
        self.days_of_week.push(constraint);
        self
    }

    /// Add a discrete fire time. Replaces an hourly cadence set earlier.
    pub fn at(mut self, time: TimeOfDay) -> Self {
        match &mut self.fire_times {
            FireTimeSpec::Discrete(times) => {
                times.insert(time);
            }
            FireTimeSpec::Hourly(_) => {
                self.fire_times = FireTimeSpec::Discrete(BTreeSet::from([time]));
            }
        }
        self
    }

    /// Fire every hour at the given minutes. Replaces any earlier times.
    pub fn hourly(mut self, minutes: impl IntoIterator<Item = u32>) -> Self {
        self.fire_times = FireTimeSpec::Hourly(minutes.into_iter().collect());
        self
    }

    pub fn fire_times(mut self, spec: FireTimeSpec) -> Self {
        self.fire_times = spec;
        self
    }

    pub fn build(self) -> Result<RecurrenceRule, ScheduleError> {
        self.months.validate()?;
        self.weeks_of_year.validate()?;
        self.weeks_of_month.validate()?;
        self.days_of_month.validate()?;
        self.days_of_week.validate()?;
        self.fire_times.validate()?;

        if self.fire_times.is_empty() {
            debug!("Recurrence rule has no fire times and will never run");
        }

        Ok(RecurrenceRule {
            months: self.months,
            weeks_of_year: self.weeks_of_year,
            weeks_of_month: self.weeks_of_month,
            days_of_month: self.days_of_month,
            days_of_week: self.days_of_week,
            fire_times: self.fire_times,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::calendar::ZonedCalendar;

    // 2024-01-01T00:00:00Z, a Monday
    const JAN_1_2024: i64 = 1_704_067_200;

    fn time(hour: u32, minute: u32) -> TimeOfDay {
        TimeOfDay::new(hour, minute).unwrap()
    }

    #[test]
    fn test_time_of_day_validation() {
        assert!(TimeOfDay::new(23, 59).is_ok());
        assert!(TimeOfDay::new(24, 0).is_err());
        assert!(TimeOfDay::new(12, 60).is_err());
        assert_eq!(time(7, 5).to_string(), "07:05");
    }

    #[test]
    fn test_unrestricted_rule_triggers_every_day() {
        let rule = RecurrenceRule::builder().at(time(1, 0)).build().unwrap();
        let calendar = ZonedCalendar::utc();
        for day in 0..366 {
            let point = calendar.decompose(JAN_1_2024 + day * SECONDS_PER_DAY);
            assert!(rule.triggers_on_day(&point));
        }
    }

    #[test]
    fn test_dimensions_are_combined_with_and() {
        let rule = RecurrenceRule::builder()
            .month(Constraint::Exact(MonthOfYear::JANUARY))
            .day_of_week(Constraint::Exact(DayOfWeek::MONDAY))
            .at(time(1, 0))
            .build()
            .unwrap();
        let calendar = ZonedCalendar::utc();

        // Monday in January
        assert!(rule.triggers_on_day(&calendar.decompose(JAN_1_2024)));
        // Tuesday in January
        assert!(!rule.triggers_on_day(&calendar.decompose(JAN_1_2024 + SECONDS_PER_DAY)));
        // Monday 2024-02-05
        assert!(!rule.triggers_on_day(&calendar.decompose(JAN_1_2024 + 35 * SECONDS_PER_DAY)));
    }

    #[test]
    fn test_last_week_only_applies_when_requested() {
        let calendar = ZonedCalendar::utc();
        // 2024-01-27, within the last seven days of January, fourth week
        let point = calendar.decompose(JAN_1_2024 + 26 * SECONDS_PER_DAY);

        let first_week = RecurrenceRule::builder()
            .week_of_month(Constraint::Exact(WeekOfMonth::FIRST))
            .at(time(1, 0))
            .build()
            .unwrap();
        assert!(!first_week.triggers_on_day(&point));

        let last_week = RecurrenceRule::builder()
            .week_of_month(Constraint::Exact(WeekOfMonth::LAST))
            .at(time(1, 0))
            .build()
            .unwrap();
        assert!(last_week.triggers_on_day(&point));
        // 2024-01-24 is not
        assert!(!last_week.triggers_on_day(&calendar.decompose(JAN_1_2024 + 23 * SECONDS_PER_DAY)));
    }

    #[test]
    fn test_build_rejects_invalid_constraints() {
        let result = RecurrenceRule::builder()
            .month(Constraint::Modulo {
                remainder: 0,
                divisor: 0,
            })
            .build();
        assert!(matches!(
            result,
            Err(ScheduleError::InvalidConstraint { dimension: "month", .. })
        ));

        let result = RecurrenceRule::builder().hourly([0, 60]).build();
        assert!(matches!(result, Err(ScheduleError::InvalidFireTime(_))));
    }

    #[test]
    fn test_empty_fire_times_never_fire() {
        let rule = RecurrenceRule::builder().build().unwrap();
        assert!(rule.fire_times().is_empty());
        let runs = rule.enumerate_fire_times(
            &ZonedCalendar::utc(),
            JAN_1_2024,
            JAN_1_2024 + 30 * SECONDS_PER_DAY,
        );
        assert!(runs.is_empty());

        let rule = RecurrenceRule::builder().hourly(Vec::new()).build().unwrap();
        assert!(rule
            .enumerate_fire_times(&ZonedCalendar::utc(), JAN_1_2024, JAN_1_2024 + SECONDS_PER_DAY)
            .is_empty());
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let rule = RecurrenceRule::builder().at(time(9, 0)).build().unwrap();
        let runs = rule.enumerate_fire_times(&ZonedCalendar::utc(), JAN_1_2024 + 10, JAN_1_2024);
        assert!(runs.is_empty());
    }

    #[test]
    fn test_discrete_times_are_sorted_within_day() {
        let rule = RecurrenceRule::builder()
            .at(time(18, 0))
            .at(time(6, 30))
            .at(time(6, 30))
            .build()
            .unwrap();
        let runs = rule.enumerate_fire_times(
            &ZonedCalendar::utc(),
            JAN_1_2024,
            JAN_1_2024 + SECONDS_PER_DAY - 1,
        );
        assert_eq!(runs, vec![JAN_1_2024 + 6 * 3600 + 1800, JAN_1_2024 + 18 * 3600]);
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let rule = RecurrenceRule::builder().at(time(9, 0)).build().unwrap();
        let nine = JAN_1_2024 + 9 * 3600;
        let runs = rule.enumerate_fire_times(&ZonedCalendar::utc(), nine, nine);
        assert_eq!(runs, vec![nine]);
        assert!(rule
            .enumerate_fire_times(&ZonedCalendar::utc(), nine + 1, nine + 3600)
            .is_empty());
    }

    #[test]
    fn test_at_replaces_hourly() {
        let rule = RecurrenceRule::builder()
            .hourly([15])
            .at(time(3, 0))
            .build()
            .unwrap();
        assert_eq!(
            rule.fire_times(),
            &FireTimeSpec::Discrete(BTreeSet::from([time(3, 0)]))
        );
    }

    #[test]
    fn test_next_fire_time() {
        let rule = RecurrenceRule::builder()
            .day_of_week(Constraint::Exact(DayOfWeek::FRIDAY))
            .at(time(22, 0))
            .build()
            .unwrap();
        let calendar = ZonedCalendar::utc();

        // Friday 2024-01-05 22:00
        let friday = JAN_1_2024 + 4 * SECONDS_PER_DAY + 22 * 3600;
        assert_eq!(rule.next_fire_time(&calendar, JAN_1_2024, 7), Some(friday));
        assert_eq!(
            rule.next_fire_time(&calendar, friday, 7),
            Some(friday + 7 * SECONDS_PER_DAY)
        );
        assert_eq!(rule.next_fire_time(&calendar, friday, 6), None);
    }

    #[test]
    fn test_dst_days_are_visited_once() {
        let calendar = ZonedCalendar::new(chrono_tz::America::New_York);
        let rule = RecurrenceRule::builder().at(time(0, 30)).build().unwrap();

        // 2024-03-09T05:00Z .. 2024-03-12T05:00Z spans the spring transition
        let from = 1_709_960_400;
        let runs = rule.enumerate_fire_times(&calendar, from, from + 3 * SECONDS_PER_DAY);
        assert_eq!(runs.len(), 4);
        assert!(runs.windows(2).all(|w| w[0] < w[1]));

        let rule = RecurrenceRule::builder().hourly([0]).build().unwrap();
        // 2024-03-10 local day has 23 hours and 02:00 does not exist
        let sunday = calendar.decompose(from + SECONDS_PER_DAY);
        let start = calendar.compose(&sunday.with_time(0, 0)).unwrap();
        let end = calendar.compose(&sunday.with_time(23, 59)).unwrap();
        assert_eq!(rule.enumerate_fire_times(&calendar, start, end).len(), 23);
    }

    #[test]
    fn test_enumerate_at_epoch_extremes() {
        let rule = RecurrenceRule::builder().hourly([0, 30]).build().unwrap();
        for tz in [chrono_tz::Asia::Ho_Chi_Minh, chrono_tz::America::New_York] {
            let calendar = ZonedCalendar::new(tz);
            assert!(rule
                .enumerate_fire_times(&calendar, i64::MAX - 10, i64::MAX)
                .is_empty());
            assert!(rule
                .enumerate_fire_times(&calendar, i64::MIN, i64::MIN + 10)
                .is_empty());
            assert_eq!(rule.next_fire_time(&calendar, i64::MAX - 1, 7), None);
        }
    }
}
