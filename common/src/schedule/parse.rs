// Schedule directives as written in job configuration
//
// Each dimension is a list of tokens:
//   `*`            no restriction
//   `mon`, `nov`   names (three letters or the full word)
//   `1`, `w07`     numbers; months and days of month count from 1
//   `nov-feb`      interval, may wrap around
//   `*/2`, `1/3`   modulo on the zero-based value
// Tokens may also be given comma separated within one string.

use super::constraint::{
    Constraint, DayOfMonth, DayOfWeek, Dimension, DimensionFilter, MonthOfYear, WeekOfMonth,
    WeekOfYear,
};
use super::rule::{FireTimeSpec, RecurrenceRule, TimeOfDay};
use crate::errors::ScheduleError;
use serde::{Deserialize, Serialize};

const MONTH_NAMES: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

const DAY_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

const WEEK_NAMES: [&str; 5] = ["first", "second", "third", "fourth", "fifth"];

/// Schedule section of a job definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleDirective {
    pub months: Vec<String>,
    pub weeks_of_year: Vec<String>,
    pub weeks_of_month: Vec<String>,
    pub days_of_month: Vec<String>,
    pub days_of_week: Vec<String>,
    /// Discrete `HH:MM` times
    pub at: Vec<String>,
    /// Minute offsets for an hourly cadence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly: Option<Vec<u32>>,
}

impl TryFrom<&ScheduleDirective> for RecurrenceRule {
    type Error = ScheduleError;

    fn try_from(directive: &ScheduleDirective) -> Result<Self, Self::Error> {
        let fire_times = match &directive.hourly {
            Some(_) if !directive.at.is_empty() => {
                return Err(ScheduleError::InvalidFireTime(
                    "'at' and 'hourly' cannot be combined".to_string(),
                ))
            }
            Some(minutes) => FireTimeSpec::Hourly(minutes.iter().copied().collect()),
            None => FireTimeSpec::Discrete(
                directive
                    .at
                    .iter()
                    .map(|t| parse_time(t))
                    .collect::<Result<_, _>>()?,
            ),
        };

        let mut builder = RecurrenceRule::builder().fire_times(fire_times);
        for c in parse_filter::<MonthOfYear>(&directive.months)?.constraints() {
            builder = builder.month(*c);
        }
        for c in parse_filter::<WeekOfYear>(&directive.weeks_of_year)?.constraints() {
            builder = builder.week_of_year(*c);
        }
        for c in parse_filter::<WeekOfMonth>(&directive.weeks_of_month)?.constraints() {
            builder = builder.week_of_month(*c);
        }
        for c in parse_filter::<DayOfMonth>(&directive.days_of_month)?.constraints() {
            builder = builder.day_of_month(*c);
        }
        for c in parse_filter::<DayOfWeek>(&directive.days_of_week)?.constraints() {
            builder = builder.day_of_week(*c);
        }
        builder.build()
    }
}

/// Dimension values as they appear in configuration
pub trait DirectiveValue: Dimension {
    fn parse_value(token: &str) -> Option<Self>;
}

fn lookup_name(names: &[&str], token: &str) -> Option<u32> {
    if token.len() < 3 {
        return None;
    }
    names
        .iter()
        .position(|name| name.starts_with(token))
        .map(|i| i as u32)
}

/// One-based number in `1..=max`, returned zero-based
fn one_based(token: &str, max: u32) -> Option<u32> {
    match token.parse::<u32>() {
        Ok(n) if (1..=max).contains(&n) => Some(n - 1),
        _ => None,
    }
}

impl DirectiveValue for MonthOfYear {
    fn parse_value(token: &str) -> Option<Self> {
        lookup_name(&MONTH_NAMES, token)
            .or_else(|| one_based(token, 12))
            .map(MonthOfYear)
    }
}

impl DirectiveValue for WeekOfYear {
    fn parse_value(token: &str) -> Option<Self> {
        let digits = token.strip_prefix('w').unwrap_or(token);
        match digits.parse::<u32>() {
            // ISO weeks start at 1
            Ok(n) if (1..=Self::MAX).contains(&n) => Some(WeekOfYear(n)),
            _ => None,
        }
    }
}

impl DirectiveValue for WeekOfMonth {
    fn parse_value(token: &str) -> Option<Self> {
        if token == "last" {
            return Some(WeekOfMonth::LAST);
        }
        let ordinal = ["1st", "2nd", "3rd", "4th", "5th"]
            .iter()
            .position(|o| *o == token)
            .map(|i| i as u32);
        ordinal
            .or_else(|| lookup_name(&WEEK_NAMES, token))
            .or_else(|| one_based(token, 5))
            .map(WeekOfMonth)
    }
}

impl DirectiveValue for DayOfMonth {
    fn parse_value(token: &str) -> Option<Self> {
        one_based(token, 31).map(DayOfMonth)
    }
}

impl DirectiveValue for DayOfWeek {
    fn parse_value(token: &str) -> Option<Self> {
        if let Some(day) = lookup_name(&DAY_NAMES, token) {
            return Some(DayOfWeek(day));
        }
        match token.parse::<u32>() {
            Ok(n) if n <= Self::MAX => Some(DayOfWeek(n)),
            _ => None,
        }
    }
}

/// Parse one token. `*` yields no constraint.
pub fn parse_constraint<T: DirectiveValue>(token: &str) -> Result<Option<Constraint<T>>, ScheduleError> {
    let lower = token.trim().to_ascii_lowercase();
    let invalid = || ScheduleError::token(T::NAME, token.trim());

    if lower == "*" {
        return Ok(None);
    }

    if let Some((remainder, divisor)) = lower.split_once('/') {
        let remainder = if remainder == "*" {
            0
        } else {
            remainder.parse::<u32>().map_err(|_| invalid())?
        };
        let divisor = divisor.parse::<u32>().map_err(|_| invalid())?;
        return Ok(Some(Constraint::Modulo { remainder, divisor }));
    }

    if let Some((first, last)) = lower.split_once('-') {
        let first = T::parse_value(first.trim()).ok_or_else(invalid)?;
        let last = T::parse_value(last.trim()).ok_or_else(invalid)?;
        return Ok(Some(Constraint::Interval { first, last }));
    }

    T::parse_value(&lower)
        .map(|v| Some(Constraint::Exact(v)))
        .ok_or_else(invalid)
}

/// Parse all tokens of a dimension. Any `*` makes the dimension unrestricted.
pub fn parse_filter<T: DirectiveValue>(tokens: &[String]) -> Result<DimensionFilter<T>, ScheduleError> {
    let mut filter = DimensionFilter::new();
    let mut wildcard = false;

    for token in tokens
        .iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
    {
        match parse_constraint::<T>(token)? {
            Some(constraint) => filter.push(constraint),
            None => wildcard = true,
        }
    }

    Ok(if wildcard { DimensionFilter::new() } else { filter })
}

/// Parse `HH:MM`
pub fn parse_time(token: &str) -> Result<TimeOfDay, ScheduleError> {
    let token = token.trim();
    let (hour, minute) = token
        .split_once(':')
        .and_then(|(h, m)| Some((h.parse::<u32>().ok()?, m.parse::<u32>().ok()?)))
        .ok_or_else(|| ScheduleError::token("time", token))?;
    TimeOfDay::new(hour, minute)
}
