// Calendar dimensions and the constraints a rule places on them

use crate::errors::ScheduleError;
use std::fmt;

/// A calendar axis a recurrence rule can restrict.
///
/// Every dimension is a thin wrapper around a zero-based integer whose valid
/// values are `0..=MAX`. Constraints compare on that integer.
pub trait Dimension: Copy + Eq + fmt::Debug {
    /// Human readable name used in error messages and logs
    const NAME: &'static str;
    /// Largest valid value (inclusive)
    const MAX: u32;

    fn value(self) -> u32;
}

macro_rules! dimension {
    ($(#[$meta:meta])* $name:ident, $label:literal, $max:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u32);

        impl Dimension for $name {
            const NAME: &'static str = $label;
            const MAX: u32 = $max;

            #[inline]
            fn value(self) -> u32 {
                self.0
            }
        }
    };
}

dimension!(
    /// Month of the year, January = 0
    MonthOfYear,
    "month",
    11
);
dimension!(
    /// Week of the year as reported by the calendar
    WeekOfYear,
    "week of year",
    53
);
dimension!(
    /// Ordinal week within the month (0 = first .. 4 = fifth) or the
    /// symbolic [`WeekOfMonth::LAST`]
    WeekOfMonth,
    "week of month",
    5
);
dimension!(
    /// Zero-based day of the month
    DayOfMonth,
    "day of month",
    30
);
dimension!(
    /// Day of the week, Sunday = 0
    DayOfWeek,
    "day of week",
    6
);

impl MonthOfYear {
    pub const JANUARY: Self = Self(0);
    pub const FEBRUARY: Self = Self(1);
    pub const MARCH: Self = Self(2);
    pub const APRIL: Self = Self(3);
    pub const MAY: Self = Self(4);
    pub const JUNE: Self = Self(5);
    pub const JULY: Self = Self(6);
    pub const AUGUST: Self = Self(7);
    pub const SEPTEMBER: Self = Self(8);
    pub const OCTOBER: Self = Self(9);
    pub const NOVEMBER: Self = Self(10);
    pub const DECEMBER: Self = Self(11);
}

impl WeekOfMonth {
    pub const FIRST: Self = Self(0);
    pub const SECOND: Self = Self(1);
    pub const THIRD: Self = Self(2);
    pub const FOURTH: Self = Self(3);
    pub const FIFTH: Self = Self(4);
    /// "Last week of the month". Never produced by the calendar; only
    /// matched through the last-seven-days rule.
    pub const LAST: Self = Self(5);
}

impl DayOfWeek {
    pub const SUNDAY: Self = Self(0);
    pub const MONDAY: Self = Self(1);
    pub const TUESDAY: Self = Self(2);
    pub const WEDNESDAY: Self = Self(3);
    pub const THURSDAY: Self = Self(4);
    pub const FRIDAY: Self = Self(5);
    pub const SATURDAY: Self = Self(6);
}

/// A single test against one dimension's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint<T> {
    /// Matches one value
    Exact(T),
    /// Matches when `value % divisor == remainder`
    Modulo { remainder: u32, divisor: u32 },
    /// Matches `first..=last`, wrapping around the end of the cycle when
    /// `first > last` (e.g. November through February)
    Interval { first: T, last: T },
}

impl<T: Dimension> Constraint<T> {
    pub fn contains(&self, value: T) -> bool {
        let v = value.value();
        match *self {
            Constraint::Exact(expected) => v == expected.value(),
            Constraint::Modulo { remainder, divisor } => divisor != 0 && v % divisor == remainder,
            Constraint::Interval { first, last } => {
                let (first, last) = (first.value(), last.value());
                if first <= last {
                    first <= v && v <= last
                } else {
                    v >= first || v <= last
                }
            }
        }
    }

    /// Check the constraint against the dimension's domain
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let in_domain = |t: T| {
            if t.value() > T::MAX {
                Err(ScheduleError::constraint(
                    T::NAME,
                    format!("value {} is outside 0..={}", t.value(), T::MAX),
                ))
            } else {
                Ok(())
            }
        };

        match *self {
            Constraint::Exact(value) => in_domain(value),
            Constraint::Modulo { remainder, divisor } => {
                if divisor == 0 {
                    return Err(ScheduleError::constraint(
                        T::NAME,
                        "divisor must be greater than 0",
                    ));
                }
                if remainder >= divisor {
                    return Err(ScheduleError::constraint(
                        T::NAME,
                        format!("remainder {remainder} can never match divisor {divisor}"),
                    ));
                }
                Ok(())
            }
            Constraint::Interval { first, last } => {
                in_domain(first)?;
                in_domain(last)
            }
        }
    }
}

/// OR-combination of the constraints configured for one dimension.
///
/// An empty filter places no restriction on the dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionFilter<T> {
    constraints: Vec<Constraint<T>>,
}

impl<T> Default for DimensionFilter<T> {
    fn default() -> Self {
        Self {
            constraints: Vec::new(),
        }
    }
}

impl<T> From<Vec<Constraint<T>>> for DimensionFilter<T> {
    fn from(constraints: Vec<Constraint<T>>) -> Self {
        Self { constraints }
    }
}

impl<T: Dimension> DimensionFilter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint<T>) {
        self.constraints.push(constraint);
    }

    pub fn constraints(&self) -> &[Constraint<T>] {
        &self.constraints
    }

    pub fn is_unrestricted(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn satisfied(&self, value: T) -> bool {
        self.is_unrestricted() || self.constraints.iter().any(|c| c.contains(value))
    }

    pub fn validate(&self) -> Result<(), ScheduleError> {
        self.constraints.iter().try_for_each(Constraint::validate)
    }
}

impl DimensionFilter<WeekOfMonth> {
    /// Whether the filter explicitly asks for the last week of the month.
    ///
    /// Only exact and interval constraints can name `LAST`; a modulo
    /// expression selects ordinal weeks only.
    pub fn requests_last(&self) -> bool {
        self.constraints.iter().any(|c| match c {
            Constraint::Exact(_) | Constraint::Interval { .. } => c.contains(WeekOfMonth::LAST),
            Constraint::Modulo { .. } => false,
        })
    }
}
