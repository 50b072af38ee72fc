use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};
use time::{Date, Duration, Month, OffsetDateTime, UtcOffset};

use crate::error::InvalidPeriodError;

/// A calendar month in UTC, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BillingPeriod {
    first_day: Date,
}

impl BillingPeriod {
    /// The month that contains `date`.
    pub fn containing(date: Date) -> Self {
        Self {
            first_day: date - Duration::days(i64::from(date.day()) - 1),
        }
    }

    pub fn year(&self) -> i32 {
        self.first_day.year()
    }

    pub fn month(&self) -> Month {
        self.first_day.month()
    }

    /// Midnight UTC on the first day of the month.
    pub fn start(&self) -> OffsetDateTime {
        self.first_day.midnight().assume_utc()
    }

    /// The month before this one; `None` only at the lower edge of the calendar.
    pub fn previous(&self) -> Option<Self> {
        self.first_day.previous_day().map(Self::containing)
    }

    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        let date = ts.to_offset(UtcOffset::UTC).date();
        date.year() == self.year() && date.month() == self.month()
    }
}

impl FromStr for BillingPeriod {
    type Err = InvalidPeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidPeriodError {
            value: s.to_string(),
        };

        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u8 = month.parse().map_err(|_| invalid())?;
        let month = Month::try_from(month).map_err(|_| invalid())?;

        let first_day = Date::from_calendar_date(year, month, 1).map_err(|_| invalid())?;
        Ok(Self { first_day })
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), u8::from(self.month()))
    }
}

impl Serialize for BillingPeriod {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
