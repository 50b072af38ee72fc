use std::{collections::BTreeMap, fmt, str::FromStr};

use time::{Date, Duration, OffsetDateTime, UtcOffset};

use crate::domain::{MeterReading, RawMeterReading};
use crate::error::InvalidReadingError;

/// Net consumption for one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyConsumption {
    pub date: Date,
    pub consumption: f64,
}

/// Net consumption for one bucket starting at `period_start` (UTC).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodConsumption {
    pub period_start: OffsetDateTime,
    pub consumption: f64,
}

/// Bucket size for [`aggregate_periods`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Granularity {
    Hour,
    #[default]
    Day,
    /// ISO week, starting Monday.
    Week,
    Month,
}

impl Granularity {
    /// Start of the bucket containing `ts`, in UTC.
    pub fn bucket_start(&self, ts: OffsetDateTime) -> OffsetDateTime {
        let utc = ts.to_offset(UtcOffset::UTC);
        let date = utc.date();
        match self {
            Self::Hour => date.midnight().assume_utc() + Duration::hours(i64::from(utc.hour())),
            Self::Day => date.midnight().assume_utc(),
            Self::Week => {
                let back = i64::from(date.weekday().number_days_from_monday());
                (date - Duration::days(back)).midnight().assume_utc()
            }
            Self::Month => (date - Duration::days(i64::from(date.day()) - 1))
                .midnight()
                .assume_utc(),
        }
    }
}

impl FromStr for Granularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(format!("unknown granularity '{other}', expected hour, day, week or month")),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        };
        f.write_str(s)
    }
}

/// Group readings by `bucket_key` and difference the cumulative counter
/// within each bucket.
///
/// Readings are sorted by timestamp first, so input order does not matter.
/// Each bucket yields `max(last - first, 0)`; a single-reading bucket
/// yields 0. Output is ascending by key.
///
/// The clamp means a meter counter reset (rollover or replacement) shows
/// up as zero consumption for that bucket instead of the true delta.
pub fn aggregate_by<K, F>(readings: &[MeterReading], bucket_key: F) -> Vec<(K, f64)>
where
    K: Ord,
    F: Fn(&MeterReading) -> K,
{
    let mut ordered: Vec<&MeterReading> = readings.iter().collect();
    ordered.sort_by_key(|r| r.ts);

    // (first, last) cumulative reading per bucket
    let mut buckets: BTreeMap<K, (f64, f64)> = BTreeMap::new();
    for r in ordered {
        buckets
            .entry(bucket_key(r))
            .and_modify(|(_, last)| *last = r.energy_kwh)
            .or_insert((r.energy_kwh, r.energy_kwh));
    }

    buckets
        .into_iter()
        .map(|(key, (first, last))| (key, (last - first).max(0.0)))
        .collect()
}

/// Daily consumption keyed by the UTC calendar day of each reading.
pub fn aggregate_daily(readings: &[MeterReading]) -> Vec<DailyConsumption> {
    aggregate_by(readings, |r| r.ts.to_offset(UtcOffset::UTC).date())
        .into_iter()
        .map(|(date, consumption)| DailyConsumption { date, consumption })
        .collect()
}

pub fn aggregate_periods(readings: &[MeterReading], granularity: Granularity) -> Vec<PeriodConsumption> {
    aggregate_by(readings, |r| granularity.bucket_start(r.ts))
        .into_iter()
        .map(|(period_start, consumption)| PeriodConsumption {
            period_start,
            consumption,
        })
        .collect()
}

/// Daily series plus the readings that had to be left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DailyReport {
    pub days: Vec<DailyConsumption>,
    pub rejected: Vec<InvalidReadingError>,
}

impl DailyReport {
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }
}

/// Parse and validate raw readings, then aggregate the valid ones by day.
/// Invalid readings are excluded from every bucket and reported.
pub fn aggregate_daily_raw<I>(raw: I) -> DailyReport
where
    I: IntoIterator<Item = RawMeterReading>,
{
    let mut valid = Vec::new();
    let mut rejected = Vec::new();
    for r in raw {
        match MeterReading::try_from(r) {
            Ok(reading) => valid.push(reading),
            Err(e) => rejected.push(e),
        }
    }

    DailyReport {
        days: aggregate_daily(&valid),
        rejected,
    }
}
