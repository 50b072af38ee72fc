use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::datetime, macros::format_description,
    OffsetDateTime, PrimitiveDateTime,
};

use crate::error::InvalidReadingError;

/// A cumulative-energy sample reported by a meter.
#[derive(Debug, Clone, PartialEq)]
pub struct MeterReading {
    pub ts: OffsetDateTime,
    pub device_id: String,
    /// Cumulative counter in kWh.
    pub energy_kwh: f64,
    pub power_w: Option<f64>,
    pub voltage: Option<f64>,
    pub current: Option<f64>,
    pub power_factor: Option<f64>,
}

/// Reading as received from the readings API or a file export, before the
/// timestamp has been parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeterReading {
    pub timestamp: String,
    pub device_id: String,
    pub energy_kwh: f64,
    #[serde(default)]
    pub power_w: Option<f64>,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub power_factor: Option<f64>,
}

/// Parse an RFC 3339 timestamp. Timestamps without an offset
/// (`2024-01-01T10:00:00`) are taken to be UTC.
pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, InvalidReadingError> {
    let trimmed = value.trim();
    if let Ok(ts) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Ok(ts);
    }

    let naive = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    PrimitiveDateTime::parse(trimmed, naive)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|e| InvalidReadingError::Timestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

impl RawMeterReading {
    /// Parse the timestamp only; see [`validate_reading`] for value checks.
    pub fn parse(self) -> Result<MeterReading, InvalidReadingError> {
        let ts = parse_timestamp(&self.timestamp)?;
        Ok(MeterReading {
            ts,
            device_id: self.device_id,
            energy_kwh: self.energy_kwh,
            power_w: self.power_w,
            voltage: self.voltage,
            current: self.current,
            power_factor: self.power_factor,
        })
    }
}

/// Sanity checks on a parsed reading.
///
/// Rules:
/// - energy_kwh must be finite and non-negative.
/// - ts must be within [2000-01-01, 2100-01-01].
pub fn validate_reading(reading: &MeterReading) -> Result<(), InvalidReadingError> {
    if !reading.energy_kwh.is_finite() || reading.energy_kwh < 0.0 {
        return Err(InvalidReadingError::InvalidEnergy(reading.energy_kwh));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);

    if reading.ts < min_ts || reading.ts > max_ts {
        return Err(InvalidReadingError::TimestampOutOfRange(reading.ts));
    }

    Ok(())
}

impl TryFrom<RawMeterReading> for MeterReading {
    type Error = InvalidReadingError;

    fn try_from(raw: RawMeterReading) -> Result<Self, Self::Error> {
        let reading = raw.parse()?;
        validate_reading(&reading)?;
        Ok(reading)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(timestamp: &str, energy_kwh: f64) -> RawMeterReading {
        RawMeterReading {
            timestamp: timestamp.to_string(),
            device_id: "meter-1".to_string(),
            energy_kwh,
            power_w: Some(230.0),
            voltage: None,
            current: None,
            power_factor: None,
        }
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        let reading = MeterReading::try_from(raw("2024-01-01T05:30:00+05:30", 1.5)).unwrap();
        assert_eq!(reading.ts, datetime!(2024-01-01 00:00:00 UTC));
        assert_eq!(reading.power_w, Some(230.0));
    }

    #[test]
    fn naive_timestamp_is_utc() {
        let reading = MeterReading::try_from(raw("2024-03-10T12:00:00", 1.0)).unwrap();
        assert_eq!(reading.ts, datetime!(2024-03-10 12:00:00 UTC));
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let err = MeterReading::try_from(raw("yesterday", 1.0)).unwrap_err();
        assert!(matches!(err, InvalidReadingError::Timestamp { .. }));
    }

    #[test]
    fn rejects_negative_and_nan_energy() {
        assert!(matches!(
            MeterReading::try_from(raw("2024-01-01T00:00:00Z", -0.1)),
            Err(InvalidReadingError::InvalidEnergy(_))
        ));
        assert!(matches!(
            MeterReading::try_from(raw("2024-01-01T00:00:00Z", f64::NAN)),
            Err(InvalidReadingError::InvalidEnergy(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_ts() {
        let err = MeterReading::try_from(raw("1800-01-01T00:00:00Z", 1.0)).unwrap_err();
        assert!(matches!(err, InvalidReadingError::TimestampOutOfRange(_)));
    }
}
