use std::{fs::File, path::PathBuf};

use csv::StringRecord;
use metering_core::domain::{MeterReading, RawMeterReading};
use metering_core::InvalidReadingError;

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// CSV export of meter readings.
///
/// Expected header columns (by name):
/// - timestamp (RFC3339 timestamp)
/// - device_id
/// - energy_kwh
/// - power_w, voltage, current, power_factor (optional)
pub struct MeterReadingCsvFileSource {
    path: PathBuf,
}

impl MeterReadingCsvFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn parse_optional_f64(s: &str) -> Option<f64> {
    if s.trim().is_empty() {
        None
    } else {
        s.trim().parse().ok()
    }
}

fn record_to_meter_reading(record: &StringRecord, headers: &StringRecord) -> Result<MeterReading, InvalidReadingError> {
    let get = |name: &str| -> Option<&str> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
    };
    let required = |name: &str| {
        get(name).ok_or_else(|| InvalidReadingError::Malformed(format!("missing column '{name}' in CSV record")))
    };

    let energy_str = required("energy_kwh")?;
    let energy_kwh: f64 = energy_str
        .trim()
        .parse()
        .map_err(|e| InvalidReadingError::Malformed(format!("invalid energy_kwh '{energy_str}': {e}")))?;

    let raw = RawMeterReading {
        timestamp: required("timestamp")?.to_string(),
        device_id: required("device_id")?.trim().to_string(),
        energy_kwh,
        power_w: get("power_w").and_then(parse_optional_f64),
        voltage: get("voltage").and_then(parse_optional_f64),
        current: get("current").and_then(parse_optional_f64),
        power_factor: get("power_factor").and_then(parse_optional_f64),
    };
    raw.parse()
}

#[async_trait::async_trait]
impl Source<MeterReading> for MeterReadingCsvFileSource {
    async fn stream(&self) -> EnvelopeStream<MeterReading> {
        // Blocking CSV reader inside a single async task; fine for
        // billing-sized exports.
        let path = self.path.clone();
        let s = async_stream::stream! {
            let file = match File::open(&path) {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!(
                        "failed to open CSV file {}: {e}",
                        path.display()
                    )));
                    return;
                }
            };
            let mut rdr = csv::Reader::from_reader(file);
            let headers = match rdr.headers() {
                Ok(h) => h.clone(),
                Err(e) => {
                    yield Err(PipelineError::Source(format!("failed to read CSV headers: {e}")));
                    return;
                }
            };

            for result in rdr.records() {
                let parsed = result
                    .map_err(|e| InvalidReadingError::Malformed(format!("failed to read CSV record: {e}")))
                    .and_then(|record| record_to_meter_reading(&record, &headers));

                match parsed {
                    Ok(reading) => {
                        yield Ok(Envelope::new(reading));
                    }
                    Err(e) => {
                        metrics::counter!("meter_reading_csv_parse_errors_total").increment(1);
                        yield Err(PipelineError::Reading(e));
                    }
                }
            }
        };

        Box::pin(s)
    }
}
