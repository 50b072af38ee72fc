use std::path::PathBuf;

use async_stream::stream;
use metering_core::domain::{MeterReading, RawMeterReading};
use metering_core::InvalidReadingError;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
};

use crate::pipeline::{Envelope, EnvelopeStream, PipelineError, Source};

/// NDJSON export of meter readings, one object per line:
///
/// `{"timestamp": "2024-01-01T00:00:00Z", "device_id": "m-1", "energy_kwh": 10.5, "power_w": 230.0}`
///
/// Lines that do not decode are yielded as `PipelineError::Reading` and the
/// stream continues. Failing to open or read the file ends it.
pub struct MeterReadingNdjsonFileSource {
    path: PathBuf,
}

impl MeterReadingNdjsonFileSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }
}

fn parse_line(line: &str) -> Result<MeterReading, InvalidReadingError> {
    let raw: RawMeterReading =
        serde_json::from_str(line).map_err(|e| InvalidReadingError::Malformed(e.to_string()))?;
    raw.parse()
}

#[async_trait::async_trait]
impl Source<MeterReading> for MeterReadingNdjsonFileSource {
    async fn stream(&self) -> EnvelopeStream<MeterReading> {
        let path = self.path.clone();
        let s = stream! {
            let file = match File::open(&path).await {
                Ok(f) => f,
                Err(e) => {
                    yield Err(PipelineError::Source(format!(
                        "failed to open readings file {}: {e}",
                        path.display()
                    )));
                    return;
                }
            };
            let mut lines = BufReader::new(file).lines();

            loop {
                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(PipelineError::Source(format!("failed to read readings line: {e}")));
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }

                match parse_line(&line) {
                    Ok(reading) => {
                        yield Ok(Envelope::new(reading));
                    }
                    Err(e) => {
                        metrics::counter!("meter_reading_ndjson_parse_errors_total").increment(1);
                        yield Err(PipelineError::Reading(e));
                    }
                }
            }
        };

        Box::pin(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use time::macros::datetime;

    #[test]
    fn parse_line_accepts_optional_fields() {
        let reading = parse_line(
            r#"{"timestamp":"2024-01-01T00:00:00Z","device_id":"m-123","energy_kwh":1.23,"voltage":229.5}"#,
        )
        .unwrap();
        assert_eq!(reading.ts, datetime!(2024-01-01 00:00:00 UTC));
        assert_eq!(reading.device_id, "m-123");
        assert_eq!(reading.energy_kwh, 1.23);
        assert_eq!(reading.voltage, Some(229.5));
        assert!(reading.power_w.is_none());
    }

    #[test]
    fn parse_line_reports_malformed_json_and_timestamp() {
        assert!(matches!(parse_line("{not json"), Err(InvalidReadingError::Malformed(_))));
        assert!(matches!(
            parse_line(r#"{"timestamp":"soon","device_id":"m","energy_kwh":1}"#),
            Err(InvalidReadingError::Timestamp { .. })
        ));
    }

    #[tokio::test]
    async fn stream_skips_bad_lines_without_stopping() {
        let dir = std::env::temp_dir().join(format!("billing-service-ndjson-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("readings.ndjson");
        tokio::fs::write(
            &path,
            concat!(
                r#"{"timestamp":"2024-01-01T00:00:00Z","device_id":"m-1","energy_kwh":10.0}"#, "\n",
                "garbage\n",
                "\n",
                r#"{"timestamp":"2024-01-01T12:00:00Z","device_id":"m-1","energy_kwh":12.5}"#, "\n",
            ),
        )
        .await
        .unwrap();

        let items: Vec<_> = MeterReadingNdjsonFileSource::new(path.clone()).stream().await.collect().await;
        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(PipelineError::Reading(_))));
        assert_eq!(items[2].as_ref().unwrap().payload.energy_kwh, 12.5);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn missing_file_is_a_source_error() {
        let items: Vec<_> = MeterReadingNdjsonFileSource::new("/nonexistent/readings.ndjson")
            .stream()
            .await
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(PipelineError::Source(_))));
    }
}
