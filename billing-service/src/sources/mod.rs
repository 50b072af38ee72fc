pub mod meter_reading_csv_file;
pub mod meter_reading_ndjson_file;

pub use meter_reading_csv_file::MeterReadingCsvFileSource;
pub use meter_reading_ndjson_file::MeterReadingNdjsonFileSource;

use metering_core::domain::MeterReading;

use crate::config::{ReadingsConfig, ReadingsFormat};
use crate::pipeline::{EnvelopeStream, Source};

/// Readings file source chosen from configuration.
pub enum ReadingFileSource {
    Ndjson(MeterReadingNdjsonFileSource),
    Csv(MeterReadingCsvFileSource),
}

impl ReadingFileSource {
    pub fn from_config(cfg: &ReadingsConfig) -> Self {
        match cfg.format {
            ReadingsFormat::Ndjson => Self::Ndjson(MeterReadingNdjsonFileSource::new(cfg.path.clone())),
            ReadingsFormat::Csv => Self::Csv(MeterReadingCsvFileSource::new(cfg.path.clone())),
        }
    }
}

#[async_trait::async_trait]
impl Source<MeterReading> for ReadingFileSource {
    async fn stream(&self) -> EnvelopeStream<MeterReading> {
        match self {
            Self::Ndjson(s) => s.stream().await,
            Self::Csv(s) => s.stream().await,
        }
    }
}
