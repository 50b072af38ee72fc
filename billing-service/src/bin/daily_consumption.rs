use anyhow::{anyhow, Result};
use billing_service::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::ConsumptionCsvSink,
    sources::ReadingFileSource,
    transform,
};
use metering_core::{domain::MeterReading, Granularity};
use std::{env, sync::Arc};

/// usage: daily_consumption [device_id] [hour|day|week|month]
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    let device_filter = args.get(1).filter(|s| !s.is_empty() && s.as_str() != "*").cloned();
    let granularity = match args.get(2) {
        Some(s) => s.parse::<Granularity>().map_err(|e| anyhow!(e))?,
        None => Granularity::Day,
    };

    let cfg = AppConfig::load()?;

    let sink = ConsumptionCsvSink::new(granularity, device_filter, cfg.output.daily_csv_path.clone());
    let pipeline: Pipeline<_, MeterReading, _> = Pipeline {
        source: ReadingFileSource::from_config(&cfg.readings),
        transforms: vec![Arc::new(transform::ReadingValidation)],
        sink,
    };

    let summary = pipeline.run().await?;
    if summary.readings.rejected > 0 {
        tracing::warn!(rejected = summary.readings.rejected, "some readings were skipped");
    }

    Ok(())
}
