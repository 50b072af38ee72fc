use anyhow::{anyhow, Result};
use billing_service::{
    config::AppConfig,
    observability,
    pipeline::Pipeline,
    sinks::InvoiceSink,
    sources::ReadingFileSource,
    transform,
};
use metering_core::domain::{BillingPeriod, MeterReading};
use std::{env, sync::Arc};
use time::{Duration, OffsetDateTime};

/// Monthly billing job.
///
/// usage: billing-service [YYYY-MM]
///
/// Bills every device found in the configured readings file for the given
/// month (default: the previous UTC month).
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let cfg = AppConfig::load()?;

    // A broken tariff stops the job before anything is billed.
    let tariff = cfg.tariff_schedule()?;

    let now = OffsetDateTime::now_utc();
    let period = match env::args().nth(1) {
        Some(arg) => arg.parse::<BillingPeriod>()?,
        None => BillingPeriod::containing(now.date())
            .previous()
            .ok_or_else(|| anyhow!("no month before {}", now.date()))?,
    };

    tracing::info!(
        month = %period,
        readings = %cfg.readings.path.display(),
        slabs = tariff.slabs().len(),
        "starting monthly billing job"
    );

    let sink = InvoiceSink::new(
        tariff,
        period,
        cfg.output.invoice_dir.clone(),
        Duration::days(cfg.invoice.due_days),
        now,
    );
    let pipeline: Pipeline<_, MeterReading, _> = Pipeline {
        source: ReadingFileSource::from_config(&cfg.readings),
        transforms: vec![Arc::new(transform::ReadingValidation)],
        sink,
    };

    let summary = pipeline.run().await?;

    tracing::info!(
        month = %summary.month,
        generated = summary.generated,
        failed = summary.failed,
        readings_accepted = summary.readings.accepted,
        readings_rejected = summary.readings.rejected,
        billed_total = %summary.billed_total(),
        "billing job completed"
    );

    if summary.failed > 0 {
        return Err(anyhow!("{} device(s) could not be billed for {}", summary.failed, summary.month));
    }

    Ok(())
}
