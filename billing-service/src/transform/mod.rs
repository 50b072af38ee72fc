use crate::pipeline::{Envelope, PipelineError, Transform};
use metering_core::domain::{validate_reading, MeterReading};

/// Pure validation of a `MeterReading` record.
///
/// Rules:
/// - energy_kwh must be finite and non-negative.
/// - ts must be within a broad sanity window [2000-01-01, 2100-01-01].
pub fn validate_meter_reading(env: Envelope<MeterReading>) -> Result<Envelope<MeterReading>, PipelineError> {
    validate_reading(&env.payload)?;
    Ok(env)
}

#[derive(Clone, Default)]
pub struct ReadingValidation;

#[async_trait::async_trait]
impl Transform<MeterReading, MeterReading> for ReadingValidation {
    async fn apply(
        &self,
        input: Envelope<MeterReading>,
    ) -> Result<Envelope<MeterReading>, PipelineError> {
        match validate_meter_reading(input) {
            Ok(env) => Ok(env),
            Err(e) => {
                metrics::counter!("validation_meter_reading_rejected_total").increment(1);
                Err(e)
            }
        }
    }
}
