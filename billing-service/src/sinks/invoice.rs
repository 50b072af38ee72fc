use std::{collections::BTreeMap, path::PathBuf};

use metering_core::{
    bill_for_period,
    domain::{BillingPeriod, Invoice, MeterReading, TariffSchedule},
};
use rust_decimal::Decimal;
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, Duration, OffsetDateTime};

use crate::{
    export::{format_amount, render_invoice_html},
    pipeline::{next_accepted, Envelope, PipelineError, RecordCounts, Sink},
};

/// One line of `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct InvoiceSummary {
    pub invoice_id: String,
    pub device_id: String,
    pub month: String,
    pub energy_kwh: String,
    pub total: String,
    pub currency: String,
    pub due_date: String,
    pub file: String,
}

impl InvoiceSummary {
    fn from_invoice(invoice: &Invoice) -> Self {
        let b = &invoice.bill.breakdown;
        Self {
            invoice_id: invoice.invoice_id.clone(),
            device_id: invoice.bill.device_id.clone(),
            month: invoice.bill.month.to_string(),
            energy_kwh: format_amount(b.energy_total),
            total: format_amount(b.total),
            currency: b.currency.clone(),
            due_date: invoice.due_date.to_string(),
            file: invoice.file_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BillingRunSummary {
    pub month: BillingPeriod,
    pub issued_at: String,
    pub readings: RecordCounts,
    pub generated: usize,
    pub failed: usize,
    pub invoices: Vec<InvoiceSummary>,
}

/// Bills every device seen in the stream for one month.
///
/// Readings are buffered per device (only those inside the billing month);
/// when the stream ends each device is billed, its invoice written as
/// `invoice-<device>-<month>.html` and a `summary.json` written alongside.
/// A device whose bill cannot be computed is logged and counted, and does
/// not stop the others.
pub struct InvoiceSink {
    tariff: TariffSchedule,
    period: BillingPeriod,
    output_dir: PathBuf,
    payment_terms: Duration,
    issued_at: OffsetDateTime,
}

impl InvoiceSink {
    pub fn new<P: Into<PathBuf>>(
        tariff: TariffSchedule,
        period: BillingPeriod,
        output_dir: P,
        payment_terms: Duration,
        issued_at: OffsetDateTime,
    ) -> Self {
        Self {
            tariff,
            period,
            output_dir: output_dir.into(),
            payment_terms,
            issued_at,
        }
    }

    async fn write_invoice(&self, invoice: &Invoice) -> Result<(), PipelineError> {
        let path = self.output_dir.join(invoice.file_name());
        tokio::fs::write(&path, render_invoice_html(invoice))
            .await
            .map_err(|e| PipelineError::Sink(format!("failed to write {}: {e}", path.display())))
    }

    async fn write_summary(&self, summary: &BillingRunSummary) -> Result<(), PipelineError> {
        let path = self.output_dir.join("summary.json");
        let json = serde_json::to_vec_pretty(summary)
            .map_err(|e| PipelineError::Sink(format!("failed to encode summary: {e}")))?;
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| PipelineError::Sink(format!("failed to write {}: {e}", path.display())))
    }
}

#[async_trait::async_trait]
impl Sink<MeterReading> for InvoiceSink {
    type Output = BillingRunSummary;

    async fn run<S>(&self, mut input: S) -> Result<BillingRunSummary, PipelineError>
    where
        S: futures::Stream<Item = Result<Envelope<MeterReading>, PipelineError>> + Send + Unpin + 'static,
    {
        let mut counts = RecordCounts::default();
        let mut by_device: BTreeMap<String, Vec<MeterReading>> = BTreeMap::new();

        while let Some(env) = next_accepted(&mut input, &mut counts).await? {
            let reading = env.payload;
            if self.period.contains(reading.ts) {
                by_device.entry(reading.device_id.clone()).or_default().push(reading);
            }
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| PipelineError::Sink(format!("failed to create {}: {e}", self.output_dir.display())))?;

        let mut invoices = Vec::new();
        let mut failed = 0;
        for (device_id, readings) in &by_device {
            let bill = match bill_for_period(device_id, self.period, &self.tariff, readings) {
                Ok(Some(bill)) => bill,
                Ok(None) => {
                    tracing::warn!(device_id = %device_id, month = %self.period, "no readings to bill");
                    continue;
                }
                Err(e) => {
                    failed += 1;
                    metrics::counter!("bill_computation_errors_total").increment(1);
                    tracing::error!(device_id = %device_id, month = %self.period, error = %e, "bill computation failed");
                    continue;
                }
            };

            let invoice = Invoice::issue(bill, self.issued_at, self.payment_terms);
            self.write_invoice(&invoice).await?;
            metrics::counter!("invoices_generated_total").increment(1);
            tracing::info!(
                device_id = %device_id,
                invoice_id = %invoice.invoice_id,
                energy_kwh = %invoice.bill.breakdown.energy_total.round_dp(2),
                total = %invoice.bill.breakdown.total.round_dp(2),
                "invoice generated"
            );
            invoices.push(InvoiceSummary::from_invoice(&invoice));
        }

        let summary = BillingRunSummary {
            month: self.period,
            issued_at: self
                .issued_at
                .format(&Rfc3339)
                .unwrap_or_else(|_| self.issued_at.to_string()),
            readings: counts,
            generated: invoices.len(),
            failed,
            invoices,
        };
        self.write_summary(&summary).await?;

        Ok(summary)
    }
}

impl BillingRunSummary {
    /// Sum of invoice totals as written (already rounded).
    pub fn billed_total(&self) -> Decimal {
        self.invoices
            .iter()
            .filter_map(|i| i.total.parse::<Decimal>().ok())
            .sum()
    }
}
