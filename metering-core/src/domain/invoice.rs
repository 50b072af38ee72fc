use std::fmt;

use time::{Date, Duration, OffsetDateTime};

use super::Bill;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Issued,
    Paid,
    Overdue,
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Issued => "issued",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        };
        f.write_str(s)
    }
}

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    let len = s.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(s.as_bytes());
}

/// Stable id for a bill: the same device, month and total always hash to
/// the same invoice id, so re-running a billing job does not mint new ones.
pub fn invoice_id(bill: &Bill) -> String {
    let mut h = blake3::Hasher::new();
    hash_str(&mut h, &bill.device_id);
    hash_str(&mut h, &bill.month.to_string());
    hash_str(&mut h, &bill.breakdown.total.normalize().to_string());
    hash_str(&mut h, &bill.breakdown.currency);
    let hex = h.finalize().to_hex();
    hex.as_str()[..16].to_string()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Invoice {
    pub invoice_id: String,
    pub bill: Bill,
    pub status: InvoiceStatus,
    pub issued_at: OffsetDateTime,
    pub due_date: Date,
}

impl Invoice {
    pub fn issue(bill: Bill, issued_at: OffsetDateTime, payment_terms: Duration) -> Self {
        let due_date = (issued_at + payment_terms).date();
        Self {
            invoice_id: invoice_id(&bill),
            bill,
            status: InvoiceStatus::Issued,
            issued_at,
            due_date,
        }
    }

    pub fn mark_paid(&mut self) {
        self.status = InvoiceStatus::Paid;
    }

    /// Status as seen on `today`: an unpaid invoice is overdue once its due
    /// date has passed.
    pub fn status_on(&self, today: Date) -> InvoiceStatus {
        match self.status {
            InvoiceStatus::Issued if today > self.due_date => InvoiceStatus::Overdue,
            status => status,
        }
    }

    /// Name of the exported document, `invoice-<device>-<YYYY-MM>.html`.
    pub fn file_name(&self) -> String {
        let device: String = self
            .bill
            .device_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        format!("invoice-{}-{}.html", device, self.bill.month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BillBreakdown, BillingPeriod};
    use rust_decimal::Decimal;
    use time::macros::{date, datetime};

    fn bill(device_id: &str, total: i64) -> Bill {
        Bill {
            device_id: device_id.to_string(),
            month: "2024-01".parse::<BillingPeriod>().unwrap(),
            breakdown: BillBreakdown {
                energy_total: Decimal::from(150),
                slab_charges: vec![],
                subtotal: Decimal::from(total),
                fixed_charge: Decimal::ZERO,
                tax_rate: Decimal::ZERO,
                tax: Decimal::ZERO,
                total: Decimal::from(total),
                currency: "INR".to_string(),
            },
        }
    }

    #[test]
    fn invoice_id_is_deterministic() {
        assert_eq!(invoice_id(&bill("m-1", 1062)), invoice_id(&bill("m-1", 1062)));
        assert_ne!(invoice_id(&bill("m-1", 1062)), invoice_id(&bill("m-2", 1062)));
        assert_ne!(invoice_id(&bill("m-1", 1062)), invoice_id(&bill("m-1", 1063)));
        assert_eq!(invoice_id(&bill("m-1", 1062)).len(), 16);
    }

    #[test]
    fn issue_sets_due_date_and_file_name() {
        let invoice = Invoice::issue(
            bill("meter/7", 10),
            datetime!(2024-02-01 09:00:00 UTC),
            Duration::days(15),
        );
        assert_eq!(invoice.status, InvoiceStatus::Issued);
        assert_eq!(invoice.due_date, date!(2024-02-16));
        assert_eq!(invoice.file_name(), "invoice-meter_7-2024-01.html");
    }

    #[test]
    fn unpaid_invoice_becomes_overdue_after_due_date() {
        let mut invoice = Invoice::issue(bill("m-1", 10), datetime!(2024-02-01 09:00:00 UTC), Duration::days(15));

        assert_eq!(invoice.status_on(date!(2024-02-16)), InvoiceStatus::Issued);
        assert_eq!(invoice.status_on(date!(2024-02-17)), InvoiceStatus::Overdue);

        invoice.mark_paid();
        assert_eq!(invoice.status_on(date!(2024-03-01)), InvoiceStatus::Paid);
        assert_eq!(invoice.status.to_string(), "paid");
    }
}
