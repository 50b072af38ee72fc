use rust_decimal::Decimal;
use serde::Serialize;

use super::BillingPeriod;

/// Units and charge attributed to one slab.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlabCharge {
    pub slab: String,
    pub units: Decimal,
    pub rate: Decimal,
    pub charge: Decimal,
}

/// Result of progressive slab billing for an energy total.
///
/// Amounts are unrounded; round only when presenting them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillBreakdown {
    pub energy_total: Decimal,
    /// One entry per configured slab, in tariff order.
    pub slab_charges: Vec<SlabCharge>,
    pub subtotal: Decimal,
    pub fixed_charge: Decimal,
    pub tax_rate: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub currency: String,
}

impl BillBreakdown {
    pub fn allocated_units(&self) -> Decimal {
        self.slab_charges.iter().map(|c| c.units).sum()
    }
}

/// A breakdown for a specific device and month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bill {
    pub device_id: String,
    pub month: BillingPeriod,
    #[serde(flatten)]
    pub breakdown: BillBreakdown,
}
