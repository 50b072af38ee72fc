//! Billing and consumption logic for smart energy meters.
//!
//! - [`billing::compute_bill`]: progressive slab billing for a tariff.
//! - [`aggregate::aggregate_daily`]: per-day consumption from cumulative readings.
//!
//! Everything here is pure computation over in-memory values.

pub mod aggregate;
pub mod billing;
pub mod domain;
pub mod error;

pub use aggregate::{aggregate_by, aggregate_daily, aggregate_daily_raw, aggregate_periods, DailyConsumption, Granularity};
pub use billing::{bill_for_period, compute_bill};
pub use error::{BillingError, InvalidPeriodError, InvalidReadingError, InvalidTariffError, UnallocatedEnergyError};
