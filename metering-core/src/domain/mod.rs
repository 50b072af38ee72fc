pub mod bill;
pub mod invoice;
pub mod meter_reading;
pub mod period;
pub mod tariff;

pub use bill::{Bill, BillBreakdown, SlabCharge};
pub use invoice::{Invoice, InvoiceStatus};
pub use meter_reading::{validate_reading, MeterReading, RawMeterReading};
pub use period::BillingPeriod;
pub use tariff::{Slab, SlabConfig, TariffConfig, TariffSchedule};
