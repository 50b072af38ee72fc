use rust_decimal::Decimal;
use time::OffsetDateTime;

/// A tariff schedule that cannot be used for billing.
///
/// Raised while building a `TariffSchedule`, so a bad configuration is
/// rejected before any bill is computed.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InvalidTariffError {
    #[error("tariff has no slabs")]
    NoSlabs,
    #[error("invalid slab range '{range}': {reason}")]
    MalformedRange { range: String, reason: String },
    #[error("slab '{range}' has negative rate {rate}")]
    NegativeRate { range: String, rate: Decimal },
    #[error("slab '{range}' starts before the previous slab ends at {previous_upper}")]
    Overlapping { range: String, previous_upper: Decimal },
    #[error("open-ended slab '{range}' must be the last slab")]
    UnboundedNotLast { range: String },
    #[error("fixed charge must be non-negative, got {0}")]
    NegativeFixedCharge(Decimal),
    #[error("tax rate must be in [0, 1), got {0}")]
    TaxRateOutOfRange(Decimal),
    #[error("minimum bill must be non-negative, got {0}")]
    NegativeMinimumBill(Decimal),
}

/// Energy left over after every slab has been filled.
///
/// Only possible when no slab is open-ended.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("{unallocated} of {energy_total} kWh exceed the capacity of every configured slab")]
pub struct UnallocatedEnergyError {
    pub energy_total: Decimal,
    pub unallocated: Decimal,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BillingError {
    #[error(transparent)]
    Unallocated(#[from] UnallocatedEnergyError),
    #[error("energy total must be non-negative, got {0}")]
    NegativeEnergy(Decimal),
    #[error("energy total {0} cannot be represented as a decimal quantity")]
    NonRepresentableEnergy(f64),
    #[error("bill amount for {energy_total} kWh exceeds the representable range")]
    AmountOverflow { energy_total: Decimal },
}

/// A single meter reading that was rejected.
///
/// Readings are rejected one at a time; the rest of a batch is still used.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InvalidReadingError {
    #[error("malformed reading record: {0}")]
    Malformed(String),
    #[error("invalid timestamp '{value}': {reason}")]
    Timestamp { value: String, reason: String },
    #[error("timestamp {0} outside allowed range")]
    TimestampOutOfRange(OffsetDateTime),
    #[error("energy_kwh must be finite and non-negative, got {0}")]
    InvalidEnergy(f64),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid billing period '{value}': expected YYYY-MM")]
pub struct InvalidPeriodError {
    pub value: String,
}
