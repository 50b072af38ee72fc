use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::InvalidTariffError;

/// One slab as entered by an operator, e.g. `{ range = "0-100", rate = 3.5 }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlabConfig {
    pub range: String,
    pub rate: Decimal,
}

fn default_currency() -> String {
    "INR".to_string()
}

/// Raw tariff configuration, as stored in config files or sent by the
/// tariff editor. Convert it into a [`TariffSchedule`] before billing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffConfig {
    pub slabs: Vec<SlabConfig>,
    pub fixed_charge: Decimal,
    pub tax_rate: Decimal,
    #[serde(default)]
    pub minimum_bill: Option<Decimal>,
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// A tariff tier: units between `lower_bound` and `upper_bound` are billed at `rate`.
#[derive(Debug, Clone, PartialEq)]
pub struct Slab {
    pub range_label: String,
    pub lower_bound: Decimal,
    /// `None` for the open-ended final slab.
    pub upper_bound: Option<Decimal>,
    pub rate: Decimal,
}

impl Slab {
    /// Build a slab from a range string (`"0-100"`, `"100-"` or `"301+"`) and a rate.
    pub fn parse(range: &str, rate: Decimal) -> Result<Self, InvalidTariffError> {
        let (lower_bound, upper_bound) = parse_slab_range(range)?;
        if rate.is_sign_negative() && !rate.is_zero() {
            return Err(InvalidTariffError::NegativeRate {
                range: range.to_string(),
                rate,
            });
        }

        Ok(Self {
            range_label: range.trim().to_string(),
            lower_bound,
            upper_bound,
            rate,
        })
    }

    /// Number of units this slab absorbs, `None` when unbounded.
    pub fn capacity(&self) -> Option<Decimal> {
        self.upper_bound.map(|upper| upper - self.lower_bound)
    }

    pub fn is_open_ended(&self) -> bool {
        self.upper_bound.is_none()
    }
}

fn parse_bound(range: &str, s: &str) -> Result<Decimal, InvalidTariffError> {
    let value = Decimal::from_str(s.trim()).map_err(|e| InvalidTariffError::MalformedRange {
        range: range.to_string(),
        reason: format!("'{}' is not a number: {e}", s.trim()),
    })?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(InvalidTariffError::MalformedRange {
            range: range.to_string(),
            reason: "bounds must be non-negative".to_string(),
        });
    }
    Ok(value)
}

/// Parse a human-entered slab range into `(lower, upper)` bounds.
///
/// Accepted forms:
/// - `"0-100"`: bounded slab
/// - `"100-"` or `"301+"`: open-ended slab
pub fn parse_slab_range(range: &str) -> Result<(Decimal, Option<Decimal>), InvalidTariffError> {
    let trimmed = range.trim();
    let malformed = |reason: &str| InvalidTariffError::MalformedRange {
        range: range.to_string(),
        reason: reason.to_string(),
    };

    if trimmed.is_empty() {
        return Err(malformed("empty range"));
    }

    if let Some(lower) = trimmed.strip_suffix('+') {
        return Ok((parse_bound(range, lower)?, None));
    }

    let (lower, upper) = trimmed
        .split_once('-')
        .ok_or_else(|| malformed("expected 'lower-upper', 'lower-' or 'lower+'"))?;

    let lower = parse_bound(range, lower)?;
    if upper.trim().is_empty() {
        return Ok((lower, None));
    }

    let upper = parse_bound(range, upper)?;
    if upper <= lower {
        return Err(malformed("upper bound must be greater than lower bound"));
    }

    Ok((lower, Some(upper)))
}

/// A validated tariff: ordered slabs, fixed charge and tax rate.
#[derive(Debug, Clone, PartialEq)]
pub struct TariffSchedule {
    slabs: Vec<Slab>,
    fixed_charge: Decimal,
    tax_rate: Decimal,
    minimum_bill: Option<Decimal>,
    currency: String,
}

impl TariffSchedule {
    /// Validate slabs, fixed charge and tax rate.
    ///
    /// Slabs must be ascending and must not overlap; gaps between bounds
    /// (`0-100`, `101-300`) are accepted since each slab bills exactly its
    /// own capacity. Only the last slab may be open-ended.
    pub fn new(
        slabs: Vec<Slab>,
        fixed_charge: Decimal,
        tax_rate: Decimal,
    ) -> Result<Self, InvalidTariffError> {
        if slabs.is_empty() {
            return Err(InvalidTariffError::NoSlabs);
        }

        for pair in slabs.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            let Some(previous_upper) = prev.upper_bound else {
                return Err(InvalidTariffError::UnboundedNotLast {
                    range: prev.range_label.clone(),
                });
            };
            if next.lower_bound < previous_upper {
                return Err(InvalidTariffError::Overlapping {
                    range: next.range_label.clone(),
                    previous_upper,
                });
            }
        }

        if fixed_charge.is_sign_negative() && !fixed_charge.is_zero() {
            return Err(InvalidTariffError::NegativeFixedCharge(fixed_charge));
        }
        if tax_rate < Decimal::ZERO || tax_rate >= Decimal::ONE {
            return Err(InvalidTariffError::TaxRateOutOfRange(tax_rate));
        }

        Ok(Self {
            slabs,
            fixed_charge,
            tax_rate,
            minimum_bill: None,
            currency: default_currency(),
        })
    }

    pub fn with_minimum_bill(mut self, minimum_bill: Decimal) -> Result<Self, InvalidTariffError> {
        if minimum_bill.is_sign_negative() && !minimum_bill.is_zero() {
            return Err(InvalidTariffError::NegativeMinimumBill(minimum_bill));
        }
        self.minimum_bill = Some(minimum_bill);
        Ok(self)
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn slabs(&self) -> &[Slab] {
        &self.slabs
    }

    pub fn fixed_charge(&self) -> Decimal {
        self.fixed_charge
    }

    pub fn tax_rate(&self) -> Decimal {
        self.tax_rate
    }

    pub fn minimum_bill(&self) -> Option<Decimal> {
        self.minimum_bill
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// True when the last slab has no upper bound, i.e. any energy total can be billed.
    pub fn covers_unbounded_energy(&self) -> bool {
        self.slabs.last().is_some_and(Slab::is_open_ended)
    }
}

impl TryFrom<&TariffConfig> for TariffSchedule {
    type Error = InvalidTariffError;

    fn try_from(cfg: &TariffConfig) -> Result<Self, Self::Error> {
        let slabs = cfg
            .slabs
            .iter()
            .map(|s| Slab::parse(&s.range, s.rate))
            .collect::<Result<Vec<_>, _>>()?;

        let schedule = TariffSchedule::new(slabs, cfg.fixed_charge, cfg.tax_rate)?
            .with_currency(cfg.currency.clone());

        match cfg.minimum_bill {
            Some(min) => schedule.with_minimum_bill(min),
            None => Ok(schedule),
        }
    }
}

impl TryFrom<TariffConfig> for TariffSchedule {
    type Error = InvalidTariffError;

    fn try_from(cfg: TariffConfig) -> Result<Self, Self::Error> {
        TariffSchedule::try_from(&cfg)
    }
}
