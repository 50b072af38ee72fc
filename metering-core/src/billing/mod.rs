use rust_decimal::Decimal;

use crate::domain::{Bill, BillBreakdown, BillingPeriod, MeterReading, SlabCharge, TariffSchedule};
use crate::error::{BillingError, UnallocatedEnergyError};

/// Progressive slab billing.
///
/// Energy fills slabs cheapest-first; every configured slab appears in the
/// breakdown, with zero units once the energy is used up. Tax applies to
/// the slab subtotal plus the fixed charge. If the tariff sets a minimum
/// bill, the total is raised to it.
///
/// Energy that no slab can absorb is an error rather than being dropped.
pub fn compute_bill(tariff: &TariffSchedule, energy_total: Decimal) -> Result<BillBreakdown, BillingError> {
    if energy_total.is_sign_negative() && !energy_total.is_zero() {
        return Err(BillingError::NegativeEnergy(energy_total));
    }

    let overflow = || BillingError::AmountOverflow { energy_total };

    let mut remaining = energy_total;
    let mut slab_charges = Vec::with_capacity(tariff.slabs().len());

    for slab in tariff.slabs() {
        let units = if remaining <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            match slab.capacity() {
                Some(capacity) => remaining.min(capacity),
                None => remaining,
            }
        };
        remaining -= units;

        let charge = units.checked_mul(slab.rate).ok_or_else(overflow)?;
        slab_charges.push(SlabCharge {
            slab: slab.range_label.clone(),
            units,
            rate: slab.rate,
            charge,
        });
    }

    if remaining > Decimal::ZERO {
        return Err(UnallocatedEnergyError {
            energy_total,
            unallocated: remaining,
        }
        .into());
    }

    let subtotal = slab_charges
        .iter()
        .try_fold(Decimal::ZERO, |acc, c| acc.checked_add(c.charge))
        .ok_or_else(overflow)?;
    let fixed_charge = tariff.fixed_charge();
    let taxable = subtotal.checked_add(fixed_charge).ok_or_else(overflow)?;
    let tax = taxable.checked_mul(tariff.tax_rate()).ok_or_else(overflow)?;
    let mut total = taxable.checked_add(tax).ok_or_else(overflow)?;
    if let Some(minimum) = tariff.minimum_bill() {
        total = total.max(minimum);
    }

    Ok(BillBreakdown {
        energy_total,
        slab_charges,
        subtotal,
        fixed_charge,
        tax_rate: tariff.tax_rate(),
        tax,
        total,
        currency: tariff.currency().to_string(),
    })
}

/// Energy consumed by `device_id` during `period`: last minus first
/// cumulative reading, clamped at zero.
///
/// Returns `None` when the device has no readings in the period.
pub fn period_energy(device_id: &str, period: &BillingPeriod, readings: &[MeterReading]) -> Option<f64> {
    let mut in_period: Vec<&MeterReading> = readings
        .iter()
        .filter(|r| r.device_id == device_id && period.contains(r.ts))
        .collect();
    in_period.sort_by_key(|r| r.ts);

    let first = in_period.first()?;
    let last = in_period.last()?;
    Some((last.energy_kwh - first.energy_kwh).max(0.0))
}

/// Bill a device for one month from its readings.
///
/// `Ok(None)` means there was nothing to bill (no readings in the period).
pub fn bill_for_period(
    device_id: &str,
    period: BillingPeriod,
    tariff: &TariffSchedule,
    readings: &[MeterReading],
) -> Result<Option<Bill>, BillingError> {
    let Some(kwh) = period_energy(device_id, &period, readings) else {
        return Ok(None);
    };
    let energy_total =
        Decimal::try_from(kwh).map_err(|_| BillingError::NonRepresentableEnergy(kwh))?;

    let breakdown = compute_bill(tariff, energy_total)?;
    Ok(Some(Bill {
        device_id: device_id.to_string(),
        month: period,
        breakdown,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Slab;
    use std::str::FromStr;
    use time::macros::datetime;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn two_slab_tariff() -> TariffSchedule {
        TariffSchedule::new(
            vec![
                Slab::parse("0-100", d("5")).unwrap(),
                Slab::parse("100-", d("7")).unwrap(),
            ],
            d("50"),
            d("0.18"),
        )
        .unwrap()
    }

    fn reading(ts: time::OffsetDateTime, device_id: &str, energy_kwh: f64) -> MeterReading {
        MeterReading {
            ts,
            device_id: device_id.to_string(),
            energy_kwh,
            power_w: None,
            voltage: None,
            current: None,
            power_factor: None,
        }
    }

    #[test]
    fn worked_example_150_kwh() {
        let bill = compute_bill(&two_slab_tariff(), d("150")).unwrap();

        let charges: Vec<Decimal> = bill.slab_charges.iter().map(|c| c.charge).collect();
        assert_eq!(charges, vec![d("500"), d("350")]);
        assert_eq!(bill.slab_charges[1].units, d("50"));
        assert_eq!(bill.subtotal, d("850"));
        assert_eq!(bill.tax, d("162"));
        assert_eq!(bill.total, d("1062"));
        assert_eq!(bill.currency, "INR");
    }

    #[test]
    fn zero_energy_bills_fixed_charge_plus_tax() {
        let tariff = two_slab_tariff();
        let bill = compute_bill(&tariff, Decimal::ZERO).unwrap();

        assert_eq!(bill.slab_charges.len(), 2);
        assert!(bill.slab_charges.iter().all(|c| c.units.is_zero() && c.charge.is_zero()));
        assert_eq!(bill.total, tariff.fixed_charge() * (Decimal::ONE + tariff.tax_rate()));
    }

    #[test]
    fn unused_slabs_still_listed() {
        let tariff = TariffSchedule::new(
            vec![
                Slab::parse("0-100", d("3.5")).unwrap(),
                Slab::parse("101-300", d("4.5")).unwrap(),
                Slab::parse("301+", d("6")).unwrap(),
            ],
            d("50"),
            d("0.18"),
        )
        .unwrap();

        let bill = compute_bill(&tariff, d("40")).unwrap();
        let units: Vec<Decimal> = bill.slab_charges.iter().map(|c| c.units).collect();
        assert_eq!(units, vec![d("40"), d("0"), d("0")]);
        assert_eq!(bill.subtotal, d("140"));
    }

    #[test]
    fn all_energy_is_allocated_with_open_final_slab() {
        let tariff = two_slab_tariff();
        for kwh in ["0", "0.5", "99.99", "100", "100.01", "150", "12345.678"] {
            let bill = compute_bill(&tariff, d(kwh)).unwrap();
            assert_eq!(bill.allocated_units(), d(kwh), "energy {kwh}");
        }
    }

    #[test]
    fn excess_energy_without_open_slab_is_an_error() {
        let tariff = TariffSchedule::new(
            vec![
                Slab::parse("0-100", d("5")).unwrap(),
                Slab::parse("100-200", d("7")).unwrap(),
            ],
            d("0"),
            d("0"),
        )
        .unwrap();

        assert!(compute_bill(&tariff, d("200")).is_ok());
        let err = compute_bill(&tariff, d("250")).unwrap_err();
        assert_eq!(
            err,
            BillingError::Unallocated(UnallocatedEnergyError {
                energy_total: d("250"),
                unallocated: d("50"),
            })
        );
    }

    #[test]
    fn negative_energy_is_rejected() {
        assert!(matches!(
            compute_bill(&two_slab_tariff(), d("-1")),
            Err(BillingError::NegativeEnergy(_))
        ));
    }

    #[test]
    fn total_is_monotonic_in_energy() {
        let tariff = two_slab_tariff();
        let mut previous = Decimal::MIN;
        for step in 0..400 {
            let kwh = Decimal::new(step * 75, 2);
            let total = compute_bill(&tariff, kwh).unwrap().total;
            assert!(total >= previous, "total decreased at {kwh} kWh");
            previous = total;
        }
    }

    #[test]
    fn identical_inputs_give_identical_bills() {
        let tariff = two_slab_tariff();
        assert_eq!(
            compute_bill(&tariff, d("123.45")).unwrap(),
            compute_bill(&tariff, d("123.45")).unwrap()
        );
    }

    #[test]
    fn minimum_bill_raises_small_totals() {
        let tariff = two_slab_tariff().with_minimum_bill(d("100")).unwrap();

        assert_eq!(compute_bill(&tariff, d("0")).unwrap().total, d("100"));
        assert_eq!(compute_bill(&tariff, d("150")).unwrap().total, d("1062"));
    }

    #[test]
    fn period_energy_uses_first_and_last_reading_in_month() {
        let period: BillingPeriod = "2024-01".parse().unwrap();
        let readings = vec![
            reading(datetime!(2024-01-31 23:00:00 UTC), "m-1", 160.0),
            reading(datetime!(2023-12-31 23:00:00 UTC), "m-1", 5.0),
            reading(datetime!(2024-01-01 00:10:00 UTC), "m-1", 10.0),
            reading(datetime!(2024-02-01 00:00:00 UTC), "m-1", 170.0),
            reading(datetime!(2024-01-15 12:00:00 UTC), "m-2", 999.0),
        ];

        assert_eq!(period_energy("m-1", &period, &readings), Some(150.0));
        assert_eq!(period_energy("m-2", &period, &readings), Some(0.0));
        assert_eq!(period_energy("m-3", &period, &readings), None);
    }

    #[test]
    fn bill_for_period_computes_from_readings() {
        let period: BillingPeriod = "2024-01".parse().unwrap();
        let readings = vec![
            reading(datetime!(2024-01-01 00:00:00 UTC), "m-1", 1000.0),
            reading(datetime!(2024-01-31 00:00:00 UTC), "m-1", 1150.0),
        ];

        let bill = bill_for_period("m-1", period, &two_slab_tariff(), &readings)
            .unwrap()
            .unwrap();
        assert_eq!(bill.device_id, "m-1");
        assert_eq!(bill.month, period);
        assert_eq!(bill.breakdown.energy_total, d("150"));
        assert_eq!(bill.breakdown.total, d("1062"));

        let none = bill_for_period("m-2", period, &two_slab_tariff(), &readings).unwrap();
        assert!(none.is_none());
    }

    #[test]
    fn huge_energy_total_is_an_error_not_a_panic() {
        // representable as a Decimal, but 7x it is not
        let huge = d("20000000000000000000000000000");
        assert_eq!(
            compute_bill(&two_slab_tariff(), huge),
            Err(BillingError::AmountOverflow { energy_total: huge })
        );
    }

    #[test]
    fn bill_for_period_reports_overflow_from_huge_counter() {
        let period: BillingPeriod = "2024-01".parse().unwrap();
        let readings = vec![
            reading(datetime!(2024-01-01 00:00:00 UTC), "m-1", 0.0),
            reading(datetime!(2024-01-31 00:00:00 UTC), "m-1", 2.0e28),
        ];

        let res = bill_for_period("m-1", period, &two_slab_tariff(), &readings);
        assert!(matches!(res, Err(BillingError::AmountOverflow { .. })));
    }
}
