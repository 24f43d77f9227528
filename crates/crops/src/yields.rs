//! Yield averaging.

use rust_decimal::Decimal;

use fieldstock_core::{DomainError, DomainResult, Quantity};

/// Arithmetic mean of a set of harvest yields, `None` for an empty set.
///
/// Fails when the yields do not sum to a representable decimal.
pub fn mean_yield<I>(yields: I) -> DomainResult<Option<Decimal>>
where
    I: IntoIterator<Item = Quantity>,
{
    let mut total = Quantity::ZERO;
    let mut count: u64 = 0;
    for y in yields {
        total = total
            .checked_add(y)
            .ok_or_else(|| DomainError::invalid_argument("harvest yields overflow their total"))?;
        count += 1;
    }

    if count == 0 {
        return Ok(None);
    }
    Ok(Some((total.amount() / Decimal::from(count)).normalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn q(d: Decimal) -> Quantity {
        Quantity::new(d).unwrap()
    }

    #[test]
    fn empty_set_has_no_mean() {
        assert_eq!(mean_yield(Vec::new()).unwrap(), None);
    }

    #[test]
    fn mean_of_five_and_seven_is_six() {
        assert_eq!(mean_yield([q(dec!(5.0)), q(dec!(7.0))]).unwrap(), Some(dec!(6)));
    }

    #[test]
    fn overflowing_total_is_an_error_not_a_panic() {
        let err = mean_yield([q(Decimal::MAX), q(dec!(1))]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidArgument(_)));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the mean matches a floating-point reference and lies
            /// between the smallest and largest yield.
            #[test]
            fn mean_matches_reference(cents in prop::collection::vec(1u32..1_000_000, 1..60)) {
                let yields: Vec<Quantity> = cents
                    .iter()
                    .map(|c| q(Decimal::new(i64::from(*c), 2)))
                    .collect();

                let mean = mean_yield(yields.iter().copied()).unwrap().unwrap();

                let reference = cents.iter().map(|c| f64::from(*c) / 100.0).sum::<f64>()
                    / cents.len() as f64;
                let mean_f64: f64 = mean.to_string().parse().unwrap();
                prop_assert!((mean_f64 - reference).abs() < 1e-6);

                let min = yields.iter().min().unwrap().amount();
                let max = yields.iter().max().unwrap().amount();
                prop_assert!(mean >= min && mean <= max);
            }
        }
    }
}
