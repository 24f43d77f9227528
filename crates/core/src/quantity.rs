//! Produce quantities.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// A non-negative amount of produce.
///
/// Backed by a decimal so reserve/release round trips are exact; the unit
/// (kg, crates, bunches) is a property of the lot, not of this type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "Decimal", try_from = "Decimal")]
pub struct Quantity(Decimal);

impl ValueObject for Quantity {}

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    /// A quantity that may be zero.
    pub fn new(amount: Decimal) -> DomainResult<Self> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(DomainError::invalid_argument(format!(
                "quantity cannot be negative (got {amount})"
            )));
        }
        Ok(Self(amount.normalize()))
    }

    /// A strictly positive quantity (order sizes, reservations, yields).
    pub fn positive(amount: Decimal) -> DomainResult<Self> {
        let quantity = Self::new(amount)?;
        if quantity.is_zero() {
            return Err(DomainError::invalid_argument("quantity must be positive"));
        }
        Ok(quantity)
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// `self - other`, or `None` when the result would be negative.
    pub fn checked_sub(self, other: Quantity) -> Option<Quantity> {
        if other.0 > self.0 {
            None
        } else {
            Some(Self(self.0 - other.0))
        }
    }

    /// `self + other`, or `None` when the sum is not representable.
    pub fn checked_add(self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Total of `quantities`, or `None` on overflow.
    pub fn checked_total<I>(quantities: I) -> Option<Quantity>
    where
        I: IntoIterator<Item = Quantity>,
    {
        quantities
            .into_iter()
            .try_fold(Quantity::ZERO, |total, q| total.checked_add(q))
    }
}

impl TryFrom<Decimal> for Quantity {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Quantity> for Decimal {
    fn from(value: Quantity) -> Self {
        value.0
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(matches!(
            Quantity::new(dec!(-0.5)),
            Err(DomainError::InvalidArgument(_))
        ));
    }

    #[test]
    fn positive_rejects_zero() {
        assert!(Quantity::new(dec!(0)).is_ok());
        assert!(Quantity::positive(dec!(0)).is_err());
        assert!(Quantity::positive(dec!(0.001)).is_ok());
    }

    #[test]
    fn checked_sub_never_goes_negative() {
        let ten = Quantity::new(dec!(10)).unwrap();
        let seven = Quantity::new(dec!(7)).unwrap();
        assert_eq!(ten.checked_sub(seven).unwrap().amount(), dec!(3));
        assert_eq!(seven.checked_sub(ten), None);
    }

    #[test]
    fn checked_add_reports_overflow() {
        let one = Quantity::new(dec!(1)).unwrap();
        let max = Quantity::new(Decimal::MAX).unwrap();
        assert_eq!(one.checked_add(one).unwrap().amount(), dec!(2));
        assert_eq!(max.checked_add(one), None);
        assert_eq!(Quantity::checked_total([one, one, one]).unwrap().amount(), dec!(3));
        assert_eq!(Quantity::checked_total([max, one]), None);
        assert_eq!(Quantity::checked_total(Vec::new()), Some(Quantity::ZERO));
    }

    #[test]
    fn equal_values_with_different_scale_are_equal() {
        assert_eq!(
            Quantity::new(dec!(2.50)).unwrap(),
            Quantity::new(dec!(2.5)).unwrap()
        );
    }

    #[test]
    fn deserializing_a_negative_amount_fails() {
        let err = serde_json::from_str::<Quantity>("\"-1\"");
        assert!(err.is_err());
        let ok: Quantity = serde_json::from_str("\"4.25\"").unwrap();
        assert_eq!(ok.amount(), dec!(4.25));
    }
}
