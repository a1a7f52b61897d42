//! Type-safe price representation using decimal arithmetic.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::account::FieldError;

/// A non-negative unit price.
///
/// Serialized as a JSON number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::float")] Decimal);

impl Price {
    /// Digits kept after the decimal point.
    pub const SCALE: u32 = 2;

    /// Smallest amount that no longer fits the `price` column, `NUMERIC(12, 2)`.
    pub const LIMIT: Decimal = Decimal::from_parts(1_410_065_408, 2, 0, false, 0);

    /// Create a price.
    ///
    /// Amounts must be non-negative, below [`Price::LIMIT`] and carry at most
    /// two decimal places. Trailing zeros do not count: `5.000` is `5`.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] for the `price` field naming the broken rule.
    pub fn new(amount: Decimal) -> Result<Self, FieldError> {
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(FieldError::new("price", "must be greater than or equal to 0"));
        }
        if amount >= Self::LIMIT {
            return Err(FieldError::new(
                "price",
                format!("must be less than {}", Self::LIMIT),
            ));
        }
        let amount = amount.normalize();
        if amount.scale() > Self::SCALE {
            return Err(FieldError::new(
                "price",
                "must have no more than 2 decimal places",
            ));
        }
        Ok(Self(amount))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Total for `quantity` units at this price.
    #[must_use]
    pub fn total_for(self, quantity: i32) -> Decimal {
        self.0 * Decimal::from(quantity)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Price {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Price {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Price {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_negative() {
        assert!(Price::new(Decimal::new(-1, 0)).is_err());
        assert!(Price::new(Decimal::ZERO).is_ok());
    }

    #[test]
    fn test_rejects_sub_cent_amounts() {
        let err = Price::new(Decimal::new(5, 3)).unwrap_err();
        assert_eq!(err.field, "price");
        assert!(err.reason.contains("2 decimal places"));
        assert!(Price::new(Decimal::new(1999, 2)).is_ok());
        assert_eq!(Price::new(Decimal::new(5000, 3)).unwrap().amount(), Decimal::new(5, 0));
    }

    #[test]
    fn test_rejects_amounts_beyond_column() {
        assert_eq!(Price::LIMIT, Decimal::new(10_000_000_000, 0));
        assert!(Price::new(Price::LIMIT).is_err());
        assert!(Price::new(Decimal::new(999_999_999_999, 2)).is_ok());
    }

    #[test]
    fn test_total_for() {
        let price = Price::new(Decimal::new(1250, 2)).unwrap();
        assert_eq!(price.total_for(3), Decimal::new(3750, 2));
        assert_eq!(price.total_for(0), Decimal::ZERO);
    }

    #[test]
    fn test_serializes_as_number() {
        let price = Price::new(Decimal::new(5, 0)).unwrap();
        assert_eq!(serde_json::to_string(&price).unwrap(), "5.0");
        let parsed: Price = serde_json::from_str("19.99").unwrap();
        assert_eq!(parsed.amount(), Decimal::new(1999, 2));
    }
}
