//! Funding order-book types.

use rust_decimal::Decimal;

/// Single ask level of a funding order book.
///
/// Levels carry a positive `amount`; the bid side of the raw book is
/// filtered out before it reaches this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AskLevel {
    /// Daily fractional rate at this level.
    pub rate: Decimal,
    /// Loan period in days.
    pub period: u32,
    /// Number of orders aggregated at this level.
    pub count: u32,
    /// Amount offered at this level.
    pub amount: Decimal,
}

impl AskLevel {
    /// Create a new ask level.
    pub fn new(rate: Decimal, period: u32, count: u32, amount: Decimal) -> Self {
        Self {
            rate,
            period,
            count,
            amount,
        }
    }
}

/// How a level's depth counts toward the cumulative walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepthWeight {
    /// Use the level's amount as-is.
    #[default]
    Amount,
    /// Weight the amount by the number of orders at the level.
    AmountTimesCount,
}

impl DepthWeight {
    /// Depth contributed by one level under this weighting.
    pub fn of(&self, level: &AskLevel) -> Decimal {
        match self {
            DepthWeight::Amount => level.amount,
            DepthWeight::AmountTimesCount => level.amount * Decimal::from(level.count),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn depth_weight_variants() {
        let level = AskLevel::new(dec!(0.0004), 30, 3, dec!(100));
        assert_eq!(DepthWeight::Amount.of(&level), dec!(100));
        assert_eq!(DepthWeight::AmountTimesCount.of(&level), dec!(300));
    }
}
