//! Cumulative walk over the ask ladder.

use rust_decimal::Decimal;
use tracing::instrument;

use super::types::{AskLevel, DepthWeight};

/// Derive the book-backed rate by walking the ask ladder.
///
/// Levels must be ordered by ascending rate. Depth accumulates per level
/// under the given weighting; the first level whose cumulative depth reaches
/// `min_cumulative` defines the rate. If no level reaches the threshold the
/// deepest available level wins; an empty ladder yields `None`, meaning the
/// book carries no usable signal.
#[instrument(skip(asks), fields(levels = asks.len(), min_cumulative = %min_cumulative))]
pub fn book_backed_rate(
    asks: &[AskLevel],
    min_cumulative: Decimal,
    weight: DepthWeight,
) -> Option<Decimal> {
    let mut cumulative = Decimal::ZERO;

    for level in asks {
        cumulative += weight.of(level);
        if cumulative >= min_cumulative {
            return Some(level.rate);
        }
    }

    asks.last().map(|l| l.rate)
}

/// Total amount offered across the ladder.
pub fn total_ask_liquidity(asks: &[AskLevel]) -> Decimal {
    asks.iter().map(|l| l.amount).sum()
}

/// Cumulative amount offered at rates up to and including `max_rate`.
pub fn liquidity_up_to(asks: &[AskLevel], max_rate: Decimal) -> Decimal {
    asks.iter()
        .filter(|l| l.rate <= max_rate)
        .map(|l| l.amount)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ladder() -> Vec<AskLevel> {
        vec![
            AskLevel::new(dec!(0.0003), 2, 1, dec!(100000)),
            AskLevel::new(dec!(0.0004), 30, 2, dec!(200000)),
            AskLevel::new(dec!(0.0006), 120, 5, dec!(5000000)),
        ]
    }

    #[test]
    fn walk_stops_at_threshold_level() {
        // cumulative after level 1 = 1e5 (< 2.5e5), after level 2 = 3e5
        let bbr = book_backed_rate(&ladder(), dec!(250000), DepthWeight::Amount);
        assert_eq!(bbr, Some(dec!(0.0004)));
    }

    #[test]
    fn walk_falls_back_to_deepest_level() {
        let bbr = book_backed_rate(&ladder(), dec!(10000000), DepthWeight::Amount);
        assert_eq!(bbr, Some(dec!(0.0006)));
    }

    #[test]
    fn empty_ladder_yields_no_rate() {
        assert_eq!(book_backed_rate(&[], dec!(1), DepthWeight::Amount), None);
    }

    #[test]
    fn count_weighting_reaches_threshold_earlier() {
        // level 2 alone holds 2e5 * 2 = 4e5 under count weighting
        let bbr = book_backed_rate(&ladder(), dec!(400000), DepthWeight::AmountTimesCount);
        assert_eq!(bbr, Some(dec!(0.0004)));

        let bbr_plain = book_backed_rate(&ladder(), dec!(400000), DepthWeight::Amount);
        assert_eq!(bbr_plain, Some(dec!(0.0006)));
    }

    #[test]
    fn liquidity_helpers() {
        assert_eq!(total_ask_liquidity(&ladder()), dec!(5300000));
        assert_eq!(liquidity_up_to(&ladder(), dec!(0.0004)), dec!(300000));
    }
}
