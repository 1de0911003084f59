//! Pure reconciliation planning: which offers to cancel, how to split the
//! balance.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::exchange::types::Offer;
use crate::policy::{CancelMatch, RemainderMode};

/// The single logical position the book is converged toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfferTarget {
    /// Daily fractional rate.
    pub rate: Decimal,
    /// Loan period in days.
    pub period: u32,
}

/// Offers that do not match the target and must be canceled.
pub fn offers_to_cancel<'a>(
    offers: &'a [Offer],
    target: &OfferTarget,
    matching: CancelMatch,
) -> Vec<&'a Offer> {
    offers
        .iter()
        .filter(|o| o.is_active())
        .filter(|o| match matching {
            CancelMatch::RateOnly => o.rate != target.rate,
            CancelMatch::RateAndPeriod => o.rate != target.rate || o.period != target.period,
        })
        .collect()
}

/// Split a balance into offer-sized chunks.
///
/// `⌊total/max_chunk⌋` full chunks plus a remainder, which either becomes
/// its own chunk or is folded into the last full one. Chunks always sum to
/// `total`; under `SeparateOffer` each chunk is at most `max_chunk` and at
/// most one is smaller.
pub fn split_into_chunks(
    total: Decimal,
    max_chunk: Decimal,
    mode: RemainderMode,
) -> Vec<Decimal> {
    if total <= Decimal::ZERO || max_chunk <= Decimal::ZERO {
        return Vec::new();
    }

    let full = (total / max_chunk).floor().to_u64().unwrap_or(0);
    let rest = total - max_chunk * Decimal::from(full);

    let mut chunks = vec![max_chunk; full as usize];
    if rest > Decimal::ZERO {
        match mode {
            RemainderMode::SeparateOffer => chunks.push(rest),
            RemainderMode::FoldIntoLast => match chunks.last_mut() {
                Some(last) => *last += rest,
                None => chunks.push(rest),
            },
        }
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::types::{OfferStatus, OfferType};
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn offer(id: u64, rate: Decimal, period: u32) -> Offer {
        Offer {
            id,
            symbol: "fUSD".to_string(),
            amount: dec!(300),
            rate,
            period,
            offer_type: OfferType::Limit,
            status: OfferStatus::Active,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    #[test]
    fn cancels_exactly_the_mismatched_offer() {
        let offers = vec![offer(1, dec!(0.0005), 30), offer(2, dec!(0.0004), 7)];
        let target = OfferTarget { rate: dec!(0.0005), period: 30 };

        let to_cancel = offers_to_cancel(&offers, &target, CancelMatch::RateAndPeriod);

        assert_eq!(to_cancel.len(), 1);
        assert_eq!(to_cancel[0].id, 2);
    }

    #[test]
    fn rate_only_matching_ignores_period() {
        let offers = vec![offer(1, dec!(0.0005), 30), offer(2, dec!(0.0005), 7)];
        let target = OfferTarget { rate: dec!(0.0005), period: 30 };

        assert!(offers_to_cancel(&offers, &target, CancelMatch::RateOnly).is_empty());
        assert_eq!(
            offers_to_cancel(&offers, &target, CancelMatch::RateAndPeriod).len(),
            1
        );
    }

    #[test]
    fn converged_book_cancels_nothing() {
        let offers = vec![offer(1, dec!(0.0005), 30), offer(2, dec!(0.0005), 30)];
        let target = OfferTarget { rate: dec!(0.0005), period: 30 };

        assert!(offers_to_cancel(&offers, &target, CancelMatch::RateAndPeriod).is_empty());
    }

    #[test]
    fn split_produces_full_chunks_plus_remainder() {
        let chunks = split_into_chunks(dec!(650), dec!(300), RemainderMode::SeparateOffer);
        assert_eq!(chunks, vec![dec!(300), dec!(300), dec!(50)]);
    }

    #[test]
    fn split_chunks_sum_to_total_with_at_most_one_short() {
        for total in [dec!(0), dec!(50), dec!(300), dec!(650), dec!(899.99), dec!(1200)] {
            let chunks = split_into_chunks(total, dec!(300), RemainderMode::SeparateOffer);

            let sum: Decimal = chunks.iter().sum();
            assert_eq!(sum, total.max(Decimal::ZERO));
            assert!(chunks.iter().all(|c| *c <= dec!(300)));
            assert!(chunks.iter().filter(|c| **c < dec!(300)).count() <= 1);
        }
    }

    #[test]
    fn split_folds_remainder_into_last_chunk() {
        let chunks = split_into_chunks(dec!(650), dec!(300), RemainderMode::FoldIntoLast);
        assert_eq!(chunks, vec![dec!(300), dec!(350)]);

        let sum: Decimal = chunks.iter().sum();
        assert_eq!(sum, dec!(650));
    }

    #[test]
    fn split_of_sub_chunk_total_is_one_chunk_either_way() {
        assert_eq!(
            split_into_chunks(dec!(120), dec!(300), RemainderMode::SeparateOffer),
            vec![dec!(120)]
        );
        assert_eq!(
            split_into_chunks(dec!(120), dec!(300), RemainderMode::FoldIntoLast),
            vec![dec!(120)]
        );
    }

    #[test]
    fn split_of_nothing_is_empty() {
        assert!(split_into_chunks(dec!(0), dec!(300), RemainderMode::SeparateOffer).is_empty());
        assert!(split_into_chunks(dec!(-5), dec!(300), RemainderMode::SeparateOffer).is_empty());
    }
}
