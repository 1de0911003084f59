//! Per-currency lending policy.
//!
//! Policy is configuration data, not code: a rate curve, a period ladder,
//! the idle-alert tunables and one named knob per behavior that diverged
//! over the strategy's history. Built-in tables exist for every supported
//! currency.

use once_cell::sync::Lazy;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashMap;
use time::Duration;

use crate::exchange::types::Currency;
use crate::orderbook::DepthWeight;

/// Decimal places a rate is truncated to before it is acted on.
pub const RATE_DECIMALS: u32 = 6;

/// Truncate a daily fractional rate to [`RATE_DECIMALS`] places.
///
/// Truncation rather than rounding, so a derived rate never lands above a
/// level actually present in the book.
pub fn round_rate(rate: Decimal) -> Decimal {
    rate.round_dp_with_strategy(RATE_DECIMALS, RoundingStrategy::ToZero)
}

/// Which offer fields must match the target for an offer to survive the
/// cancel phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CancelMatch {
    /// Cancel when the rate differs, ignoring the period.
    RateOnly,
    /// Cancel when either the rate or the period differs.
    #[default]
    RateAndPeriod,
}

/// What happens to the sub-chunk remainder of a balance split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemainderMode {
    /// The remainder becomes its own (short) offer.
    #[default]
    SeparateOffer,
    /// The remainder is folded into the last full chunk.
    FoldIntoLast,
}

/// How far the idle scan walks once an alert-worthy breakpoint is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlertScan {
    /// Stop at the nearest qualifying breakpoint.
    #[default]
    FirstBreak,
    /// Keep walking the streak and report the oldest qualifying breakpoint.
    DeepestBreak,
}

/// Target-rate curve: an offset below the market reference, floored.
#[derive(Debug, Clone, Copy)]
pub struct RateCurve {
    /// Offset applied to the market reference rate (usually negative, to
    /// undercut and stay lent).
    pub frr_offset: Decimal,
    /// Rate below which the policy refuses to lend.
    pub floor_rate: Decimal,
}

impl RateCurve {
    /// Derive the target rate from the FRR and the book-backed rate.
    ///
    /// The reference is the higher of the two signals: the book when it
    /// clears above the lagging index, the FRR when the book is shallow or
    /// empty.
    pub fn target(&self, frr: Decimal, bbr: Option<Decimal>) -> Decimal {
        let reference = match bbr {
            Some(b) => frr.max(b),
            None => frr,
        };
        round_rate((reference + self.frr_offset).max(self.floor_rate))
    }
}

/// One step of a period ladder.
#[derive(Debug, Clone, Copy)]
pub struct PeriodStep {
    /// Minimum target rate for this step to apply.
    pub min_rate: Decimal,
    /// Loan period in days.
    pub days: u32,
}

/// Maps a target rate to a loan period: better rates are locked for longer.
#[derive(Debug, Clone)]
pub struct PeriodLadder {
    /// Steps ordered by descending `min_rate`.
    pub steps: Vec<PeriodStep>,
    /// Period when no step applies.
    pub default_days: u32,
}

impl PeriodLadder {
    /// Loan period for a target rate.
    pub fn period_for(&self, rate: Decimal) -> u32 {
        self.steps
            .iter()
            .find(|s| rate >= s.min_rate)
            .map(|s| s.days)
            .unwrap_or(self.default_days)
    }
}

/// Sustained-idle alert tunables.
#[derive(Debug, Clone, Copy)]
pub struct IdleAlertPolicy {
    /// Idle amount below which the streak is considered broken.
    pub threshold_amount: Decimal,
    /// How long the amount must have been idle before alerting.
    pub duration: Duration,
}

/// Complete lending policy for one currency.
#[derive(Debug, Clone)]
pub struct CurrencyPolicy {
    /// Currency this policy drives.
    pub currency: Currency,
    /// Target-rate curve.
    pub rate: RateCurve,
    /// Rate-to-period ladder.
    pub periods: PeriodLadder,
    /// Sustained-idle alerting.
    pub idle_alert: IdleAlertPolicy,
    /// Retention window for idle samples.
    pub series_ttl: Duration,
    /// Liquidity floor for the book-backed rate walk.
    pub min_cumulative_ask: Decimal,
    /// Depth weighting used by the walk.
    pub depth_weight: DepthWeight,
    /// Per-offer ceiling imposed by the exchange.
    pub max_offer_amount: Decimal,
    /// Minimum offer size; smaller chunks are skipped, not submitted.
    pub min_offer_amount: Decimal,
    /// Cancel-phase matching rule.
    pub cancel_match: CancelMatch,
    /// Split-phase remainder handling.
    pub remainder: RemainderMode,
    /// Idle-scan stopping rule.
    pub alert_scan: AlertScan,
}

static BUILTIN: Lazy<HashMap<Currency, CurrencyPolicy>> = Lazy::new(|| {
    let mut map = HashMap::new();

    map.insert(
        Currency::Usd,
        CurrencyPolicy {
            currency: Currency::Usd,
            rate: RateCurve {
                frr_offset: Decimal::new(-25, 6), // -0.000025
                floor_rate: Decimal::new(3, 4),   // 0.0003
            },
            periods: PeriodLadder {
                steps: vec![
                    PeriodStep { min_rate: Decimal::new(6, 4), days: 120 },
                    PeriodStep { min_rate: Decimal::new(5, 4), days: 30 },
                    PeriodStep { min_rate: Decimal::new(4, 4), days: 7 },
                ],
                default_days: 2,
            },
            idle_alert: IdleAlertPolicy {
                threshold_amount: Decimal::new(200, 0),
                duration: Duration::days(5),
            },
            ..base_policy(Currency::Usd)
        },
    );

    map.insert(
        Currency::Eur,
        CurrencyPolicy {
            currency: Currency::Eur,
            rate: RateCurve {
                frr_offset: Decimal::new(-15, 6), // -0.000015
                floor_rate: Decimal::new(4, 4),   // 0.0004
            },
            periods: PeriodLadder {
                steps: vec![
                    PeriodStep { min_rate: Decimal::new(7, 4), days: 120 },
                    PeriodStep { min_rate: Decimal::new(6, 4), days: 90 },
                    PeriodStep { min_rate: Decimal::new(5, 4), days: 30 },
                ],
                default_days: 2,
            },
            idle_alert: IdleAlertPolicy {
                threshold_amount: Decimal::new(200, 0),
                duration: Duration::hours(18),
            },
            ..base_policy(Currency::Eur)
        },
    );

    map.insert(
        Currency::Gbp,
        CurrencyPolicy {
            currency: Currency::Gbp,
            rate: RateCurve {
                frr_offset: Decimal::new(-15, 6),
                floor_rate: Decimal::new(4, 4),
            },
            periods: PeriodLadder {
                steps: vec![
                    PeriodStep { min_rate: Decimal::new(8, 4), days: 120 },
                    PeriodStep { min_rate: Decimal::new(7, 4), days: 60 },
                    PeriodStep { min_rate: Decimal::new(6, 4), days: 7 },
                ],
                default_days: 2,
            },
            idle_alert: IdleAlertPolicy {
                threshold_amount: Decimal::new(200, 0),
                duration: Duration::hours(12),
            },
            ..base_policy(Currency::Gbp)
        },
    );

    map
});

/// Shared defaults that the per-currency tables override.
fn base_policy(currency: Currency) -> CurrencyPolicy {
    CurrencyPolicy {
        currency,
        rate: RateCurve {
            frr_offset: Decimal::ZERO,
            floor_rate: Decimal::ZERO,
        },
        periods: PeriodLadder {
            steps: Vec::new(),
            default_days: 2,
        },
        idle_alert: IdleAlertPolicy {
            threshold_amount: Decimal::new(200, 0),
            duration: Duration::days(5),
        },
        series_ttl: Duration::days(90),
        min_cumulative_ask: Decimal::new(100_000, 0),
        depth_weight: DepthWeight::default(),
        max_offer_amount: Decimal::new(300, 0),
        min_offer_amount: Decimal::new(150, 0),
        cancel_match: CancelMatch::default(),
        remainder: RemainderMode::default(),
        alert_scan: AlertScan::default(),
    }
}

impl CurrencyPolicy {
    /// Built-in policy for a currency.
    pub fn builtin(currency: Currency) -> Self {
        BUILTIN
            .get(&currency)
            .cloned()
            .unwrap_or_else(|| base_policy(currency))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_rate_truncates() {
        assert_eq!(round_rate(dec!(0.00045678912)), dec!(0.000456));
        assert_eq!(round_rate(dec!(0.0004)), dec!(0.0004));
    }

    #[test]
    fn rate_curve_undercuts_reference() {
        let curve = CurrencyPolicy::builtin(Currency::Usd).rate;
        // frr well above the floor: offset applies
        assert_eq!(curve.target(dec!(0.0005), None), dec!(0.000475));
        // frr below the floor: floored
        assert_eq!(curve.target(dec!(0.0001), None), dec!(0.0003));
    }

    #[test]
    fn rate_curve_prefers_deeper_book() {
        let curve = CurrencyPolicy::builtin(Currency::Usd).rate;
        // book clears above the index
        assert_eq!(curve.target(dec!(0.0004), Some(dec!(0.0006))), dec!(0.000575));
        // shallow book below the index is ignored in favour of frr
        assert_eq!(curve.target(dec!(0.0006), Some(dec!(0.0004))), dec!(0.000575));
    }

    #[test]
    fn usd_period_ladder_matches_table() {
        let ladder = CurrencyPolicy::builtin(Currency::Usd).periods;
        assert_eq!(ladder.period_for(dec!(0.0007)), 120);
        assert_eq!(ladder.period_for(dec!(0.0006)), 120);
        assert_eq!(ladder.period_for(dec!(0.00055)), 30);
        assert_eq!(ladder.period_for(dec!(0.00045)), 7);
        assert_eq!(ladder.period_for(dec!(0.0003)), 2);
    }

    #[test]
    fn eur_and_gbp_ladders_match_tables() {
        let eur = CurrencyPolicy::builtin(Currency::Eur).periods;
        assert_eq!(eur.period_for(dec!(0.0007)), 120);
        assert_eq!(eur.period_for(dec!(0.00065)), 90);
        assert_eq!(eur.period_for(dec!(0.0005)), 30);
        assert_eq!(eur.period_for(dec!(0.0002)), 2);

        let gbp = CurrencyPolicy::builtin(Currency::Gbp).periods;
        assert_eq!(gbp.period_for(dec!(0.0008)), 120);
        assert_eq!(gbp.period_for(dec!(0.00075)), 60);
        assert_eq!(gbp.period_for(dec!(0.0006)), 7);
        assert_eq!(gbp.period_for(dec!(0.0005)), 2);
    }

    #[test]
    fn builtin_alert_windows_differ_per_currency() {
        assert_eq!(
            CurrencyPolicy::builtin(Currency::Usd).idle_alert.duration,
            Duration::days(5)
        );
        assert_eq!(
            CurrencyPolicy::builtin(Currency::Eur).idle_alert.duration,
            Duration::hours(18)
        );
        assert_eq!(
            CurrencyPolicy::builtin(Currency::Gbp).idle_alert.duration,
            Duration::hours(12)
        );
    }
}
