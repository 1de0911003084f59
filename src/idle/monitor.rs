//! Sustained-idle detection over the sample series.

use rust_decimal::Decimal;
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

use super::store::IdleSeriesStore;
use super::{append_and_prune, IdleSample};
use crate::alert::AlertSink;
use crate::error::Result;
use crate::metrics;
use crate::policy::{AlertScan, CurrencyPolicy};

/// A detected sustained-idle condition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdleBreak {
    /// Smallest idle amount observed across the streak.
    pub lowest: Decimal,
    /// Timestamp of the qualifying breakpoint; the amount has been idle at
    /// least since then.
    pub since: OffsetDateTime,
}

/// Scan a series (ordered oldest first) for a sustained-idle condition.
///
/// Walking most-recent-first: any sample below the threshold is the most
/// recent point of non-idleness and ends the scan without an alert. Samples
/// at or above it extend the streak; the first one old enough is the
/// qualifying breakpoint. `DeepestBreak` keeps walking the streak and
/// reports the oldest qualifying breakpoint instead.
pub fn scan_for_break(
    series: &[IdleSample],
    threshold: Decimal,
    min_duration: Duration,
    scan: AlertScan,
    now: OffsetDateTime,
) -> Option<IdleBreak> {
    let mut lowest = Decimal::MAX;
    let mut hit = None;

    for sample in series.iter().rev() {
        if sample.value < threshold {
            break;
        }

        lowest = lowest.min(sample.value);
        if now - sample.ts >= min_duration {
            hit = Some(IdleBreak {
                lowest,
                since: sample.ts,
            });
            if scan == AlertScan::FirstBreak {
                return hit;
            }
        }
    }

    hit
}

/// Render a duration as an operator-friendly span ("6 days, 3 hours").
pub fn format_span(span: Duration) -> String {
    let days = span.whole_days();
    let hours = (span - Duration::days(days)).whole_hours();
    let minutes = (span - Duration::days(days) - Duration::hours(hours)).whole_minutes();

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days} day{}", plural(days)));
    }
    if hours > 0 {
        parts.push(format!("{hours} hour{}", plural(hours)));
    }
    if minutes > 0 {
        parts.push(format!("{minutes} minute{}", plural(minutes)));
    }

    if parts.is_empty() {
        "less than a minute".to_string()
    } else {
        parts.join(", ")
    }
}

fn plural(n: i64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Records idle samples and raises sustained-idle alerts.
pub struct IdleMonitor<'a> {
    store: &'a dyn IdleSeriesStore,
    sink: &'a dyn AlertSink,
}

impl<'a> IdleMonitor<'a> {
    /// Create a monitor over a store and a sink.
    pub fn new(store: &'a dyn IdleSeriesStore, sink: &'a dyn AlertSink) -> Self {
        Self { store, sink }
    }

    /// Append the current idle amount, persist the pruned series, then scan
    /// for an alert condition.
    ///
    /// The persist happens before the scan so that a later failure in the
    /// tick cannot roll back idle tracking.
    pub async fn record_and_check(
        &self,
        policy: &CurrencyPolicy,
        idle_amount: Decimal,
        now: OffsetDateTime,
    ) -> Result<Option<IdleBreak>> {
        let currency = policy.currency;

        let previous = self.store.read(currency).await?;
        let series = append_and_prune(
            previous,
            IdleSample {
                ts: now,
                value: idle_amount,
            },
            policy.series_ttl,
            now,
        );
        self.store.write(currency, &series).await?;
        debug!(%currency, %idle_amount, samples = series.len(), "recorded idle sample");

        let hit = scan_for_break(
            &series,
            policy.idle_alert.threshold_amount,
            policy.idle_alert.duration,
            policy.alert_scan,
            now,
        );

        if let Some(idle_break) = &hit {
            let message = format!(
                "at least {:.2} {} has been idle during the last {}",
                idle_break.lowest,
                currency,
                format_span(now - idle_break.since)
            );
            warn!(%currency, lowest = %idle_break.lowest, "sustained idle balance");
            self.sink.publish(&message).await?;
            metrics::inc_idle_alerts();
        }

        Ok(hit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::MemorySink;
    use crate::exchange::types::Currency;
    use crate::idle::store::MemoryStore;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-06-10 12:00 UTC);

    fn sample(days_ago: i64, value: Decimal) -> IdleSample {
        IdleSample {
            ts: NOW - Duration::days(days_ago),
            value,
        }
    }

    #[test]
    fn recent_activity_suppresses_alert() {
        // day-1 sample below threshold ends the scan immediately
        let series = vec![sample(10, dec!(500)), sample(6, dec!(300)), sample(1, dec!(50))];

        let hit = scan_for_break(&series, dec!(200), Duration::days(5), AlertScan::FirstBreak, NOW);
        assert_eq!(hit, None);
    }

    #[test]
    fn old_enough_streak_fires_with_lowest_amount() {
        let series = vec![sample(10, dec!(500)), sample(6, dec!(300))];

        let hit = scan_for_break(&series, dec!(200), Duration::days(5), AlertScan::FirstBreak, NOW)
            .unwrap();

        assert_eq!(hit.lowest, dec!(300));
        assert_eq!(hit.since, NOW - Duration::days(6));
    }

    #[test]
    fn deepest_break_reports_oldest_breakpoint() {
        let series = vec![sample(10, dec!(500)), sample(6, dec!(300))];

        let hit = scan_for_break(&series, dec!(200), Duration::days(5), AlertScan::DeepestBreak, NOW)
            .unwrap();

        assert_eq!(hit.lowest, dec!(300));
        assert_eq!(hit.since, NOW - Duration::days(10));
    }

    #[test]
    fn empty_or_too_recent_series_is_not_an_error() {
        assert_eq!(
            scan_for_break(&[], dec!(200), Duration::days(5), AlertScan::FirstBreak, NOW),
            None
        );

        let recent = vec![sample(1, dec!(500)), sample(0, dec!(400))];
        assert_eq!(
            scan_for_break(&recent, dec!(200), Duration::days(5), AlertScan::FirstBreak, NOW),
            None
        );
    }

    #[test]
    fn samples_more_idle_than_threshold_do_not_break_the_streak() {
        // lower values still >= threshold extend the streak and drag `lowest` down
        let series = vec![sample(8, dec!(900)), sample(4, dec!(210)), sample(2, dec!(600))];

        let hit = scan_for_break(&series, dec!(200), Duration::days(3), AlertScan::FirstBreak, NOW)
            .unwrap();

        assert_eq!(hit.lowest, dec!(210));
        assert_eq!(hit.since, NOW - Duration::days(4));
    }

    #[test]
    fn format_span_reads_naturally() {
        assert_eq!(format_span(Duration::days(6) + Duration::hours(3)), "6 days, 3 hours");
        assert_eq!(format_span(Duration::hours(1)), "1 hour");
        assert_eq!(format_span(Duration::seconds(30)), "less than a minute");
    }

    #[tokio::test]
    async fn monitor_persists_then_alerts() {
        let store = MemoryStore::new();
        let sink = MemorySink::new();
        store
            .seed(
                Currency::Usd,
                vec![sample(10, dec!(500)), sample(6, dec!(300))],
            )
            .await;

        let policy = CurrencyPolicy::builtin(Currency::Usd);
        let monitor = IdleMonitor::new(&store, &sink);

        let hit = monitor
            .record_and_check(&policy, dec!(250), NOW)
            .await
            .unwrap();

        assert!(hit.is_some());
        assert_eq!(store.read(Currency::Usd).await.unwrap().len(), 3);

        let messages = sink.published().await;
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("250.00 USD has been idle"));
        assert!(messages[0].contains("6 days"));
    }

    #[tokio::test]
    async fn monitor_stays_quiet_when_current_sample_breaks_streak() {
        let store = MemoryStore::new();
        let sink = MemorySink::new();
        store
            .seed(
                Currency::Usd,
                vec![sample(10, dec!(500)), sample(6, dec!(300))],
            )
            .await;

        let policy = CurrencyPolicy::builtin(Currency::Usd);
        let monitor = IdleMonitor::new(&store, &sink);

        let hit = monitor
            .record_and_check(&policy, dec!(50), NOW)
            .await
            .unwrap();

        assert_eq!(hit, None);
        assert!(sink.published().await.is_empty());
    }
}
