//! Idle-balance tracking: the persisted sample series and the sustained-idle
//! monitor.

pub mod monitor;
pub mod store;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub use monitor::{IdleBreak, IdleMonitor};
pub use store::{IdleSeriesStore, JsonFileStore, MemoryStore};

/// One observation of how much capital sat idle.
///
/// Never edited after creation; series are append-then-prune only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IdleSample {
    /// When the sample was taken.
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    /// Idle amount at that time.
    pub value: Decimal,
}

/// Append a sample and drop everything older than the retention window.
///
/// Series are kept ordered oldest first.
pub fn append_and_prune(
    mut series: Vec<IdleSample>,
    sample: IdleSample,
    ttl: Duration,
    now: OffsetDateTime,
) -> Vec<IdleSample> {
    series.push(sample);
    series.retain(|s| now - s.ts <= ttl);
    series
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    fn sample(ts: OffsetDateTime, value: Decimal) -> IdleSample {
        IdleSample { ts, value }
    }

    #[test]
    fn prune_drops_only_expired_samples() {
        let now = datetime!(2024-06-01 12:00 UTC);
        let ttl = Duration::days(90);

        let series = vec![
            sample(now - Duration::days(120), dec!(100)), // expired
            sample(now - Duration::days(90), dec!(200)),  // exactly at the boundary, kept
            sample(now - Duration::days(10), dec!(300)),
        ];

        let pruned = append_and_prune(series, sample(now, dec!(400)), ttl, now);

        assert_eq!(pruned.len(), 3);
        assert!(pruned.iter().all(|s| now - s.ts <= ttl));
        assert_eq!(pruned.last().unwrap().value, dec!(400));
    }

    #[test]
    fn append_keeps_oldest_first_ordering() {
        let now = datetime!(2024-06-01 12:00 UTC);
        let series = vec![sample(now - Duration::days(2), dec!(1))];

        let appended = append_and_prune(series, sample(now, dec!(2)), Duration::days(90), now);

        assert!(appended.windows(2).all(|w| w[0].ts <= w[1].ts));
    }

    #[test]
    fn sample_serializes_with_rfc3339_timestamp() {
        let s = sample(datetime!(2024-06-01 12:00 UTC), dec!(123.45));
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("2024-06-01T12:00:00Z"));

        let back: IdleSample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
