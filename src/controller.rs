//! The per-tick funding position controller.
//!
//! Invocation-stateless: all cross-tick memory lives in the idle series and
//! in the exchange's own offer book. Currencies are processed strictly
//! sequentially to bound request pressure on the exchange API.

use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::{error, info, instrument};

use crate::alert::AlertSink;
use crate::error::{BotError, Result};
use crate::exchange::ports::{wallet_snapshot, ExchangeReadPort, ExchangeWritePort};
use crate::exchange::types::{Currency, Offer, WalletSnapshot};
use crate::idle::monitor::{IdleBreak, IdleMonitor};
use crate::idle::store::IdleSeriesStore;
use crate::metrics;
use crate::policy::CurrencyPolicy;
use crate::reconcile::{OfferTarget, ReconcileSummary, Reconciler};
use crate::signals::{read_signals, MarketSignals};

/// Outcome of one currency within a tick.
#[derive(Debug, Clone, Copy)]
pub struct CurrencyReport {
    /// Currency processed.
    pub currency: Currency,
    /// Idle balance recorded this tick.
    pub idle_amount: Decimal,
    /// Sustained-idle condition, if one fired.
    pub idle_break: Option<IdleBreak>,
    /// Market signals the target was derived from.
    pub signals: MarketSignals,
    /// Target position.
    pub target: OfferTarget,
    /// What reconciliation did.
    pub reconcile: ReconcileSummary,
}

/// A currency whose processing failed; the rest of the tick continued.
#[derive(Debug, Clone)]
pub struct CurrencyFailure {
    /// Currency that failed.
    pub currency: Currency,
    /// Failure description, as forwarded to the alert sink.
    pub error: String,
}

/// Result of one full tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Currencies processed successfully, in configuration order.
    pub completed: Vec<CurrencyReport>,
    /// Currencies that failed.
    pub failures: Vec<CurrencyFailure>,
}

impl TickReport {
    /// Whether every configured currency completed.
    pub fn all_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Offers submitted across the tick.
    pub fn offers_submitted(&self) -> u32 {
        self.completed.iter().map(|c| c.reconcile.submitted).sum()
    }

    /// Offers canceled across the tick.
    pub fn offers_canceled(&self) -> u32 {
        self.completed.iter().map(|c| c.reconcile.canceled).sum()
    }
}

/// Idle balance from a wallet snapshot and the active offers.
///
/// The lent portion is what the wallet holds beyond its offered and
/// available parts; idle is everything that is not lent.
pub fn idle_balance(snapshot: &WalletSnapshot, offers: &[Offer]) -> Decimal {
    let offered: Decimal = offers.iter().map(|o| o.amount).sum();
    let lended = snapshot.balance_total - offered - snapshot.balance_available;
    snapshot.balance_total - lended
}

/// Per-tick orchestrator over all configured currencies.
pub struct FundingController {
    read: Arc<dyn ExchangeReadPort>,
    write: Arc<dyn ExchangeWritePort>,
    store: Arc<dyn IdleSeriesStore>,
    sink: Arc<dyn AlertSink>,
    policies: Vec<CurrencyPolicy>,
}

impl FundingController {
    /// Create a controller over its collaborators.
    pub fn new(
        read: Arc<dyn ExchangeReadPort>,
        write: Arc<dyn ExchangeWritePort>,
        store: Arc<dyn IdleSeriesStore>,
        sink: Arc<dyn AlertSink>,
        policies: Vec<CurrencyPolicy>,
    ) -> Self {
        Self {
            read,
            write,
            store,
            sink,
            policies,
        }
    }

    /// Policies this controller runs.
    pub fn policies(&self) -> &[CurrencyPolicy] {
        &self.policies
    }

    /// Run one tick over all configured currencies.
    ///
    /// A failing currency is recorded and skipped; the remaining currencies
    /// still run. Failures are forwarded to the alert sink afterwards, and
    /// only a failure of that delivery itself errors the tick.
    pub async fn run_tick(&self) -> Result<TickReport> {
        let start = Instant::now();
        metrics::inc_ticks();

        let mut report = TickReport::default();

        for policy in &self.policies {
            let currency_start = Instant::now();

            match self.run_currency(policy).await {
                Ok(currency_report) => report.completed.push(currency_report),
                Err(e) => {
                    error!(currency = %policy.currency, error = %e, "currency processing failed");
                    metrics::inc_currency_failures(&policy.currency.to_string());
                    report.failures.push(CurrencyFailure {
                        currency: policy.currency,
                        error: e.to_string(),
                    });
                }
            }

            metrics::record_currency_latency(currency_start, &policy.currency.to_string());
        }

        for failure in &report.failures {
            self.sink
                .publish(&format!(
                    "unexpected failure processing {}: {}",
                    failure.currency, failure.error
                ))
                .await?;
        }

        metrics::record_tick_latency(start);
        Ok(report)
    }

    #[instrument(skip(self, policy), fields(currency = %policy.currency))]
    async fn run_currency(&self, policy: &CurrencyPolicy) -> Result<CurrencyReport> {
        let symbol = policy.currency.symbol();

        let snapshot = wallet_snapshot(self.read.as_ref(), policy.currency).await?;
        let offers: Vec<Offer> = self
            .read
            .active_offers(&symbol)
            .await?
            .into_iter()
            .filter(|o| o.is_active())
            .collect();

        let idle = idle_balance(&snapshot, &offers);
        if idle < Decimal::ZERO {
            return Err(BotError::NegativeIdleBalance {
                currency: policy.currency,
                idle,
            });
        }
        info!(%idle, offers = offers.len(), "idle amount");

        // persisted before reconciliation so a later failure cannot roll
        // back idle tracking
        let now = OffsetDateTime::now_utc();
        let idle_break = IdleMonitor::new(self.store.as_ref(), self.sink.as_ref())
            .record_and_check(policy, idle, now)
            .await?;

        let signals = read_signals(self.read.as_ref(), &symbol, policy).await?;
        let rate = policy.rate.target(signals.frr, signals.bbr);
        let target = OfferTarget {
            rate,
            period: policy.periods.period_for(rate),
        };
        info!(rate = %target.rate, period = target.period, "target position");

        let reconcile = Reconciler::new(self.read.as_ref(), self.write.as_ref())
            .converge(policy, &target, &offers)
            .await?;

        Ok(CurrencyReport {
            currency: policy.currency,
            idle_amount: idle,
            idle_break,
            signals,
            target,
            reconcile,
        })
    }
}
