//! Reconciliation execution against the exchange ports.

use std::collections::HashSet;

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use super::plan::{offers_to_cancel, split_into_chunks, OfferTarget};
use crate::error::ExchangeError;
use crate::exchange::ports::{funding_available, ExchangeReadPort, ExchangeWritePort};
use crate::exchange::types::{Offer, OfferRequest, SubmitOutcome};
use crate::metrics;
use crate::policy::CurrencyPolicy;

/// What one reconciliation pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Offers canceled (mismatches plus the absorption cancel).
    pub canceled: u32,
    /// Offers accepted by the exchange.
    pub submitted: u32,
    /// Chunks skipped for being below the minimum offer size.
    pub skipped_below_min: u32,
    /// Offers the exchange rejected with a recoverable status.
    pub rejected: u32,
    /// Whether a stranded remainder was merged into an existing offer.
    pub absorbed: bool,
}

impl ReconcileSummary {
    /// Whether the pass performed no remote mutations.
    pub fn is_noop(&self) -> bool {
        self.canceled == 0 && self.submitted == 0
    }
}

/// Converges the active offers toward one logical position at the target.
pub struct Reconciler<'a> {
    read: &'a dyn ExchangeReadPort,
    write: &'a dyn ExchangeWritePort,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over the two exchange ports.
    pub fn new(read: &'a dyn ExchangeReadPort, write: &'a dyn ExchangeWritePort) -> Self {
        Self { read, write }
    }

    /// Run one cancel / split / absorb pass.
    ///
    /// `active_offers` is the offer list fetched at the start of the tick;
    /// the balance is re-read after each phase because cancels and submits
    /// move it.
    #[instrument(skip(self, policy, target, active_offers), fields(currency = %policy.currency, rate = %target.rate, period = target.period))]
    pub async fn converge(
        &self,
        policy: &CurrencyPolicy,
        target: &OfferTarget,
        active_offers: &[Offer],
    ) -> Result<ReconcileSummary, ExchangeError> {
        let symbol = policy.currency.symbol();
        let mut summary = ReconcileSummary::default();

        // cancel phase
        let to_cancel = offers_to_cancel(active_offers, target, policy.cancel_match);
        debug!(count = to_cancel.len(), "offers to cancel");
        for offer in &to_cancel {
            self.write.cancel_offer(offer.id).await?;
            metrics::inc_offers_canceled();
            summary.canceled += 1;
        }

        let canceled_ids: HashSet<u64> = to_cancel.iter().map(|o| o.id).collect();
        let surviving: Vec<&Offer> = active_offers
            .iter()
            .filter(|o| !canceled_ids.contains(&o.id))
            .collect();

        // split phase
        let available = funding_available(self.read, policy.currency).await?;
        info!(%available, "balance available to offer");

        for chunk in split_into_chunks(available, policy.max_offer_amount, policy.remainder) {
            if chunk < policy.min_offer_amount {
                warn!(
                    %chunk,
                    minimum = %policy.min_offer_amount,
                    "skipping chunk below minimum offer size"
                );
                metrics::inc_chunks_skipped();
                summary.skipped_below_min += 1;
                continue;
            }
            self.submit(&symbol, chunk, target, &mut summary).await?;
        }

        // remainder absorption: merge whatever is still unlendable into the
        // first surviving offer instead of leaving it stranded
        let leftover = funding_available(self.read, policy.currency).await?;
        if leftover > Decimal::ZERO && !surviving.is_empty() {
            let first = surviving[0];
            debug!(offer_id = first.id, %leftover, "absorbing leftover into existing offer");

            self.write.cancel_offer(first.id).await?;
            metrics::inc_offers_canceled();
            summary.canceled += 1;

            let combined = funding_available(self.read, policy.currency).await?;
            if combined > Decimal::ZERO {
                self.submit(&symbol, combined, target, &mut summary).await?;
                summary.absorbed = true;
            }
        }

        Ok(summary)
    }

    async fn submit(
        &self,
        symbol: &str,
        amount: Decimal,
        target: &OfferTarget,
        summary: &mut ReconcileSummary,
    ) -> Result<(), ExchangeError> {
        let request = OfferRequest::limit(symbol, amount, target.rate, target.period);

        match self.write.submit_offer(&request).await? {
            SubmitOutcome::Accepted => {
                metrics::inc_offers_submitted();
                summary.submitted += 1;
            }
            SubmitOutcome::Rejected { reason } => {
                warn!(%amount, reason, "offer rejected, skipping");
                metrics::inc_offer_rejections();
                summary.rejected += 1;
            }
        }

        Ok(())
    }
}
