//! Port traits the controller consumes.
//!
//! The live [`BitfinexClient`](super::client::BitfinexClient) implements
//! both; tests use [`MockExchange`](super::mock::MockExchange) and dry runs
//! swap the write side for [`DryRunWritePort`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

use super::types::{
    Currency, FundingStat, FundingTicker, Offer, OfferRequest, Precision, SubmitOutcome, Wallet,
    WalletKind, WalletSnapshot,
};
use crate::error::ExchangeError;
use crate::orderbook::AskLevel;

/// Read-only view of the exchange.
#[async_trait]
pub trait ExchangeReadPort: Send + Sync {
    /// All wallets of the authenticated account.
    async fn wallets(&self) -> Result<Vec<Wallet>, ExchangeError>;

    /// Active funding offers for a symbol.
    async fn active_offers(&self, symbol: &str) -> Result<Vec<Offer>, ExchangeError>;

    /// Funding ticker (FRR and top of book) for a symbol.
    async fn funding_ticker(&self, symbol: &str) -> Result<FundingTicker, ExchangeError>;

    /// Ask side of the funding book, ordered by ascending rate.
    async fn funding_book(
        &self,
        symbol: &str,
        precision: Precision,
    ) -> Result<Vec<AskLevel>, ExchangeError>;

    /// Historical funding statistics, most recent first.
    async fn funding_stats(&self, symbol: &str) -> Result<Vec<FundingStat>, ExchangeError>;
}

/// Mutating side of the exchange.
#[async_trait]
pub trait ExchangeWritePort: Send + Sync {
    /// Submit a new funding offer.
    ///
    /// The outcome reports the exchange's accept/reject verdict; transport
    /// failures and non-recoverable statuses are errors.
    async fn submit_offer(&self, request: &OfferRequest) -> Result<SubmitOutcome, ExchangeError>;

    /// Cancel an offer by id.
    async fn cancel_offer(&self, id: u64) -> Result<(), ExchangeError>;
}

/// Funding-wallet snapshot for one currency; absent wallets read as zero.
pub async fn wallet_snapshot(
    read: &dyn ExchangeReadPort,
    currency: Currency,
) -> Result<WalletSnapshot, ExchangeError> {
    let wallets = read.wallets().await?;
    let funding = wallets
        .into_iter()
        .find(|w| w.kind == WalletKind::Funding && w.currency == currency.to_string());

    Ok(match funding {
        Some(w) => WalletSnapshot {
            currency,
            balance_total: w.balance,
            balance_available: w.balance_available,
        },
        None => WalletSnapshot {
            currency,
            balance_total: Decimal::ZERO,
            balance_available: Decimal::ZERO,
        },
    })
}

/// Balance currently available to place offers for a currency.
pub async fn funding_available(
    read: &dyn ExchangeReadPort,
    currency: Currency,
) -> Result<Decimal, ExchangeError> {
    Ok(wallet_snapshot(read, currency).await?.balance_available)
}

/// Write port that only logs what it would do.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunWritePort;

#[async_trait]
impl ExchangeWritePort for DryRunWritePort {
    async fn submit_offer(&self, request: &OfferRequest) -> Result<SubmitOutcome, ExchangeError> {
        info!(
            symbol = %request.symbol,
            amount = %request.amount,
            rate = %request.rate,
            period = request.period,
            "dry-run: would submit funding offer"
        );
        Ok(SubmitOutcome::Accepted)
    }

    async fn cancel_offer(&self, id: u64) -> Result<(), ExchangeError> {
        info!(offer_id = id, "dry-run: would cancel funding offer");
        Ok(())
    }
}
