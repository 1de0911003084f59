//! Mock exchange for unit and integration testing.
//!
//! Keeps a tiny in-memory model of wallets and offers so reconciliation can
//! be exercised end-to-end without network access: submits consume available
//! balance, cancels return it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;

use super::ports::{ExchangeReadPort, ExchangeWritePort};
use super::types::{
    Currency, FundingStat, FundingTicker, Offer, OfferRequest, OfferStatus, OfferType, Precision,
    SubmitOutcome, Wallet, WalletKind,
};
use crate::error::ExchangeError;
use crate::orderbook::AskLevel;

/// Failure switches for exercising error paths.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Fail every wallet read.
    pub fail_wallets: bool,
    /// Fail offer reads for this symbol only.
    pub fail_offers_for: Option<String>,
    /// Fail every ticker read.
    pub fail_ticker: bool,
    /// Reject submitted offers below this amount, like the real exchange.
    pub min_offer_amount: Option<Decimal>,
}

#[derive(Debug, Default)]
struct State {
    behavior: MockBehavior,
    wallets: Vec<Wallet>,
    offers: HashMap<String, Vec<Offer>>,
    tickers: HashMap<String, FundingTicker>,
    books: HashMap<String, Vec<AskLevel>>,
    stats: HashMap<String, Vec<FundingStat>>,
    next_id: u64,
    submitted: u32,
    canceled: u32,
}

/// Mock exchange implementing both ports.
#[derive(Debug, Clone, Default)]
pub struct MockExchange {
    state: Arc<Mutex<State>>,
}

impl MockExchange {
    /// Create an empty mock exchange.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the failure behavior.
    pub fn set_behavior(&self, behavior: MockBehavior) {
        self.state.lock().unwrap().behavior = behavior;
    }

    /// Set the funding wallet for a currency.
    pub fn set_funding_wallet(&self, currency: Currency, total: Decimal, available: Decimal) {
        let mut state = self.state.lock().unwrap();
        state
            .wallets
            .retain(|w| !(w.kind == WalletKind::Funding && w.currency == currency.to_string()));
        state.wallets.push(Wallet {
            kind: WalletKind::Funding,
            currency: currency.to_string(),
            balance: total,
            balance_available: available,
        });
    }

    /// Set the funding ticker FRR for a symbol.
    pub fn set_frr(&self, symbol: &str, frr: Decimal) {
        self.state.lock().unwrap().tickers.insert(
            symbol.to_string(),
            FundingTicker {
                frr,
                bid: frr,
                bid_period: 2,
                ask: frr,
                ask_period: 2,
                frr_amount_available: Decimal::ZERO,
            },
        );
    }

    /// Set the ask ladder for a symbol.
    pub fn set_book(&self, symbol: &str, asks: Vec<AskLevel>) {
        self.state
            .lock()
            .unwrap()
            .books
            .insert(symbol.to_string(), asks);
    }

    /// Set funding statistics for a symbol.
    pub fn set_stats(&self, symbol: &str, stats: Vec<FundingStat>) {
        self.state
            .lock()
            .unwrap()
            .stats
            .insert(symbol.to_string(), stats);
    }

    /// Seed an active offer, returning its id.
    pub fn add_active_offer(
        &self,
        symbol: &str,
        amount: Decimal,
        rate: Decimal,
        period: u32,
    ) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = state.next_id;
        let now = OffsetDateTime::now_utc();
        state.offers.entry(symbol.to_string()).or_default().push(Offer {
            id,
            symbol: symbol.to_string(),
            amount,
            rate,
            period,
            offer_type: OfferType::Limit,
            status: OfferStatus::Active,
            created_at: now,
            updated_at: now,
        });
        id
    }

    /// Current offers for a symbol.
    pub fn offers_for(&self, symbol: &str) -> Vec<Offer> {
        self.state
            .lock()
            .unwrap()
            .offers
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    /// Current available funding balance for a currency.
    pub fn available_balance(&self, currency: Currency) -> Decimal {
        self.state
            .lock()
            .unwrap()
            .wallets
            .iter()
            .find(|w| w.kind == WalletKind::Funding && w.currency == currency.to_string())
            .map(|w| w.balance_available)
            .unwrap_or(Decimal::ZERO)
    }

    /// Total offers submitted through the write port.
    pub fn submitted_count(&self) -> u32 {
        self.state.lock().unwrap().submitted
    }

    /// Total offers canceled through the write port.
    pub fn canceled_count(&self) -> u32 {
        self.state.lock().unwrap().canceled
    }

    fn credit_available(state: &mut State, symbol: &str, amount: Decimal) {
        if let Some(currency) = Currency::from_symbol(symbol) {
            if let Some(wallet) = state
                .wallets
                .iter_mut()
                .find(|w| w.kind == WalletKind::Funding && w.currency == currency.to_string())
            {
                wallet.balance_available += amount;
            }
        }
    }
}

#[async_trait]
impl ExchangeReadPort for MockExchange {
    async fn wallets(&self) -> Result<Vec<Wallet>, ExchangeError> {
        let state = self.state.lock().unwrap();
        if state.behavior.fail_wallets {
            return Err(ExchangeError::Action {
                action: "read wallets".to_string(),
                status: "mock wallet failure".to_string(),
            });
        }
        Ok(state.wallets.clone())
    }

    async fn active_offers(&self, symbol: &str) -> Result<Vec<Offer>, ExchangeError> {
        let state = self.state.lock().unwrap();
        if state.behavior.fail_offers_for.as_deref() == Some(symbol) {
            return Err(ExchangeError::Action {
                action: format!("read offers for {symbol}"),
                status: "mock offer failure".to_string(),
            });
        }
        Ok(state.offers.get(symbol).cloned().unwrap_or_default())
    }

    async fn funding_ticker(&self, symbol: &str) -> Result<FundingTicker, ExchangeError> {
        let state = self.state.lock().unwrap();
        if state.behavior.fail_ticker {
            return Err(ExchangeError::Action {
                action: format!("read ticker for {symbol}"),
                status: "mock ticker failure".to_string(),
            });
        }
        // unknown symbols read as a dead market
        Ok(state.tickers.get(symbol).copied().unwrap_or(FundingTicker {
            frr: Decimal::ZERO,
            bid: Decimal::ZERO,
            bid_period: 2,
            ask: Decimal::ZERO,
            ask_period: 2,
            frr_amount_available: Decimal::ZERO,
        }))
    }

    async fn funding_book(
        &self,
        symbol: &str,
        _precision: Precision,
    ) -> Result<Vec<AskLevel>, ExchangeError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .books
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }

    async fn funding_stats(&self, symbol: &str) -> Result<Vec<FundingStat>, ExchangeError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .stats
            .get(symbol)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExchangeWritePort for MockExchange {
    async fn submit_offer(&self, request: &OfferRequest) -> Result<SubmitOutcome, ExchangeError> {
        let mut state = self.state.lock().unwrap();

        if let Some(min) = state.behavior.min_offer_amount {
            if request.amount < min {
                return Ok(SubmitOutcome::Rejected {
                    reason: format!("Invalid offer: incorrect amount, minimum is {min}"),
                });
            }
        }

        state.next_id += 1;
        let id = state.next_id;
        let now = OffsetDateTime::now_utc();
        let offer = Offer {
            id,
            symbol: request.symbol.clone(),
            amount: request.amount,
            rate: request.rate,
            period: request.period,
            offer_type: request.offer_type,
            status: OfferStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state
            .offers
            .entry(request.symbol.clone())
            .or_default()
            .push(offer);
        Self::credit_available(&mut state, &request.symbol, -request.amount);
        state.submitted += 1;

        Ok(SubmitOutcome::Accepted)
    }

    async fn cancel_offer(&self, id: u64) -> Result<(), ExchangeError> {
        let mut state = self.state.lock().unwrap();

        let mut found: Option<(String, Decimal)> = None;
        for (symbol, offers) in state.offers.iter_mut() {
            if let Some(idx) = offers.iter().position(|o| o.id == id) {
                let offer = offers.remove(idx);
                found = Some((symbol.clone(), offer.amount));
                break;
            }
        }

        match found {
            Some((symbol, amount)) => {
                Self::credit_available(&mut state, &symbol, amount);
                state.canceled += 1;
                Ok(())
            }
            None => Err(ExchangeError::Action {
                action: format!("cancel funding offer {id}"),
                status: "ERROR".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn submit_consumes_available_balance() {
        let mock = MockExchange::new();
        mock.set_funding_wallet(Currency::Usd, dec!(1000), dec!(1000));

        let request = OfferRequest::limit("fUSD", dec!(300), dec!(0.0004), 7);
        let outcome = mock.submit_offer(&request).await.unwrap();

        assert_eq!(outcome, SubmitOutcome::Accepted);
        assert_eq!(mock.available_balance(Currency::Usd), dec!(700));
        assert_eq!(mock.offers_for("fUSD").len(), 1);
    }

    #[tokio::test]
    async fn cancel_returns_balance() {
        let mock = MockExchange::new();
        mock.set_funding_wallet(Currency::Usd, dec!(1000), dec!(700));
        let id = mock.add_active_offer("fUSD", dec!(300), dec!(0.0004), 7);

        mock.cancel_offer(id).await.unwrap();

        assert_eq!(mock.available_balance(Currency::Usd), dec!(1000));
        assert!(mock.offers_for("fUSD").is_empty());
    }

    #[tokio::test]
    async fn cancel_of_unknown_offer_fails() {
        let mock = MockExchange::new();
        let result = mock.cancel_offer(99).await;
        assert!(matches!(result, Err(ExchangeError::Action { .. })));
    }

    #[tokio::test]
    async fn minimum_amount_rejection() {
        let mock = MockExchange::new();
        mock.set_behavior(MockBehavior {
            min_offer_amount: Some(dec!(150)),
            ..Default::default()
        });

        let request = OfferRequest::limit("fUSD", dec!(50), dec!(0.0004), 7);
        let outcome = mock.submit_offer(&request).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn failure_flags_trip_reads() {
        let mock = MockExchange::new();
        mock.set_behavior(MockBehavior {
            fail_wallets: true,
            ..Default::default()
        });
        assert!(mock.wallets().await.is_err());
    }
}
