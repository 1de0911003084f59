//! Market signal reading: FRR from the ticker, BBR from the book.

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::error::ExchangeError;
use crate::exchange::ports::ExchangeReadPort;
use crate::exchange::types::Precision;
use crate::orderbook::book_backed_rate;
use crate::policy::{round_rate, CurrencyPolicy};

/// Live market signals for one funding symbol.
#[derive(Debug, Clone, Copy)]
pub struct MarketSignals {
    /// Flash return rate, daily fractional.
    pub frr: Decimal,
    /// Book-backed rate, absent when the ask ladder is empty.
    pub bbr: Option<Decimal>,
}

/// Read the signals the rate policy feeds on.
///
/// The FRR alone reacts slowly; the book walk estimates the rate actually
/// achievable for the configured liquidity depth, so the target tracks real
/// liquidity rather than a lagging index.
#[instrument(skip(exchange, policy), fields(symbol = %symbol))]
pub async fn read_signals(
    exchange: &dyn ExchangeReadPort,
    symbol: &str,
    policy: &CurrencyPolicy,
) -> Result<MarketSignals, ExchangeError> {
    let ticker = exchange.funding_ticker(symbol).await?;
    let asks = exchange.funding_book(symbol, Precision::P0).await?;

    let frr = round_rate(ticker.frr);
    let bbr = book_backed_rate(&asks, policy.min_cumulative_ask, policy.depth_weight)
        .map(round_rate);

    debug!(
        frr = %frr,
        bbr = ?bbr,
        ask_levels = asks.len(),
        "read market signals"
    );

    Ok(MarketSignals { frr, bbr })
}
