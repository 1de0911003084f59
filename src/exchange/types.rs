//! Exchange-side types for the Bitfinex margin-funding market.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

/// Funding currency the bot can manage.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US dollar.
    #[strum(to_string = "USD", serialize = "usd")]
    #[default]
    Usd,
    /// Euro.
    #[strum(to_string = "EUR", serialize = "eur")]
    Eur,
    /// Pound sterling.
    #[strum(to_string = "GBP", serialize = "gbp")]
    Gbp,
}

impl Currency {
    /// Funding symbol on the exchange (e.g. `fUSD`).
    pub fn symbol(&self) -> String {
        format!("f{}", self)
    }

    /// Parse a funding symbol (`fUSD`) back into a currency.
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        symbol.strip_prefix('f')?.parse().ok()
    }
}

/// Wallet kind as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum WalletKind {
    /// Spot exchange wallet.
    #[strum(serialize = "exchange")]
    Exchange,
    /// Margin trading wallet.
    #[strum(serialize = "margin")]
    Margin,
    /// Margin-funding wallet.
    #[strum(serialize = "funding")]
    Funding,
}

/// One wallet row from the exchange.
#[derive(Debug, Clone)]
pub struct Wallet {
    /// Wallet kind.
    pub kind: WalletKind,
    /// Currency code as reported (e.g. `USD`).
    pub currency: String,
    /// Total balance.
    pub balance: Decimal,
    /// Balance not locked in offers or loans.
    pub balance_available: Decimal,
}

/// Funding-wallet view for one currency, read fresh each tick.
#[derive(Debug, Clone, Copy)]
pub struct WalletSnapshot {
    /// Currency this snapshot describes.
    pub currency: Currency,
    /// Total funding-wallet balance.
    pub balance_total: Decimal,
    /// Balance available to place new offers.
    pub balance_available: Decimal,
}

/// Funding offer status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
pub enum OfferStatus {
    /// Offer is live on the funding book.
    #[strum(serialize = "ACTIVE")]
    Active,
    /// Offer was fully taken.
    #[strum(serialize = "EXECUTED")]
    Executed,
    /// Offer was partially taken.
    #[strum(serialize = "PARTIALLY FILLED", serialize = "PARTIALLY_FILLED")]
    PartiallyFilled,
    /// Offer was canceled.
    #[strum(serialize = "CANCELED", serialize = "CANCELLED")]
    Canceled,
}

/// Funding offer type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, Default)]
pub enum OfferType {
    /// Plain limit offer at a fixed rate.
    #[default]
    #[strum(serialize = "LIMIT")]
    Limit,
    /// Variable FRR-delta offer.
    #[strum(serialize = "FRRDELTAVAR")]
    FrrDeltaVar,
    /// Fixed FRR-delta offer.
    #[strum(serialize = "FRRDELTAFIX")]
    FrrDeltaFix,
}

/// A funding offer as observed on the exchange.
///
/// Owned by the exchange; the bot only requests cancel/submit and never
/// mutates one of these directly.
#[derive(Debug, Clone)]
pub struct Offer {
    /// Exchange-assigned offer id.
    pub id: u64,
    /// Funding symbol (e.g. `fUSD`).
    pub symbol: String,
    /// Remaining (unlent) amount.
    pub amount: Decimal,
    /// Daily fractional rate.
    pub rate: Decimal,
    /// Loan period in days, within `[2, 120]`.
    pub period: u32,
    /// Offer type.
    pub offer_type: OfferType,
    /// Current status.
    pub status: OfferStatus,
    /// Creation time.
    pub created_at: OffsetDateTime,
    /// Last update time.
    pub updated_at: OffsetDateTime,
}

impl Offer {
    /// Whether the offer is still live on the book.
    pub fn is_active(&self) -> bool {
        matches!(self.status, OfferStatus::Active | OfferStatus::PartiallyFilled)
    }
}

/// Parameters for submitting a new funding offer.
#[derive(Debug, Clone)]
pub struct OfferRequest {
    /// Offer type.
    pub offer_type: OfferType,
    /// Funding symbol.
    pub symbol: String,
    /// Offer amount.
    pub amount: Decimal,
    /// Daily fractional rate.
    pub rate: Decimal,
    /// Loan period in days.
    pub period: u32,
}

impl OfferRequest {
    /// Create a limit offer request.
    pub fn limit(symbol: impl Into<String>, amount: Decimal, rate: Decimal, period: u32) -> Self {
        Self {
            offer_type: OfferType::Limit,
            symbol: symbol.into(),
            amount,
            rate,
            period,
        }
    }

    /// Validate offer parameters against exchange constraints.
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.is_empty() {
            return Err("symbol is required".to_string());
        }
        if self.amount <= Decimal::ZERO {
            return Err("amount must be positive".to_string());
        }
        if self.rate <= Decimal::ZERO {
            return Err("rate must be positive".to_string());
        }
        if !(2..=120).contains(&self.period) {
            return Err(format!("period {} outside [2, 120]", self.period));
        }
        Ok(())
    }
}

/// Exchange verdict on a submitted offer, distinct from transport failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Offer accepted onto the book.
    Accepted,
    /// Offer rejected by a recoverable domain rule (e.g. below minimum size).
    Rejected {
        /// Rejection reason from the exchange.
        reason: String,
    },
}

/// Funding ticker snapshot.
#[derive(Debug, Clone, Copy)]
pub struct FundingTicker {
    /// Flash return rate, daily fractional.
    pub frr: Decimal,
    /// Best bid rate.
    pub bid: Decimal,
    /// Best bid period in days.
    pub bid_period: u32,
    /// Best ask rate.
    pub ask: Decimal,
    /// Best ask period in days.
    pub ask_period: u32,
    /// Amount available at the FRR.
    pub frr_amount_available: Decimal,
}

/// One row of historical funding statistics.
#[derive(Debug, Clone, Copy)]
pub struct FundingStat {
    /// Sample timestamp.
    pub ts: OffsetDateTime,
    /// FRR scaled to a daily fractional rate.
    pub frr_daily: Decimal,
    /// Average loan period in days.
    pub avg_period: Decimal,
}

/// Order-book precision level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Default)]
pub enum Precision {
    /// Highest precision.
    #[default]
    #[strum(serialize = "P0")]
    P0,
    /// One aggregation step.
    #[strum(serialize = "P1")]
    P1,
    /// Two aggregation steps.
    #[strum(serialize = "P2")]
    P2,
    /// Three aggregation steps.
    #[strum(serialize = "P3")]
    P3,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::datetime;

    #[test]
    fn currency_symbol_roundtrip() {
        assert_eq!(Currency::Usd.symbol(), "fUSD");
        assert_eq!(Currency::Gbp.symbol(), "fGBP");
        assert_eq!(Currency::from_symbol("fUSD"), Some(Currency::Usd));
        assert_eq!(Currency::from_symbol("fEUR"), Some(Currency::Eur));
        assert_eq!(Currency::from_symbol("tBTCUSD"), None);
    }

    #[test]
    fn currency_from_string_works() {
        use std::str::FromStr;
        assert_eq!(Currency::from_str("USD").unwrap(), Currency::Usd);
        assert_eq!(Currency::from_str("eur").unwrap(), Currency::Eur);
        assert!(Currency::from_str("JPY").is_err());
    }

    #[test]
    fn offer_status_parses_exchange_spelling() {
        use std::str::FromStr;
        assert_eq!(
            OfferStatus::from_str("PARTIALLY FILLED").unwrap(),
            OfferStatus::PartiallyFilled
        );
        assert_eq!(OfferStatus::from_str("ACTIVE").unwrap(), OfferStatus::Active);
    }

    #[test]
    fn offer_is_active() {
        let offer = Offer {
            id: 1,
            symbol: "fUSD".to_string(),
            amount: dec!(300),
            rate: dec!(0.0004),
            period: 7,
            offer_type: OfferType::Limit,
            status: OfferStatus::Active,
            created_at: datetime!(2024-01-01 00:00 UTC),
            updated_at: datetime!(2024-01-01 00:00 UTC),
        };
        assert!(offer.is_active());
        assert!(!Offer { status: OfferStatus::Executed, ..offer }.is_active());
    }

    #[test]
    fn limit_request_defaults() {
        let req = OfferRequest::limit("fUSD", dec!(300), dec!(0.0004), 7);
        assert_eq!(req.offer_type, OfferType::Limit);
        assert_eq!(req.symbol, "fUSD");
    }

    #[test]
    fn offer_request_validation() {
        assert!(OfferRequest::limit("fUSD", dec!(300), dec!(0.0004), 7).validate().is_ok());
        assert!(OfferRequest::limit("fUSD", dec!(300), dec!(0.0004), 2).validate().is_ok());
        assert!(OfferRequest::limit("fUSD", dec!(300), dec!(0.0004), 120).validate().is_ok());

        assert!(OfferRequest::limit("", dec!(300), dec!(0.0004), 7).validate().is_err());
        assert!(OfferRequest::limit("fUSD", dec!(0), dec!(0.0004), 7).validate().is_err());
        assert!(OfferRequest::limit("fUSD", dec!(300), dec!(-0.0001), 7).validate().is_err());
        assert!(OfferRequest::limit("fUSD", dec!(300), dec!(0.0004), 1).validate().is_err());
        assert!(OfferRequest::limit("fUSD", dec!(300), dec!(0.0004), 121).validate().is_err());
    }
}
