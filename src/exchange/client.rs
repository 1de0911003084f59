//! Bitfinex REST v2 client implementing both exchange ports.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use sha2::Sha384;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use super::ports::{ExchangeReadPort, ExchangeWritePort};
use super::types::{
    FundingStat, FundingTicker, Offer, OfferRequest, OfferStatus, OfferType, Precision,
    SubmitOutcome, Wallet, WalletKind,
};
use crate::config::Config;
use crate::error::ExchangeError;
use crate::orderbook::AskLevel;

/// Prefix of the one submit rejection that is recoverable: the chunk was
/// below the exchange minimum and is simply skipped.
const MIN_AMOUNT_REJECTION: &str = "Invalid offer: incorrect amount, minimum is";

/// Book depth requested per fetch.
const BOOK_LEN: u32 = 100;

/// Bitfinex REST v2 client.
#[derive(Debug, Clone)]
pub struct BitfinexClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL for public endpoints.
    public_url: String,
    /// Base URL for authenticated endpoints.
    auth_url: String,
    /// API key.
    api_key: String,
    /// API secret.
    api_secret: String,
}

impl BitfinexClient {
    /// Create a new client from config.
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.http_timeout_ms))
            .connect_timeout(std::time::Duration::from_millis(2_000))
            .tcp_nodelay(true)
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .expect("failed to create HTTP client");

        Self {
            http,
            public_url: config.bitfinex_public_url.clone(),
            auth_url: config.bitfinex_auth_url.clone(),
            api_key: config.bitfinex_api_key.clone(),
            api_secret: config.bitfinex_api_secret.clone(),
        }
    }

    /// Get the public base URL.
    pub fn public_url(&self) -> &str {
        &self.public_url
    }

    async fn get_public(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Value, ExchangeError> {
        let url = format!("{}/{}", self.public_url, path);
        let response = self.http.get(&url).query(query).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                endpoint: path.to_string(),
                status,
                body,
            });
        }

        Ok(response.json().await?)
    }

    async fn post_private(&self, path: &str, body: &Value) -> Result<Value, ExchangeError> {
        let body_json = body.to_string();
        let nonce = (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000).to_string();
        let payload = format!("/api/{path}{nonce}{body_json}");
        let signature = sign_payload(&self.api_secret, &payload)?;

        let url = format!("{}/{}", self.auth_url, path);
        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .header("bfx-nonce", nonce)
            .header("bfx-apikey", &self.api_key)
            .header("bfx-signature", signature)
            .body(body_json)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                endpoint: path.to_string(),
                status,
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl ExchangeReadPort for BitfinexClient {
    #[instrument(skip(self))]
    async fn wallets(&self) -> Result<Vec<Wallet>, ExchangeError> {
        let endpoint = "v2/auth/r/wallets";
        let response = self.post_private(endpoint, &json!({})).await?;

        let rows = as_array(&response, endpoint)?;
        let wallets = rows
            .iter()
            .map(|row| parse_wallet_row(as_array(row, endpoint)?, endpoint))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = wallets.len(), "fetched wallets");
        Ok(wallets)
    }

    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn active_offers(&self, symbol: &str) -> Result<Vec<Offer>, ExchangeError> {
        let endpoint = format!("v2/auth/r/funding/offers/{symbol}");
        let response = self.post_private(&endpoint, &json!({})).await?;

        let rows = as_array(&response, &endpoint)?;
        let offers = rows
            .iter()
            .map(|row| parse_offer_row(as_array(row, &endpoint)?, &endpoint))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(count = offers.len(), "fetched active offers");
        Ok(offers)
    }

    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn funding_ticker(&self, symbol: &str) -> Result<FundingTicker, ExchangeError> {
        let endpoint = format!("v2/ticker/{symbol}");
        let response = self.get_public(&endpoint, &[]).await?;
        parse_ticker(as_array(&response, &endpoint)?, &endpoint)
    }

    #[instrument(skip(self), fields(symbol = %symbol, precision = %precision))]
    async fn funding_book(
        &self,
        symbol: &str,
        precision: Precision,
    ) -> Result<Vec<AskLevel>, ExchangeError> {
        let endpoint = format!("v2/book/{symbol}/{precision}");
        let response = self
            .get_public(&endpoint, &[("len", BOOK_LEN.to_string())])
            .await?;

        let rows = as_array(&response, &endpoint)?;
        let mut asks = rows
            .iter()
            .map(|row| parse_book_row(as_array(row, &endpoint)?, &endpoint))
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            // funding asks are the rows offering an amount
            .filter(|l: &AskLevel| l.amount > Decimal::ZERO)
            .collect::<Vec<_>>();

        asks.sort_by(|a, b| a.rate.cmp(&b.rate));
        Ok(asks)
    }

    #[instrument(skip(self), fields(symbol = %symbol))]
    async fn funding_stats(&self, symbol: &str) -> Result<Vec<FundingStat>, ExchangeError> {
        let endpoint = format!("v2/funding/stats/{symbol}/hist");
        let response = self.get_public(&endpoint, &[]).await?;

        let rows = as_array(&response, &endpoint)?;
        rows.iter()
            .map(|row| parse_stat_row(as_array(row, &endpoint)?, &endpoint))
            .collect()
    }
}

#[async_trait]
impl ExchangeWritePort for BitfinexClient {
    #[instrument(skip(self, request), fields(symbol = %request.symbol, amount = %request.amount, rate = %request.rate))]
    async fn submit_offer(&self, request: &OfferRequest) -> Result<SubmitOutcome, ExchangeError> {
        request.validate().map_err(|reason| ExchangeError::Action {
            action: "submit funding offer".to_string(),
            status: reason,
        })?;

        let endpoint = "v2/auth/w/funding/offer/submit";
        let body = json!({
            "type": request.offer_type.to_string(),
            "symbol": request.symbol,
            "amount": request.amount.to_string(),
            "rate": request.rate.to_string(),
            "period": request.period,
        });

        let response = self.post_private(endpoint, &body).await?;
        let outcome = parse_submit_notification(&response, endpoint)?;

        match &outcome {
            SubmitOutcome::Accepted => info!(
                symbol = %request.symbol,
                amount = %request.amount,
                rate = %request.rate,
                period = request.period,
                "submitted funding offer"
            ),
            SubmitOutcome::Rejected { reason } => debug!(
                symbol = %request.symbol,
                amount = %request.amount,
                reason = %reason,
                "funding offer rejected"
            ),
        }

        Ok(outcome)
    }

    #[instrument(skip(self), fields(offer_id = id))]
    async fn cancel_offer(&self, id: u64) -> Result<(), ExchangeError> {
        let endpoint = "v2/auth/w/funding/offer/cancel";
        let response = self.post_private(endpoint, &json!({ "id": id })).await?;
        parse_cancel_notification(&response, id, endpoint)?;

        info!(offer_id = id, "cancelled funding offer");
        Ok(())
    }
}

/// HMAC-SHA384 signature over the request payload, hex encoded.
pub fn sign_payload(secret: &str, payload: &str) -> Result<String, ExchangeError> {
    let mut mac = Hmac::<Sha384>::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Signing(e.to_string()))?;
    mac.update(payload.as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn parse_err(endpoint: &str, reason: impl Into<String>) -> ExchangeError {
    ExchangeError::Parse {
        endpoint: endpoint.to_string(),
        reason: reason.into(),
    }
}

fn as_array<'a>(value: &'a Value, endpoint: &str) -> Result<&'a [Value], ExchangeError> {
    value
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| parse_err(endpoint, format!("expected array, got {value}")))
}

fn dec_at(row: &[Value], idx: usize, endpoint: &str) -> Result<Decimal, ExchangeError> {
    let raw = row
        .get(idx)
        .and_then(Value::as_f64)
        .ok_or_else(|| parse_err(endpoint, format!("expected number at index {idx}")))?;
    Decimal::from_f64(raw)
        .ok_or_else(|| parse_err(endpoint, format!("unrepresentable number at index {idx}")))
}

fn u64_at(row: &[Value], idx: usize, endpoint: &str) -> Result<u64, ExchangeError> {
    row.get(idx)
        .and_then(Value::as_u64)
        .ok_or_else(|| parse_err(endpoint, format!("expected integer at index {idx}")))
}

fn u32_at(row: &[Value], idx: usize, endpoint: &str) -> Result<u32, ExchangeError> {
    u64_at(row, idx, endpoint)?
        .try_into()
        .map_err(|_| parse_err(endpoint, format!("integer out of range at index {idx}")))
}

fn str_at<'a>(row: &'a [Value], idx: usize, endpoint: &str) -> Result<&'a str, ExchangeError> {
    row.get(idx)
        .and_then(Value::as_str)
        .ok_or_else(|| parse_err(endpoint, format!("expected string at index {idx}")))
}

fn ts_at(row: &[Value], idx: usize, endpoint: &str) -> Result<OffsetDateTime, ExchangeError> {
    let millis = row
        .get(idx)
        .and_then(Value::as_i64)
        .ok_or_else(|| parse_err(endpoint, format!("expected timestamp at index {idx}")))?;
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
        .map_err(|e| parse_err(endpoint, format!("invalid timestamp at index {idx}: {e}")))
}

fn parse_wallet_row(row: &[Value], endpoint: &str) -> Result<Wallet, ExchangeError> {
    let kind: WalletKind = str_at(row, 0, endpoint)?
        .parse()
        .map_err(|_| parse_err(endpoint, "unknown wallet kind"))?;

    Ok(Wallet {
        kind,
        currency: str_at(row, 1, endpoint)?.to_string(),
        balance: dec_at(row, 2, endpoint)?,
        balance_available: dec_at(row, 4, endpoint)?,
    })
}

fn parse_offer_row(row: &[Value], endpoint: &str) -> Result<Offer, ExchangeError> {
    let offer_type: OfferType = str_at(row, 6, endpoint)?
        .parse()
        .map_err(|_| parse_err(endpoint, "unknown offer type"))?;
    let status: OfferStatus = str_at(row, 10, endpoint)?
        .parse()
        .map_err(|_| parse_err(endpoint, "unknown offer status"))?;

    Ok(Offer {
        id: u64_at(row, 0, endpoint)?,
        symbol: str_at(row, 1, endpoint)?.to_string(),
        created_at: ts_at(row, 2, endpoint)?,
        updated_at: ts_at(row, 3, endpoint)?,
        amount: dec_at(row, 4, endpoint)?,
        offer_type,
        status,
        rate: dec_at(row, 14, endpoint)?,
        period: u32_at(row, 15, endpoint)?,
    })
}

fn parse_book_row(row: &[Value], endpoint: &str) -> Result<AskLevel, ExchangeError> {
    Ok(AskLevel {
        rate: dec_at(row, 0, endpoint)?,
        period: u32_at(row, 1, endpoint)?,
        count: u32_at(row, 2, endpoint)?,
        amount: dec_at(row, 3, endpoint)?,
    })
}

fn parse_ticker(row: &[Value], endpoint: &str) -> Result<FundingTicker, ExchangeError> {
    Ok(FundingTicker {
        frr: dec_at(row, 0, endpoint)?,
        bid: dec_at(row, 1, endpoint)?,
        bid_period: u32_at(row, 2, endpoint)?,
        ask: dec_at(row, 4, endpoint)?,
        ask_period: u32_at(row, 5, endpoint)?,
        frr_amount_available: dec_at(row, 15, endpoint)?,
    })
}

fn parse_stat_row(row: &[Value], endpoint: &str) -> Result<FundingStat, ExchangeError> {
    // index 3 carries the FRR divided by 365; scale back to a daily rate
    Ok(FundingStat {
        ts: ts_at(row, 0, endpoint)?,
        frr_daily: dec_at(row, 3, endpoint)? * Decimal::from(365),
        avg_period: dec_at(row, 4, endpoint)?,
    })
}

/// Classify a submit notification into an outcome or an error.
fn parse_submit_notification(
    response: &Value,
    endpoint: &str,
) -> Result<SubmitOutcome, ExchangeError> {
    let row = as_array(response, endpoint)?;

    if row.first().and_then(Value::as_str) == Some("error") {
        let message = str_at(row, 2, endpoint)?.to_string();
        if message.starts_with(MIN_AMOUNT_REJECTION) {
            return Ok(SubmitOutcome::Rejected { reason: message });
        }
        return Err(ExchangeError::Action {
            action: "submit funding offer".to_string(),
            status: message,
        });
    }

    let status = str_at(row, 6, endpoint)?;
    if status != "SUCCESS" {
        return Err(ExchangeError::Action {
            action: "submit funding offer".to_string(),
            status: status.to_string(),
        });
    }

    Ok(SubmitOutcome::Accepted)
}

/// Check a cancel notification for success.
fn parse_cancel_notification(
    response: &Value,
    id: u64,
    endpoint: &str,
) -> Result<(), ExchangeError> {
    let row = as_array(response, endpoint)?;

    if row.first().and_then(Value::as_str) == Some("error") {
        return Err(ExchangeError::Action {
            action: format!("cancel funding offer {id}"),
            status: str_at(row, 2, endpoint)?.to_string(),
        });
    }

    let status = str_at(row, 6, endpoint)?;
    if status != "SUCCESS" {
        return Err(ExchangeError::Action {
            action: format!("cancel funding offer {id}"),
            status: status.to_string(),
        });
    }

    Ok(())
}
