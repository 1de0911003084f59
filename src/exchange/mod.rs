//! Exchange integration: types, port traits, the live Bitfinex client and a
//! mock for tests.

pub mod client;
pub mod mock;
pub mod ports;
pub mod types;

pub use client::BitfinexClient;
pub use ports::{
    funding_available, wallet_snapshot, DryRunWritePort, ExchangeReadPort, ExchangeWritePort,
};
pub use types::{Currency, Offer, OfferRequest, SubmitOutcome, WalletSnapshot};
