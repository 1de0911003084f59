//! Offer reconciliation: converge the active offers toward one logical
//! position at the target (rate, period), sized to all available balance.

pub mod executor;
pub mod plan;

pub use executor::{ReconcileSummary, Reconciler};
pub use plan::{offers_to_cancel, split_into_chunks, OfferTarget};
