//! Funding order-book representation and the cumulative ladder walk.

pub mod aggregator;
pub mod types;

pub use aggregator::{book_backed_rate, liquidity_up_to, total_ask_liquidity};
pub use types::{AskLevel, DepthWeight};
