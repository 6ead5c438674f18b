//! Price resolution for execution and valuation.
//!
//! `PriceOracle` is the contract the engine consumes; `FallbackPriceOracle`
//! layers a feed over static fallback tables so that a price is always
//! available.

pub mod error;
pub mod feed;
pub mod oracle;

pub use error::FeedError;
pub use feed::{KlineFeed, PriceFeed, StaticFeed};
pub use oracle::{FallbackPriceOracle, PriceOracle, Quote};
