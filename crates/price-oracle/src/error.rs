use thiserror::Error;

/// Failures of a price feed. The oracle never surfaces these to its callers;
/// they are logged and replaced by a fallback price.
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Database error while reading prices: {0}")]
    Database(#[from] database::DbError),

    #[error("Feed returned an unusable price for {symbol}: {price}")]
    InvalidPrice { symbol: String, price: String },
}
