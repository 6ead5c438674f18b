use crate::error::FeedError;
use async_trait::async_trait;
use database::DbRepository;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// A source of closing prices.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Returns up to `depth` of the most recent closes for `symbol`, newest
    /// first. An empty vector means the feed has no data for the symbol.
    async fn recent_closes(&self, symbol: &str, depth: usize) -> Result<Vec<Decimal>, FeedError>;
}

/// An in-memory close series per symbol, oldest first. Used for paper
/// simulations and tests.
#[derive(Debug, Default)]
pub struct StaticFeed {
    closes: RwLock<HashMap<String, Vec<Decimal>>>,
}

impl StaticFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a feed from `(symbol, closes oldest-first)` pairs.
    pub fn with_series<I, S>(series: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<Decimal>)>,
        S: Into<String>,
    {
        let closes = series.into_iter().map(|(s, c)| (s.into(), c)).collect();
        Self {
            closes: RwLock::new(closes),
        }
    }

    /// Appends a new close, which becomes the current price.
    pub async fn push_close(&self, symbol: &str, close: Decimal) {
        self.closes
            .write()
            .await
            .entry(symbol.to_string())
            .or_default()
            .push(close);
    }
}

#[async_trait]
impl PriceFeed for StaticFeed {
    async fn recent_closes(&self, symbol: &str, depth: usize) -> Result<Vec<Decimal>, FeedError> {
        let closes = self.closes.read().await;
        Ok(closes
            .get(symbol)
            .map(|series| series.iter().rev().take(depth).copied().collect())
            .unwrap_or_default())
    }
}

/// Reads closes from the `klines` table for one bar interval.
#[derive(Debug, Clone)]
pub struct KlineFeed {
    repo: DbRepository,
    interval: String,
}

impl KlineFeed {
    pub fn new(repo: DbRepository, interval: impl Into<String>) -> Self {
        Self {
            repo,
            interval: interval.into(),
        }
    }
}

#[async_trait]
impl PriceFeed for KlineFeed {
    async fn recent_closes(&self, symbol: &str, depth: usize) -> Result<Vec<Decimal>, FeedError> {
        Ok(self.repo.latest_closes(symbol, &self.interval, depth).await?)
    }
}
