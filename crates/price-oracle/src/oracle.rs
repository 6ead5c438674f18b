use crate::feed::PriceFeed;
use async_trait::async_trait;
use configuration::Pricing;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Source of execution and valuation prices. Implementations never fail:
/// unknown symbols and feed outages resolve to a fallback price.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn current_price(&self, symbol: &str) -> Decimal;

    /// The close `periods_back` bars ago (0 is the latest). Falls back to the
    /// current price when the feed has too little history.
    async fn historical_price(&self, symbol: &str, periods_back: usize) -> Decimal;

    /// Current price with the change against the previous close.
    async fn quote(&self, symbol: &str) -> Quote {
        let symbol = core_types::normalize_symbol(symbol);
        let price = self.current_price(&symbol).await;
        let previous_close = self.historical_price(&symbol, 1).await;
        Quote::new(&symbol, price, previous_close)
    }
}

/// A price snapshot with its daily change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub price: Decimal,
    pub previous_close: Decimal,
    pub change: Decimal,
    pub change_percent: Decimal,
}

impl Quote {
    pub fn new(symbol: &str, price: Decimal, previous_close: Decimal) -> Self {
        let change = price.saturating_sub(previous_close);
        let change_percent = change
            .checked_div(previous_close)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO);
        Self {
            symbol: symbol.to_string(),
            price,
            previous_close,
            change,
            change_percent,
        }
    }
}

struct CachedPrice {
    price: Decimal,
    fetched_at: Instant,
}

/// Feed first, then the per-symbol fallback table, then the global default.
///
/// Current prices are cached per symbol for `ttl`; historical lookups always
/// go to the feed.
pub struct FallbackPriceOracle {
    feed: Option<Arc<dyn PriceFeed>>,
    fallback_prices: HashMap<String, Decimal>,
    default_price: Decimal,
    ttl: Duration,
    cache: DashMap<String, CachedPrice>,
}

impl FallbackPriceOracle {
    pub fn new(feed: Option<Arc<dyn PriceFeed>>, pricing: &Pricing) -> Self {
        Self {
            feed,
            fallback_prices: pricing.fallback_prices.clone(),
            default_price: pricing.default_price,
            ttl: Duration::from_secs(pricing.cache_ttl_secs),
            cache: DashMap::new(),
        }
    }

    /// An oracle with no feed at all: every price comes from the tables.
    pub fn from_settings(pricing: &Pricing) -> Self {
        Self::new(None, pricing)
    }

    pub fn with_feed(feed: Arc<dyn PriceFeed>, pricing: &Pricing) -> Self {
        Self::new(Some(feed), pricing)
    }

    fn fallback(&self, symbol: &str) -> Decimal {
        self.fallback_prices
            .get(symbol)
            .copied()
            .unwrap_or(self.default_price)
    }

    fn cached(&self, symbol: &str) -> Option<Decimal> {
        if self.ttl.is_zero() {
            return None;
        }
        self.cache
            .get(symbol)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.price)
    }

    /// The feed close `periods_back` bars ago, if the feed has one and it is
    /// positive. Any feed error is logged and treated as "no data".
    async fn close_at(&self, symbol: &str, periods_back: usize) -> Option<Decimal> {
        let feed = self.feed.as_ref()?;
        match feed.recent_closes(symbol, periods_back.saturating_add(1)).await {
            Ok(closes) => {
                let close = closes.get(periods_back).copied().filter(|p| *p > Decimal::ZERO);
                if close.is_none() {
                    tracing::debug!(symbol, periods_back, "No usable feed data, using fallback price.");
                }
                close
            }
            Err(e) => {
                tracing::warn!(symbol, error = %e, "Price feed failed, using fallback price.");
                None
            }
        }
    }
}

#[async_trait]
impl PriceOracle for FallbackPriceOracle {
    async fn current_price(&self, symbol: &str) -> Decimal {
        let symbol = core_types::normalize_symbol(symbol);
        if let Some(price) = self.cached(&symbol) {
            return price;
        }

        let price = match self.close_at(&symbol, 0).await {
            Some(price) => price,
            None => self.fallback(&symbol),
        };

        if !self.ttl.is_zero() {
            self.cache.insert(
                symbol.clone(),
                CachedPrice {
                    price,
                    fetched_at: Instant::now(),
                },
            );
        }
        tracing::debug!(%symbol, %price, "Resolved current price.");
        price
    }

    async fn historical_price(&self, symbol: &str, periods_back: usize) -> Decimal {
        let symbol = core_types::normalize_symbol(symbol);
        match self.close_at(&symbol, periods_back).await {
            Some(price) => price,
            None => self.current_price(&symbol).await,
        }
    }
}
