#![allow(dead_code)]

use async_trait::async_trait;
use configuration::{AccountPolicy, Pricing};
use core_types::{Account, OrderRecord};
use database::{AccountStore, DbError, InMemoryAccountStore, OrderFilter};
use engine::TradingEngine;
use price_oracle::{FallbackPriceOracle, StaticFeed};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn pricing() -> Pricing {
    Pricing {
        cache_ttl_secs: 0,
        ..Pricing::default()
    }
}

pub fn oracle(feed: Arc<StaticFeed>) -> Arc<FallbackPriceOracle> {
    Arc::new(FallbackPriceOracle::with_feed(feed, &pricing()))
}

pub fn paper_engine(starting_cash: Decimal) -> (Arc<TradingEngine>, Arc<InMemoryAccountStore>, Arc<StaticFeed>) {
    let store = Arc::new(InMemoryAccountStore::new());
    let feed = Arc::new(StaticFeed::new());
    let engine = TradingEngine::new(store.clone(), oracle(feed.clone()), AccountPolicy::paper(starting_cash));
    (Arc::new(engine), store, feed)
}

/// Delegates to an in-memory store but can be told to fail every commit.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryAccountStore,
    pub fail_commits: AtomicBool,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_commits.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for FlakyStore {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, DbError> {
        self.inner.get_account(account_id).await
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, DbError> {
        self.inner.insert_account(account).await
    }

    async fn save_account(&self, account: &Account) -> Result<(), DbError> {
        self.inner.save_account(account).await
    }

    async fn append_order(&self, order: &OrderRecord) -> Result<(), DbError> {
        self.inner.append_order(order).await
    }

    async fn commit_fill(&self, account: &Account, order: &OrderRecord) -> Result<(), DbError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(DbError::Unavailable("store offline".to_string()));
        }
        self.inner.commit_fill(account, order).await
    }

    async fn list_orders(&self, account_id: &str, filter: &OrderFilter) -> Result<Vec<OrderRecord>, DbError> {
        self.inner.list_orders(account_id, filter).await
    }

    async fn list_account_ids(&self) -> Result<Vec<String>, DbError> {
        self.inner.list_account_ids().await
    }
}

/// Shares a store with other engines, but its first read of any account sees
/// nothing, as if another process created the account right after the read.
pub struct LaggingStore {
    pub inner: Arc<InMemoryAccountStore>,
    lagged: AtomicBool,
}

impl LaggingStore {
    pub fn new(inner: Arc<InMemoryAccountStore>) -> Self {
        Self { inner, lagged: AtomicBool::new(false) }
    }
}

#[async_trait]
impl AccountStore for LaggingStore {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, DbError> {
        if !self.lagged.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.get_account(account_id).await
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, DbError> {
        self.inner.insert_account(account).await
    }

    async fn save_account(&self, account: &Account) -> Result<(), DbError> {
        self.inner.save_account(account).await
    }

    async fn append_order(&self, order: &OrderRecord) -> Result<(), DbError> {
        self.inner.append_order(order).await
    }

    async fn commit_fill(&self, account: &Account, order: &OrderRecord) -> Result<(), DbError> {
        self.inner.commit_fill(account, order).await
    }

    async fn list_orders(&self, account_id: &str, filter: &OrderFilter) -> Result<Vec<OrderRecord>, DbError> {
        self.inner.list_orders(account_id, filter).await
    }

    async fn list_account_ids(&self) -> Result<Vec<String>, DbError> {
        self.inner.list_account_ids().await
    }
}
