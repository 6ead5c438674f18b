use crate::error::DbError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, OrderRecord, OrderSide};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use tokio::sync::RwLock;

/// Filters for reading an account's order log.
///
/// Results are always chronological (ascending `sequence`). Pagination is
/// restartable: pass the last sequence seen as `after_sequence` to continue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderFilter {
    pub symbol: Option<String>,
    pub side: Option<OrderSide>,
    /// Inclusive lower bound on the execution timestamp.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the execution timestamp.
    pub to: Option<DateTime<Utc>>,
    pub after_sequence: Option<u64>,
    pub limit: Option<usize>,
}

impl OrderFilter {
    /// Everything in the log.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn for_symbol(symbol: &str) -> Self {
        Self {
            symbol: Some(core_types::normalize_symbol(symbol)),
            ..Self::default()
        }
    }

    /// Whether a record passes every predicate except `limit`.
    pub fn matches(&self, record: &OrderRecord) -> bool {
        self.symbol.as_ref().is_none_or(|s| *s == record.symbol)
            && self.side.is_none_or(|side| side == record.side)
            && self.from.is_none_or(|from| record.timestamp >= from)
            && self.to.is_none_or(|to| record.timestamp <= to)
            && self.after_sequence.is_none_or(|after| record.sequence > after)
    }
}

/// Durable keyed storage of accounts plus an append-only order log per account.
///
/// Implementations must make `commit_fill` all-or-nothing: either the new
/// account state and the order record are both stored, or neither is.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Reads the account and its positions as one consistent snapshot.
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, DbError>;

    /// Stores a fresh account unless one with the same id already exists.
    /// Returns `false`, leaving the stored account untouched, when it does.
    async fn insert_account(&self, account: &Account) -> Result<bool, DbError>;

    /// Atomically replaces the stored account (cash, positions, counters).
    async fn save_account(&self, account: &Account) -> Result<(), DbError>;

    async fn append_order(&self, order: &OrderRecord) -> Result<(), DbError>;

    /// Stores the post-trade account and appends its order record in a single
    /// unit. Fails with `Conflict` if the stored account has moved on since the
    /// caller read it (the record's sequence is not the next one).
    async fn commit_fill(&self, account: &Account, order: &OrderRecord) -> Result<(), DbError>;

    async fn list_orders(&self, account_id: &str, filter: &OrderFilter) -> Result<Vec<OrderRecord>, DbError>;

    async fn list_account_ids(&self) -> Result<Vec<String>, DbError>;
}

#[derive(Debug, Default)]
struct Books {
    accounts: HashMap<String, Account>,
    orders: HashMap<String, Vec<OrderRecord>>,
}

/// A process-local store for paper trading and tests.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    books: RwLock<Books>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_next_sequence(stored: Option<&Account>, order: &OrderRecord) -> Result<(), DbError> {
    let current = stored.map(|a| a.order_count).unwrap_or(0);
    if order.sequence != current + 1 {
        return Err(DbError::Conflict(format!(
            "order {} for account {} has sequence {}, expected {}",
            order.order_id,
            order.account_id,
            order.sequence,
            current + 1
        )));
    }
    Ok(())
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>, DbError> {
        Ok(self.books.read().await.accounts.get(account_id).cloned())
    }

    async fn save_account(&self, account: &Account) -> Result<(), DbError> {
        self.books
            .write()
            .await
            .accounts
            .insert(account.account_id.clone(), account.clone());
        Ok(())
    }

    async fn insert_account(&self, account: &Account) -> Result<bool, DbError> {
        let mut books = self.books.write().await;
        match books.accounts.entry(account.account_id.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(account.clone());
                Ok(true)
            }
        }
    }

    async fn append_order(&self, order: &OrderRecord) -> Result<(), DbError> {
        let mut books = self.books.write().await;
        let log = books.orders.entry(order.account_id.clone()).or_default();
        if log.iter().any(|o| o.sequence == order.sequence) {
            return Err(DbError::Conflict(format!(
                "sequence {} already used for account {}",
                order.sequence, order.account_id
            )));
        }
        log.push(order.clone());
        Ok(())
    }

    async fn commit_fill(&self, account: &Account, order: &OrderRecord) -> Result<(), DbError> {
        let mut books = self.books.write().await;
        check_next_sequence(books.accounts.get(&account.account_id), order)?;

        // Both writes happen under one write guard, so readers never observe
        // one without the other.
        books
            .accounts
            .insert(account.account_id.clone(), account.clone());
        books
            .orders
            .entry(order.account_id.clone())
            .or_default()
            .push(order.clone());
        Ok(())
    }

    async fn list_orders(&self, account_id: &str, filter: &OrderFilter) -> Result<Vec<OrderRecord>, DbError> {
        let books = self.books.read().await;
        let mut orders: Vec<OrderRecord> = books
            .orders
            .get(account_id)
            .map(|log| log.iter().filter(|o| filter.matches(o)).cloned().collect())
            .unwrap_or_default();
        orders.sort_by_key(|o| o.sequence);
        if let Some(limit) = filter.limit {
            orders.truncate(limit);
        }
        Ok(orders)
    }

    async fn list_account_ids(&self) -> Result<Vec<String>, DbError> {
        let mut ids: Vec<String> = self.books.read().await.accounts.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
