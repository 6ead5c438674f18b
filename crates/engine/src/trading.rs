use crate::accounts::AccountManager;
use crate::auditor::{audit_ledger, AuditReport};
use crate::error::EngineError;
use analytics::{
    export, performance_statement, trade_history, LedgerReplay, PerformancePeriod, PerformanceReport,
    PortfolioReport, TradeHistoryReport, ValuationEngine,
};
use chrono::Utc;
use configuration::AccountPolicy;
use core_types::{Account, OrderReceipt, OrderRecord, OrderRequest};
use dashmap::DashMap;
use database::{AccountStore, OrderFilter};
use executor::{apply_execution, validate_request, Executor, QuoteExecutor};
use futures::future::join_all;
use price_oracle::{PriceOracle, Quote};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// The order execution and reporting facade for one book.
///
/// Every operation on an account runs under that account's mutex, so orders
/// on one account are linearised while different accounts proceed in
/// parallel. Reports hold the mutex only while snapshotting.
pub struct TradingEngine {
    accounts: AccountManager,
    store: Arc<dyn AccountStore>,
    executor: Arc<dyn Executor>,
    oracle: Arc<dyn PriceOracle>,
    valuation: ValuationEngine,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl TradingEngine {
    /// An engine that fills at supplied prices or the oracle's quote.
    pub fn new(store: Arc<dyn AccountStore>, oracle: Arc<dyn PriceOracle>, policy: AccountPolicy) -> Self {
        let executor = Arc::new(QuoteExecutor::new(Arc::clone(&oracle)));
        Self::with_executor(store, oracle, executor, policy)
    }

    pub fn with_executor(
        store: Arc<dyn AccountStore>,
        oracle: Arc<dyn PriceOracle>,
        executor: Arc<dyn Executor>,
        policy: AccountPolicy,
    ) -> Self {
        Self {
            accounts: AccountManager::new(Arc::clone(&store), policy),
            store,
            executor,
            oracle,
            valuation: ValuationEngine::new(),
            locks: DashMap::new(),
        }
    }

    pub fn policy(&self) -> &AccountPolicy {
        self.accounts.policy()
    }

    /// Waits for exclusive access to one account. The table entry is dropped
    /// again once the last holder or waiter releases it.
    async fn lock_account(&self, account_id: &str) -> AccountGuard<'_> {
        // Clone out of the map so no shard guard is held across an await.
        let lock = self.locks.entry(account_id.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        AccountGuard {
            locks: &self.locks,
            account_id: account_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of accounts with a live entry in the lock table.
    pub fn locked_accounts(&self) -> usize {
        self.locks.len()
    }

    /// Validates, prices, applies and persists one order.
    ///
    /// The ledger change is made on a working copy and committed together with
    /// the order record; on any error the stored account and log are unchanged.
    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderReceipt, EngineError> {
        let result = self.place_order_locked(order).await;
        match &result {
            Ok(receipt) => tracing::info!(
                account_id = %order.account_id,
                order_id = %receipt.order_id,
                symbol = %receipt.symbol,
                side = %receipt.side,
                quantity = %receipt.quantity,
                price = %receipt.executed_price,
                cash_after = %receipt.cash_after,
                "Order executed."
            ),
            Err(e) if e.is_rejection() => tracing::warn!(
                account_id = %order.account_id,
                symbol = %order.symbol,
                side = %order.side,
                reason = %e,
                "Order rejected."
            ),
            Err(e) => tracing::error!(
                account_id = %order.account_id,
                symbol = %order.symbol,
                error = %e,
                "Order failed."
            ),
        }
        result
    }

    async fn place_order_locked(&self, order: &OrderRequest) -> Result<OrderReceipt, EngineError> {
        let order = validate_request(order)?;

        let _guard = self.lock_account(&order.account_id).await;

        let account = self.accounts.get_or_create(&order.account_id).await?;
        let execution = self.executor.execute(&order).await?;

        let mut working = account.clone();
        let sequence = apply_execution(&mut working, &execution)?;
        let record = OrderRecord::executed(&execution, sequence);

        self.store.commit_fill(&working, &record).await?;

        Ok(OrderReceipt {
            order_id: record.order_id,
            symbol: record.symbol.clone(),
            side: record.side,
            quantity: record.quantity,
            executed_price: record.executed_price,
            total_amount: record.total_value(),
            status: record.status,
            cash_after: working.cash,
        })
    }

    /// Provisions an account under this book's kind and starting cash.
    pub async fn open_account(&self, account_id: &str) -> Result<Account, EngineError> {
        let _guard = self.lock_account(account_id).await;
        self.accounts.open(account_id).await
    }

    /// Account and its filtered log, read under the account's lock.
    async fn snapshot(&self, account_id: &str, filter: &OrderFilter) -> Result<(Account, Vec<OrderRecord>), EngineError> {
        let _guard = self.lock_account(account_id).await;
        let account = self.accounts.get_or_create(account_id).await?;
        let orders = self.store.list_orders(account_id, filter).await?;
        Ok((account, orders))
    }

    /// Current prices for every held symbol, looked up concurrently.
    async fn prices_for(&self, account: &Account) -> HashMap<String, Decimal> {
        let lookups = account.positions.keys().map(|symbol| async move {
            (symbol.clone(), self.oracle.current_price(symbol).await)
        });
        join_all(lookups).await.into_iter().collect()
    }

    pub async fn get_portfolio(&self, account_id: &str) -> Result<PortfolioReport, EngineError> {
        let (account, orders) = self.snapshot(account_id, &OrderFilter::all()).await?;
        let replay = LedgerReplay::run(account.starting_cash, &orders)?;
        let prices = self.prices_for(&account).await;
        Ok(self.valuation.value(&account, &prices, replay.realized_pnl)?)
    }

    pub async fn get_order_history(&self, account_id: &str, filter: &OrderFilter) -> Result<Vec<OrderRecord>, EngineError> {
        let (_, orders) = self.snapshot(account_id, filter).await?;
        Ok(orders)
    }

    pub async fn get_trade_history_report(
        &self,
        account_id: &str,
        filter: &OrderFilter,
    ) -> Result<TradeHistoryReport, EngineError> {
        let orders = self.get_order_history(account_id, filter).await?;
        Ok(trade_history(account_id, &orders, filter.from, filter.to))
    }

    /// P&L statement for a trailing period ending now; `None` covers the
    /// whole history.
    pub async fn get_performance(
        &self,
        account_id: &str,
        period: Option<PerformancePeriod>,
    ) -> Result<PerformanceReport, EngineError> {
        let (account, orders) = self.snapshot(account_id, &OrderFilter::all()).await?;
        let prices = self.prices_for(&account).await;
        Ok(performance_statement(&account, &orders, &prices, period, Utc::now())?)
    }

    pub async fn export_trade_history_csv(&self, account_id: &str, filter: &OrderFilter) -> Result<String, EngineError> {
        let report = self.get_trade_history_report(account_id, filter).await?;
        Ok(export::trade_history_csv(&report)?)
    }

    pub async fn export_portfolio_csv(&self, account_id: &str) -> Result<String, EngineError> {
        let report = self.get_portfolio(account_id).await?;
        Ok(export::portfolio_csv(&report)?)
    }

    pub async fn export_performance_csv(
        &self,
        account_id: &str,
        period: Option<PerformancePeriod>,
    ) -> Result<String, EngineError> {
        let report = self.get_performance(account_id, period).await?;
        Ok(export::performance_csv(&report)?)
    }

    pub async fn quote(&self, symbol: &str) -> Quote {
        self.oracle.quote(symbol).await
    }

    /// Replays the account's log and compares it with the stored ledger.
    pub async fn audit(&self, account_id: &str) -> Result<AuditReport, EngineError> {
        let (account, orders) = self.snapshot(account_id, &OrderFilter::all()).await?;
        Ok(audit_ledger(&account, &orders))
    }

    pub async fn account_ids(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.store.list_account_ids().await?)
    }
}

/// Exclusive access to one account, released on drop.
struct AccountGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    account_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for AccountGuard<'_> {
    fn drop(&mut self) {
        // Releases this holder's reference to the mutex first.
        self.guard.take();
        // Only the table itself still holds the mutex: nobody is waiting on it.
        self.locks
            .remove_if(self.account_id.as_str(), |_, lock| Arc::strong_count(lock) == 1);
    }
}
