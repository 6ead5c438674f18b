//! # Analytics
//!
//! Read-only reporting over an account snapshot and its order log.
//!
//! ## Architectural Principles
//!
//! - **Pure calculation:** nothing here touches storage or the price oracle. The
//!   caller snapshots the account and log, resolves prices, and passes them in.
//! - **One cost-basis arithmetic:** `LedgerReplay` drives `core_types::Position`
//!   exactly like the live ledger does, so replayed averages and stored averages
//!   agree to the last digit.
//!
//! ## Public API
//!
//! - `ValuationEngine`: live valuation into a `PortfolioReport`.
//! - `LedgerReplay`: realized P&L and ledger reconstruction from the log.
//! - `performance_statement`: trailing-window P&L statement.
//! - `trade_history`: filtered history with totals.
//! - `export`: CSV renderings of the three reports.

pub mod error;
pub mod export;
pub mod history;
pub mod performance;
pub mod replay;
pub mod report;
pub mod valuation;

pub use error::AnalyticsError;
pub use history::trade_history;
pub use performance::{performance_statement, PerformancePeriod};
pub use replay::LedgerReplay;
pub use report::{
    PerformanceReport, PortfolioReport, PositionReport, RealizedTrade, SymbolPnl, TradeHistoryEntry,
    TradeHistoryReport, TradeHistorySummary, TradingMetrics, UnrealizedPosition,
};
pub use valuation::ValuationEngine;
