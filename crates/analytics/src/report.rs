use chrono::{DateTime, Utc};
use core_types::{OrderSide, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Valuation of one held position at current prices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionReport {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub current_price: Decimal,
    pub cost_basis: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    /// Zero when the cost basis is zero.
    pub unrealized_pnl_percent: Decimal,
    /// Share of the invested value, zero when nothing is invested.
    pub weight_percent: Decimal,
}

/// Point-in-time valuation of an account.
///
/// `realized_pnl + unrealized_pnl == total_value - starting_value` up to
/// decimal division rounding in the average costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioReport {
    pub account_id: String,
    pub total_value: Decimal,
    pub cash: Decimal,
    /// Market value of all positions.
    pub portfolio_value: Decimal,
    pub starting_value: Decimal,
    pub total_return: Decimal,
    pub total_return_percent: Decimal,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub positions: Vec<PositionReport>,
    pub largest_position: Option<String>,
    pub best_performer: Option<String>,
    pub worst_performer: Option<String>,
    pub generated_at: DateTime<Utc>,
}

/// A sell matched against the running average cost at the time of the sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RealizedTrade {
    pub sequence: u64,
    pub symbol: String,
    pub quantity: Decimal,
    pub sell_price: Decimal,
    pub average_cost: Decimal,
    pub pnl: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnrealizedPosition {
    pub symbol: String,
    pub quantity: Decimal,
    pub average_cost: Decimal,
    pub current_price: Decimal,
    pub unrealized_pnl: Decimal,
}

/// Order flow inside the statement window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingMetrics {
    pub total_trades: usize,
    pub trading_volume: Decimal,
    pub buy_volume: Decimal,
    pub sell_volume: Decimal,
    /// Buy volume minus sell volume.
    pub net_flow: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolPnl {
    pub symbol: String,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub trades_count: usize,
}

/// Profit and loss statement for a trailing window (or the whole history).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub account_id: String,
    pub period: Option<crate::PerformancePeriod>,
    /// `None` for a whole-history statement.
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: DateTime<Utc>,
    pub realized_pnl: Decimal,
    pub unrealized_pnl: Decimal,
    pub total_pnl: Decimal,
    pub trading_metrics: TradingMetrics,
    pub realized_trades: Vec<RealizedTrade>,
    pub unrealized_positions: Vec<UnrealizedPosition>,
    pub symbol_breakdown: Vec<SymbolPnl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeHistoryEntry {
    pub order_id: Uuid,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    pub total_value: Decimal,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeHistorySummary {
    pub total_trades: usize,
    pub total_buy_value: Decimal,
    pub total_sell_value: Decimal,
    /// Buy value minus sell value.
    pub net_trading_value: Decimal,
    pub symbols_traded: usize,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

/// Filtered order history, newest first, with totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeHistoryReport {
    pub account_id: String,
    pub trades: Vec<TradeHistoryEntry>,
    pub summary: TradeHistorySummary,
}
