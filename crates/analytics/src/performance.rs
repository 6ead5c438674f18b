use crate::error::AnalyticsError;
use crate::replay::LedgerReplay;
use crate::report::{PerformanceReport, SymbolPnl, TradingMetrics, UnrealizedPosition};
use crate::valuation::price_of;
use chrono::{DateTime, Duration, Utc};
use core_types::{Account, OrderRecord, OrderSide, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Trailing window of a P&L statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PerformancePeriod {
    Week,
    Month,
    Quarter,
    Year,
}

impl PerformancePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformancePeriod::Week => "week",
            PerformancePeriod::Month => "month",
            PerformancePeriod::Quarter => "quarter",
            PerformancePeriod::Year => "year",
        }
    }

    pub fn length(&self) -> Duration {
        match self {
            PerformancePeriod::Week => Duration::days(7),
            PerformancePeriod::Month => Duration::days(30),
            PerformancePeriod::Quarter => Duration::days(90),
            PerformancePeriod::Year => Duration::days(365),
        }
    }

    pub fn start(&self, end: DateTime<Utc>) -> DateTime<Utc> {
        end - self.length()
    }
}

impl FromStr for PerformancePeriod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "week" => Ok(PerformancePeriod::Week),
            "month" => Ok(PerformancePeriod::Month),
            "quarter" => Ok(PerformancePeriod::Quarter),
            "year" => Ok(PerformancePeriod::Year),
            other => Err(AnalyticsError::UnknownPeriod(other.to_string())),
        }
    }
}

impl fmt::Display for PerformancePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds a P&L statement ending at `now`.
///
/// The cost basis comes from the whole log; only sells executed inside the
/// window count towards the period's realized P&L. Unrealized P&L is always
/// the current one.
pub fn performance_statement(
    account: &Account,
    orders: &[OrderRecord],
    prices: &HashMap<String, Decimal>,
    period: Option<PerformancePeriod>,
    now: DateTime<Utc>,
) -> Result<PerformanceReport, AnalyticsError> {
    let start_date = period.map(|p| p.start(now));
    let in_window = |ts: DateTime<Utc>| start_date.is_none_or(|start| ts >= start) && ts <= now;

    let replay = LedgerReplay::run(account.starting_cash, orders)?;
    let realized_trades: Vec<_> = replay
        .realized_trades
        .into_iter()
        .filter(|t| in_window(t.timestamp))
        .collect();
    let realized_pnl: Decimal = realized_trades.iter().map(|t| t.pnl).sum();
    tracing::debug!(
        account_id = %account.account_id,
        period = ?period,
        realized_trades = realized_trades.len(),
        "Computed period realized P&L."
    );

    let mut metrics = TradingMetrics::default();
    for order in orders
        .iter()
        .filter(|o| o.status == OrderStatus::Executed && in_window(o.timestamp))
    {
        let value = order.total_value();
        metrics.total_trades += 1;
        metrics.trading_volume += value;
        match order.side {
            OrderSide::Buy => metrics.buy_volume += value,
            OrderSide::Sell => metrics.sell_volume += value,
        }
    }
    metrics.net_flow = metrics.buy_volume - metrics.sell_volume;

    let mut unrealized_positions = Vec::with_capacity(account.positions.len());
    for position in account.positions.values() {
        let current_price = price_of(prices, &position.symbol)?;
        unrealized_positions.push(UnrealizedPosition {
            symbol: position.symbol.clone(),
            quantity: position.quantity,
            average_cost: position.average_cost,
            current_price,
            unrealized_pnl: (current_price - position.average_cost) * position.quantity,
        });
    }
    let unrealized_pnl: Decimal = unrealized_positions.iter().map(|p| p.unrealized_pnl).sum();

    let mut breakdown: BTreeMap<String, SymbolPnl> = BTreeMap::new();
    for trade in &realized_trades {
        let entry = breakdown.entry(trade.symbol.clone()).or_default();
        entry.realized_pnl += trade.pnl;
        entry.trades_count += 1;
    }
    for position in &unrealized_positions {
        breakdown.entry(position.symbol.clone()).or_default().unrealized_pnl += position.unrealized_pnl;
    }
    let symbol_breakdown = breakdown
        .into_iter()
        .map(|(symbol, mut pnl)| {
            pnl.symbol = symbol;
            pnl.total_pnl = pnl.realized_pnl + pnl.unrealized_pnl;
            pnl
        })
        .collect();

    Ok(PerformanceReport {
        account_id: account.account_id.clone(),
        period,
        start_date,
        end_date: now,
        realized_pnl,
        unrealized_pnl,
        total_pnl: realized_pnl + unrealized_pnl,
        trading_metrics: metrics,
        realized_trades,
        unrealized_positions,
        symbol_breakdown,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AccountKind, Execution, OrderType, Position};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn record(sequence: u64, side: OrderSide, symbol: &str, quantity: Decimal, price: Decimal, age_days: i64, now: DateTime<Utc>) -> OrderRecord {
        let execution = Execution {
            order_id: Uuid::new_v4(),
            account_id: "a1".to_string(),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
            price,
            timestamp: now - Duration::days(age_days),
        };
        OrderRecord::executed(&execution, sequence)
    }

    #[test]
    fn period_parsing() {
        assert_eq!("Quarter".parse::<PerformancePeriod>().unwrap(), PerformancePeriod::Quarter);
        assert_eq!(PerformancePeriod::Week.length(), Duration::days(7));
        assert!("fortnight".parse::<PerformancePeriod>().is_err());
    }

    #[test]
    fn window_limits_realized_pnl_but_not_cost_basis() {
        let now = Utc::now();
        // Bought 40 days ago, one sell 35 days ago, one sell 2 days ago.
        let orders = vec![
            record(1, OrderSide::Buy, "IBM", dec!(10), dec!(100), 40, now),
            record(2, OrderSide::Sell, "IBM", dec!(4), dec!(110), 35, now),
            record(3, OrderSide::Sell, "IBM", dec!(2), dec!(120), 2, now),
        ];
        let mut account = Account::new("a1", AccountKind::Paper, dec!(1000));
        account.cash = dec!(1000) - dec!(1000) + dec!(440) + dec!(240);
        account
            .positions
            .insert("IBM".to_string(), Position::open("IBM", dec!(4), dec!(100)));
        account.order_count = 3;
        let prices = HashMap::from([("IBM".to_string(), dec!(105))]);

        let month = performance_statement(&account, &orders, &prices, Some(PerformancePeriod::Month), now).unwrap();
        assert_eq!(month.realized_pnl, dec!(40));
        assert_eq!(month.unrealized_pnl, dec!(20));
        assert_eq!(month.total_pnl, dec!(60));
        assert_eq!(month.trading_metrics.total_trades, 1);
        assert_eq!(month.trading_metrics.sell_volume, dec!(240));
        assert_eq!(month.trading_metrics.net_flow, dec!(-240));
        assert_eq!(month.symbol_breakdown.len(), 1);
        assert_eq!(month.symbol_breakdown[0].trades_count, 1);
        assert_eq!(month.symbol_breakdown[0].total_pnl, dec!(60));

        let all = performance_statement(&account, &orders, &prices, None, now).unwrap();
        assert_eq!(all.realized_pnl, dec!(80));
        assert!(all.start_date.is_none());
        assert_eq!(all.trading_metrics.total_trades, 3);
        assert_eq!(all.trading_metrics.buy_volume, dec!(1000));
    }
}
