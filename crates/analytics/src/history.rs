use crate::report::{TradeHistoryEntry, TradeHistoryReport, TradeHistorySummary};
use chrono::{DateTime, Utc};
use core_types::{OrderRecord, OrderSide};
use std::collections::BTreeSet;

/// Summarises an already filtered slice of the order log. Trades are listed
/// newest first; `from`/`to` echo the date range the caller filtered on.
pub fn trade_history(
    account_id: &str,
    orders: &[OrderRecord],
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> TradeHistoryReport {
    let mut summary = TradeHistorySummary {
        from,
        to,
        ..TradeHistorySummary::default()
    };
    let mut symbols = BTreeSet::new();

    let mut trades: Vec<TradeHistoryEntry> = orders
        .iter()
        .map(|order| {
            let total_value = order.total_value();
            match order.side {
                OrderSide::Buy => summary.total_buy_value += total_value,
                OrderSide::Sell => summary.total_sell_value += total_value,
            }
            symbols.insert(order.symbol.as_str());

            TradeHistoryEntry {
                order_id: order.order_id,
                sequence: order.sequence,
                timestamp: order.timestamp,
                symbol: order.symbol.clone(),
                side: order.side,
                quantity: order.quantity,
                price: order.executed_price,
                total_value,
                status: order.status,
            }
        })
        .collect();
    trades.sort_by(|a, b| b.sequence.cmp(&a.sequence));

    summary.total_trades = trades.len();
    summary.net_trading_value = summary.total_buy_value - summary.total_sell_value;
    summary.symbols_traded = symbols.len();

    TradeHistoryReport {
        account_id: account_id.to_string(),
        trades,
        summary,
    }
}
