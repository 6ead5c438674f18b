//! CSV renderings of the reports. Amounts are `$`-prefixed with two decimals,
//! percentages carry a `%` suffix, sides and statuses are upper case.

use crate::error::AnalyticsError;
use crate::report::{PerformanceReport, PortfolioReport, TradeHistoryReport};
use csv::{Writer, WriterBuilder};
use rust_decimal::Decimal;

fn two_dp(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp(2);
    rounded.rescale(2);
    rounded
}

fn money(value: Decimal) -> String {
    format!("${}", two_dp(value))
}

fn percent(value: Decimal) -> String {
    format!("{}%", two_dp(value))
}

/// Sections have different widths, so the writer is flexible.
fn writer() -> Writer<Vec<u8>> {
    WriterBuilder::new().flexible(true).from_writer(Vec::new())
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String, AnalyticsError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| AnalyticsError::Export(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| AnalyticsError::Export(e.to_string()))
}

pub fn trade_history_csv(report: &TradeHistoryReport) -> Result<String, AnalyticsError> {
    let mut wtr = writer();
    wtr.write_record(["Date", "Time", "Symbol", "Side", "Quantity", "Price", "Total Value", "Status"])?;

    for trade in &report.trades {
        wtr.write_record([
            trade.timestamp.format("%Y-%m-%d").to_string(),
            trade.timestamp.format("%H:%M:%S").to_string(),
            trade.symbol.clone(),
            trade.side.as_str().to_uppercase(),
            trade.quantity.to_string(),
            money(trade.price),
            money(trade.total_value),
            trade.status.as_str().to_uppercase(),
        ])?;
    }
    finish(wtr)
}

pub fn portfolio_csv(report: &PortfolioReport) -> Result<String, AnalyticsError> {
    let mut wtr = writer();
    wtr.write_record(["Portfolio Performance Summary"])?;
    wtr.write_record(["Metric", "Value"])?;
    for (metric, value) in [
        ("Total Value", money(report.total_value)),
        ("Cash", money(report.cash)),
        ("Portfolio Value", money(report.portfolio_value)),
        ("Total Return", money(report.total_return)),
        ("Total Return %", percent(report.total_return_percent)),
        ("Realized P&L", money(report.realized_pnl)),
        ("Unrealized P&L", money(report.unrealized_pnl)),
        ("Total P&L", money(report.total_pnl)),
    ] {
        wtr.write_record([metric.to_string(), value])?;
    }
    wtr.write_record([""])?;

    wtr.write_record(["Current Positions"])?;
    wtr.write_record([
        "Symbol",
        "Quantity",
        "Avg Price",
        "Current Price",
        "Cost Basis",
        "Market Value",
        "Unrealized P&L",
        "Return %",
        "Weight %",
    ])?;
    for position in &report.positions {
        wtr.write_record([
            position.symbol.clone(),
            position.quantity.to_string(),
            money(position.average_cost),
            money(position.current_price),
            money(position.cost_basis),
            money(position.market_value),
            money(position.unrealized_pnl),
            percent(position.unrealized_pnl_percent),
            percent(position.weight_percent),
        ])?;
    }
    finish(wtr)
}

pub fn performance_csv(report: &PerformanceReport) -> Result<String, AnalyticsError> {
    let mut wtr = writer();
    let title = match report.period {
        Some(period) => format!("P&L Statement - {}", capitalize(period.as_str())),
        None => "P&L Statement - All Time".to_string(),
    };
    wtr.write_record([title])?;
    let range = match report.start_date {
        Some(start) => format!(
            "{} to {}",
            start.format("%Y-%m-%d"),
            report.end_date.format("%Y-%m-%d")
        ),
        None => format!("inception to {}", report.end_date.format("%Y-%m-%d")),
    };
    wtr.write_record(["Period".to_string(), range])?;
    wtr.write_record([""])?;

    wtr.write_record(["Summary"])?;
    wtr.write_record(["Metric", "Value"])?;
    wtr.write_record(["Realized P&L".to_string(), money(report.realized_pnl)])?;
    wtr.write_record(["Unrealized P&L".to_string(), money(report.unrealized_pnl)])?;
    wtr.write_record(["Total P&L".to_string(), money(report.total_pnl)])?;
    wtr.write_record([""])?;

    let metrics = &report.trading_metrics;
    wtr.write_record(["Trading Metrics"])?;
    wtr.write_record(["Total Trades".to_string(), metrics.total_trades.to_string()])?;
    wtr.write_record(["Trading Volume".to_string(), money(metrics.trading_volume)])?;
    wtr.write_record(["Buy Volume".to_string(), money(metrics.buy_volume)])?;
    wtr.write_record(["Sell Volume".to_string(), money(metrics.sell_volume)])?;
    wtr.write_record(["Net Flow".to_string(), money(metrics.net_flow)])?;

    if !report.realized_trades.is_empty() {
        wtr.write_record([""])?;
        wtr.write_record(["Realized Trades"])?;
        wtr.write_record(["Date", "Symbol", "Quantity", "Sell Price", "Avg Buy Price", "P&L"])?;
        for trade in &report.realized_trades {
            wtr.write_record([
                trade.timestamp.format("%Y-%m-%d").to_string(),
                trade.symbol.clone(),
                trade.quantity.to_string(),
                money(trade.sell_price),
                money(trade.average_cost),
                money(trade.pnl),
            ])?;
        }
    }
    finish(wtr)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{TradeHistoryEntry, TradeHistorySummary};
    use chrono::{TimeZone, Utc};
    use core_types::{OrderSide, OrderStatus};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    #[test]
    fn money_is_rounded_to_cents() {
        assert_eq!(money(dec!(100)), "$100.00");
        assert_eq!(money(dec!(193.3333333)), "$193.33");
        assert_eq!(money(dec!(-5.005)), "$-5.00");
        assert_eq!(percent(dec!(12.5)), "12.50%");
    }

    #[test]
    fn trade_history_rows() {
        let report = TradeHistoryReport {
            account_id: "a1".to_string(),
            trades: vec![TradeHistoryEntry {
                order_id: Uuid::new_v4(),
                sequence: 1,
                timestamp: Utc.with_ymd_and_hms(2024, 7, 1, 9, 30, 0).unwrap(),
                symbol: "AAPL".to_string(),
                side: OrderSide::Buy,
                quantity: dec!(10),
                price: dec!(190),
                total_value: dec!(1900),
                status: OrderStatus::Executed,
            }],
            summary: TradeHistorySummary::default(),
        };

        let csv = trade_history_csv(&report).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "Date,Time,Symbol,Side,Quantity,Price,Total Value,Status");
        assert_eq!(lines[1], "2024-07-01,09:30:00,AAPL,BUY,10,$190.00,$1900.00,EXECUTED");
    }
}
