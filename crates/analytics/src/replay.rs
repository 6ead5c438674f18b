use crate::error::AnalyticsError;
use crate::report::RealizedTrade;
use core_types::{OrderRecord, OrderSide, OrderStatus, Position};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Rebuilds an account's ledger from its order log.
///
/// Records are fed in sequence order. Buys go through `Position::add_fill` and
/// sells through `Position::reduce`, the same arithmetic the live ledger uses,
/// so the running average of every symbol equals the stored average cost at
/// the same point of the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerReplay {
    pub cash: Decimal,
    pub positions: BTreeMap<String, Position>,
    pub order_count: u64,
    pub realized_pnl: Decimal,
    pub realized_trades: Vec<RealizedTrade>,
}

impl LedgerReplay {
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            cash: starting_cash,
            positions: BTreeMap::new(),
            order_count: 0,
            realized_pnl: Decimal::ZERO,
            realized_trades: Vec::new(),
        }
    }

    /// Replays a full log from `starting_cash`.
    pub fn run(starting_cash: Decimal, orders: &[OrderRecord]) -> Result<Self, AnalyticsError> {
        let mut replay = Self::new(starting_cash);
        for order in orders {
            replay.apply(order)?;
        }
        Ok(replay)
    }

    /// Applies the next record of the log. Records that did not execute are
    /// skipped.
    pub fn apply(&mut self, order: &OrderRecord) -> Result<(), AnalyticsError> {
        if order.status != OrderStatus::Executed {
            return Ok(());
        }
        if order.sequence != self.order_count + 1 {
            return Err(AnalyticsError::InconsistentLog(format!(
                "expected sequence {}, found {} (order {})",
                self.order_count + 1,
                order.sequence,
                order.order_id
            )));
        }

        let overflow = || {
            AnalyticsError::InconsistentLog(format!("order {} overflows the ledger", order.sequence))
        };
        let notional = order.quantity.checked_mul(order.executed_price).ok_or_else(overflow)?;
        match order.side {
            OrderSide::Buy => {
                let cash = self.cash.checked_sub(notional).ok_or_else(overflow)?;
                match self.positions.get_mut(&order.symbol) {
                    Some(position) => position.add_fill(order.quantity, order.executed_price)?,
                    None => {
                        self.positions.insert(
                            order.symbol.clone(),
                            Position::open(order.symbol.clone(), order.quantity, order.executed_price),
                        );
                    }
                }
                self.cash = cash;
            }
            OrderSide::Sell => {
                let position = self.positions.get_mut(&order.symbol).ok_or_else(|| {
                    AnalyticsError::InconsistentLog(format!(
                        "sell of {} at sequence {} without a position",
                        order.symbol, order.sequence
                    ))
                })?;

                let average_cost = position.average_cost;
                let pnl = (order.executed_price - average_cost)
                    .checked_mul(order.quantity)
                    .ok_or_else(overflow)?;
                let cash = self.cash.checked_add(notional).ok_or_else(overflow)?;
                let realized_pnl = self.realized_pnl.checked_add(pnl).ok_or_else(overflow)?;
                if position.reduce(order.quantity)?.is_zero() {
                    self.positions.remove(&order.symbol);
                }

                self.cash = cash;
                self.realized_pnl = realized_pnl;
                self.realized_trades.push(RealizedTrade {
                    sequence: order.sequence,
                    symbol: order.symbol.clone(),
                    quantity: order.quantity,
                    sell_price: order.executed_price,
                    average_cost,
                    pnl,
                    timestamp: order.timestamp,
                });
            }
        }
        self.order_count = order.sequence;
        Ok(())
    }

    /// Running average cost of `symbol`, if held.
    pub fn average_cost(&self, symbol: &str) -> Option<Decimal> {
        self.positions.get(symbol).map(|p| p.average_cost)
    }

    /// Realized P&L per symbol over the whole replay.
    pub fn realized_by_symbol(&self) -> BTreeMap<String, Decimal> {
        let mut by_symbol = BTreeMap::new();
        for trade in &self.realized_trades {
            *by_symbol.entry(trade.symbol.clone()).or_insert(Decimal::ZERO) += trade.pnl;
        }
        by_symbol
    }
}
