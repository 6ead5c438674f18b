use crate::error::AnalyticsError;
use crate::report::{PortfolioReport, PositionReport};
use chrono::Utc;
use core_types::Account;
use rust_decimal::Decimal;
use std::collections::HashMap;

pub(crate) fn percent_of(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        Decimal::ZERO
    } else {
        part / whole * Decimal::ONE_HUNDRED
    }
}

/// Looks up the current price of every held symbol.
pub(crate) fn price_of(prices: &HashMap<String, Decimal>, symbol: &str) -> Result<Decimal, AnalyticsError> {
    prices
        .get(symbol)
        .copied()
        .ok_or_else(|| AnalyticsError::MissingPrice(symbol.to_string()))
}

/// A stateless calculator for live valuations.
#[derive(Debug, Default)]
pub struct ValuationEngine {}

impl ValuationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values an account snapshot at the supplied prices.
    ///
    /// # Arguments
    ///
    /// * `account` - The ledger snapshot.
    /// * `prices` - Current price per held symbol. Every held symbol must be present.
    /// * `realized_pnl` - Realized P&L from a replay of the account's order log.
    pub fn value(
        &self,
        account: &Account,
        prices: &HashMap<String, Decimal>,
        realized_pnl: Decimal,
    ) -> Result<PortfolioReport, AnalyticsError> {
        let mut positions = Vec::with_capacity(account.positions.len());
        let mut portfolio_value = Decimal::ZERO;
        let mut unrealized_pnl = Decimal::ZERO;

        for position in account.positions.values() {
            let current_price = price_of(prices, &position.symbol)?;
            let cost_basis = position.cost_basis();
            let market_value = position.quantity * current_price;
            let pnl = (current_price - position.average_cost) * position.quantity;

            positions.push(PositionReport {
                symbol: position.symbol.clone(),
                quantity: position.quantity,
                average_cost: position.average_cost,
                current_price,
                cost_basis,
                market_value,
                unrealized_pnl: pnl,
                unrealized_pnl_percent: percent_of(pnl, cost_basis),
                weight_percent: Decimal::ZERO,
            });
            portfolio_value += market_value;
            unrealized_pnl += pnl;
        }

        // Weights need the total first.
        for position in &mut positions {
            position.weight_percent = percent_of(position.market_value, portfolio_value);
        }

        let total_value = account.cash + portfolio_value;
        let total_return = total_value - account.starting_cash;

        let largest_position = positions
            .iter()
            .max_by_key(|p| p.market_value)
            .map(|p| p.symbol.clone());
        let best_performer = positions
            .iter()
            .max_by_key(|p| p.unrealized_pnl_percent)
            .map(|p| p.symbol.clone());
        let worst_performer = positions
            .iter()
            .min_by_key(|p| p.unrealized_pnl_percent)
            .map(|p| p.symbol.clone());

        Ok(PortfolioReport {
            account_id: account.account_id.clone(),
            total_value,
            cash: account.cash,
            portfolio_value,
            starting_value: account.starting_cash,
            total_return,
            total_return_percent: percent_of(total_return, account.starting_cash),
            realized_pnl,
            unrealized_pnl,
            total_pnl: realized_pnl + unrealized_pnl,
            positions,
            largest_position,
            best_performer,
            worst_performer,
            generated_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{AccountKind, Position};
    use rust_decimal_macros::dec;

    fn account() -> Account {
        let mut account = Account::new("a1", AccountKind::Paper, dec!(10000));
        account.cash = dec!(6000);
        account
            .positions
            .insert("AAPL".to_string(), Position::open("AAPL", dec!(10), dec!(200)));
        account
            .positions
            .insert("IBM".to_string(), Position::open("IBM", dec!(20), dec!(100)));
        account
    }

    fn prices() -> HashMap<String, Decimal> {
        HashMap::from([("AAPL".to_string(), dec!(220)), ("IBM".to_string(), dec!(90))])
    }

    #[test]
    fn values_positions_and_totals() {
        let report = ValuationEngine::new().value(&account(), &prices(), dec!(50)).unwrap();

        assert_eq!(report.portfolio_value, dec!(4000));
        assert_eq!(report.total_value, dec!(10000));
        assert_eq!(report.total_return, Decimal::ZERO);
        assert_eq!(report.unrealized_pnl, dec!(0));
        assert_eq!(report.total_pnl, dec!(50));

        let aapl = &report.positions[0];
        assert_eq!(aapl.unrealized_pnl, dec!(200));
        assert_eq!(aapl.unrealized_pnl_percent, dec!(10));
        assert_eq!(aapl.weight_percent, dec!(55));

        assert_eq!(report.largest_position.as_deref(), Some("AAPL"));
        assert_eq!(report.best_performer.as_deref(), Some("AAPL"));
        assert_eq!(report.worst_performer.as_deref(), Some("IBM"));
    }

    #[test]
    fn empty_account_has_zero_weights_and_no_leaders() {
        let account = Account::new("a1", AccountKind::Live, dec!(10000));
        let report = ValuationEngine::new().value(&account, &HashMap::new(), Decimal::ZERO).unwrap();
        assert_eq!(report.total_value, dec!(10000));
        assert!(report.positions.is_empty());
        assert!(report.largest_position.is_none());
    }

    #[test]
    fn missing_price_is_an_error() {
        let err = ValuationEngine::new().value(&account(), &HashMap::new(), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, AnalyticsError::MissingPrice(s) if s == "AAPL"));
    }
}
