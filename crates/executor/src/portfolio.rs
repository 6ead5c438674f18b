use crate::error::ExecutorError;
use core_types::{check_price, normalize_symbol, Account, Execution, OrderRequest, OrderSide, Position};
use rust_decimal::Decimal;

/// Request-level checks that need neither the account nor a price:
/// positive quantity, a usable price for the order type, a non-empty symbol
/// and account id.
///
/// Returns the request with its symbol normalized, which is the form every
/// later stage keys positions by.
pub fn validate_request(order: &OrderRequest) -> Result<OrderRequest, ExecutorError> {
    if order.quantity <= Decimal::ZERO {
        return Err(ExecutorError::Validation(format!(
            "quantity must be positive, got {}",
            order.quantity
        )));
    }
    check_price(order.order_type, order.price)?;

    let symbol = normalize_symbol(&order.symbol);
    if symbol.is_empty() {
        return Err(ExecutorError::Validation("symbol must not be empty".to_string()));
    }
    if order.account_id.trim().is_empty() {
        return Err(ExecutorError::Validation("account id must not be empty".to_string()));
    }

    Ok(OrderRequest {
        symbol,
        ..order.clone()
    })
}

fn value_of(execution: &Execution) -> Result<Decimal, ExecutorError> {
    execution.notional().ok_or_else(|| {
        ExecutorError::Validation(format!(
            "order value of {} {} at {} is too large",
            execution.quantity, execution.symbol, execution.price
        ))
    })
}

fn too_large(what: &str) -> ExecutorError {
    ExecutorError::Validation(format!("{} would exceed the representable value", what))
}

/// Checks a priced fill against the account. A sell must be covered by the
/// position, a buy by the cash balance. An order whose value does not fit in
/// a `Decimal` is rejected as invalid.
pub fn check_execution(account: &Account, execution: &Execution) -> Result<(), ExecutorError> {
    let notional = value_of(execution)?;
    match execution.side {
        OrderSide::Sell => {
            let held = account.held_quantity(&execution.symbol);
            if held < execution.quantity {
                return Err(ExecutorError::InsufficientShares {
                    symbol: execution.symbol.clone(),
                    held,
                    requested: execution.quantity,
                });
            }
            account.cash.checked_add(notional).ok_or_else(|| too_large("cash balance"))?;
        }
        OrderSide::Buy => {
            if account.cash < notional {
                return Err(ExecutorError::InsufficientFunds {
                    required: notional,
                    available: account.cash,
                });
            }
        }
    }
    Ok(())
}

/// Applies a fill to the account: cash, position and order counter.
///
/// Every new value is computed before the first write, so on error the
/// account is untouched. On success the new order count is the sequence
/// number of the fill's log record.
pub fn apply_execution(account: &mut Account, execution: &Execution) -> Result<u64, ExecutorError> {
    check_execution(account, execution)?;

    let notional = value_of(execution)?;
    let symbol = &execution.symbol;
    let order_count = account.order_count.checked_add(1).ok_or_else(|| too_large("order count"))?;

    match execution.side {
        OrderSide::Buy => {
            let position = match account.positions.get(symbol) {
                Some(existing) => {
                    let mut position = existing.clone();
                    position.add_fill(execution.quantity, execution.price)?;
                    position
                }
                None => Position::open(symbol.clone(), execution.quantity, execution.price),
            };
            account.cash -= notional;
            account.positions.insert(symbol.clone(), position);
        }
        OrderSide::Sell => {
            let cash = account.cash.checked_add(notional).ok_or_else(|| too_large("cash balance"))?;
            let position = account.positions.get_mut(symbol).ok_or_else(|| {
                ExecutorError::LedgerError(format!("no position for {} after validation", symbol))
            })?;
            let remaining = position.reduce(execution.quantity)?;
            if remaining.is_zero() {
                account.positions.remove(symbol);
            }
            account.cash = cash;
        }
    }

    account.order_count = order_count;
    tracing::debug!(
        account_id = %account.account_id,
        %symbol,
        cash = %account.cash,
        held = %account.held_quantity(symbol),
        "Applied execution to ledger."
    );
    Ok(account.order_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use core_types::{AccountKind, OrderType};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn fill(side: OrderSide, symbol: &str, quantity: Decimal, price: Decimal) -> Execution {
        Execution {
            order_id: Uuid::new_v4(),
            account_id: "a1".to_string(),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
            price,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn buys_average_and_full_sell_removes_position() {
        let mut account = Account::new("a1", AccountKind::Paper, dec!(10000));

        apply_execution(&mut account, &fill(OrderSide::Buy, "AAPL", dec!(10), dec!(190))).unwrap();
        assert_eq!(account.cash, dec!(8100));

        let seq = apply_execution(&mut account, &fill(OrderSide::Buy, "AAPL", dec!(5), dec!(200))).unwrap();
        assert_eq!(seq, 2);
        let position = account.position("AAPL").unwrap();
        assert_eq!(position.quantity, dec!(15));
        assert_eq!(position.average_cost.round_dp(2), dec!(193.33));
        assert_eq!(account.cash, dec!(7100));

        apply_execution(&mut account, &fill(OrderSide::Sell, "AAPL", dec!(15), dec!(210))).unwrap();
        assert!(account.position("AAPL").is_none());
        assert_eq!(account.cash, dec!(10250));
        assert_eq!(account.order_count, 3);
    }

    #[test]
    fn partial_sell_keeps_average_cost() {
        let mut account = Account::new("a1", AccountKind::Paper, dec!(1000));
        apply_execution(&mut account, &fill(OrderSide::Buy, "IBM", dec!(4), dec!(100))).unwrap();
        apply_execution(&mut account, &fill(OrderSide::Sell, "IBM", dec!(1), dec!(150))).unwrap();

        let position = account.position("IBM").unwrap();
        assert_eq!(position.quantity, dec!(3));
        assert_eq!(position.average_cost, dec!(100));
        assert_eq!(account.cash, dec!(750));
    }

    #[test]
    fn selling_without_a_position_is_rejected_untouched() {
        let mut account = Account::new("a1", AccountKind::Paper, dec!(1000));
        let before = account.clone();

        let err = apply_execution(&mut account, &fill(OrderSide::Sell, "TSLA", dec!(1), dec!(250))).unwrap_err();
        assert_eq!(
            err,
            ExecutorError::InsufficientShares {
                symbol: "TSLA".to_string(),
                held: Decimal::ZERO,
                requested: dec!(1),
            }
        );
        assert_eq!(account, before);
    }

    #[test]
    fn buying_beyond_cash_is_rejected_untouched() {
        let mut account = Account::new("a1", AccountKind::Paper, dec!(1000));
        let before = account.clone();

        let err = apply_execution(&mut account, &fill(OrderSide::Buy, "MSFT", dec!(100), dec!(500))).unwrap_err();
        assert_eq!(
            err,
            ExecutorError::InsufficientFunds {
                required: dec!(50000),
                available: dec!(1000),
            }
        );
        assert_eq!(account, before);
    }

    #[test]
    fn spending_exactly_all_cash_is_allowed() {
        let mut account = Account::new("a1", AccountKind::Paper, dec!(1000));
        apply_execution(&mut account, &fill(OrderSide::Buy, "UL", dec!(20), dec!(50))).unwrap();
        assert_eq!(account.cash, Decimal::ZERO);
    }

    #[test]
    fn request_checks_run_in_order() {
        let mut order = OrderRequest::limit("a1", "AAPL", OrderSide::Buy, dec!(-1), dec!(0));
        let err = validate_request(&order).unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(msg) if msg.contains("quantity")));

        order.quantity = dec!(1);
        let err = validate_request(&order).unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(msg) if msg.contains("price")));

        order.price = Some(dec!(10));
        order.symbol = "  ".to_string();
        let err = validate_request(&order).unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(msg) if msg.contains("symbol")));

        order.symbol = "AAPL".to_string();
        order.account_id = " ".to_string();
        let err = validate_request(&order).unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(msg) if msg.contains("account id")));
    }

    #[test]
    fn accepted_requests_carry_a_normalized_symbol() {
        let mut order = OrderRequest::market("a1", "AAPL", OrderSide::Buy, dec!(1));
        order.symbol = " aapl".to_string();
        assert_eq!(validate_request(&order).unwrap().symbol, "AAPL");
    }

    #[test]
    fn oversized_orders_are_rejected_untouched() {
        let mut account = Account::new("a1", AccountKind::Paper, dec!(1000));
        let before = account.clone();

        let err = apply_execution(&mut account, &fill(OrderSide::Buy, "AAPL", Decimal::MAX, dec!(2))).unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(msg) if msg.contains("too large")));
        assert_eq!(account, before);

        // The sell is covered by the position but its proceeds overflow the cash balance.
        account.cash = Decimal::MAX;
        apply_execution(&mut account, &fill(OrderSide::Buy, "UL", dec!(1), dec!(1))).unwrap();
        let before = account.clone();
        let err = apply_execution(&mut account, &fill(OrderSide::Sell, "UL", dec!(1), dec!(10))).unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(_)));
        assert_eq!(account, before);
    }
}
