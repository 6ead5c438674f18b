use crate::error::ExecutorError;
use crate::portfolio::validate_request;
use async_trait::async_trait;
use chrono::Utc;
use core_types::{Execution, OrderRequest};
use price_oracle::PriceOracle;
use std::sync::Arc;
use uuid::Uuid;

/// Turns an accepted order into a priced fill.
///
/// An executor never touches the account; the caller applies the returned
/// `Execution` to the ledger.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, order: &OrderRequest) -> Result<Execution, ExecutorError>;
}

/// Fills every order immediately and in full.
///
/// The execution price is the order's own price when one was supplied (always
/// the case for limit orders), otherwise the oracle's current quote.
pub struct QuoteExecutor {
    oracle: Arc<dyn PriceOracle>,
}

impl QuoteExecutor {
    pub fn new(oracle: Arc<dyn PriceOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl Executor for QuoteExecutor {
    async fn execute(&self, order: &OrderRequest) -> Result<Execution, ExecutorError> {
        let order = validate_request(order)?;

        let price = match order.price {
            Some(price) => price,
            None => self.oracle.current_price(&order.symbol).await,
        };
        tracing::debug!(
            symbol = %order.symbol,
            side = %order.side,
            %price,
            supplied = order.price.is_some(),
            "Resolved execution price."
        );

        Ok(Execution {
            order_id: Uuid::new_v4(),
            account_id: order.account_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            quantity: order.quantity,
            price,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::Pricing;
    use core_types::OrderSide;
    use price_oracle::FallbackPriceOracle;
    use rust_decimal_macros::dec;

    fn executor() -> QuoteExecutor {
        QuoteExecutor::new(Arc::new(FallbackPriceOracle::from_settings(&Pricing::default())))
    }

    #[tokio::test]
    async fn market_order_takes_the_oracle_quote() {
        let order = OrderRequest::market("a1", "aapl", OrderSide::Buy, dec!(3));
        let execution = executor().execute(&order).await.unwrap();
        assert_eq!(execution.symbol, "AAPL");
        assert_eq!(execution.price, dec!(220));
        assert_eq!(execution.notional(), Some(dec!(660)));
    }

    #[tokio::test]
    async fn supplied_price_is_used_as_is() {
        let order = OrderRequest::limit("a1", "AAPL", OrderSide::Sell, dec!(1), dec!(199.99));
        let execution = executor().execute(&order).await.unwrap();
        assert_eq!(execution.price, dec!(199.99));
    }

    #[tokio::test]
    async fn invalid_orders_are_not_priced() {
        let order = OrderRequest::market("a1", "AAPL", OrderSide::Buy, dec!(0));
        let err = executor().execute(&order).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Validation(_)));
    }
}
