use crate::enums::{AccountKind, OrderSide, OrderStatus, OrderType};
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A long holding in a single symbol with a weighted-average cost basis.
///
/// Both the live ledger and the order-log replay drive their cost basis through
/// this type, so the two paths perform identical decimal operations in
/// identical order and agree exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    /// Always strictly positive while the position exists.
    pub quantity: Decimal,
    /// Cost per unit. Changes only on buy fills.
    pub average_cost: Decimal,
}

impl Position {
    /// Opens a position from a first buy fill.
    pub fn open(symbol: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            average_cost: price,
        }
    }

    /// Adds a buy fill, recomputing the quantity-weighted average cost.
    ///
    /// Fails without touching the position when the combined value or
    /// quantity no longer fits in a `Decimal`.
    pub fn add_fill(&mut self, quantity: Decimal, price: Decimal) -> Result<(), CoreError> {
        let overflow = || {
            CoreError::InvalidInput(
                "quantity".to_string(),
                format!("position in {} would exceed the representable value", self.symbol),
            )
        };
        let existing_value = self.average_cost.checked_mul(self.quantity).ok_or_else(overflow)?;
        let new_value = price.checked_mul(quantity).ok_or_else(overflow)?;
        let total_value = existing_value.checked_add(new_value).ok_or_else(overflow)?;
        let total_quantity = self.quantity.checked_add(quantity).ok_or_else(overflow)?;

        if !total_quantity.is_zero() {
            self.average_cost = total_value.checked_div(total_quantity).ok_or_else(overflow)?;
        }
        self.quantity = total_quantity;
        Ok(())
    }

    /// Removes `quantity` units at the current average cost and returns the
    /// quantity left. The average cost itself is not touched.
    pub fn reduce(&mut self, quantity: Decimal) -> Result<Decimal, CoreError> {
        if quantity > self.quantity {
            return Err(CoreError::Invariant(format!(
                "cannot remove {} {} from a position of {}",
                quantity, self.symbol, self.quantity
            )));
        }
        self.quantity -= quantity;
        Ok(self.quantity)
    }

    /// Total cost of the units currently held.
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.average_cost
    }
}

/// The mutable cash-and-holdings state of one account. It is a cache of the
/// order log: replaying every executed order from `starting_cash` reproduces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub kind: AccountKind,
    pub cash: Decimal,
    pub starting_cash: Decimal,
    pub positions: BTreeMap<String, Position>,
    /// Number of executed orders; the next order gets `order_count + 1`.
    pub order_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(account_id: impl Into<String>, kind: AccountKind, starting_cash: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            kind,
            cash: starting_cash,
            starting_cash,
            positions: BTreeMap::new(),
            order_count: 0,
            created_at: Utc::now(),
        }
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Quantity held for `symbol`, zero when there is no position.
    pub fn held_quantity(&self, symbol: &str) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.quantity)
            .unwrap_or(Decimal::ZERO)
    }
}

/// A fully typed order as accepted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Explicit execution price. Required for limit orders; when absent the
    /// price oracle supplies the quote.
    pub price: Option<Decimal>,
    pub order_type: OrderType,
}

impl OrderRequest {
    pub fn market(
        account_id: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            symbol: normalize_symbol(&symbol.into()),
            side,
            quantity,
            price: None,
            order_type: OrderType::Market,
        }
    }

    pub fn limit(
        account_id: impl Into<String>,
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            symbol: normalize_symbol(&symbol.into()),
            side,
            quantity,
            price: Some(price),
            order_type: OrderType::Limit,
        }
    }
}

/// An order as it arrives from the request layer, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTicket {
    pub account_id: String,
    pub symbol: String,
    pub side: String,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub order_type: Option<String>,
}

impl OrderTicket {
    /// Parses the ticket into a typed request. Checks run in a fixed order and
    /// the first failure wins: quantity, side, order type, then price.
    pub fn into_request(self) -> Result<OrderRequest, CoreError> {
        if self.quantity <= Decimal::ZERO {
            return Err(CoreError::InvalidInput(
                "quantity".to_string(),
                "quantity must be positive".to_string(),
            ));
        }
        let side: OrderSide = self.side.parse()?;
        let order_type: OrderType = match self.order_type.as_deref() {
            Some(raw) => raw.parse()?,
            None => OrderType::Market,
        };
        check_price(order_type, self.price)?;

        let symbol = normalize_symbol(&self.symbol);
        if symbol.is_empty() {
            return Err(CoreError::InvalidInput(
                "symbol".to_string(),
                "symbol must not be empty".to_string(),
            ));
        }

        Ok(OrderRequest {
            account_id: self.account_id,
            symbol,
            side,
            quantity: self.quantity,
            price: self.price,
            order_type,
        })
    }
}

/// Limit orders need a positive price; a price supplied on a market order
/// must be positive as well.
pub fn check_price(order_type: OrderType, price: Option<Decimal>) -> Result<(), CoreError> {
    match (order_type, price) {
        (OrderType::Limit, None) => Err(CoreError::InvalidInput(
            "price".to_string(),
            "limit orders must have a positive price".to_string(),
        )),
        (_, Some(p)) if p <= Decimal::ZERO => Err(CoreError::InvalidInput(
            "price".to_string(),
            format!("price must be positive, got {}", p),
        )),
        _ => Ok(()),
    }
}

/// Symbols are stored upper case without surrounding whitespace.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

/// The priced fill of an order, produced before the ledger is touched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Execution {
    pub order_id: Uuid,
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Execution {
    /// Cash moved by this fill, or `None` when it does not fit in a `Decimal`.
    pub fn notional(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.price)
    }
}

/// One immutable entry of an account's append-only order log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub order_id: Uuid,
    pub account_id: String,
    /// 1-based position in the account's log.
    pub sequence: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub executed_price: Decimal,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
}

impl OrderRecord {
    pub fn executed(execution: &Execution, sequence: u64) -> Self {
        Self {
            order_id: execution.order_id,
            account_id: execution.account_id.clone(),
            sequence,
            symbol: execution.symbol.clone(),
            side: execution.side,
            quantity: execution.quantity,
            executed_price: execution.price,
            order_type: execution.order_type,
            status: OrderStatus::Executed,
            timestamp: execution.timestamp,
        }
    }

    /// Cash moved by the fill. Every committed record passed the overflow
    /// check at execution time; a tampered row saturates instead of panicking.
    pub fn total_value(&self) -> Decimal {
        self.quantity.saturating_mul(self.executed_price)
    }
}

/// What the caller gets back from a successful order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub executed_price: Decimal,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub cash_after: Decimal,
}
