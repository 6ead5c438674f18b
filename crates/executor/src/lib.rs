//! # Executor Crate
//!
//! Order execution against a cash-and-holdings ledger.
//!
//! - **Pricing vs. mutation:** an `Executor` only prices an order and returns an
//!   `Execution`. The functions in `portfolio` validate that execution against an
//!   account and apply it. The engine runs the second step on a working copy
//!   and persists the result, so a rejected or failed order never leaves a
//!   partial change behind.
//! - **Validation order:** quantity, price for the order type, symbol (request
//!   level); then shares held for a sell, or cash for a buy (account level).
//!   The first failing rule is reported.

pub mod error;
pub mod exchange;
pub mod portfolio;

pub use error::ExecutorError;
pub use exchange::{Executor, QuoteExecutor};
pub use portfolio::{apply_execution, check_execution, validate_request};
