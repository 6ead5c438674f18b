use core_types::CoreError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Invalid order: {0}")]
    Validation(String),

    #[error("Insufficient funds. Required: {required}, Available: {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Insufficient shares of {symbol}. Held: {held}, Requested: {requested}")]
    InsufficientShares {
        symbol: String,
        held: Decimal,
        requested: Decimal,
    },

    #[error("An unexpected ledger state was encountered: {0}")]
    LedgerError(String),
}

impl From<CoreError> for ExecutorError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidInput(field, reason) => {
                ExecutorError::Validation(format!("{}: {}", field, reason))
            }
            CoreError::Invariant(msg) => ExecutorError::LedgerError(msg),
        }
    }
}
