use executor::ExecutorError;
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
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

    #[error("Account '{0}' not found.")]
    AccountNotFound(String),

    #[error("Persistence failure: {0}")]
    Persistence(#[from] database::DbError),

    #[error("Ledger state error: {0}")]
    Ledger(String),

    #[error("Report error: {0}")]
    Report(#[from] analytics::AnalyticsError),
}

impl EngineError {
    /// Whether the caller caused the failure. Rejections are final and must
    /// not be retried; everything else is an infrastructure or state problem.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            EngineError::Validation(_)
                | EngineError::InsufficientFunds { .. }
                | EngineError::InsufficientShares { .. }
                | EngineError::AccountNotFound(_)
        )
    }
}

impl From<ExecutorError> for EngineError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Validation(msg) => EngineError::Validation(msg),
            ExecutorError::InsufficientFunds { required, available } => {
                EngineError::InsufficientFunds { required, available }
            }
            ExecutorError::InsufficientShares {
                symbol,
                held,
                requested,
            } => EngineError::InsufficientShares {
                symbol,
                held,
                requested,
            },
            ExecutorError::LedgerError(msg) => EngineError::Ledger(msg),
        }
    }
}

impl From<core_types::CoreError> for EngineError {
    fn from(err: core_types::CoreError) -> Self {
        EngineError::from(ExecutorError::from(err))
    }
}
