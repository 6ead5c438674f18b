use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("No market price supplied for symbol: {0}")]
    MissingPrice(String),

    #[error("Order log is inconsistent: {0}")]
    InconsistentLog(String),

    #[error("Unknown performance period: {0}")]
    UnknownPeriod(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to finalise export: {0}")]
    Export(String),
}

impl From<core_types::CoreError> for AnalyticsError {
    fn from(err: core_types::CoreError) -> Self {
        AnalyticsError::InconsistentLog(err.to_string())
    }
}
