use thiserror::Error;

#[derive(Debug, Error)]
pub enum TradeUpError {
    #[error("Invalid input for {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    /// A contract violation inside the engine (negative principal reaching
    /// the amortization formulas, a zero-length cycle, ...).
    #[error("Internal invariant violated: {context}")]
    InternalInvariant { context: String },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl TradeUpError {
    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        TradeUpError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn internal(context: impl Into<String>) -> Self {
        TradeUpError::InternalInvariant {
            context: context.into(),
        }
    }
}

impl From<serde_json::Error> for TradeUpError {
    fn from(e: serde_json::Error) -> Self {
        TradeUpError::SerializationError(e.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for TradeUpError {
    fn from(e: rayon::ThreadPoolBuildError) -> Self {
        TradeUpError::WorkerPool(e.to_string())
    }
}
