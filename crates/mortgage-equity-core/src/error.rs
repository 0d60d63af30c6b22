use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MortgageEquityError {
    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("Convergence failure: {function} did not converge after {iterations} iterations (delta: {last_delta})")]
    ConvergenceFailure {
        function: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Division by zero in {context}")]
    DivisionByZero { context: String },

    #[error("Decimal overflow in {context}")]
    Overflow { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl MortgageEquityError {
    /// True for errors raised while validating inputs, before any solving.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            MortgageEquityError::InvalidInput { .. }
                | MortgageEquityError::FinancialImpossibility(_)
                | MortgageEquityError::SerializationError(_)
        )
    }
}

impl From<serde_json::Error> for MortgageEquityError {
    fn from(e: serde_json::Error) -> Self {
        MortgageEquityError::SerializationError(e.to_string())
    }
}
