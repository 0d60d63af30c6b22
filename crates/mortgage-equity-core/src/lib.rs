pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "mortgage_equity")]
pub mod mortgage_equity;

#[cfg(feature = "scenarios")]
pub mod scenarios;

pub use error::MortgageEquityError;
pub use types::*;

pub type MortgageEquityResult<T> = Result<T, MortgageEquityError>;
