pub mod cap_rate;
pub mod capital_structure;
pub mod debt_terms;
pub mod inputs;
pub mod sinking_fund;

pub use cap_rate::{
    calculate_cap_rate, calculate_cap_rate_with, solve, solve_with, CapRateAnalysis,
    CapRateOutput, SolverSettings, FLAT_KEYS,
};
pub use debt_terms::{calculate_terms, derive_terms, DerivedTerms, LoanTerms};
pub use inputs::{normalize, CapRateInputs, RawCapRateInput};
