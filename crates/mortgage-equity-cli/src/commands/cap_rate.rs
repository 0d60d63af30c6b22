use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use mortgage_equity_core::mortgage_equity::{
    calculate_cap_rate_with, calculate_terms, RawCapRateInput, SolverSettings,
};

use crate::input;

/// Arguments for the cap-rate solve
#[derive(Args)]
pub struct CapRateArgs {
    /// Path to JSON input file (flat scenario mapping)
    #[arg(long)]
    pub input: Option<String>,

    /// Print only the flat name-to-value mapping
    #[arg(long)]
    pub flat: bool,

    #[command(flatten)]
    pub solver: SolverArgs,
}

/// Arguments for deriving debt terms
#[derive(Args)]
pub struct TermsArgs {
    /// Path to JSON input file (flat scenario mapping)
    #[arg(long)]
    pub input: Option<String>,
}

/// Overrides for the equity-yield Newton solve
#[derive(Args)]
pub struct SolverArgs {
    /// Residual at which the equity yield is accepted (default 0.000001)
    #[arg(long)]
    pub tolerance: Option<Decimal>,

    /// Maximum Newton iterations (default 100)
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

impl SolverArgs {
    pub fn settings(&self) -> Result<SolverSettings, Box<dyn std::error::Error>> {
        let defaults = SolverSettings::default();
        let settings = SolverSettings {
            tolerance: self.tolerance.unwrap_or(defaults.tolerance),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
        };
        if settings.tolerance <= Decimal::ZERO {
            return Err("--tolerance must be positive".into());
        }
        if settings.max_iterations == 0 {
            return Err("--max-iterations must be at least 1".into());
        }
        Ok(settings)
    }
}

pub fn run_cap_rate(args: CapRateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let settings = args.solver.settings()?;
    let raw = RawCapRateInput::from_value(input::read_scenario(args.input.as_deref(), "cap-rate")?)?;
    let result = calculate_cap_rate_with(&raw, &settings)?;

    if args.flat {
        return Ok(serde_json::to_value(result.result.output.to_flat_map())?);
    }
    Ok(serde_json::to_value(result)?)
}

pub fn run_terms(args: TermsArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let raw = RawCapRateInput::from_value(input::read_scenario(args.input.as_deref(), "terms")?)?;
    let result = calculate_terms(&raw)?;
    Ok(serde_json::to_value(result)?)
}
