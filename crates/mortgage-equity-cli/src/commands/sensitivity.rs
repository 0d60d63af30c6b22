use clap::Args;
use serde_json::Value;

use mortgage_equity_core::scenarios::sensitivity::{cap_rate_sensitivity, SensitivityInput};
use mortgage_equity_core::SensitivityVariable;

use crate::commands::cap_rate::SolverArgs;
use crate::input;

/// Arguments for a cap-rate sensitivity sweep
#[derive(Args)]
pub struct SensitivityArgs {
    /// Path to JSON file with the base-case scenario
    #[arg(long)]
    pub input: Option<String>,

    /// First sensitivity variable in format name:min:max:step, raw units
    /// (e.g. "cash_on_cash:6:14:1")
    #[arg(long)]
    pub var1: String,

    /// Second sensitivity variable (optional, creates a 2D table)
    #[arg(long)]
    pub var2: Option<String>,

    /// Output metric to tabulate (any key of the flat output)
    #[arg(long, default_value = "cap_rate")]
    pub metric: String,

    #[command(flatten)]
    pub solver: SolverArgs,
}

fn parse_sens_var(arg: &str) -> Result<SensitivityVariable, Box<dyn std::error::Error>> {
    let parts: Vec<&str> = arg.split(':').collect();
    if parts.len() != 4 {
        return Err(format!(
            "Sensitivity variable must be name:min:max:step, got '{}'",
            arg
        )
        .into());
    }
    Ok(SensitivityVariable {
        name: parts[0].to_string(),
        min: parts[1].parse()?,
        max: parts[2].parse()?,
        step: parts[3].parse()?,
    })
}

pub fn run_sensitivity(args: SensitivityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let input = SensitivityInput {
        base_inputs: input::read_scenario(args.input.as_deref(), "sensitivity")?,
        variable_1: parse_sens_var(&args.var1)?,
        variable_2: args.var2.as_deref().map(parse_sens_var).transpose()?,
        output_metric: args.metric,
        settings: args.solver.settings()?,
    };

    let result = cap_rate_sensitivity(&input)?;
    Ok(serde_json::to_value(result)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_parse_sens_var() {
        let var = parse_sens_var("interest:4.5:6:0.5").unwrap();
        assert_eq!(var.name, "interest");
        assert_eq!(var.min, Decimal::new(45, 1));
        assert_eq!(var.max, Decimal::from(6));
        assert_eq!(var.step, Decimal::new(5, 1));
    }

    #[test]
    fn test_parse_sens_var_rejects_bad_format() {
        assert!(parse_sens_var("interest:4.5:6").is_err());
        assert!(parse_sens_var("interest:a:6:1").is_err());
    }
}
