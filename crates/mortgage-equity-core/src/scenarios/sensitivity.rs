use rayon::prelude::*;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::MortgageEquityError;
use crate::mortgage_equity::cap_rate::{solve_with, SolverSettings, FLAT_KEYS};
use crate::mortgage_equity::debt_terms::derive_terms;
use crate::mortgage_equity::inputs::{normalize, RawCapRateInput};
use crate::types::*;
use crate::MortgageEquityResult;

fn default_metric() -> String {
    "cap_rate".into()
}

/// Input for a one- or two-way cap-rate sensitivity sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityInput {
    /// Base-case raw scenario (flat mapping, percentages as whole numbers)
    pub base_inputs: serde_json::Value,
    /// First variable to sweep, in raw units
    pub variable_1: SensitivityVariable,
    /// Optional second variable; a one-way sweep when absent
    #[serde(default)]
    pub variable_2: Option<SensitivityVariable>,
    /// Key of the flat output mapping to record in each cell
    #[serde(default = "default_metric")]
    pub output_metric: String,
    #[serde(default)]
    pub settings: SolverSettings,
}

/// Output of a sensitivity sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensitivityOutput {
    pub variable_1_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_2_name: Option<String>,
    pub variable_1_values: Vec<Decimal>,
    /// Empty for a one-way sweep
    pub variable_2_values: Vec<Decimal>,
    pub output_metric: String,
    /// matrix[i][j] = metric at variable_1_values[i], variable_2_values[j].
    /// One column for a one-way sweep; `None` where the scenario failed.
    pub matrix: Vec<Vec<Option<Decimal>>>,
    pub base_case_value: Option<Decimal>,
    /// Cell closest to the midpoint of each range (row, col)
    pub base_case_position: (usize, usize),
}

/// Generate the sweep values for a sensitivity variable from min to max with step.
fn generate_sweep_values(var: &SensitivityVariable) -> MortgageEquityResult<Vec<Decimal>> {
    if var.step <= Decimal::ZERO {
        return Err(MortgageEquityError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: "Step must be positive".into(),
        });
    }
    if var.min > var.max {
        return Err(MortgageEquityError::InvalidInput {
            field: format!("variable:{}", var.name),
            reason: "Min must be <= max".into(),
        });
    }

    let mut values = Vec::new();
    let mut current = var.min;
    while current <= var.max {
        values.push(current);
        current += var.step;
    }
    if let Some(&last) = values.last() {
        if last < var.max {
            values.push(var.max);
        }
    }

    Ok(values)
}

/// Find the closest index to a target value in a sorted list.
fn closest_index(values: &[Decimal], target: Decimal) -> usize {
    values
        .iter()
        .enumerate()
        .min_by_key(|(_, v)| (**v - target).abs())
        .map(|(i, _)| i)
        .unwrap_or(0)
}

/// Replace one numeric field of a raw scenario mapping.
///
/// Whole values are written as JSON integers so that year fields still
/// deserialise; fractional values are written as decimal strings.
fn set_field(
    base: &serde_json::Value,
    name: &str,
    value: Decimal,
) -> MortgageEquityResult<serde_json::Value> {
    let mut mapping = base.clone();
    let obj = mapping
        .as_object_mut()
        .ok_or_else(|| MortgageEquityError::InvalidInput {
            field: "base_inputs".into(),
            reason: "Base inputs must be a JSON object".into(),
        })?;

    match obj.get(name) {
        Some(current) if current.is_number() || current.is_string() => {}
        Some(_) => {
            return Err(MortgageEquityError::InvalidInput {
                field: name.into(),
                reason: "Only numeric inputs can be swept".into(),
            })
        }
        None => {
            return Err(MortgageEquityError::InvalidInput {
                field: name.into(),
                reason: "Not a key of the base inputs".into(),
            })
        }
    }

    let json_value = match value.fract().is_zero().then(|| value.to_i64()).flatten() {
        Some(whole) => serde_json::Value::from(whole),
        None => serde_json::Value::String(value.normalize().to_string()),
    };
    obj.insert(name.to_string(), json_value);
    Ok(mapping)
}

/// Run one grid cell: the full pipeline on the base scenario with the swept
/// values substituted.
fn evaluate_cell(
    input: &SensitivityInput,
    v1: Decimal,
    v2: Option<Decimal>,
) -> MortgageEquityResult<Decimal> {
    let mut mapping = set_field(&input.base_inputs, &input.variable_1.name, v1)?;
    if let (Some(var), Some(v2)) = (&input.variable_2, v2) {
        mapping = set_field(&mapping, &var.name, v2)?;
    }

    let raw = RawCapRateInput::from_value(mapping)?;
    let inputs = normalize(&raw)?;
    let terms = derive_terms(&inputs)?;
    let output = solve_with(&inputs, &terms, &input.settings)?;

    output
        .metric(&input.output_metric)
        .ok_or_else(|| MortgageEquityError::InvalidInput {
            field: "output_metric".into(),
            reason: format!("{} is not reported for this scenario", input.output_metric),
        })
}

fn validate_input(input: &SensitivityInput) -> MortgageEquityResult<()> {
    if !FLAT_KEYS.contains(&input.output_metric.as_str()) {
        return Err(MortgageEquityError::InvalidInput {
            field: "output_metric".into(),
            reason: format!("Unknown output metric '{}'", input.output_metric),
        });
    }

    // Surface malformed base scenarios once rather than in every cell
    RawCapRateInput::from_value(input.base_inputs.clone())?;

    set_field(&input.base_inputs, &input.variable_1.name, input.variable_1.min)?;
    if let Some(var) = &input.variable_2 {
        if var.name == input.variable_1.name {
            return Err(MortgageEquityError::InvalidInput {
                field: format!("variable:{}", var.name),
                reason: "Cannot sweep the same input twice".into(),
            });
        }
        set_field(&input.base_inputs, &var.name, var.min)?;
    }
    Ok(())
}

/// Sweep one or two raw inputs over a grid and record an output metric.
///
/// Cells are independent full computations and run in parallel. A cell whose
/// scenario fails is recorded as `None` with a warning naming its inputs.
pub fn cap_rate_sensitivity(
    input: &SensitivityInput,
) -> MortgageEquityResult<ComputationOutput<SensitivityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_input(input)?;

    let v1_values = generate_sweep_values(&input.variable_1)?;
    let v2_values = match &input.variable_2 {
        Some(var) => generate_sweep_values(var)?,
        None => Vec::new(),
    };

    let cells: Vec<(usize, Decimal, Option<Decimal>)> = v1_values
        .iter()
        .enumerate()
        .flat_map(|(row, &v1)| {
            if v2_values.is_empty() {
                vec![(row, v1, None)]
            } else {
                v2_values.iter().map(|&v2| (row, v1, Some(v2))).collect()
            }
        })
        .collect();

    log::debug!(
        "sensitivity sweep of {} over {} cells",
        input.output_metric,
        cells.len()
    );

    let results: Vec<MortgageEquityResult<Decimal>> = cells
        .par_iter()
        .map(|&(_, v1, v2)| evaluate_cell(input, v1, v2))
        .collect();

    let mut matrix: Vec<Vec<Option<Decimal>>> = vec![Vec::new(); v1_values.len()];
    for (&(row, v1, v2), result) in cells.iter().zip(results) {
        match result {
            Ok(value) => matrix[row].push(Some(value)),
            Err(e) => {
                let at = match v2 {
                    Some(v2) => format!("({v1}, {v2})"),
                    None => format!("({v1})"),
                };
                warnings.push(format!("Evaluation failed at {at}: {e}"));
                matrix[row].push(None);
            }
        }
    }

    let mid1 = (input.variable_1.min + input.variable_1.max) / dec!(2);
    let base_row = closest_index(&v1_values, mid1);
    let base_col = match &input.variable_2 {
        Some(var) => closest_index(&v2_values, (var.min + var.max) / dec!(2)),
        None => 0,
    };
    let base_case_value = matrix
        .get(base_row)
        .and_then(|row| row.get(base_col))
        .copied()
        .flatten();

    let output = SensitivityOutput {
        variable_1_name: input.variable_1.name.clone(),
        variable_2_name: input.variable_2.as_ref().map(|v| v.name.clone()),
        variable_1_values: v1_values,
        variable_2_values: v2_values,
        output_metric: input.output_metric.clone(),
        matrix,
        base_case_value,
        base_case_position: (base_row, base_col),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    let methodology = if input.variable_2.is_some() {
        "2-Way Cap Rate Sensitivity Analysis"
    } else {
        "1-Way Cap Rate Sensitivity Analysis"
    };
    Ok(with_metadata(
        methodology,
        &serde_json::json!({
            "variable_1": input.variable_1.name,
            "variable_2": input.variable_2.as_ref().map(|v| v.name.clone()),
            "output_metric": input.output_metric,
            "base_inputs": input.base_inputs,
        }),
        warnings,
        elapsed,
        output,
    ))
}
