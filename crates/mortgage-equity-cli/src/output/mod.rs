pub mod csv_out;
pub mod minimal;
pub mod table;

use crate::OutputFormat;
use serde_json::Value;

/// Dispatch output to the appropriate formatter.
pub fn format_output(format: &OutputFormat, value: &Value) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table => table::print_table(value),
        OutputFormat::Csv => csv_out::print_csv(value),
        OutputFormat::Minimal => minimal::print_minimal(value),
    }
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("JSON serialization error: {}", e),
    }
}

/// Flatten nested objects into dotted keys (`output.cap_rate`). Arrays and
/// scalars are kept as leaves.
pub fn flatten(value: &Value) -> Vec<(String, Value)> {
    let mut fields = Vec::new();
    flatten_into("", value, &mut fields);
    fields
}

fn flatten_into(prefix: &str, value: &Value, fields: &mut Vec<(String, Value)>) {
    match value {
        Value::Object(map) => {
            for (key, val) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(&path, val, fields);
            }
        }
        other => fields.push((prefix.to_string(), other.clone())),
    }
}

/// A sensitivity result carries a matrix of cells keyed by the swept values.
pub fn is_sensitivity_grid(result: &Value) -> bool {
    result.get("matrix").is_some() && result.get("variable_1_values").is_some()
}

/// Header and rows of a sensitivity grid: one row per variable_1 value, one
/// column per variable_2 value (or a single metric column for a one-way
/// sweep). Failed cells are empty.
pub fn grid_rows(result: &Value) -> (Vec<String>, Vec<Vec<String>>) {
    let text = |v: &Value| match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let name_1 = result.get("variable_1_name").map(text).unwrap_or_default();
    let metric = result.get("output_metric").map(text).unwrap_or_default();
    let empty = Vec::new();
    let values_1 = result
        .get("variable_1_values")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let values_2 = result
        .get("variable_2_values")
        .and_then(Value::as_array)
        .unwrap_or(&empty);
    let matrix = result.get("matrix").and_then(Value::as_array).unwrap_or(&empty);

    let mut header = Vec::with_capacity(values_2.len() + 1);
    if values_2.is_empty() {
        header.push(name_1);
        header.push(metric);
    } else {
        let name_2 = result.get("variable_2_name").map(text).unwrap_or_default();
        header.push(format!("{name_1} \\ {name_2}"));
        header.extend(values_2.iter().map(text));
    }

    let rows = values_1
        .iter()
        .zip(matrix)
        .map(|(v1, cells)| {
            let mut row = vec![text(v1)];
            if let Some(cells) = cells.as_array() {
                row.extend(cells.iter().map(text));
            }
            row
        })
        .collect();

    (header, rows)
}
