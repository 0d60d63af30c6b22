use serde_json::Value;
use std::io;

use super::{flatten, grid_rows, is_sensitivity_grid};

/// Write output as CSV to stdout.
pub fn print_csv(value: &Value) {
    let stdout = io::stdout();
    let mut wtr = csv::Writer::from_writer(stdout.lock());

    let result = value.get("result").unwrap_or(value);
    if is_sensitivity_grid(result) {
        let (header, rows) = grid_rows(result);
        let _ = wtr.write_record(&header);
        for row in rows {
            let _ = wtr.write_record(&row);
        }
    } else if result.is_object() {
        let _ = wtr.write_record(["field", "value"]);
        for (key, val) in flatten(result) {
            let _ = wtr.write_record([key, format_csv_value(&val)]);
        }
    } else {
        let _ = wtr.write_record([format_csv_value(result)]);
    }

    let _ = wtr.flush();
}

fn format_csv_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
