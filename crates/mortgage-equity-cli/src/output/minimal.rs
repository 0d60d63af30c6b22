use serde_json::Value;

use super::flatten;

/// Output fields in order of priority for a one-value answer.
const PRIORITY_KEYS: [&str; 5] = [
    "cap_rate",
    "base_case_value",
    "op_cap_rate",
    "equity",
    "first_mort",
];

/// Print just the key answer value from the output.
///
/// Looks for the priority fields anywhere in the result (so both the flat
/// mapping and the nested envelope work), then falls back to the first field.
pub fn print_minimal(value: &Value) {
    let result = value.get("result").unwrap_or(value);
    let fields = flatten(result);

    for key in PRIORITY_KEYS {
        let hit = fields.iter().find(|(path, val)| {
            !val.is_null() && (path == key || path.ends_with(&format!(".{key}")))
        });
        if let Some((_, val)) = hit {
            println!("{}", format_minimal(val));
            return;
        }
    }

    match fields.first() {
        Some((key, val)) if !key.is_empty() => println!("{}: {}", key, format_minimal(val)),
        _ => println!("{}", format_minimal(result)),
    }
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
