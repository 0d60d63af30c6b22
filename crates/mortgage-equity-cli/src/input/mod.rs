pub mod file;
pub mod stdin;

use serde_json::Value;

/// Read a flat JSON scenario from `--input <file>` or, failing that, piped
/// stdin. `what` names the command in the error when neither is given.
pub fn read_scenario(path: Option<&str>, what: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let value = match path {
        Some(path) => file::read_json_value(path)?,
        None => match stdin::read_stdin()? {
            Some(value) => value,
            None => return Err(format!("--input <file.json> or stdin required for {what}").into()),
        },
    };

    if !value.is_object() {
        return Err(format!("{what} expects a JSON object of named inputs").into());
    }
    Ok(value)
}
