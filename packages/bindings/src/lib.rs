use napi::Result as NapiResult;
use napi_derive::napi;

use mortgage_equity_core::mortgage_equity::{self, RawCapRateInput};
use mortgage_equity_core::scenarios::sensitivity::{self, SensitivityInput};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_scenario(input_json: &str) -> NapiResult<RawCapRateInput> {
    let value: serde_json::Value = serde_json::from_str(input_json).map_err(to_napi_error)?;
    RawCapRateInput::from_value(value).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Cap rate
// ---------------------------------------------------------------------------

/// Full computation envelope for a flat scenario mapping.
#[napi]
pub fn calculate_cap_rate(input_json: String) -> NapiResult<String> {
    let raw = parse_scenario(&input_json)?;
    let output = mortgage_equity::calculate_cap_rate(&raw).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Flat name-to-number mapping only.
#[napi]
pub fn calculate_cap_rate_flat(input_json: String) -> NapiResult<String> {
    let raw = parse_scenario(&input_json)?;
    let output = mortgage_equity::calculate_cap_rate(&raw).map_err(to_napi_error)?;
    serde_json::to_string(&output.result.output.to_flat_map()).map_err(to_napi_error)
}

#[napi]
pub fn derive_terms(input_json: String) -> NapiResult<String> {
    let raw = parse_scenario(&input_json)?;
    let output = mortgage_equity::calculate_terms(&raw).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[napi]
pub fn cap_rate_sensitivity(input_json: String) -> NapiResult<String> {
    let input: SensitivityInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = sensitivity::cap_rate_sensitivity(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
