use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::MortgageEquityError;
use crate::types::{Percent, Rate};
use crate::MortgageEquityResult;

/// Raw scenario as supplied by the caller: percentages as whole numbers
/// (80 = 80%), booleans for the mezzanine flags and integer years.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCapRateInput {
    /// Target first-year cash-on-cash return on equity
    pub cash_on_cash: Percent,
    /// Nominal first-mortgage loan-to-value
    pub target_ltv: Percent,
    /// Mezzanine debt as a percentage of value
    pub mezz_debt: Percent,
    /// Transfer tax as a percentage of price
    pub transfer_cost: Percent,
    /// Share of the transfer tax borne by the buyer
    pub transfer_buyer_share: Percent,
    /// Recordation tax as a percentage of price
    pub recordation_cost: Percent,
    /// Share of the recordation tax borne by the buyer
    pub recordation_buyer_share: Percent,
    /// Financing fee as a percentage of price
    pub finance: Percent,
    /// First-mortgage interest rate
    pub interest: Percent,
    /// First-mortgage amortisation term in years
    pub amort: i64,
    /// Mezzanine interest rate
    pub mezz_rate: Percent,
    pub mezz_interest_only: bool,
    pub mezz_secured: bool,
    /// Mezzanine amortisation term in years
    pub mezz_amort: i64,
    /// Proportional change in income over the holding period
    pub income_appr: Percent,
    /// Proportional change in value over the holding period
    pub apprec_depr: Percent,
    /// Holding period in years
    pub holding_period: i64,
}

impl RawCapRateInput {
    /// Build from a flat JSON mapping of field name to value.
    pub fn from_value(value: serde_json::Value) -> MortgageEquityResult<Self> {
        Ok(serde_json::from_value(value)?)
    }
}

/// Normalised scenario: every rate and ratio is a fraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapRateInputs {
    pub cash_on_cash: Rate,
    pub target_ltv: Rate,
    pub mezz_debt: Rate,
    pub transfer_cost: Rate,
    pub transfer_buyer_share: Rate,
    pub recordation_cost: Rate,
    pub recordation_buyer_share: Rate,
    pub finance: Rate,
    pub interest: Rate,
    pub amort: u32,
    pub mezz_rate: Rate,
    pub mezz_interest_only: bool,
    pub mezz_secured: bool,
    /// Zero when there is no mezzanine tranche and no term was given
    pub mezz_amort: u32,
    pub income_appr: Rate,
    pub apprec_depr: Rate,
    pub holding_period: u32,
}

impl CapRateInputs {
    pub fn has_mezzanine(&self) -> bool {
        self.mezz_debt > Decimal::ZERO
    }

    pub fn has_income_change(&self) -> bool {
        !self.income_appr.is_zero()
    }
}

impl TryFrom<&RawCapRateInput> for CapRateInputs {
    type Error = MortgageEquityError;

    fn try_from(raw: &RawCapRateInput) -> MortgageEquityResult<Self> {
        normalize(raw)
    }
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

/// Validate a raw scenario and convert its percentages to fractions.
pub fn normalize(raw: &RawCapRateInput) -> MortgageEquityResult<CapRateInputs> {
    validate_raw(raw)?;

    let pct = |v: Percent| v / dec!(100);
    let has_mezz = raw.mezz_debt > Decimal::ZERO;

    Ok(CapRateInputs {
        cash_on_cash: pct(raw.cash_on_cash),
        target_ltv: pct(raw.target_ltv),
        mezz_debt: pct(raw.mezz_debt),
        transfer_cost: pct(raw.transfer_cost),
        transfer_buyer_share: pct(raw.transfer_buyer_share),
        recordation_cost: pct(raw.recordation_cost),
        recordation_buyer_share: pct(raw.recordation_buyer_share),
        finance: pct(raw.finance),
        interest: pct(raw.interest),
        amort: to_years("amort", raw.amort)?,
        mezz_rate: pct(raw.mezz_rate),
        mezz_interest_only: raw.mezz_interest_only,
        mezz_secured: raw.mezz_secured,
        mezz_amort: if has_mezz || raw.mezz_amort > 0 {
            to_years("mezz_amort", raw.mezz_amort)?
        } else {
            0
        },
        income_appr: pct(raw.income_appr),
        apprec_depr: pct(raw.apprec_depr),
        holding_period: to_years("holding_period", raw.holding_period)?,
    })
}

fn to_years(field: &str, years: i64) -> MortgageEquityResult<u32> {
    u32::try_from(years).map_err(|_| MortgageEquityError::InvalidInput {
        field: field.into(),
        reason: format!("{years} is not a representable number of years"),
    })
}

fn invalid(field: &str, reason: &str) -> MortgageEquityError {
    MortgageEquityError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

fn validate_raw(raw: &RawCapRateInput) -> MortgageEquityResult<()> {
    if raw.holding_period <= 0 {
        return Err(invalid(
            "holding_period",
            "Holding period must be at least 1 year",
        ));
    }
    if raw.amort <= 0 {
        return Err(invalid("amort", "Amortisation term must be at least 1 year"));
    }
    if raw.cash_on_cash <= Decimal::ZERO {
        return Err(invalid("cash_on_cash", "Cash-on-cash target must be positive"));
    }
    if raw.interest < Decimal::ZERO {
        return Err(invalid("interest", "Interest rate cannot be negative"));
    }
    if raw.target_ltv < Decimal::ZERO {
        return Err(invalid("target_ltv", "Loan-to-value cannot be negative"));
    }
    if raw.mezz_debt < Decimal::ZERO {
        return Err(invalid("mezz_debt", "Mezzanine debt cannot be negative"));
    }
    if raw.target_ltv + raw.mezz_debt > dec!(100) {
        return Err(invalid(
            "target_ltv",
            "First mortgage plus mezzanine debt cannot exceed 100% of value",
        ));
    }

    if raw.mezz_debt > Decimal::ZERO {
        if raw.mezz_amort <= 0 {
            return Err(invalid(
                "mezz_amort",
                "Mezzanine amortisation term must be at least 1 year",
            ));
        }
        if raw.mezz_rate < Decimal::ZERO {
            return Err(invalid("mezz_rate", "Mezzanine rate cannot be negative"));
        }
    }

    for (field, value) in [
        ("transfer_cost", raw.transfer_cost),
        ("recordation_cost", raw.recordation_cost),
        ("finance", raw.finance),
    ] {
        if value < Decimal::ZERO {
            return Err(invalid(field, "Closing costs cannot be negative"));
        }
    }

    for (field, value) in [
        ("transfer_buyer_share", raw.transfer_buyer_share),
        ("recordation_buyer_share", raw.recordation_buyer_share),
    ] {
        if value < Decimal::ZERO || value > dec!(100) {
            return Err(invalid(field, "Buyer share must be between 0 and 100"));
        }
    }

    if raw.apprec_depr < dec!(-100) {
        return Err(invalid(
            "apprec_depr",
            "Depreciation cannot exceed 100% of value",
        ));
    }
    if raw.income_appr <= dec!(-100) {
        return Err(invalid(
            "income_appr",
            "Income change must be greater than -100%",
        ));
    }

    Ok(())
}
