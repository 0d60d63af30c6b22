use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::capital_structure::{is_balanced, resolve_capital_structure, CapitalStructure};
use super::inputs::{normalize, CapRateInputs, RawCapRateInput};
use crate::time_value::{loan_constant, principal_repaid};
use crate::types::{with_metadata, ComputationOutput, Rate, Ratio};
use crate::MortgageEquityResult;

/// Debt-service terms for a single tranche.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    /// Annual debt service per unit of principal
    pub constant: Rate,
    /// Fraction of original principal retired by the end of the holding period
    pub principal_repaid: Ratio,
}

impl LoanTerms {
    pub const NONE: LoanTerms = LoanTerms {
        constant: Decimal::ZERO,
        principal_repaid: Decimal::ZERO,
    };
}

/// Everything that depends only on the inputs, computed once per scenario
/// and shared by every solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedTerms {
    pub capital: CapitalStructure,
    pub first_mortgage: LoanTerms,
    /// All zero when there is no mezzanine tranche
    pub mezzanine: LoanTerms,
}

impl DerivedTerms {
    pub fn first_mort(&self) -> Ratio {
        self.capital.first_mort
    }

    pub fn mezz(&self) -> Ratio {
        self.capital.mezz
    }

    pub fn equity(&self) -> Ratio {
        self.capital.equity
    }

    /// Weighted annual debt service of all tranches per unit of capitalisation.
    pub fn debt_service(&self) -> Rate {
        self.capital.first_mort * self.first_mortgage.constant
            + self.capital.mezz * self.mezzanine.constant
    }

    /// Principal retired over the holding period, weighted across tranches.
    pub fn weighted_paydown(&self) -> Ratio {
        self.capital.first_mort * self.first_mortgage.principal_repaid
            + self.capital.mezz * self.mezzanine.principal_repaid
    }
}

/// Loan constant and paydown for one tranche. Interest-only debt pays its
/// coupon and retires nothing.
pub fn tranche_terms(
    rate: Rate,
    amort_years: u32,
    holding_years: u32,
    interest_only: bool,
) -> MortgageEquityResult<LoanTerms> {
    if interest_only {
        return Ok(LoanTerms {
            constant: rate,
            principal_repaid: Decimal::ZERO,
        });
    }

    Ok(LoanTerms {
        constant: loan_constant(rate, amort_years)?,
        principal_repaid: principal_repaid(rate, amort_years, holding_years)?,
    })
}

/// Derive the capital structure and per-tranche debt terms.
pub fn derive_terms(inputs: &CapRateInputs) -> MortgageEquityResult<DerivedTerms> {
    let capital = resolve_capital_structure(inputs)?;

    let first_mortgage = tranche_terms(inputs.interest, inputs.amort, inputs.holding_period, false)?;

    let mezzanine = if inputs.has_mezzanine() {
        tranche_terms(
            inputs.mezz_rate,
            inputs.mezz_amort,
            inputs.holding_period,
            inputs.mezz_interest_only,
        )?
    } else {
        LoanTerms::NONE
    };

    log::debug!(
        "derived terms: first_mort={} mezz={} equity={} const={} repaid={} mezz_const={} mezz_repaid={} balanced={}",
        capital.first_mort,
        capital.mezz,
        capital.equity,
        first_mortgage.constant,
        first_mortgage.principal_repaid,
        mezzanine.constant,
        mezzanine.principal_repaid,
        is_balanced(&capital),
    );

    Ok(DerivedTerms {
        capital,
        first_mortgage,
        mezzanine,
    })
}

/// Validate a raw scenario and report its derived terms without solving
/// for the cap rate.
pub fn calculate_terms(
    raw: &RawCapRateInput,
) -> MortgageEquityResult<ComputationOutput<DerivedTerms>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let inputs = normalize(raw)?;
    let terms = derive_terms(&inputs)?;

    if terms.equity() < dec!(0.10) {
        warnings.push(format!(
            "High leverage: equity is only {:.1}% of total capitalisation",
            terms.equity() * dec!(100)
        ));
    }
    if terms.first_mortgage.principal_repaid == Decimal::ONE {
        warnings.push("First mortgage is fully repaid within the holding period".into());
    }
    if inputs.has_mezzanine() && terms.mezzanine.principal_repaid == Decimal::ONE {
        warnings.push("Mezzanine is fully repaid within the holding period".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Mortgage-Equity Capital Structure and Debt Terms",
        raw,
        warnings,
        elapsed,
        terms,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mortgage_equity::inputs::{normalize, RawCapRateInput};
    use rust_decimal_macros::dec;

    fn sample_raw() -> RawCapRateInput {
        RawCapRateInput {
            cash_on_cash: dec!(10),
            target_ltv: dec!(80),
            mezz_debt: dec!(0),
            transfer_cost: dec!(2),
            transfer_buyer_share: dec!(50),
            recordation_cost: dec!(5),
            recordation_buyer_share: dec!(50),
            finance: dec!(1),
            interest: dec!(6),
            amort: 30,
            mezz_rate: dec!(8),
            mezz_interest_only: true,
            mezz_secured: false,
            mezz_amort: 30,
            income_appr: dec!(0),
            apprec_depr: dec!(0),
            holding_period: 5,
        }
    }

    #[test]
    fn test_baseline_terms() {
        let terms = derive_terms(&normalize(&sample_raw()).unwrap()).unwrap();
        assert!((terms.first_mort() - dec!(0.78)).abs() < dec!(0.005));
        assert!((terms.equity() - dec!(0.22)).abs() < dec!(0.005));
        assert!((terms.first_mortgage.constant - dec!(0.0719)).abs() < dec!(0.0001));
        assert!((terms.first_mortgage.principal_repaid - dec!(0.0695)).abs() < dec!(0.0001));
    }

    #[test]
    fn test_zero_mezz_zeroes_mezz_terms() {
        let terms = derive_terms(&normalize(&sample_raw()).unwrap()).unwrap();
        assert_eq!(terms.mezz(), Decimal::ZERO);
        assert_eq!(terms.mezzanine, LoanTerms::NONE);
    }

    #[test]
    fn test_interest_only_mezz() {
        let mut raw = sample_raw();
        raw.mezz_debt = dec!(5);
        let terms = derive_terms(&normalize(&raw).unwrap()).unwrap();
        assert_eq!(terms.mezzanine.constant, dec!(0.08));
        assert_eq!(terms.mezzanine.principal_repaid, Decimal::ZERO);
        // 0.05 * 0.08
        assert_eq!(terms.mezz() * terms.mezzanine.constant, dec!(0.004));
    }

    #[test]
    fn test_amortising_mezz_matches_first_mortgage_formula() {
        let mut raw = sample_raw();
        raw.mezz_debt = dec!(10);
        raw.mezz_rate = dec!(6);
        raw.mezz_interest_only = false;
        let terms = derive_terms(&normalize(&raw).unwrap()).unwrap();
        assert_eq!(terms.mezzanine, terms.first_mortgage);
    }

    #[test]
    fn test_terms_stay_in_bounds() {
        for (rate, amort, hold) in [(dec!(0.0), 10u32, 5u32), (dec!(0.12), 5, 10), (dec!(0.03), 40, 1)] {
            let t = tranche_terms(rate, amort, hold, false).unwrap();
            assert!(t.constant >= Decimal::ZERO);
            assert!(t.principal_repaid >= Decimal::ZERO && t.principal_repaid <= Decimal::ONE);
        }
    }

    #[test]
    fn test_calculate_terms_envelope() {
        let mut raw = sample_raw();
        raw.holding_period = 30;
        let result = calculate_terms(&raw).unwrap();
        assert_eq!(result.result.first_mortgage.principal_repaid, Decimal::ONE);
        assert!(result.warnings.iter().any(|w| w.contains("fully repaid")));
    }

    #[test]
    fn test_debt_service_and_paydown() {
        let terms = derive_terms(&normalize(&sample_raw()).unwrap()).unwrap();
        // 0.784314 * 0.071946
        assert!((terms.debt_service() - dec!(0.056428)).abs() < dec!(0.000001));
        assert!((terms.weighted_paydown() - dec!(0.054476)).abs() < dec!(0.000001));
    }
}
