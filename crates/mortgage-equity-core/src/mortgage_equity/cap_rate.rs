use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;

use super::capital_structure::Tranche;
use super::debt_terms::{derive_terms, DerivedTerms};
use super::inputs::{normalize, CapRateInputs, RawCapRateInput};
use super::sinking_fund::sinking_fund;
use crate::error::MortgageEquityError;
use crate::time_value::{ellwood_j_factor, sinking_fund_factor, sinking_fund_factor_slope};
use crate::types::{with_metadata, ComputationOutput, Rate};
use crate::MortgageEquityResult;

/// Every key the flat output mapping can carry.
pub const FLAT_KEYS: [&str; 17] = [
    "first_mort",
    "mezz",
    "calc_yield",
    "amort_first_mort",
    "amort_mezz",
    "appr",
    "cap_rate",
    "sinking_fund_factor",
    "appr_depr_factor",
    "op_cap_rate",
    "yield_per",
    "amort_first_mort_per",
    "amort_mezz_per",
    "appr_per",
    "j_factor",
    "base_cash_flow",
    "base_cash_growth",
];

const MIN_YIELD: Decimal = dec!(-0.99);
const MAX_YIELD: Decimal = dec!(10);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Stopping rule for the equity-yield Newton iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Absolute residual at which the yield is accepted
    pub tolerance: Decimal,
    pub max_iterations: u32,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            tolerance: dec!(0.000001),
            max_iterations: 100,
        }
    }
}

/// Cap rate and its components, all per unit of total capitalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapRateOutput {
    /// First-mortgage debt service: first_mort * loan constant
    pub first_mort_debt_service: Rate,
    /// Mezzanine debt service: mezz * mezzanine constant
    pub mezz_debt_service: Rate,
    /// Equity income required, including the sinking-fund credit for
    /// amortisation and value change
    pub calc_yield: Rate,
    pub amort_first_mort: Rate,
    pub amort_mezz: Rate,
    pub appr: Rate,
    pub cap_rate: Rate,
    pub sinking_fund_factor: Decimal,
    pub appr_depr_factor: Decimal,
    /// Cap rate on the purchase price before capitalised closing costs
    pub op_cap_rate: Rate,
    pub yield_per: Decimal,
    pub amort_first_mort_per: Decimal,
    pub amort_mezz_per: Decimal,
    pub appr_per: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub j_factor: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_cash_flow: Option<Rate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_cash_growth: Option<Rate>,
    /// Solved total equity yield over the holding period
    pub equity_yield: Rate,
    /// Newton steps taken to reach `equity_yield`
    pub iterations: u32,
}

impl CapRateOutput {
    /// Named values in flat-mapping order. `first_mort` and `mezz` are the
    /// debt-service components; the income-change keys appear only when
    /// income is expected to change.
    pub fn named_values(&self) -> Vec<(&'static str, Decimal)> {
        let mut values = vec![
            ("first_mort", self.first_mort_debt_service),
            ("mezz", self.mezz_debt_service),
            ("calc_yield", self.calc_yield),
            ("amort_first_mort", self.amort_first_mort),
            ("amort_mezz", self.amort_mezz),
            ("appr", self.appr),
            ("cap_rate", self.cap_rate),
            ("sinking_fund_factor", self.sinking_fund_factor),
            ("appr_depr_factor", self.appr_depr_factor),
            ("op_cap_rate", self.op_cap_rate),
            ("yield_per", self.yield_per),
            ("amort_first_mort_per", self.amort_first_mort_per),
            ("amort_mezz_per", self.amort_mezz_per),
            ("appr_per", self.appr_per),
        ];
        if let Some(j) = self.j_factor {
            values.push(("j_factor", j));
        }
        if let Some(v) = self.base_cash_flow {
            values.push(("base_cash_flow", v));
        }
        if let Some(v) = self.base_cash_growth {
            values.push(("base_cash_growth", v));
        }
        values
    }

    /// Look up one value of the flat mapping by name.
    pub fn metric(&self, name: &str) -> Option<Decimal> {
        self.named_values()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }

    /// Flat name-to-float mapping used by the CLI and the bindings.
    pub fn to_flat_map(&self) -> BTreeMap<String, f64> {
        self.named_values()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_f64().unwrap_or(f64::NAN)))
            .collect()
    }

    /// Sum of the components that make up the cap rate.
    pub fn component_total(&self) -> Rate {
        self.first_mort_debt_service
            + self.mezz_debt_service
            + self.calc_yield
            + self.amort_first_mort
            + self.amort_mezz
            + self.appr
    }

    pub fn share_total(&self) -> Decimal {
        self.yield_per + self.amort_first_mort_per + self.amort_mezz_per + self.appr_per
    }
}

/// Full result of a cap-rate computation: the derived terms it was solved
/// from alongside the solved output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapRateAnalysis {
    pub output: CapRateOutput,
    pub terms: DerivedTerms,
    /// Capital stack from senior to junior
    pub capital_stack: Vec<Tranche>,
    /// Closed-form band-of-investment rate before any income-change
    /// reconciliation
    pub band_of_investment: Rate,
    /// Year-one income over total debt service, when there is debt
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debt_service_coverage: Option<Decimal>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compute the mortgage-equity cap rate for a raw scenario.
///
/// Validates and normalises the inputs, derives the capital structure and
/// debt terms, then solves for the cap rate with default solver settings.
pub fn calculate_cap_rate(
    raw: &RawCapRateInput,
) -> MortgageEquityResult<ComputationOutput<CapRateAnalysis>> {
    calculate_cap_rate_with(raw, &SolverSettings::default())
}

/// As [`calculate_cap_rate`] with explicit solver settings.
pub fn calculate_cap_rate_with(
    raw: &RawCapRateInput,
    settings: &SolverSettings,
) -> MortgageEquityResult<ComputationOutput<CapRateAnalysis>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let inputs = normalize(raw)?;
    let terms = derive_terms(&inputs)?;
    let output = solve_with(&inputs, &terms, settings)?;

    let band_of_investment = band_of_investment(&inputs, &terms);
    let debt_service = terms.debt_service();
    let debt_service_coverage = if debt_service > Decimal::ZERO {
        Some(output.cap_rate / debt_service)
    } else {
        None
    };

    collect_warnings(&inputs, &terms, &output, debt_service_coverage, &mut warnings);

    let analysis = CapRateAnalysis {
        capital_stack: terms.capital.stack(inputs.mezz_secured),
        output,
        terms,
        band_of_investment,
        debt_service_coverage,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Mortgage-Equity Capitalisation Rate (Band of Investment with Ellwood J-Factor)",
        raw,
        warnings,
        elapsed,
        analysis,
    ))
}

/// Solve for the cap rate given normalised inputs and their derived terms.
pub fn solve(inputs: &CapRateInputs, terms: &DerivedTerms) -> MortgageEquityResult<CapRateOutput> {
    solve_with(inputs, terms, &SolverSettings::default())
}

/// Solve with explicit Newton settings.
pub fn solve_with(
    inputs: &CapRateInputs,
    terms: &DerivedTerms,
    settings: &SolverSettings,
) -> MortgageEquityResult<CapRateOutput> {
    let equity = terms.equity();
    if equity <= Decimal::ZERO {
        return Err(MortgageEquityError::FinancialImpossibility(format!(
            "Equity share must be positive, got {equity}"
        )));
    }

    let (equity_yield, iterations) = solve_equity_yield(inputs, terms, settings)?;
    let sf = sinking_fund(equity_yield, inputs.holding_period, inputs.apprec_depr)?;
    let sff = sf.factor;

    // Income-change reconciliation
    let j_factor = if inputs.has_income_change() {
        Some(ellwood_j_factor(equity_yield, inputs.holding_period)?)
    } else {
        None
    };
    let divisor = match j_factor {
        Some(j) => Decimal::ONE + inputs.income_appr * j,
        None => Decimal::ONE,
    };
    if divisor <= Decimal::ZERO {
        return Err(MortgageEquityError::FinancialImpossibility(format!(
            "Income change of {} cannot be reconciled: 1 + change * J = {divisor}",
            inputs.income_appr
        )));
    }

    let first_paydown = terms.first_mort() * terms.first_mortgage.principal_repaid * sff;
    let mezz_paydown = terms.mezz() * terms.mezzanine.principal_repaid * sff;
    let value_change = inputs.apprec_depr * sff;
    let cash_yield = equity * inputs.cash_on_cash;

    let total_yield = cash_yield + first_paydown + mezz_paydown + value_change;
    if total_yield.is_zero() {
        return Err(MortgageEquityError::DivisionByZero {
            context: "total equity yield for component shares".into(),
        });
    }

    let base_rate = band_of_investment(inputs, terms);
    let cap_rate = base_rate / divisor;
    let capitalized_load = terms.capital.closing_costs.capitalized_load;

    let (base_cash_flow, base_cash_growth) = match j_factor {
        Some(_) => (Some(cash_yield / divisor), Some(base_rate - cap_rate)),
        None => (None, None),
    };

    log::debug!(
        "solved cap rate {cap_rate} (band {base_rate}, divisor {divisor}, yield {equity_yield}, sff {sff})"
    );

    Ok(CapRateOutput {
        first_mort_debt_service: terms.first_mort() * terms.first_mortgage.constant / divisor,
        mezz_debt_service: terms.mezz() * terms.mezzanine.constant / divisor,
        calc_yield: total_yield / divisor,
        amort_first_mort: -first_paydown / divisor,
        amort_mezz: -mezz_paydown / divisor,
        appr: -value_change / divisor,
        cap_rate,
        sinking_fund_factor: sff,
        appr_depr_factor: sf.appr_depr_factor,
        op_cap_rate: cap_rate * (Decimal::ONE + capitalized_load),
        yield_per: cash_yield / total_yield,
        amort_first_mort_per: first_paydown / total_yield,
        amort_mezz_per: mezz_paydown / total_yield,
        appr_per: value_change / total_yield,
        j_factor,
        base_cash_flow,
        base_cash_growth,
        equity_yield,
        iterations,
    })
}

/// first_mort * const + mezz * mezz_const + equity * cash_on_cash
pub fn band_of_investment(inputs: &CapRateInputs, terms: &DerivedTerms) -> Rate {
    terms.debt_service() + terms.equity() * inputs.cash_on_cash
}

// ---------------------------------------------------------------------------
// Equity yield
// ---------------------------------------------------------------------------

/// Total equity yield Y such that the first-year cash yield plus the
/// sinking-fund credit for debt paydown and value change equals Y:
///
///   Y = cash_on_cash + SFF(Y, H) * (first_mort * P + mezz * Pm + apprec_depr) / equity
///
/// Newton's method from Y = cash_on_cash, clamped to [-0.99, 10] each step.
fn solve_equity_yield(
    inputs: &CapRateInputs,
    terms: &DerivedTerms,
    settings: &SolverSettings,
) -> MortgageEquityResult<(Rate, u32)> {
    let equity = terms.equity();
    let benefit = terms.weighted_paydown() + inputs.apprec_depr;
    let holding = inputs.holding_period;

    ensure_yield_root(inputs, equity, benefit, settings)?;

    let mut y = inputs.cash_on_cash;
    let mut residual = Decimal::ZERO;

    for i in 0..settings.max_iterations {
        residual = y - inputs.cash_on_cash - benefit * sinking_fund_factor(y, holding)? / equity;

        if residual.abs() < settings.tolerance {
            log::trace!("equity yield converged to {y} after {i} steps");
            return Ok((y, i));
        }

        let slope = Decimal::ONE - benefit * sinking_fund_factor_slope(y, holding)? / equity;
        if slope.is_zero() {
            return Err(MortgageEquityError::ConvergenceFailure {
                function: "Equity yield".into(),
                iterations: i,
                last_delta: residual,
            });
        }

        y -= residual / slope;
        y = y.clamp(MIN_YIELD, MAX_YIELD);
        log::trace!("equity yield step {i}: y={y} residual={residual}");
    }

    Err(MortgageEquityError::ConvergenceFailure {
        function: "Equity yield".into(),
        iterations: settings.max_iterations,
        last_delta: residual,
    })
}

/// Reject scenarios whose equity-yield residual has no root in the clamp range.
///
/// With a non-negative benefit the residual rises with slope at least one and
/// always crosses zero above cash_on_cash. With a net loss it is convex and
/// positive from cash_on_cash upward, so its minimum is found by bisecting
/// the slope over [MIN_YIELD, cash_on_cash].
fn ensure_yield_root(
    inputs: &CapRateInputs,
    equity: Decimal,
    benefit: Decimal,
    settings: &SolverSettings,
) -> MortgageEquityResult<()> {
    if benefit >= Decimal::ZERO {
        return Ok(());
    }
    let holding = inputs.holding_period;
    let residual = |y: Rate| -> MortgageEquityResult<Decimal> {
        Ok(y - inputs.cash_on_cash - benefit * sinking_fund_factor(y, holding)? / equity)
    };
    let slope = |y: Rate| -> MortgageEquityResult<Decimal> {
        Ok(Decimal::ONE - benefit * sinking_fund_factor_slope(y, holding)? / equity)
    };

    let mut lo = MIN_YIELD;
    let mut hi = inputs.cash_on_cash.min(MAX_YIELD);
    if slope(lo)? < Decimal::ZERO {
        if slope(hi)? <= Decimal::ZERO {
            lo = hi;
        } else {
            for _ in 0..80 {
                let mid = (lo + hi) / dec!(2);
                if slope(mid)? < Decimal::ZERO {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
        }
    }

    let floor = residual(lo)?;
    if floor >= settings.tolerance {
        return Err(MortgageEquityError::FinancialImpossibility(format!(
            "Depreciation exceeds equity's recovery capacity: no equity yield balances a net loss of {} (residual never falls below {floor:.6})",
            -benefit
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

fn collect_warnings(
    inputs: &CapRateInputs,
    terms: &DerivedTerms,
    output: &CapRateOutput,
    debt_service_coverage: Option<Decimal>,
    warnings: &mut Vec<String>,
) {
    if terms.equity() < dec!(0.10) {
        warnings.push(format!(
            "High leverage: equity is only {:.1}% of total capitalisation",
            terms.equity() * dec!(100)
        ));
    }

    if terms.first_mortgage.constant > output.cap_rate && terms.first_mort() > Decimal::ZERO {
        warnings.push(format!(
            "Negative leverage: loan constant {:.4} exceeds cap rate {:.4}",
            terms.first_mortgage.constant, output.cap_rate
        ));
    }

    if let Some(dscr) = debt_service_coverage {
        if dscr < dec!(1.2) {
            warnings.push(format!(
                "Debt service coverage of {dscr:.2}x is below the typical 1.20x lender minimum"
            ));
        }
    }

    if output.cap_rate < dec!(0.02) || output.cap_rate > dec!(0.20) {
        warnings.push(format!(
            "Cap rate {:.2}% is outside the typical 2%-20% range",
            output.cap_rate * dec!(100)
        ));
    }

    if inputs.holding_period > inputs.amort {
        warnings.push(format!(
            "Holding period of {} years exceeds the {}-year amortisation term; the first mortgage is fully repaid",
            inputs.holding_period, inputs.amort
        ));
    }
}
