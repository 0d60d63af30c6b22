use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::MortgageEquityError;
use crate::types::{Rate, Ratio};
use crate::MortgageEquityResult;

/// Monthly payment periods per year for mortgage debt service.
pub const PAYMENTS_PER_YEAR: u32 = 12;

/// Compute (1 + r)^n by repeated squaring with checked multiplication
/// (avoids Decimal::powd drift).
pub fn compound(rate: Rate, periods: u32) -> MortgageEquityResult<Decimal> {
    let overflow = || MortgageEquityError::Overflow {
        context: format!("compounding {rate} over {periods} periods"),
    };
    let mut base = Decimal::ONE + rate;
    let mut remaining = periods;
    let mut result = Decimal::ONE;
    while remaining > 0 {
        if remaining & 1 == 1 {
            result = result.checked_mul(base).ok_or_else(overflow)?;
        }
        remaining >>= 1;
        if remaining > 0 {
            base = base.checked_mul(base).ok_or_else(overflow)?;
        }
    }
    Ok(result)
}

/// Present Value
pub fn pv(rate: Rate, nper: u32, pmt: Decimal, fv: Decimal) -> MortgageEquityResult<Decimal> {
    if rate.is_zero() {
        return Ok(-(pmt * Decimal::from(nper) + fv));
    }

    let factor = compound(rate, nper)?;
    if factor.is_zero() {
        return Err(MortgageEquityError::DivisionByZero {
            context: "PV factor".into(),
        });
    }

    let annuity_factor = (Decimal::ONE - Decimal::ONE / factor) / rate;
    Ok(-(pmt * annuity_factor + fv / factor))
}

/// Future Value
pub fn fv(rate: Rate, nper: u32, pmt: Decimal, present_value: Decimal) -> MortgageEquityResult<Decimal> {
    if rate.is_zero() {
        return Ok(-(present_value + pmt * Decimal::from(nper)));
    }

    let factor = compound(rate, nper)?;
    let annuity_factor = (factor - Decimal::ONE) / rate;

    Ok(-(present_value * factor + pmt * annuity_factor))
}

/// Payment (PMT)
pub fn pmt(rate: Rate, nper: u32, present_value: Decimal, future_value: Decimal) -> MortgageEquityResult<Decimal> {
    if nper == 0 {
        return Err(MortgageEquityError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return Ok(-(present_value + future_value) / Decimal::from(nper));
    }

    let factor = compound(rate, nper)?;
    let annuity_factor = (factor - Decimal::ONE) / rate;

    if annuity_factor.is_zero() {
        return Err(MortgageEquityError::DivisionByZero {
            context: "PMT annuity factor".into(),
        });
    }

    Ok(-(present_value * factor + future_value) / annuity_factor)
}

/// Number of monthly payments in `years`.
pub fn payment_months(years: u32) -> MortgageEquityResult<u32> {
    years
        .checked_mul(PAYMENTS_PER_YEAR)
        .ok_or_else(|| MortgageEquityError::Overflow {
            context: format!("{years}-year term in monthly payments"),
        })
}

/// Annualised constant of a fully amortising loan paid monthly:
/// 12 * i / (1 - (1 + i)^-N) with i = rate / 12 and N = 12 * years.
/// A zero rate gives the straight-line constant 1 / years.
pub fn loan_constant(annual_rate: Rate, amort_years: u32) -> MortgageEquityResult<Rate> {
    let total_months = payment_months(amort_years)?;
    if total_months == 0 {
        return Err(MortgageEquityError::InvalidInput {
            field: "amort".into(),
            reason: "Amortisation term must be at least 1 year".into(),
        });
    }
    if annual_rate.is_zero() {
        return Ok(Decimal::ONE / Decimal::from(amort_years));
    }
    let monthly_rate = annual_rate / Decimal::from(PAYMENTS_PER_YEAR);
    let monthly = pmt(monthly_rate, total_months, -Decimal::ONE, Decimal::ZERO)?;
    Ok(monthly * Decimal::from(PAYMENTS_PER_YEAR))
}

/// Fraction of original principal retired after `holding_years` of monthly
/// payments on a loan amortising over `amort_years`. Always within [0, 1].
pub fn principal_repaid(
    annual_rate: Rate,
    amort_years: u32,
    holding_years: u32,
) -> MortgageEquityResult<Ratio> {
    if amort_years == 0 {
        return Err(MortgageEquityError::InvalidInput {
            field: "amort".into(),
            reason: "Amortisation term must be at least 1 year".into(),
        });
    }
    if holding_years >= amort_years {
        return Ok(Decimal::ONE);
    }

    let total_months = payment_months(amort_years)?;
    let payments_made = payment_months(holding_years)?;
    if annual_rate.is_zero() {
        return Ok(Decimal::from(holding_years) / Decimal::from(amort_years));
    }
    let monthly_rate = annual_rate / Decimal::from(PAYMENTS_PER_YEAR);

    let monthly_pmt = pmt(monthly_rate, total_months, -Decimal::ONE, Decimal::ZERO)?;
    let balance = fv(monthly_rate, payments_made, monthly_pmt, -Decimal::ONE)?;

    Ok((Decimal::ONE - balance).clamp(Decimal::ZERO, Decimal::ONE))
}

/// Sinking fund factor: y / ((1 + y)^n - 1), the level annual deposit that
/// accumulates to 1 after `n` years at `rate`.
pub fn sinking_fund_factor(rate: Rate, n: u32) -> MortgageEquityResult<Decimal> {
    if n == 0 {
        return Err(MortgageEquityError::DivisionByZero {
            context: "sinking fund factor over zero years".into(),
        });
    }
    if rate.is_zero() {
        return Ok(Decimal::ONE / Decimal::from(n));
    }

    let accumulated = compound(rate, n)? - Decimal::ONE;
    if accumulated.is_zero() {
        return Err(MortgageEquityError::DivisionByZero {
            context: "sinking fund factor denominator".into(),
        });
    }
    Ok(rate / accumulated)
}

/// d/dy of the sinking fund factor, used by the Newton equity-yield solve.
pub fn sinking_fund_factor_slope(rate: Rate, n: u32) -> MortgageEquityResult<Decimal> {
    if n == 0 {
        return Err(MortgageEquityError::DivisionByZero {
            context: "sinking fund slope over zero years".into(),
        });
    }
    let n_dec = Decimal::from(n);
    if rate.is_zero() {
        return Ok(-(n_dec - Decimal::ONE) / (dec!(2) * n_dec));
    }

    let accumulated = compound(rate, n)? - Decimal::ONE;
    if accumulated.is_zero() {
        return Err(MortgageEquityError::DivisionByZero {
            context: "sinking fund slope denominator".into(),
        });
    }
    let numerator = accumulated - rate * n_dec * compound(rate, n - 1)?;
    Ok(numerator / (accumulated * accumulated))
}

/// Ellwood J-factor for income changing along the sinking-fund curve over
/// `n` years at equity yield `rate`: (n - a_n) / (y * s_n * a_n).
///
/// Equivalent to the present-value-weighted average of s_t / s_n across the
/// holding period, so it lies strictly between 0 and 1.
pub fn ellwood_j_factor(rate: Rate, n: u32) -> MortgageEquityResult<Decimal> {
    if n == 0 {
        return Err(MortgageEquityError::DivisionByZero {
            context: "J-factor over zero years".into(),
        });
    }
    let n_dec = Decimal::from(n);
    if rate.is_zero() {
        return Ok((n_dec + Decimal::ONE) / (dec!(2) * n_dec));
    }

    // a_n = PV of 1 per year; s_n = FV of 1 per year
    let annuity = pv(rate, n, -Decimal::ONE, Decimal::ZERO)?;
    let accumulation = fv(rate, n, -Decimal::ONE, Decimal::ZERO)?;
    let denominator = rate * accumulation * annuity;
    if denominator.is_zero() {
        return Err(MortgageEquityError::DivisionByZero {
            context: "J-factor denominator".into(),
        });
    }

    Ok((n_dec - annuity) / denominator)
}
