use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::time_value::sinking_fund_factor;
use crate::types::Rate;
use crate::MortgageEquityResult;

/// Sinking-fund terms at a given equity yield.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SinkingFund {
    pub factor: Decimal,
    /// Annualised value change: negative for appreciation, positive for
    /// depreciation
    pub appr_depr_factor: Decimal,
}

/// Sinking-fund factor over the holding period and the annualised
/// appreciation/depreciation adjustment it implies.
pub fn sinking_fund(
    equity_yield: Rate,
    holding_years: u32,
    apprec_depr: Rate,
) -> MortgageEquityResult<SinkingFund> {
    let factor = sinking_fund_factor(equity_yield, holding_years)?;
    Ok(SinkingFund {
        factor,
        appr_depr_factor: -apprec_depr * factor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_appreciation_lowers_rate() {
        let sf = sinking_fund(dec!(0.12), 7, dec!(0.05)).unwrap();
        assert!(sf.factor > Decimal::ZERO);
        assert!(sf.appr_depr_factor < Decimal::ZERO);
        assert_eq!(sf.appr_depr_factor, -dec!(0.05) * sf.factor);
    }

    #[test]
    fn test_depreciation_raises_rate() {
        let sf = sinking_fund(dec!(0.12), 7, dec!(-0.10)).unwrap();
        assert!(sf.appr_depr_factor > Decimal::ZERO);
    }

    #[test]
    fn test_no_value_change() {
        let sf = sinking_fund(dec!(0.10), 5, Decimal::ZERO).unwrap();
        assert!((sf.factor - dec!(0.163797)).abs() < dec!(0.000001));
        assert_eq!(sf.appr_depr_factor, Decimal::ZERO);
    }

    #[test]
    fn test_single_year_hold() {
        // 1-year hold: y / ((1 + y) - 1) = 1
        let sf = sinking_fund(dec!(0.15), 1, Decimal::ZERO).unwrap();
        assert_eq!(sf.factor, Decimal::ONE);
    }
}
