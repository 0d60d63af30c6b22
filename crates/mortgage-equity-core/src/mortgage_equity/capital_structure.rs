use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::inputs::CapRateInputs;
use crate::error::MortgageEquityError;
use crate::types::{Rate, Ratio};
use crate::MortgageEquityResult;

/// Buyer-borne acquisition costs, each a fraction of purchase price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosingCosts {
    /// transfer_cost * transfer_buyer_share
    pub transfer_load: Rate,
    /// recordation_cost * recordation_buyer_share
    pub recordation_load: Rate,
    /// Financing fee
    pub financing_load: Rate,
    /// Portion added to the purchase price to form total capitalisation
    pub capitalized_load: Rate,
}

/// Position of a tranche in the lien stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LienPosition {
    FirstLien,
    SecuredSubordinate,
    Unsecured,
    Residual,
}

/// One layer of the capital stack, ordered by claim priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tranche {
    pub name: String,
    pub position: LienPosition,
    pub share: Ratio,
}

/// Split of total capitalisation between debt and equity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapitalStructure {
    pub first_mort: Ratio,
    pub mezz: Ratio,
    pub equity: Ratio,
    /// First mortgage plus any mezzanine secured behind it
    pub secured_ltv: Ratio,
    pub closing_costs: ClosingCosts,
}

impl CapitalStructure {
    /// Tranches from senior to junior.
    pub fn stack(&self, mezz_secured: bool) -> Vec<Tranche> {
        let mut stack = vec![Tranche {
            name: "first_mortgage".into(),
            position: LienPosition::FirstLien,
            share: self.first_mort,
        }];
        if self.mezz > Decimal::ZERO {
            stack.push(Tranche {
                name: "mezzanine".into(),
                position: if mezz_secured {
                    LienPosition::SecuredSubordinate
                } else {
                    LienPosition::Unsecured
                },
                share: self.mezz,
            });
        }
        stack.push(Tranche {
            name: "equity".into(),
            position: LienPosition::Residual,
            share: self.equity,
        });
        stack
    }
}

/// Split total capitalisation into first mortgage, mezzanine and equity.
///
/// Capitalised closing costs (buyer transfer tax and financing fee) are
/// added to the price, so the first mortgage, sized on price, covers a
/// smaller share of the total: first_mort = target_ltv / (1 + load).
/// The mezzanine is sized directly from `mezz_debt`; its secured flag only
/// decides whether it counts towards secured LTV.
pub fn resolve_capital_structure(inputs: &CapRateInputs) -> MortgageEquityResult<CapitalStructure> {
    let closing_costs = closing_costs(inputs);

    let basis = Decimal::ONE + closing_costs.capitalized_load;
    let first_mort = inputs.target_ltv / basis;
    let mezz = inputs.mezz_debt;
    let equity = Decimal::ONE - first_mort - mezz;

    if equity <= Decimal::ZERO {
        return Err(MortgageEquityError::FinancialImpossibility(format!(
            "Over-leveraged: first mortgage {first_mort} plus mezzanine {mezz} leaves equity of {equity}"
        )));
    }

    let secured_ltv = if inputs.mezz_secured {
        first_mort + mezz
    } else {
        first_mort
    };

    Ok(CapitalStructure {
        first_mort,
        mezz,
        equity,
        secured_ltv,
        closing_costs,
    })
}

fn closing_costs(inputs: &CapRateInputs) -> ClosingCosts {
    let transfer_load = inputs.transfer_cost * inputs.transfer_buyer_share;
    let recordation_load = inputs.recordation_cost * inputs.recordation_buyer_share;
    let financing_load = inputs.finance;

    ClosingCosts {
        transfer_load,
        recordation_load,
        financing_load,
        // Recordation is settled outside the capitalised basis
        capitalized_load: transfer_load + financing_load,
    }
}

/// Whether first mortgage, mezzanine and equity sum to one.
pub fn is_balanced(structure: &CapitalStructure) -> bool {
    let total = structure.first_mort + structure.mezz + structure.equity;
    (total - Decimal::ONE).abs() <= dec!(0.000000001)
}
