//! Compound interest projection. Pure: nothing is read or stored.

use super::round_money;
use crate::errors::{BankError, Result};
use crate::models::{SimulationRequest, SimulationResult, YearlyProjection};
use rust_decimal::{Decimal, MathematicalOps};
use validator::Validate;

/// `final = principal * (1 + r/n)^(n*t)` with `r` the annual rate as a
/// fraction, `n` compounding periods per year and `t` years. The series holds
/// the projected amount at the end of each whole year.
pub fn simulate_compound_interest(request: &SimulationRequest) -> Result<SimulationResult> {
    request.validate()?;

    if request.amount <= Decimal::ZERO {
        return Err(BankError::Validation(
            "amount must be greater than zero".to_string(),
        ));
    }
    if request.annual_rate < Decimal::ZERO {
        return Err(BankError::Validation(
            "annualRate cannot be negative".to_string(),
        ));
    }

    let periods = Decimal::from(request.periods_per_year);
    let growth = request
        .annual_rate
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(|rate| rate.checked_div(periods))
        .and_then(|rate| rate.checked_add(Decimal::ONE))
        .ok_or_else(overflow)?;

    let amount_after = |years: u32| -> Result<Decimal> {
        let exponent = u64::from(request.periods_per_year) * u64::from(years);
        growth
            .checked_powu(exponent)
            .and_then(|factor| request.amount.checked_mul(factor))
            .ok_or_else(overflow)
    };

    let final_amount = amount_after(request.years)?;
    let series = (1..=request.years)
        .map(|year| {
            Ok(YearlyProjection {
                year,
                amount: round_money(amount_after(year)?),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SimulationResult {
        initial: round_money(request.amount),
        final_amount: round_money(final_amount),
        interest_earned: round_money(final_amount - request.amount),
        series,
    })
}

fn overflow() -> BankError {
    BankError::Validation("simulation parameters are out of range".to_string())
}
