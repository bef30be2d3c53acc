//! Monthly rate conversions and annuity factors.
//!
//! All conversions are compound (`(1 + r)^(1/12) - 1`) and the real rate is
//! the exact Fisher relation, so simulated and closed-form paths agree.

use super::types::{Assumptions, WithdrawalTiming};

/// Below this magnitude a monthly rate is treated as zero.
const ZERO_RATE_EPS: f64 = 1e-12;

pub fn monthly_rate(annual_rate: f64) -> f64 {
    (annual_rate.ln_1p() / 12.0).exp_m1()
}

/// Rate `r` such that `(1 + growth) = (1 + r)(1 + inflation)`.
pub fn real_rate(growth: f64, inflation: f64) -> f64 {
    (1.0 + growth) / (1.0 + inflation) - 1.0
}

/// Present value of `months` payments of 1, first one after a month.
pub fn annuity_factor(rate: f64, months: u32) -> f64 {
    let n = months as f64;
    if rate.abs() < ZERO_RATE_EPS {
        return n;
    }
    -(-n * rate.ln_1p()).exp_m1() / rate
}

/// `(1 + rate)^(-periods)`.
pub fn discount(rate: f64, periods: f64) -> f64 {
    (-periods * rate.ln_1p()).exp()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonthlyRates {
    /// Nominal monthly growth after the tax haircut.
    pub growth: f64,
    pub inflation: f64,
    pub real: f64,
}

impl MonthlyRates {
    pub fn from_assumptions(assumptions: &Assumptions) -> Self {
        let annual_return = assumptions.annual_return * (1.0 - assumptions.return_tax_rate);
        let growth = monthly_rate(annual_return);
        let inflation = monthly_rate(assumptions.annual_inflation);
        Self {
            growth,
            inflation,
            real: real_rate(growth, inflation),
        }
    }

    /// Rate that discounts expenses and extras in today's money.
    pub fn expense_rate(&self, assumptions: &Assumptions) -> f64 {
        if assumptions.index_expenses {
            self.real
        } else {
            self.growth
        }
    }

    pub fn income_rate(&self, assumptions: &Assumptions) -> f64 {
        if assumptions.index_income {
            self.real
        } else {
            self.growth
        }
    }
}

/// Months between the valuation date and a payment in month `month` (1-based).
pub fn payment_time(timing: WithdrawalTiming, month: u32) -> u32 {
    match timing {
        WithdrawalTiming::Start => month - 1,
        WithdrawalTiming::End => month,
    }
}
