//! Analytic required balance under constant rates.

use tracing::debug;

use super::error::Result;
use super::rates::{MonthlyRates, annuity_factor, discount, payment_time};
use super::types::{Assumptions, ClosedFormEstimate, MAX_MONTH_CAP, WithdrawalTiming};

/// Present value of every net withdrawal over the target term; the balance
/// that leaves exactly nothing at the end.
///
/// Expenses and income are valued as separate annuities so an unindexed
/// stream can be discounted at the nominal rate while an indexed one uses
/// the real rate. Extras inside the term are discounted one by one.
///
/// A non-positive present value means income covers the plan and a zero
/// balance suffices; that is reported through `zero_balance_sufficient`,
/// not as an error.
pub fn estimate_required_balance(assumptions: &Assumptions) -> Result<ClosedFormEstimate> {
    assumptions.validate(MAX_MONTH_CAP)?;

    let rates = MonthlyRates::from_assumptions(assumptions);
    let months = assumptions.target_months();
    let expense_rate = rates.expense_rate(assumptions);
    let income_rate = rates.income_rate(assumptions);

    let expenses_pv = assumptions.monthly_expenses
        * stream_factor(expense_rate, months, assumptions.withdrawal_timing);
    let income_pv = assumptions.monthly_income
        * stream_factor(income_rate, months, assumptions.withdrawal_timing);
    let extras_pv = extras_present_value(assumptions, expense_rate, months);

    let present_value = expenses_pv + extras_pv - income_pv;
    let zero_balance_sufficient = present_value <= 0.0;
    debug!(
        months,
        expenses_pv, income_pv, extras_pv, present_value, "closed-form estimate"
    );

    Ok(ClosedFormEstimate {
        required_balance: present_value.max(0.0),
        real_monthly_rate: rates.real,
        net_monthly_withdrawal: assumptions.monthly_expenses - assumptions.monthly_income,
        target_months: months,
        zero_balance_sufficient,
    })
}

fn stream_factor(rate: f64, months: u32, timing: WithdrawalTiming) -> f64 {
    let ordinary = annuity_factor(rate, months);
    match timing {
        WithdrawalTiming::Start => ordinary * (1.0 + rate),
        WithdrawalTiming::End => ordinary,
    }
}

fn extras_present_value(assumptions: &Assumptions, rate: f64, months: u32) -> f64 {
    let timing = assumptions.withdrawal_timing;
    let listed: f64 = assumptions
        .annual_extras
        .iter()
        .filter(|extra| extra.amount > 0.0 && u64::from(extra.year) * 12 < u64::from(months))
        .map(|extra| {
            let t = payment_time(timing, extra.year * 12 + 1);
            extra.amount * discount(rate, t as f64)
        })
        .sum();

    // Januaries inside the term: years 0..ceil(months / 12).
    let januaries = months.div_ceil(12);
    let recurring = if assumptions.recurring_annual_extra > 0.0 {
        let first = discount(rate, payment_time(timing, 1) as f64);
        let yearly_rate = (12.0 * rate.ln_1p()).exp_m1();
        assumptions.recurring_annual_extra
            * first
            * (1.0 + yearly_rate)
            * annuity_factor(yearly_rate, januaries)
    } else {
        0.0
    };

    listed + recurring
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::engine::{SimulationOptions, simulate};
    use crate::core::types::{AnnualExtra, SimulationStatus};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    fn assert_sized_to_the_month(a: &Assumptions) {
        let estimate = estimate_required_balance(a).expect("valid assumptions");
        let run = simulate(estimate.required_balance, a, SimulationOptions::default())
            .expect("valid run");
        assert_eq!(run.status, SimulationStatus::LastedFullTerm);
        assert_close(run.ending_balance, 0.0, 0.01);
    }

    #[test]
    fn zero_rates_reduce_to_linear_total() {
        let a = Assumptions::new(0.0, 0.0, 0.0, 3_000.0, 30.0);
        let estimate = estimate_required_balance(&a).expect("valid assumptions");
        assert_eq!(estimate.required_balance, 1_080_000.0);
        assert_eq!(estimate.target_months, 360);
        assert!(!estimate.zero_balance_sufficient);
    }

    #[test]
    fn five_percent_return_three_percent_inflation_lasts_thirty_years() {
        let a = Assumptions::new(0.05, 0.03, 0.0, 3_000.0, 30.0);
        let estimate = estimate_required_balance(&a).expect("valid assumptions");
        // Real return near 1.94% a year: well under the 1.08M undiscounted total.
        assert!(estimate.required_balance > 780_000.0);
        assert!(estimate.required_balance < 830_000.0);
        assert_close(estimate.real_monthly_rate, (1.05f64 / 1.03).powf(1.0 / 12.0) - 1.0, 1e-12);
        assert_sized_to_the_month(&a);
    }

    #[test]
    fn end_of_month_timing_is_sized_exactly_too() {
        let mut a = Assumptions::new(0.05, 0.03, 0.0, 3_000.0, 30.0);
        a.withdrawal_timing = WithdrawalTiming::End;
        assert_sized_to_the_month(&a);
    }

    #[test]
    fn start_timing_costs_one_month_of_real_growth_more() {
        let mut a = Assumptions::new(0.07, 0.02, 0.0, 2_500.0, 25.0);
        let start = estimate_required_balance(&a).expect("valid assumptions");
        a.withdrawal_timing = WithdrawalTiming::End;
        let end = estimate_required_balance(&a).expect("valid assumptions");
        assert_close(
            start.required_balance,
            end.required_balance * (1.0 + end.real_monthly_rate),
            1e-6,
        );
    }

    #[test]
    fn near_zero_real_rate_uses_linear_fallback() {
        let a = Assumptions::new(0.03, 0.03, 0.0, 3_000.0, 30.0);
        let estimate = estimate_required_balance(&a).expect("valid assumptions");
        assert!(estimate.real_monthly_rate.abs() < 1e-12);
        assert_close(estimate.required_balance, 1_080_000.0, 1e-3);
        assert_sized_to_the_month(&a);
    }

    #[test]
    fn income_above_expenses_needs_no_savings() {
        let a = Assumptions::new(0.08, 0.0, 1_200.0, 1_000.0, 20.0);
        let estimate = estimate_required_balance(&a).expect("not an error");
        assert!(estimate.zero_balance_sufficient);
        assert_eq!(estimate.required_balance, 0.0);
        assert_eq!(estimate.net_monthly_withdrawal, -200.0);

        let run = simulate(0.0, &a, SimulationOptions::default()).expect("valid run");
        assert_eq!(run.status, SimulationStatus::LastedFullTerm);
    }

    #[test]
    fn fixed_income_is_discounted_at_nominal_rate() {
        let mut a = Assumptions::new(0.06, 0.03, 1_000.0, 2_000.0, 20.0);
        let indexed = estimate_required_balance(&a).expect("valid assumptions");
        a.index_income = false;
        let fixed = estimate_required_balance(&a).expect("valid assumptions");
        assert!(fixed.required_balance > indexed.required_balance);
        assert_sized_to_the_month(&a);
    }

    #[test]
    fn extras_inside_the_term_are_added_undiscounted_at_zero_rates() {
        let mut a = Assumptions::new(0.0, 0.0, 0.0, 0.0, 3.0);
        a.annual_extras = vec![
            AnnualExtra {
                year: 0,
                amount: 100.0,
            },
            AnnualExtra {
                year: 2,
                amount: 50.0,
            },
            AnnualExtra {
                year: 5,
                amount: 999.0,
            },
        ];
        let estimate = estimate_required_balance(&a).expect("valid assumptions");
        assert_eq!(estimate.required_balance, 150.0);
    }

    #[test]
    fn extras_with_growth_are_sized_exactly() {
        let mut a = Assumptions::new(0.06, 0.02, 0.0, 1_500.0, 15.0);
        a.recurring_annual_extra = 5_000.0;
        a.annual_extras = vec![AnnualExtra {
            year: 3,
            amount: 20_000.0,
        }];
        a.withdrawal_timing = WithdrawalTiming::End;
        assert_sized_to_the_month(&a);

        a.withdrawal_timing = WithdrawalTiming::Start;
        a.return_tax_rate = 0.15;
        assert_sized_to_the_month(&a);
    }

    #[test]
    fn recurring_extra_counts_every_january_inside_the_term() {
        let mut a = Assumptions::new(0.0, 0.0, 0.0, 0.0, 25.0 / 12.0);
        a.recurring_annual_extra = 100.0;
        let estimate = estimate_required_balance(&a).expect("valid assumptions");
        assert_close(estimate.required_balance, 300.0, 1e-9);
    }

    #[test]
    fn extras_in_far_future_years_are_ignored() {
        let mut a = Assumptions::new(0.05, 0.03, 0.0, 1_000.0, 10.0);
        let without = estimate_required_balance(&a).expect("valid assumptions");
        a.annual_extras = vec![AnnualExtra {
            year: u32::MAX,
            amount: 1_000_000.0,
        }];
        let with = estimate_required_balance(&a).expect("valid assumptions");
        assert_eq!(with.required_balance, without.required_balance);
        assert_sized_to_the_month(&a);
    }

    #[test]
    fn rejects_invalid_assumptions() {
        let a = Assumptions::new(0.05, 0.03, 0.0, 3_000.0, -1.0);
        assert!(estimate_required_balance(&a).is_err());
    }

    #[test]
    fn rejects_term_beyond_largest_month_cap() {
        let a = Assumptions::new(0.05, 0.03, 0.0, 3_000.0, 4.0e8);
        let err = estimate_required_balance(&a).expect_err("must reject");
        assert!(err.to_string().contains("target_years"));

        let mut longest = Assumptions::new(0.05, 0.03, 0.0, 3_000.0, 200.0);
        longest.recurring_annual_extra = 1_000.0;
        assert_sized_to_the_month(&longest);
    }
}
