use tracing::{debug, warn};

use super::error::{ModelError, Result};
use super::rates::{MonthlyRates, payment_time};
use super::types::{
    Assumptions, Caveat, DEFAULT_MONTH_CAP, MonthSnapshot, SimulationResult, SimulationStatus,
    WithdrawalTiming,
};

/// A balance above `-DEPLETION_SLACK` still counts as funded; absorbs float
/// noise when a plan is sized to end at exactly zero.
pub const DEPLETION_SLACK: f64 = 0.01;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Horizon {
    /// Run for the target duration only.
    TargetTerm,
    /// Run until the money runs out, the run provably never depletes, or the
    /// month cap is hit.
    Longevity,
}

#[derive(Copy, Clone, Debug)]
pub struct SimulationOptions {
    pub horizon: Horizon,
    pub month_cap: u32,
    /// Consecutive months of strict growth required before the longevity run
    /// may stop early.
    pub growth_window: u32,
    pub record_snapshots: bool,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            horizon: Horizon::TargetTerm,
            month_cap: DEFAULT_MONTH_CAP,
            growth_window: 12,
            record_snapshots: false,
        }
    }
}

impl SimulationOptions {
    pub fn longevity() -> Self {
        Self {
            horizon: Horizon::Longevity,
            ..Self::default()
        }
    }

    pub fn with_snapshots(self) -> Self {
        Self {
            record_snapshots: true,
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MonthFlows {
    expenses: f64,
    income: f64,
    extra: f64,
}

impl MonthFlows {
    fn for_month(assumptions: &Assumptions, rates: &MonthlyRates, month: u32) -> Self {
        let t = payment_time(assumptions.withdrawal_timing, month) as i32;
        let price_index = (1.0 + rates.inflation).powi(t);
        let expense_index = if assumptions.index_expenses {
            price_index
        } else {
            1.0
        };
        let income_index = if assumptions.index_income {
            price_index
        } else {
            1.0
        };

        let extra = if month % 12 == 1 {
            assumptions.extra_for_year((month - 1) / 12) * expense_index
        } else {
            0.0
        };

        Self {
            expenses: assumptions.monthly_expenses * expense_index,
            income: assumptions.monthly_income * income_index,
            extra,
        }
    }

    fn net_outflow(self) -> f64 {
        self.expenses + self.extra - self.income
    }
}

/// Runs one deterministic month-by-month simulation.
pub fn simulate(
    initial_balance: f64,
    assumptions: &Assumptions,
    options: SimulationOptions,
) -> Result<SimulationResult> {
    validate_run(initial_balance, assumptions, options)?;
    Ok(run_simulation(initial_balance, assumptions, options))
}

/// How long `initial_balance` lasts, ignoring the target duration.
pub fn simulate_longevity(
    initial_balance: f64,
    assumptions: &Assumptions,
) -> Result<SimulationResult> {
    simulate(initial_balance, assumptions, SimulationOptions::longevity())
}

pub(crate) fn validate_run(
    initial_balance: f64,
    assumptions: &Assumptions,
    options: SimulationOptions,
) -> Result<()> {
    assumptions.validate(options.month_cap)?;
    if !initial_balance.is_finite() || initial_balance < 0.0 {
        return Err(ModelError::invalid(
            "initial_balance",
            "must be a finite amount >= 0",
        ));
    }
    if options.growth_window == 0 {
        return Err(ModelError::invalid("growth_window", "must be > 0"));
    }
    Ok(())
}

/// Assumes `validate_run` already passed.
pub(crate) fn run_simulation(
    initial_balance: f64,
    assumptions: &Assumptions,
    options: SimulationOptions,
) -> SimulationResult {
    let rates = MonthlyRates::from_assumptions(assumptions);
    let last_month = match options.horizon {
        Horizon::TargetTerm => assumptions.target_months(),
        Horizon::Longevity => options.month_cap,
    };
    let last_extra_month = assumptions
        .last_listed_extra_year()
        .map(|year| year.saturating_mul(12).saturating_add(1));

    let mut snapshots = if options.record_snapshots {
        Vec::with_capacity(last_month as usize)
    } else {
        Vec::new()
    };
    let mut balance = initial_balance;
    let mut rising_streak = 0u32;

    for month in 1..=last_month {
        let flows = MonthFlows::for_month(assumptions, &rates, month);
        let previous = balance;

        let investment_return = match assumptions.withdrawal_timing {
            WithdrawalTiming::Start => {
                let invested = balance - flows.net_outflow();
                balance = invested * (1.0 + rates.growth);
                balance - invested
            }
            WithdrawalTiming::End => {
                let growth = balance * rates.growth;
                balance = balance + growth - flows.net_outflow();
                growth
            }
        };

        if options.record_snapshots {
            snapshots.push(MonthSnapshot {
                month_index: month,
                age: assumptions
                    .start_age
                    .map(|age| age + (month - 1) as f64 / 12.0),
                balance,
                monthly_withdrawal: flows.expenses,
                extra_withdrawal: flows.extra,
                income: flows.income,
                investment_return,
            });
        }

        if balance < -DEPLETION_SLACK {
            debug!(month, balance, "funds ran out");
            return SimulationResult {
                months_lasted: month - 1,
                months_simulated: month,
                ending_balance: balance,
                status: SimulationStatus::RanOut,
                caveat: None,
                snapshots,
            };
        }

        if balance > previous {
            rising_streak += 1;
        } else {
            rising_streak = 0;
        }

        if options.horizon == Horizon::Longevity
            && rising_streak >= options.growth_window
            && last_extra_month.is_none_or(|last| last <= month)
            && perpetuity_floor(assumptions, &rates, month).is_some_and(|floor| balance >= floor)
        {
            debug!(month, balance, "balance covers all future spending");
            return SimulationResult {
                months_lasted: options.month_cap,
                months_simulated: month,
                ending_balance: balance,
                status: SimulationStatus::LastsIndefinitely,
                caveat: None,
                snapshots,
            };
        }
    }

    match options.horizon {
        Horizon::TargetTerm => SimulationResult {
            months_lasted: last_month,
            months_simulated: last_month,
            ending_balance: balance,
            status: SimulationStatus::LastedFullTerm,
            caveat: None,
            snapshots,
        },
        Horizon::Longevity => {
            warn!(
                month_cap = options.month_cap,
                balance, "month cap reached without a depletion verdict"
            );
            SimulationResult {
                months_lasted: options.month_cap,
                months_simulated: last_month,
                ending_balance: balance,
                status: SimulationStatus::LastsIndefinitely,
                caveat: Some(Caveat::ComputationCapReached),
                snapshots,
            }
        }
    }
}

/// Present value, at the end of `month`, of every future expense and
/// recurring extra paid forever. Income is left out so the floor is a
/// sufficient condition on its own. `None` when the sum diverges.
fn perpetuity_floor(assumptions: &Assumptions, rates: &MonthlyRates, month: u32) -> Option<f64> {
    let rate = rates.expense_rate(assumptions);
    let outflows = assumptions.monthly_expenses > 0.0 || assumptions.recurring_annual_extra > 0.0;
    if !outflows {
        return Some(0.0);
    }
    if rate <= 0.0 {
        return None;
    }

    let level = if assumptions.index_expenses {
        (1.0 + rates.inflation).powi(month as i32)
    } else {
        1.0
    };
    let due_now = match assumptions.withdrawal_timing {
        WithdrawalTiming::Start => 1.0 + rate,
        WithdrawalTiming::End => 1.0,
    };
    let expenses = assumptions.monthly_expenses * due_now / rate;

    let mut extras = 0.0;
    if assumptions.recurring_annual_extra > 0.0 {
        let mut next_january = (month / 12) * 12 + 1;
        if next_january <= month {
            next_january += 12;
        }
        let wait = payment_time(assumptions.withdrawal_timing, next_january) - month;
        let yearly = (1.0 + rate).powi(12);
        extras = assumptions.recurring_annual_extra * (1.0 + rate).powi(-(wait as i32))
            / (1.0 - 1.0 / yearly);
    }

    Some(level * (expenses + extras))
}
