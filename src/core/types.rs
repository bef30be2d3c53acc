use serde::Serialize;

use super::error::{ModelError, Result};

/// Longest run the simulator will attempt, in months (250 years).
pub const DEFAULT_MONTH_CAP: u32 = 3000;

/// Upper bound on any month cap or target term (1000 years).
pub const MAX_MONTH_CAP: u32 = 12_000;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WithdrawalTiming {
    /// Withdraw at the start of the month, before that month's growth.
    Start,
    /// Withdraw at the end of the month, after growth.
    End,
}

/// One-off expense paid in January of the given simulated year (0 = first year).
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualExtra {
    pub year: u32,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assumptions {
    pub annual_return: f64,
    pub annual_inflation: f64,
    pub monthly_income: f64,
    pub monthly_expenses: f64,
    pub annual_extras: Vec<AnnualExtra>,
    pub recurring_annual_extra: f64,
    pub target_years: f64,
    pub withdrawal_timing: WithdrawalTiming,
    pub return_tax_rate: f64,
    pub index_expenses: bool,
    pub index_income: bool,
    pub start_age: Option<f64>,
}

impl Assumptions {
    /// Plain assumptions: indexed income and expenses, start-of-month
    /// withdrawals, no extras and no tax on returns.
    pub fn new(
        annual_return: f64,
        annual_inflation: f64,
        monthly_income: f64,
        monthly_expenses: f64,
        target_years: f64,
    ) -> Self {
        Self {
            annual_return,
            annual_inflation,
            monthly_income,
            monthly_expenses,
            annual_extras: Vec::new(),
            recurring_annual_extra: 0.0,
            target_years,
            withdrawal_timing: WithdrawalTiming::Start,
            return_tax_rate: 0.0,
            index_expenses: true,
            index_income: true,
            start_age: None,
        }
    }

    pub fn target_months(&self) -> u32 {
        (self.target_years * 12.0).round().max(0.0) as u32
    }

    /// Extra expense due in January of `year`, in today's money.
    pub fn extra_for_year(&self, year: u32) -> f64 {
        self.recurring_annual_extra
            + self
                .annual_extras
                .iter()
                .filter(|extra| extra.year == year)
                .map(|extra| extra.amount)
                .sum::<f64>()
    }

    pub fn has_extras(&self) -> bool {
        self.recurring_annual_extra > 0.0 || self.annual_extras.iter().any(|e| e.amount > 0.0)
    }

    /// Last year carrying a listed one-off extra.
    pub fn last_listed_extra_year(&self) -> Option<u32> {
        self.annual_extras
            .iter()
            .filter(|extra| extra.amount > 0.0)
            .map(|extra| extra.year)
            .max()
    }

    pub fn validate(&self, month_cap: u32) -> Result<()> {
        if month_cap == 0 || month_cap > MAX_MONTH_CAP {
            return Err(ModelError::invalid(
                "month_cap",
                format!("{month_cap} is outside 1..={MAX_MONTH_CAP} months"),
            ));
        }

        for (field, rate) in [
            ("annual_return", self.annual_return),
            ("annual_inflation", self.annual_inflation),
        ] {
            if !rate.is_finite() {
                return Err(ModelError::invalid(field, "must be a finite number"));
            }
            if rate <= -1.0 || rate > 1.0 {
                return Err(ModelError::invalid(
                    field,
                    format!("{rate} is outside the plausible range (-100%, 100%]"),
                ));
            }
        }

        if !(0.0..=1.0).contains(&self.return_tax_rate) {
            return Err(ModelError::invalid(
                "return_tax_rate",
                "must be between 0 and 1",
            ));
        }

        for (field, amount) in [
            ("monthly_income", self.monthly_income),
            ("monthly_expenses", self.monthly_expenses),
            ("recurring_annual_extra", self.recurring_annual_extra),
        ] {
            if !amount.is_finite() || amount < 0.0 {
                return Err(ModelError::invalid(field, "must be a finite amount >= 0"));
            }
        }

        for extra in &self.annual_extras {
            if !extra.amount.is_finite() || extra.amount < 0.0 {
                return Err(ModelError::invalid(
                    "annual_extras",
                    format!("extra for year {} must be a finite amount >= 0", extra.year),
                ));
            }
        }

        if !self.target_years.is_finite() || self.target_years <= 0.0 {
            return Err(ModelError::invalid("target_years", "must be > 0"));
        }
        let months = self.target_months();
        if months == 0 {
            return Err(ModelError::invalid(
                "target_years",
                "must cover at least one month",
            ));
        }
        if months > month_cap {
            return Err(ModelError::invalid(
                "target_years",
                format!("{months} months exceeds the simulation cap of {month_cap} months"),
            ));
        }

        if let Some(age) = self.start_age {
            if !age.is_finite() || age < 0.0 {
                return Err(ModelError::invalid("start_age", "must be >= 0"));
            }
        }

        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SimulationStatus {
    RanOut,
    LastedFullTerm,
    LastsIndefinitely,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Caveat {
    /// The month cap was hit before the run could prove it never depletes.
    ComputationCapReached,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthSnapshot {
    pub month_index: u32,
    pub age: Option<f64>,
    pub balance: f64,
    pub monthly_withdrawal: f64,
    pub extra_withdrawal: f64,
    pub income: f64,
    pub investment_return: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    pub months_lasted: u32,
    pub months_simulated: u32,
    pub ending_balance: f64,
    pub status: SimulationStatus,
    pub caveat: Option<Caveat>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub snapshots: Vec<MonthSnapshot>,
}

impl SimulationResult {
    pub fn ran_out(&self) -> bool {
        self.status == SimulationStatus::RanOut
    }

    pub fn years_lasted(&self) -> f64 {
        self.months_lasted as f64 / 12.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClosedFormEstimate {
    pub required_balance: f64,
    pub real_monthly_rate: f64,
    pub net_monthly_withdrawal: f64,
    pub target_months: u32,
    pub zero_balance_sufficient: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate: f64,
    pub ran_out: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverResult {
    pub required_balance: f64,
    pub iterations: u32,
    pub achieved_tolerance: f64,
    pub converged: bool,
    pub bracket_expansions: u32,
    pub closed_form_seed: f64,
    #[serde(skip)]
    pub trace: Vec<SolveIteration>,
}
