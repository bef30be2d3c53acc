mod closed_form;
mod engine;
mod error;
mod rates;
mod solver;
mod types;

pub use closed_form::estimate_required_balance;
pub use engine::{DEPLETION_SLACK, Horizon, SimulationOptions, simulate, simulate_longevity};
pub use error::{ModelError, Result};
pub use rates::{MonthlyRates, annuity_factor, monthly_rate, real_rate};
pub use solver::{SolverConfig, solve_required_balance};
pub use types::{
    AnnualExtra, Assumptions, Caveat, ClosedFormEstimate, DEFAULT_MONTH_CAP, MAX_MONTH_CAP,
    MonthSnapshot, SimulationResult, SimulationStatus, SolveIteration, SolverResult, WithdrawalTiming,
};
